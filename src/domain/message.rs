use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MessageId = Uuid;

/// A row of the Messages sheet. Sender and receiver are full names, which is
/// how people are addressed across both dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        body: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, MessageError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(MessageError::EmptyBody);
        }
        let receiver = receiver.into().trim().to_string();
        if receiver.is_empty() {
            return Err(MessageError::NoRecipient);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            sender: sender.into().trim().to_string(),
            receiver,
            body,
            timestamp,
        })
    }

    /// Keep the id a message already carries in the Messages sheet.
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    EmptyBody,
    NoRecipient,
}

impl std::fmt::Display for MessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageError::EmptyBody => write!(f, "Message cannot be empty."),
            MessageError::NoRecipient => write!(f, "Message has no recipient."),
        }
    }
}

impl std::error::Error for MessageError {}

/// Inbox and sent counts shown as the dashboard badge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxCounts {
    pub inbox: usize,
    pub sent: usize,
}

impl std::fmt::Display for MailboxCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Messages - Inbox: {} | Sent: {}", self.inbox, self.sent)
    }
}

pub fn mailbox_counts(messages: &[Message], full_name: &str) -> MailboxCounts {
    let full_name = full_name.trim();
    messages.iter().fold(MailboxCounts::default(), |mut acc, m| {
        if m.receiver.trim() == full_name {
            acc.inbox += 1;
        }
        if m.sender.trim() == full_name {
            acc.sent += 1;
        }
        acc
    })
}

/// Messages received by `full_name`, newest first.
pub fn inbox(messages: &[Message], full_name: &str) -> Vec<Message> {
    newest_first(messages.iter().filter(|m| m.receiver.trim() == full_name.trim()))
}

/// Messages sent by `full_name`, newest first.
pub fn sent(messages: &[Message], full_name: &str) -> Vec<Message> {
    newest_first(messages.iter().filter(|m| m.sender.trim() == full_name.trim()))
}

fn newest_first<'a>(messages: impl Iterator<Item = &'a Message>) -> Vec<Message> {
    let mut out: Vec<Message> = messages.cloned().collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    out
}
