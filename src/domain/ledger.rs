use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, Role};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "Deposit",
            TransactionKind::Withdrawal => "Withdrawal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "deposit" => Some(TransactionKind::Deposit),
            "withdrawal" | "withdraw" => Some(TransactionKind::Withdrawal),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable audit entry describing a single balance change.
/// Records are append-only: storage never updates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// Assigned by the repository on insert
    pub sequence: i64,
    pub username: String,
    pub role: Role,
    pub kind: TransactionKind,
    /// Always positive
    pub amount_cents: Cents,
    pub old_balance: Cents,
    pub new_balance: Cents,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Check the record invariant: amount > 0, new = old ± amount, and a
    /// withdrawal never takes more than the old balance.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount_cents <= 0 {
            return Err(LedgerError::InvalidAmount(self.amount_cents));
        }
        if self.old_balance < 0 {
            return Err(LedgerError::NegativeBalance(self.old_balance));
        }
        let expected = match self.kind {
            TransactionKind::Deposit => self.old_balance.checked_add(self.amount_cents),
            TransactionKind::Withdrawal => {
                if self.amount_cents > self.old_balance {
                    return Err(LedgerError::InsufficientFunds {
                        balance: self.old_balance,
                        requested: self.amount_cents,
                    });
                }
                Some(self.old_balance - self.amount_cents)
            }
        };
        match expected {
            Some(expected) if expected == self.new_balance => Ok(()),
            Some(expected) => Err(LedgerError::Inconsistent {
                expected,
                recorded: self.new_balance,
            }),
            None => Err(LedgerError::Overflow),
        }
    }
}

/// Apply a deposit or withdrawal to `current_balance`.
///
/// Returns the new balance together with the record describing the
/// transition. Rejected mutations produce no record; the caller is expected
/// to persist the balance and the record together.
pub fn apply(
    username: &str,
    role: Role,
    current_balance: Cents,
    amount_cents: Cents,
    kind: TransactionKind,
    timestamp: DateTime<Utc>,
) -> Result<(Cents, TransactionRecord), LedgerError> {
    if amount_cents <= 0 {
        return Err(LedgerError::InvalidAmount(amount_cents));
    }
    if current_balance < 0 {
        return Err(LedgerError::NegativeBalance(current_balance));
    }

    let new_balance = match kind {
        TransactionKind::Deposit => current_balance
            .checked_add(amount_cents)
            .ok_or(LedgerError::Overflow)?,
        TransactionKind::Withdrawal => {
            if amount_cents > current_balance {
                return Err(LedgerError::InsufficientFunds {
                    balance: current_balance,
                    requested: amount_cents,
                });
            }
            current_balance - amount_cents
        }
    };

    let record = TransactionRecord {
        id: Uuid::new_v4(),
        sequence: 0,
        username: username.to_string(),
        role,
        kind,
        amount_cents,
        old_balance: current_balance,
        new_balance,
        timestamp,
    };

    Ok((new_balance, record))
}

/// Most recent records first, at most `limit` of them.
pub fn recent(records: &[TransactionRecord], limit: usize) -> Vec<TransactionRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.sequence.cmp(&a.sequence))
    });
    sorted.truncate(limit);
    sorted
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    InvalidAmount(Cents),
    NegativeBalance(Cents),
    InsufficientFunds { balance: Cents, requested: Cents },
    Inconsistent { expected: Cents, recorded: Cents },
    Overflow,
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::InvalidAmount(amount) => {
                write!(f, "Amount must be greater than 0 (got {} cents)", amount)
            }
            LedgerError::NegativeBalance(balance) => {
                write!(f, "Balance cannot be negative (got {} cents)", balance)
            }
            LedgerError::InsufficientFunds { balance, requested } => write!(
                f,
                "Cannot withdraw {} cents from a balance of {} cents",
                requested, balance
            ),
            LedgerError::Inconsistent { expected, recorded } => write!(
                f,
                "New balance {} cents does not match expected {} cents",
                recorded, expected
            ),
            LedgerError::Overflow => write!(f, "Balance overflow"),
        }
    }
}

impl std::error::Error for LedgerError {}
