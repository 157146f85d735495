use thiserror::Error;

use crate::domain::{
    Cents, CredentialError, GpaError, LedgerError, MessageError, Role, TransactionKind,
    format_dollars,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Username not found.")]
    UserNotFound,

    #[error("Incorrect password.")]
    IncorrectPassword,

    #[error("That username already exists in {}.", .0.sheet_name())]
    UsernameTaken(Role),

    #[error("{role} '{username}' not found")]
    RecordNotFound { role: Role, username: String },

    #[error("No {0} named '{1}'")]
    RecipientNotFound(Role, String),

    #[error("No advisor is assigned to you, or the assigned advisor is not listed.")]
    AdvisorNotFound,

    #[error("This action is only available to {0} accounts.")]
    WrongRole(Role),

    #[error("{student} is not registered for {course}.")]
    NotAdvisee { student: String, course: String },

    #[error("Cannot withdraw more than your current balance.")]
    InsufficientFunds { balance: Cents, requested: Cents },

    #[error("Enter a {} amount greater than 0.", .kind.as_str().to_lowercase())]
    InvalidAmount { kind: TransactionKind, amount: Cents },

    #[error("Your balance changed while processing; nothing was saved. Please retry.")]
    BalanceChanged,

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    #[error("{0}")]
    InvalidGpa(#[from] GpaError),

    #[error("{0}")]
    InvalidMessage(#[from] MessageError),

    #[error("Deleting a user needs explicit confirmation.")]
    ConfirmationRequired,

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { balance, requested } => {
                AppError::InsufficientFunds { balance, requested }
            }
            other => AppError::Ledger(other),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::UserNotFound => AppError::UserNotFound,
            CredentialError::IncorrectPassword => AppError::IncorrectPassword,
        }
    }
}

impl AppError {
    /// Extra detail shown under the main message, if any.
    pub fn detail(&self) -> Option<String> {
        match self {
            AppError::InsufficientFunds { balance, requested } => Some(format!(
                "Balance {}, requested {}",
                format_dollars(*balance),
                format_dollars(*requested)
            )),
            _ => None,
        }
    }
}
