//! The module contains the errors the ledger can return.
//!
//! Every failure a caller can act on is a dedicated variant; storage-level
//! failures pass through as [`Database`].
//!
//! [`Database`]: LedgerError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Ledger custom errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Username taken: {0}")]
    UsernameTaken(String),
    #[error("Transfer failed: {0}")]
    TransferFailed(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidTarget(a), Self::InvalidTarget(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::UsernameTaken(a), Self::UsernameTaken(b)) => a == b,
            (Self::TransferFailed(a), Self::TransferFailed(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
