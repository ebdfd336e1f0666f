//! Command structs for ledger operations.
//!
//! These types group parameters for write operations
//! (deposit/withdraw/transfer), keeping call sites readable and avoiding
//! long argument lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, Money};

/// Whether a transfer targets another account of the same customer or an
/// arbitrary account at the bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Internal,
    External,
}

impl TransferKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

impl TryFrom<&str> for TransferKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "internal" => Ok(Self::Internal),
            "external" => Ok(Self::External),
            other => Err(LedgerError::InvalidTarget(format!(
                "invalid transfer kind: {other}"
            ))),
        }
    }
}

/// Common metadata for transaction creation.
#[derive(Clone, Debug)]
pub struct TxMeta {
    pub note: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TxMeta {
    #[must_use]
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            note: None,
            idempotency_key: None,
            created_at,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Credit an account.
#[derive(Clone, Debug)]
pub struct DepositCmd {
    pub account_id: Uuid,
    pub amount: Money,
    pub meta: TxMeta,
}

impl DepositCmd {
    #[must_use]
    pub fn new(account_id: Uuid, amount: Money, created_at: DateTime<Utc>) -> Self {
        Self {
            account_id,
            amount,
            meta: TxMeta::new(created_at),
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.meta.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.meta.idempotency_key = Some(key.into());
        self
    }
}

/// Debit an account; fails with `InsufficientFunds` rather than overdraw.
#[derive(Clone, Debug)]
pub struct WithdrawCmd {
    pub account_id: Uuid,
    pub amount: Money,
    pub meta: TxMeta,
}

impl WithdrawCmd {
    #[must_use]
    pub fn new(account_id: Uuid, amount: Money, created_at: DateTime<Utc>) -> Self {
        Self {
            account_id,
            amount,
            meta: TxMeta::new(created_at),
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.meta.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.meta.idempotency_key = Some(key.into());
        self
    }
}

/// Move funds between two accounts as one atomic operation.
#[derive(Clone, Debug)]
pub struct TransferCmd {
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub amount: Money,
    pub kind: TransferKind,
    pub meta: TxMeta,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Money,
        kind: TransferKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
            kind,
            meta: TxMeta::new(created_at),
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.meta.note = Some(note.into());
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.meta.idempotency_key = Some(key.into());
        self
    }
}
