//! Transaction primitives.
//!
//! A `Transaction` is one append-only ledger row recording a single balance
//! change on one account. A transfer is recorded as **two** rows (a
//! `transfer_out` on the source and a `transfer_in` on the target) sharing a
//! `transfer_id` correlation id; rows are never updated or deleted once
//! committed.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, Money, ResultLedger};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::TransferOut => "transfer_out",
            Self::TransferIn => "transfer_in",
        }
    }

    /// Whether this kind increases (`true`) or decreases (`false`) the
    /// balance of the account it is recorded against.
    pub fn is_credit(self) -> bool {
        matches!(self, Self::Deposit | Self::TransferIn)
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "transfer_out" => Ok(Self::TransferOut),
            "transfer_in" => Ok(Self::TransferIn),
            other => Err(LedgerError::InvalidAmount(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(LedgerError::InvalidAmount(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    /// The account whose balance this row affects.
    pub account_id: Uuid,
    /// The other account of a transfer, if any.
    pub counterpart_account_id: Option<Uuid>,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    /// Always positive; the sign is implied by `kind`.
    pub amount: Money,
    /// Correlation id shared by the two rows of one transfer.
    pub transfer_id: Option<Uuid>,
    pub note: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

impl Transaction {
    pub fn new(
        account_id: Uuid,
        kind: TransactionKind,
        amount: Money,
        created_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> ResultLedger<Self> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(
                "amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            counterpart_account_id: None,
            kind,
            status: TransactionStatus::Completed,
            amount,
            transfer_id: None,
            note: None,
            created_by: created_by.into(),
            created_at,
            idempotency_key: None,
        })
    }

    /// Signed effect of this row on its account balance.
    pub fn signed_amount(&self) -> Money {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub counterpart_account_id: Option<String>,
    pub kind: String,
    pub status: String,
    pub amount_minor: i64,
    pub transfer_id: Option<String>,
    pub note: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
    pub idempotency_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            account_id: ActiveValue::Set(tx.account_id.to_string()),
            counterpart_account_id: ActiveValue::Set(
                tx.counterpart_account_id.map(|id| id.to_string()),
            ),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            amount_minor: ActiveValue::Set(tx.amount.cents()),
            transfer_id: ActiveValue::Set(tx.transfer_id.map(|id| id.to_string())),
            note: ActiveValue::Set(tx.note.clone()),
            created_by: ActiveValue::Set(tx.created_by.clone()),
            created_at: ActiveValue::Set(tx.created_at),
            idempotency_key: ActiveValue::Set(tx.idempotency_key.clone()),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| LedgerError::NotFound("transaction not exists".to_string()))?,
            account_id: Uuid::parse_str(&model.account_id)
                .map_err(|_| LedgerError::NotFound("account not exists".to_string()))?,
            counterpart_account_id: model
                .counterpart_account_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            kind: TransactionKind::try_from(model.kind.as_str())?,
            status: TransactionStatus::try_from(model.status.as_str())?,
            amount: Money::new(model.amount_minor),
            transfer_id: model.transfer_id.and_then(|s| Uuid::parse_str(&s).ok()),
            note: model.note,
            created_by: model.created_by,
            created_at: model.created_at,
            idempotency_key: model.idempotency_key,
        })
    }
}
