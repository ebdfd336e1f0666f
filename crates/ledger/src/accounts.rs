//! The module contains the `Account` struct and its persistence model.
//!
//! An account is a customer-facing balance container (checking, savings,
//! business). Balances are denormalized from the transaction log and are
//! mutated exclusively through the ledger's `adjust_balance` path.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, Money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Checking,
    Savings,
    Business,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Business => "business",
        }
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "business" => Ok(Self::Business),
            other => Err(LedgerError::InvalidTarget(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

/// An account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identifier for this account.
    ///
    /// This is a UUID generated once and persisted in the database.
    pub id: Uuid,
    pub user_id: String,
    pub kind: AccountKind,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        user_id: impl Into<String>,
        kind: AccountKind,
        balance: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind,
            balance,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub balance_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            user_id: ActiveValue::Set(account.user_id.clone()),
            kind: ActiveValue::Set(account.kind.as_str().to_string()),
            balance_minor: ActiveValue::Set(account.balance.cents()),
            created_at: ActiveValue::Set(account.created_at),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| LedgerError::NotFound("account not exists".to_string()))?,
            user_id: model.user_id,
            kind: AccountKind::try_from(model.kind.as_str())?,
            balance: Money::new(model.balance_minor),
            created_at: model.created_at,
        })
    }
}
