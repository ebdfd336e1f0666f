use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};

use crate::{LedgerError, Principal, ResultLedger, Transaction, TransactionKind, transactions};

use super::{Ledger, with_tx};

/// Direction filter used by the history page: `debit` is money leaving the
/// account, `credit` is money arriving, `transfer` is either transfer leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Debit,
    Credit,
    Transfer,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Transfer => "transfer",
        }
    }

    /// Transaction kinds selected by this direction.
    fn kinds(self) -> [TransactionKind; 2] {
        match self {
            Self::Debit => [TransactionKind::Withdrawal, TransactionKind::TransferOut],
            Self::Credit => [TransactionKind::Deposit, TransactionKind::TransferIn],
            Self::Transfer => [TransactionKind::TransferOut, TransactionKind::TransferIn],
        }
    }
}

impl TryFrom<&str> for Direction {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            "transfer" => Ok(Self::Transfer),
            other => Err(LedgerError::InvalidTarget(format!(
                "invalid direction: {other}"
            ))),
        }
    }
}

/// Filters for listing transactions.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransactionListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// If present, restricts rows to the direction's kinds.
    pub direction: Option<Direction>,
}

fn validate_list_filter(filter: &TransactionListFilter) -> ResultLedger<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(LedgerError::InvalidAmount(
            "invalid range: from must be < to".to_string(),
        ));
    }
    Ok(())
}

trait ApplyTxFilters: QueryFilter + Sized {
    fn apply_tx_filters(self, filter: &TransactionListFilter) -> Self;
}

impl<T> ApplyTxFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_tx_filters(mut self, filter: &TransactionListFilter) -> Self {
        if let Some(from) = filter.from {
            self = self.filter(transactions::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(transactions::Column::CreatedAt.lt(to));
        }
        if let Some(direction) = filter.direction {
            let kinds: Vec<String> = direction
                .kinds()
                .iter()
                .map(|k| k.as_str().to_string())
                .collect();
            self = self.filter(transactions::Column::Kind.is_in(kinds));
        }

        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TransactionsCursor {
    created_at: DateTime<Utc>,
    transaction_id: String,
}

impl TransactionsCursor {
    fn encode(&self) -> ResultLedger<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| LedgerError::InvalidAmount("invalid transactions cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultLedger<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| LedgerError::InvalidAmount("invalid transactions cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| LedgerError::InvalidAmount("invalid transactions cursor".to_string()))
    }
}

impl Ledger {
    /// Lists recent transactions of one account.
    pub async fn list_transactions_for_account(
        &self,
        principal: &Principal,
        account_id: Uuid,
        limit: u64,
        filter: &TransactionListFilter,
    ) -> ResultLedger<Vec<Transaction>> {
        let (items, _next) = self
            .list_transactions_for_account_page(principal, account_id, limit, None, filter)
            .await?;
        Ok(items)
    }

    /// Lists recent transactions of one account, with cursor-based
    /// pagination.
    ///
    /// Pagination is newest → older by `(created_at DESC, transaction_id
    /// DESC)`.
    pub async fn list_transactions_for_account_page(
        &self,
        principal: &Principal,
        account_id: Uuid,
        limit: u64,
        cursor: Option<&str>,
        filter: &TransactionListFilter,
    ) -> ResultLedger<(Vec<Transaction>, Option<String>)> {
        with_tx!(self, |db_tx| {
            self.require_account_read(&db_tx, account_id, principal)
                .await?;
            validate_list_filter(filter)?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = transactions::Entity::find()
                .filter(transactions::Column::AccountId.eq(account_id.to_string()))
                .order_by_desc(transactions::Column::CreatedAt)
                .order_by_desc(transactions::Column::Id)
                .limit(limit_plus_one);

            if let Some(cursor) = cursor {
                let cursor = TransactionsCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(transactions::Column::CreatedAt.lt(cursor.created_at))
                        .add(
                            Condition::all()
                                .add(transactions::Column::CreatedAt.eq(cursor.created_at))
                                .add(transactions::Column::Id.lt(cursor.transaction_id)),
                        ),
                );
            }
            query = query.apply_tx_filters(filter);

            let rows: Vec<transactions::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut out: Vec<Transaction> = Vec::with_capacity(rows.len().min(limit as usize));
            for tx_model in rows.into_iter().take(limit as usize) {
                out.push(Transaction::try_from(tx_model)?);
            }

            let next_cursor = out.last().map(|tx| TransactionsCursor {
                created_at: tx.created_at,
                transaction_id: tx.id.to_string(),
            });
            let next_cursor = if has_more {
                next_cursor.map(|c| c.encode()).transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }
}
