use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, Statement, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    LedgerError, Money, Principal, ResultLedger, Transaction, TransactionKind, TransactionStatus,
    accounts, transactions,
};

use super::{Ledger, with_tx};

/// Totals for one account, computed from the committed transaction log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountStatistics {
    pub balance: Money,
    pub total_credited: Money,
    pub total_debited: Money,
}

impl Ledger {
    /// Atomically applies `delta` to an account balance.
    ///
    /// This is the only place balances change. The conditional UPDATE holds
    /// the row lock while it checks sufficiency and mutates, so two
    /// concurrent debits can never both pass a stale check:
    /// `balance + delta >= 0` is evaluated on the locked row, not on a
    /// previously read snapshot.
    pub(super) async fn adjust_balance(
        &self,
        db_tx: &DatabaseTransaction,
        account_id: Uuid,
        delta: Money,
    ) -> ResultLedger<()> {
        let backend = self.database.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "UPDATE accounts SET balance_minor = balance_minor + ? \
             WHERE id = ? AND balance_minor + ? >= 0",
            vec![
                delta.cents().into(),
                account_id.to_string().into(),
                delta.cents().into(),
            ],
        );
        let result = db_tx.execute(stmt).await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Zero rows: either the account is gone or the guard rejected the
        // delta. Disambiguate with a plain lookup.
        match self.find_account(db_tx, account_id).await? {
            None => Err(LedgerError::NotFound("account not exists".to_string())),
            Some(_) => Err(LedgerError::InsufficientFunds(
                "balance would go negative".to_string(),
            )),
        }
    }

    /// Replays the completed transaction rows of an account and repairs the
    /// denormalized balance.
    ///
    /// A negative replay result means the store contradicts the log and is
    /// escalated as `TransferFailed` for operator attention; nothing is
    /// persisted in that case.
    pub async fn recompute_balance(
        &self,
        principal: &Principal,
        account_id: Uuid,
    ) -> ResultLedger<Money> {
        with_tx!(self, |db_tx| {
            self.require_account_read(&db_tx, account_id, principal)
                .await?;

            let rows: Vec<transactions::Model> = transactions::Entity::find()
                .filter(transactions::Column::AccountId.eq(account_id.to_string()))
                .filter(transactions::Column::Status.eq(TransactionStatus::Completed.as_str()))
                .order_by_asc(transactions::Column::CreatedAt)
                .order_by_asc(transactions::Column::Id)
                .all(&db_tx)
                .await?;

            let mut balance = Money::ZERO;
            for model in rows {
                let tx = Transaction::try_from(model)?;
                balance = balance
                    .checked_add(tx.signed_amount())
                    .ok_or_else(|| LedgerError::InvalidAmount("amount too large".to_string()))?;
            }

            if balance.is_negative() {
                tracing::error!(
                    account_id = %account_id,
                    balance = %balance,
                    "ledger replay produced a negative balance"
                );
                return Err(LedgerError::TransferFailed(
                    "ledger replay produced a negative balance".to_string(),
                ));
            }

            let account_model = accounts::ActiveModel {
                id: ActiveValue::Set(account_id.to_string()),
                balance_minor: ActiveValue::Set(balance.cents()),
                ..Default::default()
            };
            account_model.update(&db_tx).await?;

            Ok(balance)
        })
    }

    /// Returns `(balance, total credited, total debited)` for one account,
    /// from the committed transaction rows.
    pub async fn account_statistics(
        &self,
        principal: &Principal,
        account_id: Uuid,
    ) -> ResultLedger<AccountStatistics> {
        with_tx!(self, |db_tx| {
            let account = self
                .require_account_read(&db_tx, account_id, principal)
                .await?;
            let backend = self.database.get_database_backend();

            let sum_for = |kinds: [TransactionKind; 2]| {
                Statement::from_sql_and_values(
                    backend,
                    "SELECT COALESCE(SUM(amount_minor), 0) AS sum \
                     FROM transactions \
                     WHERE account_id = ? AND status = ? AND kind IN (?, ?)",
                    vec![
                        account_id.to_string().into(),
                        TransactionStatus::Completed.as_str().into(),
                        kinds[0].as_str().into(),
                        kinds[1].as_str().into(),
                    ],
                )
            };

            let total_credited: i64 = db_tx
                .query_one(sum_for([
                    TransactionKind::Deposit,
                    TransactionKind::TransferIn,
                ]))
                .await?
                .and_then(|r| r.try_get("", "sum").ok())
                .unwrap_or(0);

            let total_debited: i64 = db_tx
                .query_one(sum_for([
                    TransactionKind::Withdrawal,
                    TransactionKind::TransferOut,
                ]))
                .await?
                .and_then(|r| r.try_get("", "sum").ok())
                .unwrap_or(0);

            Ok(AccountStatistics {
                balance: Money::new(account.balance_minor),
                total_credited: Money::new(total_credited),
                total_debited: Money::new(total_debited),
            })
        })
    }
}
