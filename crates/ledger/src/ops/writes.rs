//! Write operations: deposit, withdraw, transfer.
//!
//! Every operation runs inside one database transaction: the balance
//! adjustments and the appended log rows commit together or not at all. A
//! transfer that loses its credit leg mid-flight compensates the debit before
//! reporting `TransferFailed`.

use sea_orm::{ConnectionTrait, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    DepositCmd, LedgerError, Money, Principal, ResultLedger, Transaction, TransactionKind,
    TransferCmd, TransferKind, TxMeta, WithdrawCmd, transactions,
};

use super::{Ledger, TransferPolicy, normalize_optional_text, with_tx};

fn parse_transaction_id(raw: &str) -> ResultLedger<Uuid> {
    Uuid::parse_str(raw).map_err(|_| LedgerError::InvalidAmount("invalid transaction id".to_string()))
}

/// Correlation id recorded by a previously committed transfer row.
fn existing_transfer_id(model: &transactions::Model) -> ResultLedger<Uuid> {
    match model.transfer_id.as_deref() {
        Some(raw) => parse_transaction_id(raw),
        None => parse_transaction_id(&model.id),
    }
}

/// Which leg of a transfer failed, and whether the debit was already applied
/// inside the open transaction when it happened.
enum LegFailure {
    Debit(LedgerError),
    CreditBeforeDebit(LedgerError),
    CreditAfterDebit(LedgerError),
}

impl Ledger {
    async fn find_by_idempotency_key<C>(
        &self,
        db: &C,
        created_by: &str,
        key: &str,
    ) -> ResultLedger<Option<transactions::Model>>
    where
        C: ConnectionTrait,
    {
        transactions::Entity::find()
            .filter(transactions::Column::CreatedBy.eq(created_by.to_string()))
            .filter(transactions::Column::IdempotencyKey.eq(key.to_string()))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Deposit or withdrawal: one balance adjustment plus one log row.
    async fn create_simple_transaction(
        &self,
        db_tx: &DatabaseTransaction,
        principal: &Principal,
        account_id: Uuid,
        amount: Money,
        kind: TransactionKind,
        meta: TxMeta,
    ) -> ResultLedger<Uuid> {
        if let Some(key) = meta.idempotency_key.as_deref()
            && let Some(existing) = self
                .find_by_idempotency_key(db_tx, &principal.user_id, key)
                .await?
        {
            return parse_transaction_id(&existing.id);
        }

        self.require_account_write(db_tx, account_id, principal)
            .await?;

        let mut tx = Transaction::new(
            account_id,
            kind,
            amount,
            &principal.user_id,
            meta.created_at,
        )?;
        tx.note = normalize_optional_text(meta.note.as_deref());
        tx.idempotency_key = meta.idempotency_key;

        // Insert the row before touching the balance: if a concurrent request
        // with the same idempotency key won the unique index, we answer with
        // its id while our transaction still has nothing to undo.
        if let Err(err) = transactions::ActiveModel::from(&tx).insert(db_tx).await {
            if let Some(key) = tx.idempotency_key.as_deref()
                && let Some(existing) = self
                    .find_by_idempotency_key(db_tx, &tx.created_by, key)
                    .await?
            {
                return parse_transaction_id(&existing.id);
            }
            return Err(err.into());
        }

        self.adjust_balance(db_tx, account_id, tx.signed_amount())
            .await?;

        Ok(tx.id)
    }

    /// Credit an account and append one completed `deposit` row.
    pub async fn deposit(&self, principal: &Principal, cmd: DepositCmd) -> ResultLedger<Uuid> {
        let DepositCmd {
            account_id,
            amount,
            meta,
        } = cmd;
        with_tx!(self, |db_tx| {
            let id = self
                .create_simple_transaction(
                    &db_tx,
                    principal,
                    account_id,
                    amount,
                    TransactionKind::Deposit,
                    meta,
                )
                .await?;
            Ok(id)
        })
    }

    /// Debit an account and append one completed `withdrawal` row.
    ///
    /// The sufficiency check is the atomic balance adjustment itself; a
    /// shortfall rolls the whole operation back as `InsufficientFunds` with
    /// zero rows appended.
    pub async fn withdraw(&self, principal: &Principal, cmd: WithdrawCmd) -> ResultLedger<Uuid> {
        let WithdrawCmd {
            account_id,
            amount,
            meta,
        } = cmd;
        with_tx!(self, |db_tx| {
            let id = self
                .create_simple_transaction(
                    &db_tx,
                    principal,
                    account_id,
                    amount,
                    TransactionKind::Withdrawal,
                    meta,
                )
                .await?;
            Ok(id)
        })
    }

    /// Resolve the target of a transfer according to its kind and the
    /// configured ownership policy.
    async fn resolve_transfer_target(
        &self,
        db_tx: &DatabaseTransaction,
        to_account_id: Uuid,
        principal: &Principal,
        kind: TransferKind,
    ) -> ResultLedger<()> {
        let model = self.require_account(db_tx, to_account_id).await?;
        if kind == TransferKind::Internal
            && self.transfer_policy == TransferPolicy::SameOwnerOnly
            && model.user_id != principal.user_id
        {
            return Err(LedgerError::InvalidTarget(
                "internal transfer target must belong to the same user".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply both balance adjustments in ascending account-id order, so two
    /// opposing transfers on the same pair of accounts cannot deadlock.
    async fn apply_transfer_legs(
        &self,
        db_tx: &DatabaseTransaction,
        from_account_id: Uuid,
        to_account_id: Uuid,
        amount: Money,
    ) -> Result<(), LegFailure> {
        if from_account_id < to_account_id {
            self.adjust_balance(db_tx, from_account_id, -amount)
                .await
                .map_err(LegFailure::Debit)?;
            self.adjust_balance(db_tx, to_account_id, amount)
                .await
                .map_err(LegFailure::CreditAfterDebit)?;
        } else {
            self.adjust_balance(db_tx, to_account_id, amount)
                .await
                .map_err(LegFailure::CreditBeforeDebit)?;
            self.adjust_balance(db_tx, from_account_id, -amount)
                .await
                .map_err(LegFailure::Debit)?;
        }
        Ok(())
    }

    /// Move funds between two accounts.
    ///
    /// On success both balance adjustments and the two correlated log rows
    /// (`transfer_out` on the source, `transfer_in` on the target) commit in
    /// one database transaction. On failure zero rows are appended and the
    /// balances are unchanged.
    ///
    /// Returns the transfer correlation id shared by the two rows.
    pub async fn transfer(&self, principal: &Principal, cmd: TransferCmd) -> ResultLedger<Uuid> {
        let TransferCmd {
            from_account_id,
            to_account_id,
            amount,
            kind,
            meta,
        } = cmd;

        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount("amount must be > 0".to_string()));
        }
        if from_account_id == to_account_id {
            return Err(LedgerError::InvalidTarget(
                "from and to accounts must differ".to_string(),
            ));
        }
        let note = normalize_optional_text(meta.note.as_deref());

        let db_tx = self.database.begin().await?;

        if let Some(key) = meta.idempotency_key.as_deref()
            && let Some(existing) = self
                .find_by_idempotency_key(&db_tx, &principal.user_id, key)
                .await?
        {
            let transfer_id = existing_transfer_id(&existing)?;
            db_tx.commit().await?;
            return Ok(transfer_id);
        }

        self.require_account_owned(&db_tx, from_account_id, principal)
            .await?;
        self.resolve_transfer_target(&db_tx, to_account_id, principal, kind)
            .await?;

        match self
            .apply_transfer_legs(&db_tx, from_account_id, to_account_id, amount)
            .await
        {
            Ok(()) => {}
            Err(LegFailure::Debit(err)) => {
                // Nothing to keep: an applied credit leg is discarded by the
                // rollback together with everything else.
                db_tx.rollback().await?;
                return Err(err);
            }
            Err(LegFailure::CreditBeforeDebit(err)) => {
                db_tx.rollback().await?;
                tracing::error!(
                    from = %from_account_id,
                    to = %to_account_id,
                    error = %err,
                    "transfer credit leg failed before the debit; nothing applied"
                );
                return Err(LedgerError::TransferFailed(
                    "transfer could not be completed".to_string(),
                ));
            }
            Err(LegFailure::CreditAfterDebit(err)) => {
                // The debit is already applied inside this transaction.
                // Compensate it explicitly and commit the net-zero result so
                // the source balance is observably restored.
                match self.adjust_balance(&db_tx, from_account_id, amount).await {
                    Ok(()) => {
                        db_tx.commit().await?;
                        tracing::error!(
                            from = %from_account_id,
                            to = %to_account_id,
                            error = %err,
                            "transfer credit leg failed; debit compensated"
                        );
                    }
                    Err(compensation_err) => {
                        db_tx.rollback().await?;
                        tracing::error!(
                            from = %from_account_id,
                            to = %to_account_id,
                            error = %err,
                            compensation_error = %compensation_err,
                            "transfer compensation failed; operator attention required"
                        );
                    }
                }
                return Err(LedgerError::TransferFailed(
                    "transfer could not be completed".to_string(),
                ));
            }
        }

        let transfer_id = Uuid::new_v4();

        let mut debit_row = Transaction::new(
            from_account_id,
            TransactionKind::TransferOut,
            amount,
            &principal.user_id,
            meta.created_at,
        )?;
        debit_row.counterpart_account_id = Some(to_account_id);
        debit_row.transfer_id = Some(transfer_id);
        debit_row.note = note.clone();
        // The idempotency key lives on the debit row only; the credit row of
        // the same transfer would otherwise collide on the unique index.
        debit_row.idempotency_key = meta.idempotency_key;

        let mut credit_row = Transaction::new(
            to_account_id,
            TransactionKind::TransferIn,
            amount,
            &principal.user_id,
            meta.created_at,
        )?;
        credit_row.counterpart_account_id = Some(from_account_id);
        credit_row.transfer_id = Some(transfer_id);
        credit_row.note = note;

        if let Err(err) = transactions::ActiveModel::from(&debit_row).insert(&db_tx).await {
            // A concurrent request with the same idempotency key won the
            // unique index. Discard our work and answer with the winner's
            // correlation id.
            if let Some(key) = debit_row.idempotency_key.as_deref() {
                db_tx.rollback().await?;
                if let Some(existing) = self
                    .find_by_idempotency_key(&self.database, &debit_row.created_by, key)
                    .await?
                {
                    return existing_transfer_id(&existing);
                }
            }
            return Err(err.into());
        }
        transactions::ActiveModel::from(&credit_row).insert(&db_tx).await?;

        db_tx.commit().await?;
        Ok(transfer_id)
    }
}
