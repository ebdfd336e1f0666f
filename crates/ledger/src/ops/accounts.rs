use chrono::{DateTime, Utc};
use sea_orm::{QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{Account, AccountKind, Money, Principal, ResultLedger, accounts};

use super::{Ledger, with_tx};

impl Ledger {
    /// Open an additional zero-balance account for the principal.
    pub async fn open_account(
        &self,
        principal: &Principal,
        kind: AccountKind,
        created_at: DateTime<Utc>,
    ) -> ResultLedger<Uuid> {
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, &principal.user_id).await?;

            let account = Account::new(&principal.user_id, kind, Money::ZERO, created_at);
            accounts::ActiveModel::from(&account).insert(&db_tx).await?;
            Ok(account.id)
        })
    }

    /// Return one account readable by the principal.
    pub async fn account(&self, principal: &Principal, account_id: Uuid) -> ResultLedger<Account> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_account_read(&db_tx, account_id, principal)
                .await?;
            Account::try_from(model)
        })
    }

    /// All accounts owned by the principal, oldest first.
    pub async fn accounts_by_owner(&self, principal: &Principal) -> ResultLedger<Vec<Account>> {
        let models: Vec<accounts::Model> = accounts::Entity::find()
            .filter(accounts::Column::UserId.eq(principal.user_id.clone()))
            .order_by_asc(accounts::Column::CreatedAt)
            .order_by_asc(accounts::Column::Id)
            .all(&self.database)
            .await?;

        models.into_iter().map(Account::try_from).collect()
    }
}
