use sea_orm::{DatabaseTransaction, prelude::*};
use uuid::Uuid;

use crate::{LedgerError, Principal, ResultLedger, accounts, users};

use super::Ledger;

impl Ledger {
    pub(super) async fn find_account(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
    ) -> ResultLedger<Option<accounts::Model>> {
        accounts::Entity::find_by_id(account_id.to_string())
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Resolve an account or fail with `NotFound`.
    pub(super) async fn require_account(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
    ) -> ResultLedger<accounts::Model> {
        self.find_account(db, account_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound("account not exists".to_string()))
    }

    /// Resolve an account the principal may read: the owner, or any admin.
    pub(super) async fn require_account_read(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        principal: &Principal,
    ) -> ResultLedger<accounts::Model> {
        let model = self.require_account(db, account_id).await?;
        if model.user_id != principal.user_id && !principal.role.is_admin() {
            return Err(LedgerError::Unauthorized(
                "account belongs to another user".to_string(),
            ));
        }
        Ok(model)
    }

    /// Resolve an account the principal may move money on: the owner, or an
    /// admin acting as teller.
    pub(super) async fn require_account_write(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        principal: &Principal,
    ) -> ResultLedger<accounts::Model> {
        self.require_account_read(db, account_id, principal).await
    }

    /// Resolve an account that must be owned by the principal directly.
    ///
    /// Transfer sources use this: not even admins may debit someone else's
    /// account on their behalf.
    pub(super) async fn require_account_owned(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
        principal: &Principal,
    ) -> ResultLedger<accounts::Model> {
        let model = self.require_account(db, account_id).await?;
        if model.user_id != principal.user_id {
            return Err(LedgerError::Unauthorized(
                "account belongs to another user".to_string(),
            ));
        }
        Ok(model)
    }

    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultLedger<users::Model> {
        users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::NotFound("user not exists".to_string()))
    }

    pub(super) fn require_admin(&self, principal: &Principal) -> ResultLedger<()> {
        if !principal.role.is_admin() {
            return Err(LedgerError::Unauthorized(
                "admin role required".to_string(),
            ));
        }
        Ok(())
    }
}
