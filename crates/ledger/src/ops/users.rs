//! Registration-time provisioning and admin user queries.
//!
//! The auth gateway owns credential verification; the ledger owns the user
//! row itself, so that user creation and seed-account provisioning share one
//! database transaction and cannot leave a half-provisioned customer behind.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{
    Account, AccountKind, LedgerError, Money, Principal, ResultLedger, Role, Transaction,
    TransactionKind, accounts, transactions,
    users::{self, UserSummary},
};

use super::{Ledger, normalize_required_text, with_tx};

/// Starting accounts granted to every new customer, each funded through a
/// seed deposit row so the balance stays ledger-backed.
const SEED_ACCOUNTS: &[(AccountKind, Money)] = &[
    (AccountKind::Checking, Money::new(2_500_00)),
    (AccountKind::Savings, Money::new(15_000_00)),
    (AccountKind::Business, Money::new(50_000_00)),
];

/// Canonical form of a username: trimmed, NFKC-normalized, lowercased.
fn normalize_username(value: &str) -> ResultLedger<String> {
    let normalized: String = normalize_required_text(value, "username")?
        .nfkc()
        .collect::<String>()
        .to_lowercase();
    Ok(normalized)
}

fn normalize_email(value: &str) -> ResultLedger<String> {
    let email = normalize_required_text(value, "email")?;
    if !email.contains('@') {
        return Err(LedgerError::InvalidTarget("invalid email".to_string()));
    }
    Ok(email)
}

impl Ledger {
    /// Create a user and provision the seed accounts, atomically.
    ///
    /// The password arrives already hashed by the auth gateway; the ledger
    /// stores it as an opaque string.
    pub async fn register_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        created_at: DateTime<Utc>,
    ) -> ResultLedger<Principal> {
        let username = normalize_username(username)?;
        let email = normalize_email(email)?;
        let password_hash = normalize_required_text(password_hash, "password hash")?;

        with_tx!(self, |db_tx| {
            let taken = users::Entity::find()
                .filter(
                    sea_orm::Condition::any()
                        .add(users::Column::Username.eq(username.clone()))
                        .add(users::Column::Email.eq(email.clone())),
                )
                .one(&db_tx)
                .await?
                .is_some();
            if taken {
                return Err(LedgerError::UsernameTaken(username));
            }

            let user_id = Uuid::new_v4().to_string();
            let user_model = users::ActiveModel {
                id: ActiveValue::Set(user_id.clone()),
                username: ActiveValue::Set(username),
                email: ActiveValue::Set(email),
                password_hash: ActiveValue::Set(password_hash),
                role: ActiveValue::Set(role.as_str().to_string()),
                created_at: ActiveValue::Set(created_at),
            };
            user_model.insert(&db_tx).await?;

            for (kind, balance) in SEED_ACCOUNTS {
                let account = Account::new(&user_id, *kind, *balance, created_at);
                accounts::ActiveModel::from(&account).insert(&db_tx).await?;

                let mut seed = Transaction::new(
                    account.id,
                    TransactionKind::Deposit,
                    *balance,
                    &user_id,
                    created_at,
                )?;
                seed.note = Some("opening balance".to_string());
                transactions::ActiveModel::from(&seed).insert(&db_tx).await?;
            }

            Ok(Principal::new(user_id, role))
        })
    }

    /// All registered users, oldest first. Admin role required.
    pub async fn list_users(&self, principal: &Principal) -> ResultLedger<Vec<UserSummary>> {
        self.require_admin(principal)?;

        let models: Vec<users::Model> = users::Entity::find()
            .order_by_asc(users::Column::CreatedAt)
            .order_by_asc(users::Column::Id)
            .all(&self.database)
            .await?;

        models.into_iter().map(UserSummary::try_from).collect()
    }
}
