use sea_orm::DatabaseConnection;

use crate::{LedgerError, ResultLedger};

mod access;
mod accounts;
mod balances;
mod history;
mod users;
mod writes;

pub use balances::AccountStatistics;
pub use history::{Direction, TransactionListFilter};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Ownership policy applied to the target of an `internal` transfer.
///
/// The default requires the target to belong to the acting principal;
/// `AnyAccount` relaxes that to any existing account at the bank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransferPolicy {
    #[default]
    SameOwnerOnly,
    AnyAccount,
}

#[derive(Debug)]
pub struct Ledger {
    database: DatabaseConnection,
    transfer_policy: TransferPolicy,
}

impl Ledger {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }
}

fn normalize_required_text(value: &str, label: &str) -> ResultLedger<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidTarget(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// The builder for `Ledger`
#[derive(Default)]
pub struct LedgerBuilder {
    database: DatabaseConnection,
    transfer_policy: TransferPolicy,
}

impl LedgerBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> LedgerBuilder {
        self.database = db;
        self
    }

    /// Override the internal-transfer ownership policy.
    pub fn transfer_policy(mut self, policy: TransferPolicy) -> LedgerBuilder {
        self.transfer_policy = policy;
        self
    }

    /// Construct `Ledger`
    pub async fn build(self) -> ResultLedger<Ledger> {
        Ok(Ledger {
            database: self.database,
            transfer_policy: self.transfer_policy,
        })
    }
}
