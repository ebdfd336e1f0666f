//! Core banking ledger.
//!
//! The [`Ledger`] executes deposits, withdrawals and transfers as atomic
//! operations against the account store and the append-only transaction log.
//! Every operation authorizes the acting [`Principal`] itself and runs inside
//! a single database transaction.

pub use accounts::{Account, AccountKind};
pub use commands::{DepositCmd, TransferCmd, TransferKind, TxMeta, WithdrawCmd};
pub use error::LedgerError;
pub use money::Money;
pub use ops::{
    AccountStatistics, Direction, Ledger, LedgerBuilder, TransactionListFilter, TransferPolicy,
};
pub use transactions::{Transaction, TransactionKind, TransactionStatus};
pub use users::{Principal, Role, UserSummary};

pub mod accounts;
mod commands;
mod error;
mod money;
mod ops;
pub mod transactions;
pub mod users;

type ResultLedger<T> = Result<T, LedgerError>;
