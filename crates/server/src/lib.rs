use axum::{Json, http::StatusCode, response::IntoResponse};
use ledger::LedgerError;

use serde::Serialize;
pub use server::{run, run_with_listener, spawn_with_listener};

mod accounts;
mod admin;
mod auth;
mod server;
mod transactions;

pub mod types {
    pub mod account {
        pub use api_types::account::{
            AccountCreated, AccountKind, AccountNew, AccountView, AccountsResponse,
        };
    }

    pub mod user {
        pub use api_types::register::RegisterResponse;
        pub use api_types::user::{RegisterUser, UserView, UsersResponse};
    }

    pub mod transaction {
        pub use api_types::transaction::{
            HistoryParams, MovementNew, TransactionCreated, TransactionListResponse,
            TransactionView, TransferCreated, TransferNew,
        };
    }

    pub mod stats {
        pub use api_types::stats::Statistic;
    }
}

pub enum ServerError {
    Ledger(LedgerError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_ledger_error(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Unauthorized(_) => StatusCode::FORBIDDEN,
        LedgerError::UsernameTaken(_) => StatusCode::CONFLICT,
        LedgerError::TransferFailed(_) | LedgerError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        LedgerError::InvalidAmount(_)
        | LedgerError::InvalidTarget(_)
        | LedgerError::InsufficientFunds(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_ledger_error(err: LedgerError) -> String {
    match err {
        LedgerError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        LedgerError::TransferFailed(detail) => {
            tracing::error!("transfer failed: {detail}");
            "transfer could not be completed".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Ledger(err) => {
                (status_for_ledger_error(&err), message_for_ledger_error(err))
            }
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<LedgerError> for ServerError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}
