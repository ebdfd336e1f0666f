//! Account API endpoints (dashboard listing, opening, statistics).

use api_types::account::{
    AccountCreated, AccountKind as ApiKind, AccountNew, AccountView, AccountsResponse,
};
use api_types::stats::Statistic;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use ledger::Principal;
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

fn map_kind(kind: ledger::AccountKind) -> ApiKind {
    match kind {
        ledger::AccountKind::Checking => ApiKind::Checking,
        ledger::AccountKind::Savings => ApiKind::Savings,
        ledger::AccountKind::Business => ApiKind::Business,
    }
}

fn unmap_kind(kind: ApiKind) -> ledger::AccountKind {
    match kind {
        ApiKind::Checking => ledger::AccountKind::Checking,
        ApiKind::Savings => ledger::AccountKind::Savings,
        ApiKind::Business => ledger::AccountKind::Business,
    }
}

pub(crate) fn account_view(account: &ledger::Account) -> AccountView {
    AccountView {
        id: account.id,
        kind: map_kind(account.kind),
        balance_minor: account.balance.cents(),
        created_at: account.created_at.fixed_offset(),
    }
}

pub async fn list(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
) -> Result<Json<AccountsResponse>, ServerError> {
    let accounts = state.ledger.accounts_by_owner(&principal).await?;
    Ok(Json(AccountsResponse {
        accounts: accounts.iter().map(account_view).collect(),
    }))
}

pub async fn open(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Json(payload): Json<AccountNew>,
) -> Result<(StatusCode, Json<AccountCreated>), ServerError> {
    let id = state
        .ledger
        .open_account(&principal, unmap_kind(payload.kind), Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(AccountCreated { id })))
}

pub async fn stats(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<Statistic>, ServerError> {
    let stats = state.ledger.account_statistics(&principal, account_id).await?;
    Ok(Json(Statistic {
        balance_minor: stats.balance.cents(),
        total_credited_minor: stats.total_credited.cents(),
        total_debited_minor: stats.total_debited.cents(),
    }))
}
