//! Transactions API endpoints

use api_types::transaction::{
    HistoryParams, MovementNew, TransactionCreated, TransactionKind as ApiKind,
    TransactionListResponse, TransactionStatus as ApiStatus, TransactionView, TransferCreated,
    TransferKind as ApiTransferKind, TransferNew,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use ledger::{
    DepositCmd, Direction, Money, Principal, TransactionListFilter, TransferCmd, TransferKind,
    WithdrawCmd,
};
use uuid::Uuid;

use crate::{ServerError, server::ServerState};

fn map_kind(kind: ledger::TransactionKind) -> ApiKind {
    match kind {
        ledger::TransactionKind::Deposit => ApiKind::Deposit,
        ledger::TransactionKind::Withdrawal => ApiKind::Withdrawal,
        ledger::TransactionKind::TransferOut => ApiKind::TransferOut,
        ledger::TransactionKind::TransferIn => ApiKind::TransferIn,
    }
}

fn map_status(status: ledger::TransactionStatus) -> ApiStatus {
    match status {
        ledger::TransactionStatus::Pending => ApiStatus::Pending,
        ledger::TransactionStatus::Completed => ApiStatus::Completed,
        ledger::TransactionStatus::Failed => ApiStatus::Failed,
    }
}

fn transaction_view(tx: &ledger::Transaction) -> TransactionView {
    TransactionView {
        id: tx.id,
        kind: map_kind(tx.kind),
        status: map_status(tx.status),
        amount_minor: tx.amount.cents(),
        counterpart_account_id: tx.counterpart_account_id,
        transfer_id: tx.transfer_id,
        note: tx.note.clone(),
        created_at: tx.created_at.fixed_offset(),
    }
}

pub async fn deposit_new(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<MovementNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let mut cmd = DepositCmd::new(account_id, Money::new(payload.amount_minor), Utc::now());
    if let Some(note) = payload.note {
        cmd = cmd.note(note);
    }
    if let Some(key) = payload.idempotency_key {
        cmd = cmd.idempotency_key(key);
    }

    let id = state.ledger.deposit(&principal, cmd).await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { id })))
}

pub async fn withdraw_new(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<MovementNew>,
) -> Result<(StatusCode, Json<TransactionCreated>), ServerError> {
    let mut cmd = WithdrawCmd::new(account_id, Money::new(payload.amount_minor), Utc::now());
    if let Some(note) = payload.note {
        cmd = cmd.note(note);
    }
    if let Some(key) = payload.idempotency_key {
        cmd = cmd.idempotency_key(key);
    }

    let id = state.ledger.withdraw(&principal, cmd).await?;
    Ok((StatusCode::CREATED, Json(TransactionCreated { id })))
}

pub async fn transfer_new(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Json(payload): Json<TransferNew>,
) -> Result<(StatusCode, Json<TransferCreated>), ServerError> {
    let kind = match payload.kind {
        ApiTransferKind::Internal => TransferKind::Internal,
        ApiTransferKind::External => TransferKind::External,
    };

    let mut cmd = TransferCmd::new(
        payload.from_account_id,
        payload.to_account_id,
        Money::new(payload.amount_minor),
        kind,
        Utc::now(),
    );
    if let Some(note) = payload.note {
        cmd = cmd.note(note);
    }
    if let Some(key) = payload.idempotency_key {
        cmd = cmd.idempotency_key(key);
    }

    let transfer_id = state.ledger.transfer(&principal, cmd).await?;
    Ok((StatusCode::CREATED, Json(TransferCreated { transfer_id })))
}

pub async fn history(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
    Path(account_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<TransactionListResponse>, ServerError> {
    let direction = params
        .direction
        .as_deref()
        .map(Direction::try_from)
        .transpose()?;
    let filter = TransactionListFilter {
        direction,
        ..Default::default()
    };
    let limit = params.limit.unwrap_or(50);

    let (txs, next_cursor) = state
        .ledger
        .list_transactions_for_account_page(
            &principal,
            account_id,
            limit,
            params.cursor.as_deref(),
            &filter,
        )
        .await?;

    Ok(Json(TransactionListResponse {
        transactions: txs.iter().map(transaction_view).collect(),
        next_cursor,
    }))
}
