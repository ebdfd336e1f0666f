//! Credential handling for the auth gateway.
//!
//! Passwords are stored as `salt$digest` where the digest is a base64
//! sha-256 over the salt and the password. The ledger only ever receives the
//! finished hash string.

use api_types::register::RegisterResponse;
use api_types::user::RegisterUser;
use axum::{Json, extract::State, http::StatusCode};
use base64::Engine as _;
use chrono::Utc;
use ledger::Role;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{ServerError, accounts, server::ServerState};

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"$");
    hasher.update(password.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    let digest = digest(&salt, password);
    format!("{salt}${digest}")
}

pub fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, expected)) => digest(salt, password) == expected,
        None => false,
    }
}

/// Register a new customer and report the seeded accounts.
pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<RegisterUser>,
) -> Result<(StatusCode, Json<RegisterResponse>), ServerError> {
    if payload.password.trim().is_empty() {
        return Err(ServerError::Generic(
            "password must not be empty".to_string(),
        ));
    }

    let password_hash = hash_password(&payload.password);
    let principal = state
        .ledger
        .register_user(
            &payload.username,
            &payload.email,
            &password_hash,
            Role::User,
            Utc::now(),
        )
        .await?;

    let accounts = state.ledger.accounts_by_owner(&principal).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: principal.user_id,
            accounts: accounts.iter().map(accounts::account_view).collect(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_the_original_password() {
        let stored = hash_password("hunter2");
        assert!(verify_password(&stored, "hunter2"));
    }

    #[test]
    fn verify_rejects_other_passwords_and_garbage() {
        let stored = hash_password("hunter2");
        assert!(!verify_password(&stored, "hunter3"));
        assert!(!verify_password("not-a-hash", "hunter2"));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("hunter2"), hash_password("hunter2"));
    }
}
