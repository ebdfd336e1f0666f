use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};
use ledger::{Ledger, Principal, Role, users};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use std::sync::Arc;

use crate::{accounts, admin, auth, transactions};

#[derive(Clone)]
pub struct ServerState {
    pub ledger: Arc<Ledger>,
    pub db: DatabaseConnection,
}

/// Basic-auth gateway: resolves the user row, verifies the salted digest and
/// hands the ledger a `Principal`. The ledger itself never sees credentials.
async fn authenticate(
    auth_header: TypedHeader<Authorization<Basic>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let username = auth_header.username().trim().to_lowercase();
    let user: Option<users::Model> = users::Entity::find()
        .filter(users::Column::Username.eq(username))
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let Some(user) = user else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    if !auth::verify_password(&user.password_hash, auth_header.password()) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let role = Role::try_from(user.role.as_str()).map_err(|_| StatusCode::UNAUTHORIZED)?;

    request
        .extensions_mut()
        .insert(Principal::new(user.id, role));
    Ok(next.run(request).await)
}

fn router(state: ServerState) -> Router {
    let protected = Router::new()
        .route("/accounts", get(accounts::list).post(accounts::open))
        .route("/accounts/{id}/deposit", post(transactions::deposit_new))
        .route("/accounts/{id}/withdraw", post(transactions::withdraw_new))
        .route("/accounts/{id}/transactions", get(transactions::history))
        .route("/accounts/{id}/stats", get(accounts::stats))
        .route("/transfers", post(transactions::transfer_new))
        .route("/admin/users", get(admin::list_users))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/register", post(auth::register))
        .merge(protected)
        .with_state(state)
}

pub async fn run(ledger: Ledger, db: DatabaseConnection) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(ledger, db, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    ledger: Ledger,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        ledger: Arc::new(ledger),
        db,
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    ledger: Ledger,
    db: DatabaseConnection,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(ledger, db, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use base64::Engine as _;
    use http_body_util::BodyExt;
    use migration::MigratorTrait;
    use sea_orm::{ConnectOptions, Database};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1);
        let db = Database::connect(options).await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let ledger = Ledger::builder().database(db.clone()).build().await.unwrap();
        router(ServerState {
            ledger: Arc::new(ledger),
            db,
        })
    }

    fn basic_auth(username: &str, password: &str) -> String {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        format!("Basic {encoded}")
    }

    async fn register_alice(app: &Router) -> Value {
        let request = Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "username": "alice",
                    "email": "alice@example.com",
                    "password": "hunter2"
                })
                .to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn register_reports_the_seeded_accounts() {
        let app = test_router().await;
        let body = register_alice(&app).await;

        let accounts = body["accounts"].as_array().unwrap();
        assert_eq!(accounts.len(), 3);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = test_router().await;
        register_alice(&app).await;

        let request = Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "username": "alice",
                    "email": "second@example.com",
                    "password": "hunter2"
                })
                .to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn dashboard_requires_valid_credentials() {
        let app = test_router().await;
        register_alice(&app).await;

        let ok = Request::builder()
            .uri("/accounts")
            .header(header::AUTHORIZATION, basic_auth("alice", "hunter2"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(ok).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let wrong_password = Request::builder()
            .uri("/accounts")
            .header(header::AUTHORIZATION, basic_auth("alice", "wrong"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(wrong_password).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let anonymous = Request::builder()
            .uri("/accounts")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(anonymous).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn deposit_then_history_round_trip() {
        let app = test_router().await;
        let body = register_alice(&app).await;
        let account_id = body["accounts"][0]["id"].as_str().unwrap().to_string();

        let deposit = Request::builder()
            .method("POST")
            .uri(format!("/accounts/{account_id}/deposit"))
            .header(header::AUTHORIZATION, basic_auth("alice", "hunter2"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"amount_minor": 12_34, "note": "cash"}).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(deposit).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let history = Request::builder()
            .uri(format!("/accounts/{account_id}/transactions?type=credit"))
            .header(header::AUTHORIZATION, basic_auth("alice", "hunter2"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(history).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        let transactions = body["transactions"].as_array().unwrap();
        // The fresh deposit plus the seed deposit, newest first.
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0]["amount_minor"], 12_34);
    }

    #[tokio::test]
    async fn overdraft_maps_to_unprocessable_entity() {
        let app = test_router().await;
        let body = register_alice(&app).await;
        let account_id = body["accounts"][0]["id"].as_str().unwrap().to_string();

        let withdraw = Request::builder()
            .method("POST")
            .uri(format!("/accounts/{account_id}/withdraw"))
            .header(header::AUTHORIZATION, basic_auth("alice", "hunter2"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"amount_minor": 999_999_99}).to_string()))
            .unwrap();
        let response = app.oneshot(withdraw).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn admin_listing_is_forbidden_for_plain_users() {
        let app = test_router().await;
        register_alice(&app).await;

        let request = Request::builder()
            .uri("/admin/users")
            .header(header::AUTHORIZATION, basic_auth("alice", "hunter2"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
