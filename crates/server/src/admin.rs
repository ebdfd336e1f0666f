//! Admin API endpoints.

use api_types::user::{Role as ApiRole, UserView, UsersResponse};
use axum::{Extension, Json, extract::State};
use ledger::{Principal, Role};

use crate::{ServerError, server::ServerState};

fn map_role(role: Role) -> ApiRole {
    match role {
        Role::User => ApiRole::User,
        Role::Admin => ApiRole::Admin,
    }
}

/// List every registered user. The ledger enforces the admin role.
pub async fn list_users(
    Extension(principal): Extension<Principal>,
    State(state): State<ServerState>,
) -> Result<Json<UsersResponse>, ServerError> {
    let users = state.ledger.list_users(&principal).await?;

    Ok(Json(UsersResponse {
        users: users
            .into_iter()
            .map(|user| UserView {
                id: user.id,
                username: user.username,
                email: user.email,
                role: map_role(user.role),
                created_at: user.created_at.fixed_offset(),
            })
            .collect(),
    }))
}
