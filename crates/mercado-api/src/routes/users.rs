//! Routes for the User Accounts bounded context.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::post};
use mercado_accounts::application::command_handlers::{self, UserCommandResult};
use mercado_accounts::domain::commands;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    /// Login email.
    pub email: String,
    /// Display name.
    pub name: String,
}

/// Request body for POST /{id}/global-roles.
#[derive(Debug, Deserialize)]
pub struct GrantGlobalRoleRequest {
    /// Role to grant, e.g. `GLOBAL_ADMIN`.
    pub role: String,
    /// Who is granting it.
    pub actor_id: String,
}

/// Response body returned after a user command is handled.
#[derive(Debug, Serialize)]
pub struct UserCommandResponse {
    /// The user identifier.
    pub user_id: String,
    /// Aggregate version after the command.
    pub version: i64,
    /// IDs of the domain events produced; empty when nothing changed.
    pub event_ids: Vec<Uuid>,
}

impl From<UserCommandResult> for UserCommandResponse {
    fn from(result: UserCommandResult) -> Self {
        Self {
            user_id: result.user_id,
            version: result.version,
            event_ids: result.event_ids,
        }
    }
}

/// POST /
#[instrument(skip(state, request))]
async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserCommandResponse>), ApiError> {
    let command = commands::RegisterUser {
        correlation_id: Uuid::new_v4(),
        email: request.email,
        name: request.name,
    };

    info!(correlation_id = %command.correlation_id, "handling register_user command");

    let result =
        command_handlers::handle_register_user(&command, state.event_factory.as_ref(), state.users.as_ref())
            .await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

/// POST /{id}/global-roles
#[instrument(skip(state, request), fields(role = %request.role))]
async fn grant_global_role(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<GrantGlobalRoleRequest>,
) -> Result<Json<UserCommandResponse>, ApiError> {
    let command = commands::GrantGlobalRole {
        correlation_id: Uuid::new_v4(),
        user_id,
        role: request.role,
        actor_id: request.actor_id,
    };

    info!(correlation_id = %command.correlation_id, "handling grant_global_role command");

    let result = command_handlers::handle_grant_global_role(
        &command,
        state.event_factory.as_ref(),
        state.users.as_ref(),
    )
    .await?;

    Ok(Json(result.into()))
}

/// Returns the router for the accounts context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register_user))
        .route("/{id}/global-roles", post(grant_global_role))
}
