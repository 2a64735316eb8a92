//! Routes for the Zone Affiliation bounded context.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use mercado_affiliation::application::command_handlers::{
    self, AffiliationCommandResult,
};
use mercado_affiliation::domain::aggregates::AffiliationStatus;
use mercado_affiliation::domain::commands;
use mercado_affiliation::domain::details::ZoneDetails;
use mercado_core::error::DomainError;
use mercado_projection::queries::{self, AffiliationFilter};
use mercado_projection::view::AffiliationView;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct SubmitAffiliationRequest {
    /// The user filing the request.
    pub requester_id: String,
    /// Zone data.
    pub details: ZoneDetails,
}

/// Request body for POST /{id}/approve and POST /{id}/reject.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    /// The deciding administrator.
    pub admin_id: String,
    /// Optional notes on the decision.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Query string for GET /. Exactly one filter must be given.
#[derive(Debug, Default, Deserialize)]
pub struct ListAffiliationsParams {
    /// Filter by zone.
    pub zone_id: Option<String>,
    /// Filter by state (`PENDING`, `APPROVED`, `REJECTED`).
    pub state: Option<String>,
    /// Filter by requesting user.
    pub requester_id: Option<String>,
}

impl ListAffiliationsParams {
    fn into_filter(self) -> Result<AffiliationFilter, DomainError> {
        match (self.zone_id, self.state, self.requester_id) {
            (Some(zone_id), None, None) => Ok(AffiliationFilter::Zone(zone_id)),
            (None, Some(state), None) => {
                AffiliationStatus::parse(&state.to_ascii_uppercase()).map(AffiliationFilter::State)
            }
            (None, None, Some(requester_id)) => Ok(AffiliationFilter::Requester(requester_id)),
            _ => Err(DomainError::Validation(
                "exactly one of zone_id, state or requester_id is required".to_owned(),
            )),
        }
    }
}

/// Response body returned after an affiliation command is handled.
#[derive(Debug, Serialize)]
pub struct AffiliationCommandResponse {
    /// The affiliation identifier.
    pub affiliation_id: String,
    /// The zone identifier.
    pub zone_id: String,
    /// Aggregate version after the command.
    pub version: i64,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

impl From<AffiliationCommandResult> for AffiliationCommandResponse {
    fn from(result: AffiliationCommandResult) -> Self {
        Self {
            affiliation_id: result.affiliation_id,
            zone_id: result.zone_id,
            version: result.version,
            event_ids: result.event_ids,
        }
    }
}

/// POST /
#[instrument(skip(state, request), fields(requester_id = %request.requester_id))]
async fn submit_affiliation(
    State(state): State<AppState>,
    Json(request): Json<SubmitAffiliationRequest>,
) -> Result<(StatusCode, Json<AffiliationCommandResponse>), ApiError> {
    let command = commands::SubmitAffiliation {
        correlation_id: Uuid::new_v4(),
        requester_id: request.requester_id,
        details: request.details,
    };

    info!(correlation_id = %command.correlation_id, "handling submit_affiliation command");

    let result = command_handlers::handle_submit_affiliation(
        &command,
        state.event_factory.as_ref(),
        state.affiliations.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

/// POST /{id}/approve
#[instrument(skip(state, request), fields(admin_id = %request.admin_id))]
async fn approve_affiliation(
    State(state): State<AppState>,
    Path(affiliation_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<AffiliationCommandResponse>, ApiError> {
    let command = commands::ApproveAffiliation {
        correlation_id: Uuid::new_v4(),
        affiliation_id,
        admin_id: request.admin_id,
        notes: request.notes,
    };

    info!(correlation_id = %command.correlation_id, "handling approve_affiliation command");

    let result = command_handlers::handle_approve_affiliation(
        &command,
        state.event_factory.as_ref(),
        state.affiliations.as_ref(),
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST /{id}/reject
#[instrument(skip(state, request), fields(admin_id = %request.admin_id))]
async fn reject_affiliation(
    State(state): State<AppState>,
    Path(affiliation_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<AffiliationCommandResponse>, ApiError> {
    let command = commands::RejectAffiliation {
        correlation_id: Uuid::new_v4(),
        affiliation_id,
        admin_id: request.admin_id,
        notes: request.notes,
    };

    info!(correlation_id = %command.correlation_id, "handling reject_affiliation command");

    let result = command_handlers::handle_reject_affiliation(
        &command,
        state.event_factory.as_ref(),
        state.affiliations.as_ref(),
    )
    .await?;

    Ok(Json(result.into()))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_affiliation(
    State(state): State<AppState>,
    Path(affiliation_id): Path<String>,
) -> Result<Json<AffiliationView>, ApiError> {
    let view = queries::get_affiliation_by_id(&affiliation_id, state.affiliation_views.as_ref())
        .await?;
    Ok(Json(view))
}

/// GET /?zone_id=|state=|requester_id=
#[instrument(skip(state))]
async fn list_affiliations(
    State(state): State<AppState>,
    Query(params): Query<ListAffiliationsParams>,
) -> Result<Json<Vec<AffiliationView>>, ApiError> {
    let filter = params.into_filter()?;
    let views = queries::list_affiliations(&filter, state.affiliation_views.as_ref()).await?;
    Ok(Json(views))
}

/// Returns the router for the affiliation context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_affiliation).get(list_affiliations))
        .route("/{id}", get(get_affiliation))
        .route("/{id}/approve", post(approve_affiliation))
        .route("/{id}/reject", post(reject_affiliation))
}
