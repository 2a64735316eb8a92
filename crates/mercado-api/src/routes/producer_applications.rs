//! Routes for the Producer Application bounded context.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing::get, routing::post};
use mercado_core::error::DomainError;
use mercado_producers::application::command_handlers::{
    self, ProducerApplicationCommandResult,
};
use mercado_producers::domain::aggregates::ApplicationStatus;
use mercado_producers::domain::commands;
use mercado_producers::domain::profile::ProducerProfile;
use mercado_projection::producer_queries::{self, ProducerApplicationFilter};
use mercado_projection::producer_view::ProducerApplicationView;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::affiliations::DecisionRequest;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct SubmitProducerApplicationRequest {
    /// The applying user.
    pub producer_id: String,
    /// The zone applied to.
    pub zone_id: String,
    /// Producer data.
    pub profile: ProducerProfile,
}

/// Query string for GET /. Exactly one filter must be given.
#[derive(Debug, Default, Deserialize)]
pub struct ListProducerApplicationsParams {
    pub zone_id: Option<String>,
    /// `PENDING`, `APPROVED` or `REJECTED`, any case.
    pub state: Option<String>,
    pub producer_id: Option<String>,
}

impl ListProducerApplicationsParams {
    fn into_filter(self) -> Result<ProducerApplicationFilter, DomainError> {
        match (self.zone_id, self.state, self.producer_id) {
            (Some(zone_id), None, None) => Ok(ProducerApplicationFilter::Zone(zone_id)),
            (None, Some(state), None) => ApplicationStatus::parse(&state.to_ascii_uppercase())
                .map(ProducerApplicationFilter::State),
            (None, None, Some(producer_id)) => Ok(ProducerApplicationFilter::Producer(producer_id)),
            _ => Err(DomainError::Validation(
                "exactly one of zone_id, state or producer_id is required".to_owned(),
            )),
        }
    }
}

/// Response body returned after a producer application command is handled.
#[derive(Debug, Serialize)]
pub struct ProducerApplicationCommandResponse {
    pub application_id: String,
    pub zone_id: String,
    /// Aggregate version after the command.
    pub version: i64,
    /// IDs of the domain events produced and persisted.
    pub event_ids: Vec<Uuid>,
}

impl From<ProducerApplicationCommandResult> for ProducerApplicationCommandResponse {
    fn from(result: ProducerApplicationCommandResult) -> Self {
        Self {
            application_id: result.application_id,
            zone_id: result.zone_id,
            version: result.version,
            event_ids: result.event_ids,
        }
    }
}

/// POST /
#[instrument(skip(state, request), fields(producer_id = %request.producer_id, zone_id = %request.zone_id))]
async fn submit_application(
    State(state): State<AppState>,
    Json(request): Json<SubmitProducerApplicationRequest>,
) -> Result<(StatusCode, Json<ProducerApplicationCommandResponse>), ApiError> {
    let command = commands::SubmitProducerApplication {
        correlation_id: Uuid::new_v4(),
        producer_id: request.producer_id,
        zone_id: request.zone_id,
        profile: request.profile,
    };

    info!(correlation_id = %command.correlation_id, "handling submit_producer_application command");

    let result = command_handlers::handle_submit_producer_application(
        &command,
        state.event_factory.as_ref(),
        state.producer_applications.as_ref(),
        state.pending_applications.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

/// POST /{id}/approve
#[instrument(skip(state, request), fields(admin_id = %request.admin_id))]
async fn approve_application(
    State(state): State<AppState>,
    Path(application_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<ProducerApplicationCommandResponse>, ApiError> {
    let command = commands::ApproveProducerApplication {
        correlation_id: Uuid::new_v4(),
        application_id,
        admin_id: request.admin_id,
        notes: request.notes,
    };

    let result = command_handlers::handle_approve_producer_application(
        &command,
        state.event_factory.as_ref(),
        state.producer_applications.as_ref(),
    )
    .await?;

    Ok(Json(result.into()))
}

/// POST /{id}/reject
#[instrument(skip(state, request), fields(admin_id = %request.admin_id))]
async fn reject_application(
    State(state): State<AppState>,
    Path(application_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<ProducerApplicationCommandResponse>, ApiError> {
    let command = commands::RejectProducerApplication {
        correlation_id: Uuid::new_v4(),
        application_id,
        admin_id: request.admin_id,
        notes: request.notes,
    };

    let result = command_handlers::handle_reject_producer_application(
        &command,
        state.event_factory.as_ref(),
        state.producer_applications.as_ref(),
    )
    .await?;

    Ok(Json(result.into()))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_application(
    State(state): State<AppState>,
    Path(application_id): Path<String>,
) -> Result<Json<ProducerApplicationView>, ApiError> {
    let view = producer_queries::get_producer_application_by_id(
        &application_id,
        state.producer_application_views.as_ref(),
    )
    .await?;
    Ok(Json(view))
}

/// GET /?zone_id=|state=|producer_id=
#[instrument(skip(state))]
async fn list_applications(
    State(state): State<AppState>,
    Query(params): Query<ListProducerApplicationsParams>,
) -> Result<Json<Vec<ProducerApplicationView>>, ApiError> {
    let filter = params.into_filter()?;
    let views = producer_queries::list_producer_applications(
        &filter,
        state.producer_application_views.as_ref(),
    )
    .await?;
    Ok(Json(views))
}

/// Returns the router for the producer application context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_application).get(list_applications))
        .route("/{id}", get(get_application))
        .route("/{id}/approve", post(approve_application))
        .route("/{id}/reject", post(reject_application))
}
