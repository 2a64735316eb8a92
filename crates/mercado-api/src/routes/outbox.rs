//! Operator routes for the transactional outbox.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::post};
use mercado_core::error::DomainError;
use mercado_core::outbox::OutboxStatus;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for a successful requeue or replay.
#[derive(Debug, Serialize)]
pub struct RequeueResponse {
    /// The event put back in the publisher's scan.
    pub event_id: Uuid,
    /// Status after the operation.
    pub status: OutboxStatus,
}

async fn refuse(
    state: &AppState,
    event_id: Uuid,
    action: &'static str,
) -> Result<Json<RequeueResponse>, ApiError> {
    match state.outbox.find_by_event_id(event_id).await? {
        None => Err(DomainError::AggregateNotFound(event_id.to_string()).into()),
        Some(record) => Err(DomainError::InvalidTransition {
            aggregate_id: event_id.to_string(),
            from: record.status.to_string(),
            action,
        }
        .into()),
    }
}

/// POST /{event_id}/requeue
///
/// Puts a dead-lettered row back in the publisher's scan.
#[instrument(skip(state))]
async fn requeue(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<RequeueResponse>, ApiError> {
    if state.outbox.requeue(event_id).await? {
        info!("dead-lettered outbox row requeued");
        return Ok(Json(RequeueResponse {
            event_id,
            status: OutboxStatus::Pending,
        }));
    }

    refuse(&state, event_id, "requeue").await
}

/// POST /{event_id}/replay
///
/// Publishes an already sent event again, for a consumer that logged it as
/// still parked when it stopped.
#[instrument(skip(state))]
async fn replay(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<RequeueResponse>, ApiError> {
    if state.outbox.replay(event_id).await? {
        info!("sent outbox row scheduled for replay");
        return Ok(Json(RequeueResponse {
            event_id,
            status: OutboxStatus::Pending,
        }));
    }
    refuse(&state, event_id, "replay").await
}

/// Returns the router for outbox operations.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{event_id}/requeue", post(requeue))
        .route("/{event_id}/replay", post(replay))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use mercado_core::event::{EventEnvelope, EventMetadata};
    use mercado_core::outbox::{ClaimRequest, DeliveryOutcome, NewOutboxRecord, OutboxStore};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::state::test_state::{TestState, in_memory};

    async fn post_requeue(test: &TestState, event_id: Uuid) -> (StatusCode, Value) {
        post_action(test, event_id, "requeue").await
    }

    async fn post_action(test: &TestState, event_id: Uuid, action: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/{event_id}/{action}"))
            .body(Body::empty())
            .unwrap();

        let response = router()
            .with_state(test.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body_bytes).unwrap())
    }

    fn dead_lettered(record_id: i64) -> DeliveryOutcome {
        DeliveryOutcome::DeadLettered {
            record_id,
            error: "gave up".to_owned(),
        }
    }

    fn sent(record_id: i64) -> DeliveryOutcome {
        DeliveryOutcome::Sent {
            record_id,
            sent_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 1).unwrap(),
        }
    }

    async fn seed_row(test: &TestState, dead_letter: bool) -> Uuid {
        let finish = if dead_letter {
            Some(dead_lettered as fn(i64) -> DeliveryOutcome)
        } else {
            None
        };
        seed_row_with(test, finish).await
    }

    async fn seed_row_with(test: &TestState, finish: Option<fn(i64) -> DeliveryOutcome>) -> Uuid {
        let event_id = Uuid::new_v4();
        let occurred_at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let envelope = EventEnvelope {
            event_id,
            event_type: "user.registered".to_owned(),
            occurred_at,
            meta: EventMetadata::new("User", "USR-1", 1),
            payload: serde_json::json!({}),
        };
        let record_id = test.commands.insert_outbox(NewOutboxRecord {
            event_id,
            event_type: "user.registered".to_owned(),
            payload: serde_json::to_value(envelope).unwrap(),
            aggregate_id: "USR-1".to_owned(),
            partition_key: None,
            occurred_at,
        });
        if let Some(finish) = finish {
            let now = occurred_at;
            test.commands
                .claim_batch(&ClaimRequest {
                    owner: "op".to_owned(),
                    limit: 10,
                    now,
                    lease_until: now + chrono::Duration::seconds(30),
                })
                .await
                .unwrap();
            test.commands
                .complete_batch("op", &[finish(record_id)])
                .await
                .unwrap();
        }
        event_id
    }

    #[tokio::test]
    async fn test_requeue_dead_lettered_row_returns_200() {
        // Arrange
        let test = in_memory();
        let event_id = seed_row(&test, true).await;

        // Act
        let (status, json) = post_requeue(&test, event_id).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "PENDING");
        let row = test.commands.find_by_event_id(event_id).await.unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::Pending);
        assert_eq!(row.attempts, 0);
    }

    #[tokio::test]
    async fn test_requeue_pending_row_returns_409() {
        let test = in_memory();
        let event_id = seed_row(&test, false).await;

        let (status, json) = post_requeue(&test, event_id).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "invalid_transition");
    }

    #[tokio::test]
    async fn test_requeue_unknown_event_returns_404() {
        let test = in_memory();

        let (status, _) = post_requeue(&test, Uuid::new_v4()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_replay_sent_row_returns_200_and_makes_it_publishable() {
        // Arrange
        let test = in_memory();
        let event_id = seed_row_with(&test, Some(sent)).await;

        // Act
        let (status, json) = post_action(&test, event_id, "replay").await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "PENDING");
        let row = test.commands.find_by_event_id(event_id).await.unwrap().unwrap();
        assert_eq!(row.status, OutboxStatus::Pending);
        assert_eq!(row.sent_at, None);
    }

    #[tokio::test]
    async fn test_replay_dead_lettered_row_returns_409() {
        let test = in_memory();
        let event_id = seed_row(&test, true).await;

        let (status, json) = post_action(&test, event_id, "replay").await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"], "invalid_transition");
    }
}
