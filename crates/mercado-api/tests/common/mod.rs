//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use http_body_util::BodyExt;
use mercado_core::clock::SystemClock;
use mercado_core::transport::{DeliveryHandler, MessageSubscriber};
use mercado_messaging::InMemoryBroker;
use mercado_outbox::pg_outbox_store::PgOutboxStore;
use mercado_outbox::publisher::{OutboxPublisher, PublishReport, PublisherConfig};
use mercado_projection::handler::{
    AFFILIATION_PROJECTION_PATTERN, PRODUCER_APPLICATION_PROJECTION_PATTERN, ProjectionHandler,
};
use mercado_projection::pg_projection_store::PgProjectionStore;
use mercado_projection::projector::{AffiliationProjector, ProducerApplicationProjector};
use sqlx::PgPool;
use tower::ServiceExt;

use mercado_api::state::AppState;

/// Build the full app router over `PostgreSQL`. Uses the same route
/// structure as `main.rs`.
pub fn build_test_app(pool: &PgPool) -> Router {
    mercado_api::app(AppState::postgres(pool))
}

/// Runs one publisher cycle and feeds every affiliation and producer
/// application message it produced to its projection, synchronously.
pub async fn publish_and_project(pool: &PgPool) -> PublishReport {
    let broker = Arc::new(InMemoryBroker::new());
    let mut deliveries = broker.subscribe(AFFILIATION_PROJECTION_PATTERN).await.unwrap();
    let mut producer_deliveries = broker
        .subscribe(PRODUCER_APPLICATION_PROJECTION_PATTERN)
        .await
        .unwrap();
    let publisher = OutboxPublisher::new(
        Arc::new(PgOutboxStore::new(pool.clone())),
        broker.clone(),
        Arc::new(SystemClock),
        PublisherConfig::default(),
    );
    let report = publisher.run_once().await.unwrap();
    // Dropping every broker handle closes the subscription stream.
    drop(publisher);
    drop(broker);

    let handler = ProjectionHandler::new(AffiliationProjector::new(
        Arc::new(PgProjectionStore::new(pool.clone())),
        Arc::new(SystemClock),
    ));
    while let Some(delivery) = deliveries.next().await {
        handler.handle(&delivery).await.unwrap();
    }
    let producer_handler = ProjectionHandler::new(ProducerApplicationProjector::new(
        Arc::new(PgProjectionStore::new(pool.clone())),
        Arc::new(SystemClock),
    ));
    while let Some(delivery) = producer_deliveries.next().await {
        producer_handler.handle(&delivery).await.unwrap();
    }
    report
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a POST request without a body and return the response.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// A valid submission body.
pub fn submit_body(requester_id: &str) -> serde_json::Value {
    serde_json::json!({
        "requester_id": requester_id,
        "details": {
            "hamlet_name": "La Esperanza",
            "municipality": "Fusagasugá",
            "contact": { "email": "zona@example.com" },
            "representative": {
                "name": "Ana Gómez",
                "document": "1010101010",
                "email": "ana@example.com"
            }
        }
    })
}

/// A valid producer application body.
pub fn producer_application_body(producer_id: &str, zone_id: &str) -> serde_json::Value {
    serde_json::json!({
        "producer_id": producer_id,
        "zone_id": zone_id,
        "profile": {
            "producer_name": "Finca El Roble",
            "document": "52000111",
            "email": "roble@example.com",
            "product_types": "café, plátano"
        }
    })
}
