//! Mercado accounts backend: HTTP API and worker wiring.
//!
//! Exposes the affiliation, producer application and user commands, their
//! read models and the outbox requeue and replay operations over HTTP, and
//! runs the outbox publisher and event consumers in the same process.

use axum::Router;

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod workers;

use state::AppState;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/affiliations", routes::affiliations::router())
        .nest(
            "/api/v1/producer-applications",
            routes::producer_applications::router(),
        )
        .nest("/api/v1/users", routes::users::router())
        .nest("/api/v1/outbox", routes::outbox::router())
        .with_state(state)
}
