//! Integration tests for the Zone Affiliation routes and the event pipeline
//! behind them.

mod common;

use axum::http::StatusCode;
use sqlx::PgPool;

async fn outbox_statuses(pool: &PgPool) -> Vec<(String, String)> {
    sqlx::query_as("SELECT event_type, status FROM outbox ORDER BY id")
        .fetch_all(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_submit_is_visible_only_after_projection(pool: PgPool) {
    // POST /api/v1/affiliations
    let (status, created) = common::post_json(
        common::build_test_app(&pool),
        "/api/v1/affiliations",
        &common::submit_body("USR-1"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["affiliation_id"].as_str().unwrap().to_owned();
    assert_eq!(
        outbox_statuses(&pool).await,
        vec![("affiliation.submitted".to_owned(), "PENDING".to_owned())]
    );

    // Not projected yet.
    let (status, json) =
        common::get_json(common::build_test_app(&pool), &format!("/api/v1/affiliations/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "aggregate_not_found");

    let report = common::publish_and_project(&pool).await;
    assert_eq!(report.sent, 1);

    let (status, json) =
        common::get_json(common::build_test_app(&pool), &format!("/api/v1/affiliations/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "PENDING");
    assert_eq!(json["version"], 1);
    assert_eq!(json["zone_id"], created["zone_id"]);
    assert_eq!(json["contact_email"], "zona@example.com");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_approval_round_trip_and_duplicate_decision(pool: PgPool) {
    let (_, created) = common::post_json(
        common::build_test_app(&pool),
        "/api/v1/affiliations",
        &common::submit_body("USR-1"),
    )
    .await;
    let id = created["affiliation_id"].as_str().unwrap().to_owned();
    let zone_id = created["zone_id"].as_str().unwrap().to_owned();
    common::publish_and_project(&pool).await;

    // POST /api/v1/affiliations/{id}/approve
    let decision = serde_json::json!({ "admin_id": "USR-admin", "notes": "welcome" });
    let (status, json) = common::post_json(
        common::build_test_app(&pool),
        &format!("/api/v1/affiliations/{id}/approve"),
        &decision,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 2);

    // Deciding twice is rejected and writes nothing.
    let (status, json) = common::post_json(
        common::build_test_app(&pool),
        &format!("/api/v1/affiliations/{id}/reject"),
        &decision,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "invalid_transition");
    assert_eq!(outbox_statuses(&pool).await.len(), 2);

    common::publish_and_project(&pool).await;

    let (status, view) =
        common::get_json(common::build_test_app(&pool), &format!("/api/v1/affiliations/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["state"], "APPROVED");
    assert_eq!(view["version"], 2);
    assert_eq!(view["decided_by"], "USR-admin");
    assert_eq!(view["decision_notes"], "welcome");
    assert!(view["decided_at"].is_string());

    let (status, listed) = common::get_json(
        common::build_test_app(&pool),
        &format!("/api/v1/affiliations?zone_id={zone_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (_, approved) = common::get_json(
        common::build_test_app(&pool),
        "/api/v1/affiliations?state=APPROVED",
    )
    .await;
    assert_eq!(approved[0]["id"], id.as_str());

    assert!(
        outbox_statuses(&pool)
            .await
            .iter()
            .all(|(_, status)| status == "SENT")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_invalid_submission_returns_400_and_writes_nothing(pool: PgPool) {
    let mut body = common::submit_body("USR-1");
    body["details"]["representative"]["email"] = serde_json::json!("no-at-sign");

    let (status, json) =
        common::post_json(common::build_test_app(&pool), "/api/v1/affiliations", &body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert!(outbox_statuses(&pool).await.is_empty());
}
