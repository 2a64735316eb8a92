//! Integration tests for the Producer Application routes.

mod common;

use axum::http::StatusCode;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
async fn test_application_lifecycle_through_the_read_model(pool: PgPool) {
    // POST /api/v1/producer-applications
    let (status, created) = common::post_json(
        common::build_test_app(&pool),
        "/api/v1/producer-applications",
        &common::producer_application_body("USR-7", "ZON-1"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["application_id"].as_str().unwrap().to_owned();

    let report = common::publish_and_project(&pool).await;
    assert_eq!(report.sent, 1);

    // A second open application to the same zone is refused once the first
    // is visible.
    let (status, json) = common::post_json(
        common::build_test_app(&pool),
        "/api/v1/producer-applications",
        &common::producer_application_body("USR-7", "ZON-1"),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");

    // POST /api/v1/producer-applications/{id}/approve
    let (status, json) = common::post_json(
        common::build_test_app(&pool),
        &format!("/api/v1/producer-applications/{id}/approve"),
        &serde_json::json!({ "admin_id": "USR-zone-admin" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 2);
    common::publish_and_project(&pool).await;

    let (status, json) = common::get_json(
        common::build_test_app(&pool),
        &format!("/api/v1/producer-applications/{id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "APPROVED");
    assert_eq!(json["decided_by"], "USR-zone-admin");

    // Once decided, the producer may apply again.
    let (status, _) = common::post_json(
        common::build_test_app(&pool),
        "/api/v1/producer-applications",
        &common::producer_application_body("USR-7", "ZON-1"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, listed) = common::get_json(
        common::build_test_app(&pool),
        "/api/v1/producer-applications?zone_id=ZON-1",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}
