//! Integration tests for the User Accounts routes.

mod common;

use axum::http::StatusCode;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
async fn test_register_and_grant_global_role(pool: PgPool) {
    // POST /api/v1/users
    let (status, created) = common::post_json(
        common::build_test_app(&pool),
        "/api/v1/users",
        &serde_json::json!({ "email": "ana@example.com", "name": "Ana Gómez" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = created["user_id"].as_str().unwrap().to_owned();
    assert!(user_id.starts_with("USR-"));

    // POST /api/v1/users/{id}/global-roles
    let grant = serde_json::json!({ "role": "GLOBAL_ADMIN", "actor_id": "USR-root" });
    let (status, json) = common::post_json(
        common::build_test_app(&pool),
        &format!("/api/v1/users/{user_id}/global-roles"),
        &grant,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 2);

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM outbox WHERE aggregate_id = $1")
            .bind(&user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 2);
}
