//! HTTP-level integration tests for team member management.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_auth, post_json_auth, seed_member};
use leadflow_core::roles::ActorRole;
use serde_json::json;

#[tokio::test]
async fn admin_creates_member_and_duplicate_email_conflicts() {
    let test = common::build_test_app();
    let admin = test.token(1, ActorRole::Admin);
    let body = json!({ "name": "Ines Martin", "email": "ines@leadflow.test", "role": "SETTER" });

    let response = post_json_auth(test.app(), "/api/v1/team", body, &admin).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["role"], "SETTER");
    assert_eq!(json["data"]["is_active"], true);

    let duplicate = json!({ "name": "Ines M.", "email": "INES@leadflow.test", "role": "CLOSER" });
    let response = post_json_auth(test.app(), "/api/v1/team", duplicate, &admin).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_member_payload_is_rejected() {
    let test = common::build_test_app();
    let admin = test.token(1, ActorRole::Admin);

    let response = post_json_auth(
        test.app(),
        "/api/v1/team",
        json!({ "name": "Nobody", "email": "not-an-email", "role": "CLOSER" }),
        &admin,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn head_of_sales_lists_but_cannot_create() {
    let test = common::build_test_app();
    seed_member(&test.store, "Camille", ActorRole::Closer).await;
    seed_member(&test.store, "Bruno", ActorRole::Setter).await;
    let hos = test.token(1, ActorRole::Hos);

    let response = get_auth(test.app(), "/api/v1/team", &hos).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let names: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Bruno", "Camille"]);

    let response = post_json_auth(
        test.app(),
        "/api/v1/team",
        json!({ "name": "Eve", "email": "eve@leadflow.test", "role": "EXPERT" }),
        &hos,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn closer_cannot_list_the_team() {
    let test = common::build_test_app();
    let closer = test.token(5, ActorRole::Closer);

    let response = get_auth(test.app(), "/api/v1/team", &closer).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
