//! `/health` and the behaviour of the shared middleware stack.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get, post_json_auth};
use leadflow_core::roles::ActorRole;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn health_is_ok_while_the_store_answers() {
    let test = common::build_test_app();

    let response = get(test.app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store_healthy"], true);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn store_outage_degrades_health_without_failing_it() {
    let test = common::build_test_app();
    test.store.set_offline(true);

    let response = get(test.app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["store_healthy"], false);
}

#[tokio::test]
async fn unknown_path_gets_a_json_404() {
    let test = common::build_test_app();

    let response = get(test.app(), "/api/v1/opportunities").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "No route for /api/v1/opportunities");
}

#[tokio::test]
async fn request_id_is_generated_or_echoed() {
    let test = common::build_test_app();

    let response = get(test.app(), "/health").await;
    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "crm-trace-7")
        .body(Body::empty())
        .unwrap();
    let response = test.app().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "crm-trace-7");
}

#[tokio::test]
async fn preflight_from_the_front_end_allows_patch() {
    let test = common::build_test_app();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/leads/1")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "PATCH")
        .header("Access-Control-Request-Headers", "authorization,content-type")
        .body(Body::empty())
        .unwrap();

    let response = test.app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers["access-control-allow-origin"],
        "http://localhost:5173"
    );
    let methods = headers["access-control-allow-methods"].to_str().unwrap();
    assert!(methods.contains("PATCH"), "got {methods}");
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let test = common::build_test_app();
    let token = test.token(1, ActorRole::Admin);
    let padding = "x".repeat(test.config.max_body_bytes + 1);

    let response = post_json_auth(
        test.app(),
        "/api/v1/leads",
        json!({ "activite": padding }),
        &token,
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
