#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use tower::ServiceExt;

use leadflow_api::auth::jwt::{generate_access_token, JwtConfig};
use leadflow_api::config::ServerConfig;
use leadflow_api::router::build_app_router;
use leadflow_api::state::AppState;
use leadflow_core::lead::Temperature;
use leadflow_core::pipeline::LeadStage;
use leadflow_core::roles::ActorRole;
use leadflow_core::types::{DbId, Timestamp};
use leadflow_db::models::lead::Lead;
use leadflow_db::models::team_member::{CreateTeamMember, TeamMember};
use leadflow_db::{MemoryPipelineStore, PipelineStore};
use leadflow_events::{EventBus, SnapshotRefresher};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_body_bytes: 64 * 1024,
        shutdown_timeout_secs: 30,
        snapshot_refresh_secs: 60,
        jwt: JwtConfig {
            secret: "integration-test-secret-long-enough-for-hmac".to_string(),
            issuer: None,
            access_token_expiry_mins: 15,
        },
    }
}

/// The application under test plus handles on its shared pieces.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryPipelineStore>,
    pub state: AppState,
    pub config: ServerConfig,
}

impl TestApp {
    /// A fresh router for one request (`oneshot` consumes it).
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Mint a bearer token for `member_id` acting as `role`.
    pub fn token(&self, member_id: DbId, role: ActorRole) -> String {
        generate_access_token(member_id, role.as_str(), &self.config.jwt)
            .expect("token generation should succeed")
    }
}

/// Build the full application router over an in-memory store.
///
/// Goes through `build_app_router`, so requests cross the production
/// middleware stack.
/// Background services are not started; tests drive the snapshot refresher
/// directly when they need to.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryPipelineStore::new());
    let dyn_store: Arc<dyn PipelineStore> = store.clone();

    let state = AppState {
        store: dyn_store.clone(),
        config: Arc::new(config.clone()),
        event_bus: Arc::new(EventBus::default()),
        snapshots: Arc::new(SnapshotRefresher::new(dyn_store)),
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        store,
        state,
        config,
    }
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

pub async fn seed_member(store: &MemoryPipelineStore, name: &str, role: ActorRole) -> TeamMember {
    store
        .create_team_member(&CreateTeamMember {
            name: name.to_string(),
            email: format!("{}@leadflow.test", name.to_lowercase()),
            role,
        })
        .await
        .expect("member creation should succeed")
}

/// Lead fields a test cares about; everything else gets a neutral default.
#[derive(Debug, Clone)]
pub struct LeadSeed {
    pub stage: LeadStage,
    pub ca: Decimal,
    pub temperature: Temperature,
    pub show_up: Option<bool>,
    pub closer_id: Option<DbId>,
    pub setter_id: Option<DbId>,
    pub created_at: Timestamp,
}

impl Default for LeadSeed {
    fn default() -> Self {
        Self {
            stage: LeadStage::Nouveau,
            ca: Decimal::ZERO,
            temperature: Temperature::Cold,
            show_up: None,
            closer_id: None,
            setter_id: None,
            created_at: Utc::now(),
        }
    }
}

pub async fn seed_lead(store: &MemoryPipelineStore, seed: LeadSeed) -> Lead {
    store
        .insert_lead(Lead {
            id: 0,
            first_name: Some("Test".to_string()),
            last_name: Some("Lead".to_string()),
            email: None,
            phone: None,
            activite: None,
            temperature: seed.temperature,
            ca: seed.ca,
            status: seed.stage,
            show_up: seed.show_up,
            rdv_date: None,
            closer_id: seed.closer_id,
            setter_id: seed.setter_id,
            created_at: seed.created_at,
            updated_at: seed.created_at,
        })
        .await
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, req: Request<Body>) -> Response<Body> {
    app.oneshot(req).await.unwrap()
}

/// Unauthenticated GET.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, request(Method::GET, uri, None, None)).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, request(Method::GET, uri, Some(token), None)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, request(Method::POST, uri, Some(token), Some(body))).await
}

pub async fn patch_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, request(Method::PATCH, uri, Some(token), Some(body))).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send(app, request(Method::PUT, uri, Some(token), Some(body))).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
