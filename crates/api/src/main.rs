use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use leadflow_api::config::ServerConfig;
use leadflow_api::router::build_app_router;
use leadflow_api::state::AppState;
use leadflow_db::{MemoryPipelineStore, PgPipelineStore, PipelineStore};
use leadflow_events::{EventBus, EventPersistence, SnapshotRefresher};

const DEFAULT_LOG_FILTER: &str = "leadflow_api=debug,leadflow_events=info,tower_http=debug";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        snapshot_refresh_secs = config.snapshot_refresh_secs,
        "Configuration loaded",
    );

    let store = connect_store().await;
    let event_bus = Arc::new(EventBus::default());
    let snapshots = Arc::new(SnapshotRefresher::new(Arc::clone(&store)));
    let cancel = CancellationToken::new();
    let background = spawn_services(&store, &event_bus, &snapshots, &config, &cancel);

    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        event_bus,
        snapshots,
    };

    let addr = SocketAddr::new(
        config.host.parse().expect("HOST must be an IP address"),
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("Cannot bind {addr}: {e}"));
    tracing::info!(%addr, "Listening");

    axum::serve(listener, build_app_router(state, &config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");

    tracing::info!("Connections drained, stopping event services");
    cancel.cancel();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    for (name, handle) in background {
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!(service = name, "Service did not stop within the grace period");
        }
    }
    tracing::info!("Shutdown complete");
}

/// `RUST_LOG` wins over the built-in filter. `LOG_FORMAT=json` switches to
/// one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Postgres when `DATABASE_URL` is set (migrated on startup), otherwise the
/// in-memory store.
async fn connect_store() -> Arc<dyn PipelineStore> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        tracing::warn!("DATABASE_URL not set; leads live in memory and vanish on restart");
        return Arc::new(MemoryPipelineStore::new());
    };

    let pool = leadflow_db::create_pool(&database_url)
        .await
        .expect("Cannot connect to DATABASE_URL");
    leadflow_db::health_check(&pool)
        .await
        .expect("Database did not answer the health check");
    leadflow_db::run_migrations(&pool)
        .await
        .expect("Database migrations failed");
    tracing::info!("Postgres store ready");

    Arc::new(PgPipelineStore::new(pool))
}

/// Event log writer and snapshot refresher, both stopped by `cancel`.
fn spawn_services(
    store: &Arc<dyn PipelineStore>,
    event_bus: &EventBus,
    snapshots: &Arc<SnapshotRefresher>,
    config: &ServerConfig,
    cancel: &CancellationToken,
) -> Vec<(&'static str, JoinHandle<()>)> {
    let persistence = tokio::spawn(EventPersistence::run(
        Arc::clone(store),
        event_bus.subscribe(),
        cancel.clone(),
    ));
    let refresher = tokio::spawn(Arc::clone(snapshots).run(
        event_bus.subscribe(),
        Duration::from_secs(config.snapshot_refresh_secs),
        cancel.clone(),
    ));

    vec![("event_persistence", persistence), ("snapshot_refresher", refresher)]
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Cannot listen for Ctrl-C");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Cannot listen for SIGTERM")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "Shutdown requested");
}
