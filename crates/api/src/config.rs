use std::fmt::Display;
use std::str::FromStr;

use leadflow_events::snapshot::DEFAULT_REFRESH_INTERVAL;

use crate::auth::jwt::JwtConfig;

/// Runtime settings for the API process, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// How long background tasks get to stop after the server drains.
    pub shutdown_timeout_secs: u64,
    /// Period of the unconditional KPI snapshot reload.
    pub snapshot_refresh_secs: u64,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Read the environment, falling back to local-development values.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `MAX_BODY_BYTES`        | `65536`                 |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `SNAPSHOT_REFRESH_SECS` | `60`                    |
    ///
    /// JWT settings are documented on [`JwtConfig::from_env`].
    ///
    /// # Panics
    ///
    /// When a variable is set but does not parse, or the refresh period is 0.
    pub fn from_env() -> Self {
        let cors_origins = env_or("CORS_ORIGINS", "http://localhost:5173".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        Self {
            host: env_or("HOST", "0.0.0.0".to_string()),
            port: env_or("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            max_body_bytes: env_or("MAX_BODY_BYTES", 64 * 1024),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            snapshot_refresh_secs: snapshot_refresh_secs(),
            jwt: JwtConfig::from_env(),
        }
    }
}

/// Seconds between unconditional snapshot reloads; never zero.
fn snapshot_refresh_secs() -> u64 {
    let secs = env_or("SNAPSHOT_REFRESH_SECS", DEFAULT_REFRESH_INTERVAL.as_secs());
    assert!(secs > 0, "SNAPSHOT_REFRESH_SECS must be positive");
    secs
}

/// `key` parsed as `T`, or `default` when unset.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key}={raw:?} is invalid: {e}")),
        Err(_) => default,
    }
}
