//! Bearer token handling.
//!
//! Leadflow does not run its own login flow: tokens come from the identity
//! provider in front of the CRM and are HS256 JWTs carrying the team member
//! id in `sub` and the team role in `role`. [`generate_access_token`] mints
//! tokens of that shape for local tooling and tests.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use leadflow_core::types::DbId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Clock skew tolerated on `exp`, in seconds.
const LEEWAY_SECS: u64 = 30;

const DEFAULT_EXPIRY_MINS: i64 = 60;

/// Token payload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Team member id.
    pub sub: DbId,
    /// Wire name of the team role, e.g. `"CLOSER"`.
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret.
    pub secret: String,
    /// When set, tokens must carry this `iss` and minted tokens get it.
    pub issuer: Option<String>,
    pub access_token_expiry_mins: i64,
}

impl JwtConfig {
    /// Read `JWT_SECRET` (required), `JWT_ISSUER` and `JWT_ACCESS_EXPIRY_MINS`.
    ///
    /// # Panics
    ///
    /// On a missing or empty secret, or an unparseable expiry.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .expect("JWT_SECRET must be set to a non-empty value");

        let issuer = std::env::var("JWT_ISSUER").ok().filter(|s| !s.is_empty());

        let access_token_expiry_mins = match std::env::var("JWT_ACCESS_EXPIRY_MINS") {
            Ok(raw) => raw
                .parse()
                .expect("JWT_ACCESS_EXPIRY_MINS must be a whole number of minutes"),
            Err(_) => DEFAULT_EXPIRY_MINS,
        };

        Self {
            secret,
            issuer,
            access_token_expiry_mins,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }
}

/// Sign a token for `member_id` acting as `role`.
pub fn generate_access_token(
    member_id: DbId,
    role: &str,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let iat = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: member_id,
        role: role.to_owned(),
        exp: iat + config.access_token_expiry_mins * 60,
        iat,
        iss: config.issuer.clone(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Check signature, expiry and (if configured) issuer.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &config.validation(),
    )
    .map(|data| data.claims)
}
