//! Admin authentication.
//!
//! Passwords are stored as Argon2 PHC strings. A successful login returns
//! an HS256 bearer token whose subject is the admin username; every
//! `/api/admin/*` handler takes an [`AdminSession`], which rejects requests
//! without a valid token for an admin that still exists.
//!
//! Argon2 runs on the blocking pool. Logins for unknown usernames are
//! checked against a dummy hash so both paths cost the same.

use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use mercado_core::validation::{validate_password, validate_username};
use mercado_core::AdminCredential;
use mercado_db::Database;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthSettings;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Admin username
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT token manager.
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Issues a token for `username`.
    pub fn issue(&self, username: &str) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Validates signature and expiry.
    pub fn validate(&self, token: &str) -> ApiResult<Claims> {
        let token_data: TokenData<Claims> = decode(token, &self.decoding, &Validation::default())
            .map_err(|e| {
                debug!(error = %e, "Rejected token");
                ApiError::unauthorized("Invalid or expired token")
            })?;

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hashes a password for storage.
pub async fn hash_password(password: &str) -> ApiResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password_sync(&password))
        .await
        .map_err(|e| ApiError::internal(format!("Password hashing task failed: {}", e)))?
}

fn hash_password_sync(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))
}

/// Checks a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Hash of a fixed password, verified when the username is unknown.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password_sync("mercado-unknown-admin").unwrap_or_default())
}

/// Verifies on the blocking pool. `None` verifies against the dummy hash
/// and never matches.
async fn verify_stored(password: &str, stored: Option<String>) -> ApiResult<bool> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || match stored {
        Some(hash) => verify_password(&password, &hash),
        None => {
            let _ = verify_password(&password, dummy_hash());
            false
        }
    })
    .await
    .map_err(|e| ApiError::internal(format!("Password verification task failed: {}", e)))
}

/// Builds a credential after validating username and password rules.
pub async fn new_credential(username: &str, password: &str) -> ApiResult<AdminCredential> {
    let username = username.trim();
    validate_username(username)?;
    validate_password(password)?;

    Ok(AdminCredential {
        username: username.to_string(),
        password_hash: hash_password(password).await?,
        created_at: Utc::now(),
    })
}

/// Checks credentials; returns the stored username on success.
pub async fn authenticate(db: &Database, username: &str, password: &str) -> ApiResult<String> {
    let (stored_name, stored_hash) = match db.settings().get_admin(username).await? {
        Some(admin) => (Some(admin.username), Some(admin.password_hash)),
        None => (None, None),
    };
    let matches = verify_stored(password, stored_hash).await?;

    match stored_name {
        Some(name) if matches => Ok(name),
        _ => {
            warn!(username = %username, "Failed admin login");
            Err(ApiError::unauthorized("Invalid username or password"))
        }
    }
}

/// Creates the configured admin when no admin exists yet.
///
/// Returns true if an admin was created.
pub async fn bootstrap_admin(db: &Database, auth: &AuthSettings) -> ApiResult<bool> {
    let (Some(username), Some(password)) = (&auth.bootstrap_username, &auth.bootstrap_password)
    else {
        if db.settings().admin_count().await? == 0 {
            warn!("No admin accounts exist and no bootstrap admin is configured");
        }
        return Ok(false);
    };

    if db.settings().admin_count().await? > 0 {
        return Ok(false);
    }

    let credential = new_credential(username, password).await?;
    db.settings().insert_admin(&credential).await?;
    info!(username = %credential.username, "Bootstrap admin created");
    Ok(true)
}

// =============================================================================
// Extractor
// =============================================================================

/// An authenticated admin request.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub username: String,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;

        let claims = state.jwt.validate(token)?;

        // Tokens of removed admins stop working immediately
        if state.db.settings().get_admin(&claims.sub).await?.is_none() {
            return Err(ApiError::unauthorized("Admin account no longer exists"));
        }

        Ok(AdminSession {
            username: claims.sub,
        })
    }
}
