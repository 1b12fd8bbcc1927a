use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::{error::AppError, models::user::User, state::AppState};

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_TTL_HOURS: i64 = 24;

/// Claims carried by a bearer token: the username and a unix expiry.
/// The token is the only session state; nothing is stored server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AppError::Other(anyhow::anyhow!("password hashing failed: {err}")))?;
    Ok(hash.to_string())
}

pub fn verify_password(stored_hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Signs arbitrary claims: `base64url(json) "." base64url(hmac-sha256)`.
pub fn sign_claims(key: &[u8], claims: &Claims) -> Result<String, AppError> {
    let json = serde_json::to_vec(claims).map_err(|err| AppError::Other(err.into()))?;
    let payload = URL_SAFE_NO_PAD.encode(json);
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|err| AppError::Other(anyhow::anyhow!("bad signing key: {err}")))?;
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{payload}.{signature}"))
}

pub fn mint_token(key: &[u8], username: &str) -> Result<String, AppError> {
    let claims = Claims {
        sub: username.to_string(),
        exp: (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
    };
    sign_claims(key, &claims)
}

/// Checks signature and expiry. Every failure collapses into `Unauthorized`
/// so callers cannot probe whether a token is malformed, forged, or stale.
pub fn verify_token(key: &[u8], token: &str) -> Result<Claims, AppError> {
    let (payload, signature) = token.split_once('.').ok_or(AppError::Unauthorized)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| AppError::Unauthorized)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| AppError::Unauthorized)?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AppError::Unauthorized)?;
    let claims: Claims = serde_json::from_slice(&json).map_err(|_| AppError::Unauthorized)?;

    if claims.exp <= Utc::now().timestamp() {
        return Err(AppError::Unauthorized);
    }
    Ok(claims)
}

/// Extracted from `Authorization: Bearer …` on every guarded route.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;
        let token = header.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;
        let claims = verify_token(&state.token_key, token)?;
        Ok(Self {
            username: claims.sub,
        })
    }
}

pub async fn register_user(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "username and password are required".into(),
        ));
    }

    let password_hash = hash_password(password)?;
    // The UNIQUE constraint is the duplicate check; a SELECT beforehand
    // would race against concurrent registrations.
    let user = sqlx::query_as::<_, User>(
        r#"INSERT INTO users (username, password_hash, created_at)
           VALUES (?, ?, ?)
           RETURNING id, username, password_hash, created_at, last_login_at"#,
    )
    .bind(username)
    .bind(&password_hash)
    .bind(Utc::now())
    .fetch_one(&state.db)
    .await
    .map_err(|err| match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Validation("username already exists".into())
        }
        _ => AppError::Database(err),
    })?;

    debug!("registered user {username}");
    Ok(user)
}

/// Unknown username and wrong password are indistinguishable to the caller.
pub async fn authenticate_user(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, created_at, last_login_at FROM users WHERE username = ?",
    )
    .bind(username.trim())
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::Unauthorized)?;

    if !verify_password(&user.password_hash, password) {
        return Err(AppError::Unauthorized);
    }

    sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user.id)
        .execute(&state.db)
        .await?;

    Ok(user)
}
