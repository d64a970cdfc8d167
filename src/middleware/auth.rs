// SPDX-License-Identifier: MIT

//! Session token middleware.
//!
//! Sessions are stateless HS256 JWTs delivered via the HTTP-only `token`
//! cookie (a `Bearer` header is also accepted). Validity is determined
//! purely by signature verification and the embedded expiry.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "token";

/// Session lifetime (30 days).
const SESSION_LIFETIME_SECS: usize = 30 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (internal user id)
    pub sub: String,
    /// Email at issue time
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from the session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub internal_id: String,
    pub email: String,
}

/// Middleware that requires a valid session token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get(SESSION_COOKIE) {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    };

    let key = DecodingKey::from_secret(&state.config.jwt_signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data =
        decode::<Claims>(&token, &key, &validation).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let auth_user = AuthUser {
        internal_id: token_data.claims.sub,
        email: token_data.claims.email,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Create a signed session token for a user.
pub fn create_session_token(
    internal_id: &str,
    email: &str,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: internal_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now + SESSION_LIFETIME_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
