// SPDX-License-Identifier: MIT

//! Google OAuth authentication routes.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::CredentialStore;
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_session_token, AuthUser, SESSION_COOKIE};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Public auth routes (no session required).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", get(auth_start))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/refresh", post(auth_refresh))
        .route("/auth/logout", post(logout))
}

/// Session-protected auth routes; the auth middleware is applied in
/// routes/mod.rs.
pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/profile", get(get_profile))
}

/// Query parameters for starting the OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses the configured frontend URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to Google's consent screen.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    headers: HeaderMap,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let oauth_state = sign_state(&frontend_url, &state.config.oauth_state_key)?;
    let callback_url = callback_url_from_headers(&headers);

    let auth_url = state
        .google
        .generate_auth_url(&callback_url, &oauth_state);

    tracing::info!(
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Google"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, create the session cookie.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    // Decode and verify frontend URL from state parameter
    let frontend_url = verify_and_decode_state(&params.state, &state.config.oauth_state_key)
        .unwrap_or_else(|| {
            tracing::warn!(
                "Invalid or tampered state parameter, falling back to default frontend URL"
            );
            state.config.frontend_url.clone()
        });

    // Check for OAuth errors (user denied consent, etc.)
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Google");
        let redirect = format!("{}?error={}", frontend_url, urlencoding::encode(&error));
        return Ok((jar, Redirect::temporary(&redirect)));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");

    // The token exchange must see the same redirect_uri the consent used.
    let callback_url = callback_url_from_headers(&headers);

    let credential = state
        .credentials
        .handle_oauth_callback(&code, &callback_url)
        .await?;

    let jwt = create_session_token(
        &credential.internal_id,
        &credential.email,
        &state.config.jwt_signing_key,
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Session token creation failed: {}", e)))?;

    let mut cookie = Cookie::new(SESSION_COOKIE, jwt);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(time::Duration::days(30));
    if !is_localhost(&headers) {
        cookie.set_secure(true);
    }

    Ok((jar.add(cookie), Redirect::temporary(&frontend_url)))
}

/// Request body for a refresh-token exchange.
#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
}

/// Response to a refresh-token exchange.
#[derive(Serialize)]
pub struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "expiryDate")]
    expiry_date: Option<String>,
}

/// Exchange a refresh token for a new access token.
///
/// The missing-field check runs before any provider call is made.
async fn auth_refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>> {
    let refresh_token = match body.refresh_token.as_deref() {
        Some(token) if !token.is_empty() => token,
        _ => {
            return Err(AppError::Validation(
                "refreshToken is required".to_string(),
            ))
        }
    };

    let tokens = state.credentials.refresh_by_token(refresh_token).await?;

    Ok(Json(RefreshResponse {
        access_token: tokens.access_token,
        expiry_date: tokens.expiry.map(crate::time_utils::format_utc_rfc3339),
    }))
}

/// Logout - clear the session cookie. No provider call, no store mutation.
async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    (jar.remove(removal), StatusCode::NO_CONTENT)
}

/// Profile response for the current session.
#[derive(Serialize)]
pub struct ProfileResponse {
    pub internal_id: String,
    pub external_id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Get the profile for the session's user.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileResponse>> {
    let credential = state
        .store
        .get(&user.internal_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.internal_id)))?;

    Ok(Json(ProfileResponse {
        internal_id: credential.internal_id,
        external_id: credential.external_id,
        email: credential.email,
        display_name: credential.display_name,
        avatar_url: credential.avatar_url,
    }))
}

// ─── OAuth state signing ─────────────────────────────────────────────────────

/// Sign the frontend URL + timestamp into an opaque state parameter.
fn sign_state(frontend_url: &str, secret: &[u8]) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    // Payload format: "frontend_url|timestamp_hex"
    let payload = format!("{}|{:x}", frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify the HMAC signature and decode the frontend URL from the OAuth
/// state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "frontend_url|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let frontend_url = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    let payload = format!("{}|{}", frontend_url, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(frontend_url.to_string())
}

/// Reconstruct this server's callback URL from the request's Host header.
fn callback_url_from_headers(headers: &HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            std::env::var("API_HOST").unwrap_or_else(|_| "localhost:8080".to_string())
        });

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/callback", scheme, host)
}

fn is_localhost(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|host| host.contains("localhost") || host.contains("127.0.0.1"))
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip() {
        let secret = b"secret_key";
        let frontend_url = "https://example.com";

        let state = sign_state(frontend_url, secret).unwrap();
        let result = verify_and_decode_state(&state, secret);

        assert_eq!(result, Some(frontend_url.to_string()));
    }

    #[test]
    fn test_verify_and_decode_state_invalid_signature() {
        let secret = b"secret_key";
        let payload = format!("{}|{:x}", "https://example.com", 1234567890u128);
        let state_data = format!("{}|{}", payload, "invalid_signature");
        let encoded_state = URL_SAFE_NO_PAD.encode(state_data.as_bytes());

        let result = verify_and_decode_state(&encoded_state, secret);
        assert_eq!(result, None);
    }

    #[test]
    fn test_verify_and_decode_state_wrong_secret() {
        let secret = b"secret_key";
        let state = sign_state("https://example.com", secret).unwrap();

        let result = verify_and_decode_state(&state, b"wrong_key");
        assert_eq!(result, None);
    }

    #[test]
    fn test_verify_and_decode_state_malformed() {
        let secret = b"secret_key";
        let encoded_state = URL_SAFE_NO_PAD.encode("invalid|format");
        let result = verify_and_decode_state(&encoded_state, secret);
        assert_eq!(result, None);
    }

    #[test]
    fn test_callback_url_for_production_host() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::HOST,
            "api.example.com".parse().unwrap(),
        );
        assert_eq!(
            callback_url_from_headers(&headers),
            "https://api.example.com/auth/callback"
        );
    }

    #[test]
    fn test_callback_url_for_localhost() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::HOST, "localhost:8080".parse().unwrap());
        assert_eq!(
            callback_url_from_headers(&headers),
            "http://localhost:8080/auth/callback"
        );
    }
}
