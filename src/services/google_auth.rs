// SPDX-License-Identifier: MIT

//! Google OAuth2 client: consent URL, code exchange, token refresh,
//! and userinfo lookup.

use crate::error::AppError;
use crate::models::{ExternalProfile, TokenSet};
use chrono::{Duration, Utc};
use serde::Deserialize;

const GOOGLE_AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Scopes requested at consent: spreadsheet access plus identity attributes.
const OAUTH_SCOPES: &str = "https://www.googleapis.com/auth/spreadsheets \
     https://www.googleapis.com/auth/userinfo.profile \
     https://www.googleapis.com/auth/userinfo.email";

/// Google OAuth2 client with injected credentials and endpoints.
///
/// Endpoints are constructor arguments so tests can point the client at a
/// mock server; there is no process-global client state.
#[derive(Clone)]
pub struct GoogleAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    auth_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
}

impl GoogleAuthClient {
    /// Create a client against the real Google endpoints.
    pub fn new(client_id: String, client_secret: String, timeout_secs: u64) -> Self {
        Self::with_endpoints(
            client_id,
            client_secret,
            timeout_secs,
            GOOGLE_AUTH_ENDPOINT,
            GOOGLE_TOKEN_ENDPOINT,
            GOOGLE_USERINFO_ENDPOINT,
        )
    }

    /// Create a client with explicit endpoints (used by tests).
    pub fn with_endpoints(
        client_id: String,
        client_secret: String,
        timeout_secs: u64,
        auth_endpoint: &str,
        token_endpoint: &str,
        userinfo_endpoint: &str,
    ) -> Self {
        // A default client would silently drop the timeout; fail at startup
        // instead.
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed building Google auth HTTP client");

        Self {
            http,
            client_id,
            client_secret,
            auth_endpoint: auth_endpoint.to_string(),
            token_endpoint: token_endpoint.to_string(),
            userinfo_endpoint: userinfo_endpoint.to_string(),
        }
    }

    /// Build the consent redirect URL.
    ///
    /// `access_type=offline` requests a refresh token; `prompt=consent`
    /// forces the consent screen so a refresh token is actually returned.
    pub fn generate_auth_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            self.auth_endpoint,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(OAUTH_SCOPES),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, AppError> {
        let response = self
            .post_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        let token: GoogleTokenResponse = self.check_token_response(response).await?;
        Ok(token.into())
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Google usually omits the refresh token here; a rotated one is passed
    /// through when present.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, AppError> {
        let response = self
            .post_form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        let token: GoogleTokenResponse = self.check_token_response(response).await?;
        Ok(token.into())
    }

    /// Fetch the external profile using a fresh access token.
    pub async fn get_profile(&self, access_token: &str) -> Result<ExternalProfile, AppError> {
        let send = || {
            self.http
                .get(&self.userinfo_endpoint)
                .bearer_auth(access_token)
                .send()
        };

        let response = match send().await {
            Ok(r) => r,
            Err(e) if is_transient(&e) => {
                tracing::warn!(error = %e, "Transient failure fetching profile, retrying once");
                send()
                    .await
                    .map_err(|e| AppError::ProfileFetch(e.to_string()))?
            }
            Err(e) => return Err(AppError::ProfileFetch(e.to_string())),
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProfileFetch(format!("HTTP {}: {}", status, body)));
        }

        let info: GoogleUserinfo = response
            .json()
            .await
            .map_err(|e| AppError::ProfileFetch(format!("JSON parse error: {}", e)))?;

        Ok(ExternalProfile {
            external_id: info.id,
            email: info.email,
            display_name: info.name,
            avatar_url: info.picture,
        })
    }

    /// POST a form to the token endpoint with a single immediate retry on
    /// transient transport failure (never on a 4xx rejection).
    async fn post_form(&self, params: &[(&str, &str)]) -> Result<reqwest::Response, AppError> {
        let send = || self.http.post(&self.token_endpoint).form(params).send();

        match send().await {
            Ok(r) => Ok(r),
            Err(e) if is_transient(&e) => {
                tracing::warn!(error = %e, "Transient failure calling token endpoint, retrying once");
                send()
                    .await
                    .map_err(|e| AppError::ExternalAuth(format!("Token request failed: {}", e)))
            }
            Err(e) => Err(AppError::ExternalAuth(format!(
                "Token request failed: {}",
                e
            ))),
        }
    }

    /// Check a token-endpoint response and parse the JSON body.
    async fn check_token_response(
        &self,
        response: reqwest::Response,
    ) -> Result<GoogleTokenResponse, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalAuth(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::ExternalAuth(format!("JSON parse error: {}", e)))
    }
}

/// Connect failures and timeouts are retried once; anything carrying an
/// HTTP status is a real answer and is not.
fn is_transient(err: &reqwest::Error) -> bool {
    (err.is_connect() || err.is_timeout()) && err.status().is_none()
}

/// Token response from Google's token endpoint.
#[derive(Debug, Clone, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Lifetime in seconds; some flows omit it.
    #[serde(default)]
    expires_in: Option<i64>,
}

impl From<GoogleTokenResponse> for TokenSet {
    fn from(raw: GoogleTokenResponse) -> Self {
        TokenSet {
            access_token: raw.access_token,
            refresh_token: raw.refresh_token,
            expiry: raw.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// Userinfo response from Google.
#[derive(Debug, Clone, Deserialize)]
struct GoogleUserinfo {
    id: String,
    email: String,
    name: String,
    #[serde(default)]
    picture: Option<String>,
}
