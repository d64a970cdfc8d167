// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Google OAuth client ID (public)
    pub google_client_id: String,
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// GCP project ID for the Firestore credential store.
    /// None selects the in-memory store (local development).
    pub gcp_project_id: Option<String>,
    /// Server port
    pub port: u16,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for signing the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
    /// How long before expiry an access token is refreshed proactively (seconds)
    pub refresh_margin_secs: i64,
    /// Timeout applied to outbound provider calls (seconds)
    pub http_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// For local development, secrets can be set via a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").ok(),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            refresh_margin_secs: env::var("TOKEN_REFRESH_MARGIN_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        })
    }

    /// Default config for tests only.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test_client_id".to_string(),
            google_client_secret: "test_secret".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: None,
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            oauth_state_key: b"test_state_key".to_vec(),
            refresh_margin_secs: 300,
            http_timeout_secs: 10,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("GOOGLE_CLIENT_ID", "test_id");
        env::set_var("GOOGLE_CLIENT_SECRET", "test_secret");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!!");
        env::set_var("OAUTH_STATE_KEY", "test_state_key");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.google_client_id, "test_id");
        assert_eq!(config.google_client_secret, "test_secret");
        assert_eq!(config.port, 8080);
        assert_eq!(config.refresh_margin_secs, 300);
    }
}
