// SPDX-License-Identifier: MIT

//! Credential lifecycle service.
//!
//! Owns the binding between an internal user identity and its Google OAuth2
//! credential pair:
//! - OAuth callback handling (code exchange, profile fetch, record upsert)
//! - Token refresh with per-user serialization
//! - `with_credentials`, the single choke point through which every
//!   outbound Sheets call obtains a valid access token

use crate::db::{CredentialStore, SharedStore};
use crate::error::AppError;
use crate::models::{TokenSet, UserCredential};
use crate::services::google_auth::GoogleAuthClient;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-user mutexes serializing refresh-and-write operations.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Valid credential pair handed to an outbound API call.
#[derive(Debug, Clone)]
pub struct ActiveCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// High-level credential service.
#[derive(Clone)]
pub struct CredentialService {
    google: GoogleAuthClient,
    store: SharedStore,
    /// Per-user mutex so concurrent requests cause at most one in-flight
    /// refresh per user.
    refresh_locks: RefreshLocks,
    refresh_margin: Duration,
}

impl CredentialService {
    pub fn new(google: GoogleAuthClient, store: SharedStore, refresh_margin_secs: i64) -> Self {
        Self {
            google,
            store,
            refresh_locks: Arc::new(DashMap::new()),
            refresh_margin: Duration::seconds(refresh_margin_secs),
        }
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Handle the OAuth callback: exchange the code, fetch the profile, and
    /// resolve-or-create the credential record.
    ///
    /// A repeat login for a known external id updates the existing record;
    /// a login that omits a refresh token never erases a stored one.
    pub async fn handle_oauth_callback(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<UserCredential, AppError> {
        let tokens = self.google.exchange_code(code, redirect_uri).await?;
        let profile = self.google.get_profile(&tokens.access_token).await?;

        let credential = match self.store.find_by_external_id(&profile.external_id).await? {
            Some(mut existing) => {
                existing.apply_login(&profile, &tokens);
                existing
            }
            None => UserCredential::new(&profile, &tokens),
        };

        self.store.upsert(&credential).await?;

        tracing::info!(
            internal_id = %credential.internal_id,
            external_id = %credential.external_id,
            "OAuth callback handled, credential stored"
        );

        Ok(credential)
    }

    /// Refresh by a caller-supplied refresh token (`POST /auth/refresh`).
    ///
    /// The new token pair is returned even when no stored record owns this
    /// refresh token; the orphan case is logged (see DESIGN.md).
    pub async fn refresh_by_token(&self, refresh_token: &str) -> Result<TokenSet, AppError> {
        let tokens = self.google.refresh_token(refresh_token).await?;

        match self.store.find_by_refresh_token(refresh_token).await? {
            Some(mut credential) => {
                credential.apply_refresh(&tokens);
                self.store.upsert(&credential).await?;
                tracing::info!(
                    internal_id = %credential.internal_id,
                    "Access token refreshed via /auth/refresh"
                );
            }
            None => {
                tracing::warn!(
                    "Refresh succeeded for a token with no stored record (orphaned refresh)"
                );
            }
        }

        Ok(tokens)
    }

    // ─── Credential Provider ─────────────────────────────────────────────────

    /// Load the credential record for `internal_id`, refresh it if expired or
    /// about to expire, and hand the valid pair to `f`, which performs exactly
    /// one external API call.
    ///
    /// Refresh-and-write is serialized per user: concurrent callers on the
    /// same expired record block on the per-user lock, and the double-check
    /// after acquiring it means only the first performs an external refresh.
    pub async fn with_credentials<F, Fut, T>(&self, internal_id: &str, f: F) -> Result<T, AppError>
    where
        F: FnOnce(ActiveCredentials) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let credential = self.load(internal_id).await?;

        let credential = if self.needs_refresh(&credential, Utc::now()) {
            let lock = self
                .refresh_locks
                .entry(internal_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();

            let _guard = lock.lock().await;

            // Re-read after acquiring the lock: another request may have
            // refreshed while we waited.
            let mut credential = self.load(internal_id).await?;
            if self.needs_refresh(&credential, Utc::now()) {
                self.refresh_credential(&mut credential).await?;
            }
            credential
        } else {
            credential
        };

        f(ActiveCredentials {
            access_token: credential.access_token,
            refresh_token: credential.refresh_token,
        })
        .await
    }

    async fn load(&self, internal_id: &str) -> Result<UserCredential, AppError> {
        self.store
            .get(internal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Credentials for user {}", internal_id)))
    }

    /// A token with a stored expiry is refreshed once `now` is within the
    /// margin of it. A record without an expiry is used as-is.
    fn needs_refresh(&self, credential: &UserCredential, now: DateTime<Utc>) -> bool {
        match credential.expiry() {
            Some(expiry) => now + self.refresh_margin >= expiry,
            None => false,
        }
    }

    // ─── Token Refresher ─────────────────────────────────────────────────────

    /// Exchange the stored refresh token for a new access token and persist
    /// the updated record. The stored refresh token is replaced only when the
    /// provider returns a new one; on rejection the record is left untouched.
    async fn refresh_credential(&self, credential: &mut UserCredential) -> Result<(), AppError> {
        let refresh_token = credential.refresh_token.clone().ok_or_else(|| {
            AppError::ExternalAuth(format!(
                "No refresh token stored for user {}; re-authorization required",
                credential.internal_id
            ))
        })?;

        tracing::info!(
            internal_id = %credential.internal_id,
            "Access token expired, refreshing"
        );

        let tokens = self.google.refresh_token(&refresh_token).await?;

        // Cross-instance races are not serialized by our in-process lock.
        // Detect them by re-reading before the write and warn; last write wins.
        if let Some(current) = self.store.get(&credential.internal_id).await? {
            if current.access_token != credential.access_token {
                tracing::warn!(
                    internal_id = %credential.internal_id,
                    "Stale credential write: record changed while refresh was in flight"
                );
            }
        }

        credential.apply_refresh(&tokens);
        self.store.upsert(credential).await?;

        tracing::info!(internal_id = %credential.internal_id, "Token refreshed and stored");
        Ok(())
    }
}
