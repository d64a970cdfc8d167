// SPDX-License-Identifier: MIT

use sheetbridge::config::Config;
use sheetbridge::db::{FirestoreStore, MemoryStore, SharedStore};
use sheetbridge::middleware::auth::create_session_token;
use sheetbridge::models::{ExternalProfile, TokenSet, UserCredential};
use sheetbridge::routes::create_router;
use sheetbridge::services::{CredentialService, GoogleAuthClient, SheetsClient, SheetsService};
use sheetbridge::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test store backed by the Firestore emulator.
#[allow(dead_code)]
pub async fn test_store() -> FirestoreStore {
    FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// A test app wired to the in-memory store, with the Google endpoints
/// pointed wherever the test wants (usually a wiremock server).
pub struct TestContext {
    pub app: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
}

/// Create a test app whose token/userinfo endpoints target `base_uri`.
#[allow(dead_code)]
pub fn create_test_app_with_google(base_uri: &str) -> TestContext {
    let config = Config::test_default();
    let store = Arc::new(MemoryStore::new());
    let shared: SharedStore = store.clone();

    let google = GoogleAuthClient::with_endpoints(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.http_timeout_secs,
        &format!("{}/o/oauth2/v2/auth", base_uri),
        &format!("{}/token", base_uri),
        &format!("{}/userinfo", base_uri),
    );

    let credentials = CredentialService::new(
        google.clone(),
        shared.clone(),
        config.refresh_margin_secs,
    );

    let sheets = SheetsService::new(
        SheetsClient::with_base_url(&format!("{}/spreadsheets", base_uri), config.http_timeout_secs),
        credentials.clone(),
    );

    let state = Arc::new(AppState {
        config,
        store: shared,
        google,
        credentials,
        sheets,
    });

    TestContext {
        app: create_router(state.clone()),
        state,
        store,
    }
}

/// Create a test app that never reaches an external endpoint.
#[allow(dead_code)]
pub fn create_test_app() -> TestContext {
    create_test_app_with_google("http://127.0.0.1:9")
}

/// Build a credential record for tests.
#[allow(dead_code)]
pub fn test_credential(
    external_id: &str,
    access_token: &str,
    refresh_token: Option<&str>,
    expiry: Option<chrono::DateTime<chrono::Utc>>,
) -> UserCredential {
    UserCredential::new(
        &ExternalProfile {
            external_id: external_id.to_string(),
            email: format!("{}@example.com", external_id),
            display_name: "Test User".to_string(),
            avatar_url: None,
        },
        &TokenSet {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(|t| t.to_string()),
            expiry,
        },
    )
}

/// Mint a session cookie header value for a stored credential.
#[allow(dead_code)]
pub fn session_cookie(state: &AppState, credential: &UserCredential) -> String {
    let token = create_session_token(
        &credential.internal_id,
        &credential.email,
        &state.config.jwt_signing_key,
    )
    .expect("session token");
    format!("token={}", token)
}
