// SPDX-License-Identifier: MIT

//! Sheetbridge API Server
//!
//! Authenticates users via Google OAuth2 and forwards spreadsheet
//! operations to the Google Sheets API with managed credentials.

use sheetbridge::{
    config::Config,
    db::{FirestoreStore, MemoryStore, SharedStore},
    services::{CredentialService, GoogleAuthClient, SheetsClient, SheetsService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Sheetbridge API");

    // Initialize the credential store
    let store: SharedStore = match &config.gcp_project_id {
        Some(project_id) => {
            let store = FirestoreStore::new(project_id)
                .await
                .expect("Failed to connect to Firestore");
            Arc::new(store)
        }
        None => {
            tracing::warn!("GCP_PROJECT_ID not set, using in-memory credential store");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize provider clients (explicitly constructed, never global)
    let google = GoogleAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.http_timeout_secs,
    );

    let credentials = CredentialService::new(
        google.clone(),
        store.clone(),
        config.refresh_margin_secs,
    );

    let sheets = SheetsService::new(
        SheetsClient::new(config.http_timeout_secs),
        credentials.clone(),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        google,
        credentials,
        sheets,
    });

    // Build router
    let app = sheetbridge::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sheetbridge=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
