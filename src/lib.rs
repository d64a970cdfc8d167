// SPDX-License-Identifier: MIT

//! Sheetbridge: session-issuing OAuth2 client backend in front of the
//! Google Sheets API.
//!
//! This crate binds internal user identities to Google OAuth2 credential
//! pairs, keeps those pairs fresh, and forwards spreadsheet CRUD operations
//! to the Sheets API with valid credentials supplied on demand.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::SharedStore;
use services::{CredentialService, GoogleAuthClient, SheetsService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: SharedStore,
    pub google: GoogleAuthClient,
    pub credentials: CredentialService,
    pub sheets: SheetsService,
}
