// SPDX-License-Identifier: MIT

//! Services module - credential lifecycle and provider clients.

pub mod credentials;
pub mod google_auth;
pub mod sheets;

pub use credentials::{ActiveCredentials, CredentialService};
pub use google_auth::GoogleAuthClient;
pub use sheets::{SheetsClient, SheetsService};
