// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod credential;

pub use credential::{ExternalProfile, TokenSet, UserCredential};
