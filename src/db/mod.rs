// SPDX-License-Identifier: MIT

//! Credential store layer.
//!
//! The store is the single persistent mapping from an internal user id to
//! the external identity and its OAuth2 credential pair. Production uses
//! Firestore; tests and local development use the in-memory store.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::UserCredential;
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const CREDENTIALS: &str = "credentials";
}

/// Persistent credential store.
///
/// Records are never deleted through this interface; deletion is an
/// administrative action outside this component.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get a record by internal id.
    async fn get(&self, internal_id: &str) -> Result<Option<UserCredential>, AppError>;

    /// Find the record for a provider identity, if one exists.
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<UserCredential>, AppError>;

    /// Find the record holding a given refresh token, if any.
    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<UserCredential>, AppError>;

    /// Create or replace a record (keyed by internal id).
    async fn upsert(&self, credential: &UserCredential) -> Result<(), AppError>;
}

/// Shared store handle used across services and handlers.
pub type SharedStore = Arc<dyn CredentialStore>;
