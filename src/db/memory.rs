// SPDX-License-Identifier: MIT

//! In-memory credential store for tests and local development.

use crate::db::CredentialStore;
use crate::error::AppError;
use crate::models::UserCredential;
use dashmap::DashMap;

/// DashMap-backed store keyed by internal id. Not persistent.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, UserCredential>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (test helper).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, internal_id: &str) -> Result<Option<UserCredential>, AppError> {
        Ok(self.records.get(internal_id).map(|r| r.clone()))
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<UserCredential>, AppError> {
        Ok(self
            .records
            .iter()
            .find(|r| r.external_id == external_id)
            .map(|r| r.clone()))
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<UserCredential>, AppError> {
        Ok(self
            .records
            .iter()
            .find(|r| r.refresh_token.as_deref() == Some(refresh_token))
            .map(|r| r.clone()))
    }

    async fn upsert(&self, credential: &UserCredential) -> Result<(), AppError> {
        self.records
            .insert(credential.internal_id.clone(), credential.clone());
        Ok(())
    }
}
