// SPDX-License-Identifier: MIT

//! Firestore-backed credential store.

use crate::db::{collections, CredentialStore};
use crate::error::AppError;
use crate::models::UserCredential;

/// Firestore credential store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: firestore::FirestoreDb,
}

impl FirestoreStore {
    /// Create a new Firestore-backed store.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::new_emulator(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn new_emulator(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        Ok(Self { client })
    }

    /// Query the collection for at most one record matching a field.
    async fn find_one_by_field(
        &self,
        field: &'static str,
        value: &str,
    ) -> Result<Option<UserCredential>, AppError> {
        let value = value.to_string();
        let matches: Vec<UserCredential> = self
            .client
            .fluent()
            .select()
            .from(collections::CREDENTIALS)
            .filter(move |q| q.field(field).eq(value.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.into_iter().next())
    }
}

#[async_trait::async_trait]
impl CredentialStore for FirestoreStore {
    async fn get(&self, internal_id: &str) -> Result<Option<UserCredential>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(internal_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<UserCredential>, AppError> {
        self.find_one_by_field("external_id", external_id).await
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<UserCredential>, AppError> {
        self.find_one_by_field("refresh_token", refresh_token).await
    }

    async fn upsert(&self, credential: &UserCredential) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(&credential.internal_id)
            .object(credential)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
