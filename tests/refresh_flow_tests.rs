// SPDX-License-Identifier: MIT

//! Token refresh flow tests against a mocked Google token endpoint.

use chrono::{Duration, Utc};
use sheetbridge::db::{CredentialStore, MemoryStore, SharedStore};
use sheetbridge::error::AppError;
use sheetbridge::services::{CredentialService, GoogleAuthClient};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;

fn service_for(server: &MockServer, store: SharedStore) -> CredentialService {
    let google = GoogleAuthClient::with_endpoints(
        "test_client_id".to_string(),
        "test_secret".to_string(),
        5,
        &format!("{}/auth", server.uri()),
        &format!("{}/token", server.uri()),
        &format!("{}/userinfo", server.uri()),
    );
    CredentialService::new(google, store, 300)
}

fn token_response(access_token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "access_token": access_token,
        "expires_in": 3600,
        "token_type": "Bearer",
    }))
}

#[tokio::test]
async fn test_rejected_refresh_leaves_record_unmodified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been revoked.",
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let cred = common::test_credential("g1", "A1", Some("R1"), None);
    store.upsert(&cred).await.unwrap();

    let svc = service_for(&server, store.clone());
    let result = svc.refresh_by_token("R1").await;

    assert!(matches!(result, Err(AppError::ExternalAuth(_))));

    let stored = store.get(&cred.internal_id).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "A1");
    assert_eq!(stored.refresh_token.as_deref(), Some("R1"));
}

#[tokio::test]
async fn test_refresh_updates_matching_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(token_response("A2"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let cred = common::test_credential("g1", "A1", Some("R1"), None);
    store.upsert(&cred).await.unwrap();

    let svc = service_for(&server, store.clone());
    let tokens = svc.refresh_by_token("R1").await.unwrap();

    assert_eq!(tokens.access_token, "A2");
    assert!(tokens.expiry.is_some());

    let stored = store.get(&cred.internal_id).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "A2");
    // Google did not rotate the refresh token, so the stored one survives
    assert_eq!(stored.refresh_token.as_deref(), Some("R1"));
    assert!(stored.expiry().is_some());
}

#[tokio::test]
async fn test_orphaned_refresh_still_returns_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token_response("A2"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let svc = service_for(&server, store.clone());

    // No stored record owns this refresh token
    let tokens = svc.refresh_by_token("R-orphan").await.unwrap();
    assert_eq!(tokens.access_token, "A2");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_with_credentials_refreshes_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token_response("A2"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let expired = Utc::now() - Duration::minutes(1);
    let cred = common::test_credential("g1", "A1", Some("R1"), Some(expired));
    store.upsert(&cred).await.unwrap();

    let svc = service_for(&server, store.clone());
    let handed_out = svc
        .with_credentials(&cred.internal_id, |creds| async move {
            Ok(creds.access_token)
        })
        .await
        .unwrap();

    // The expired token is never handed to the caller
    assert_eq!(handed_out, "A2");

    let stored = store.get(&cred.internal_id).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "A2");
    assert!(stored.expiry().unwrap() > Utc::now());
}

#[tokio::test]
async fn test_with_credentials_skips_refresh_when_valid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token_response("A2"))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let valid = Utc::now() + Duration::hours(1);
    let cred = common::test_credential("g1", "A1", Some("R1"), Some(valid));
    store.upsert(&cred).await.unwrap();

    let svc = service_for(&server, store.clone());
    let handed_out = svc
        .with_credentials(&cred.internal_id, |creds| async move {
            Ok(creds.access_token)
        })
        .await
        .unwrap();

    assert_eq!(handed_out, "A1");
}

#[tokio::test]
async fn test_concurrent_with_credentials_refreshes_once() {
    let server = MockServer::start().await;
    // Per-user serialization: exactly one external refresh call is allowed.
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token_response("A2"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let expired = Utc::now() - Duration::minutes(1);
    let cred = common::test_credential("g1", "A1", Some("R1"), Some(expired));
    store.upsert(&cred).await.unwrap();

    let svc = service_for(&server, store.clone());

    let (first, second) = tokio::join!(
        svc.with_credentials(&cred.internal_id, |creds| async move {
            Ok(creds.access_token)
        }),
        svc.with_credentials(&cred.internal_id, |creds| async move {
            Ok(creds.access_token)
        }),
    );

    assert_eq!(first.unwrap(), "A2");
    assert_eq!(second.unwrap(), "A2");

    let stored = store.get(&cred.internal_id).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "A2");
}

#[tokio::test]
async fn test_with_credentials_unknown_user() {
    let server = MockServer::start().await;
    let svc = service_for(&server, Arc::new(MemoryStore::new()));

    let result = svc
        .with_credentials("no-such-user", |creds| async move {
            Ok(creds.access_token)
        })
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_expired_record_without_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(token_response("A2"))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let expired = Utc::now() - Duration::minutes(1);
    let cred = common::test_credential("g1", "A1", None, Some(expired));
    store.upsert(&cred).await.unwrap();

    let svc = service_for(&server, store.clone());
    let result = svc
        .with_credentials(&cred.internal_id, |creds| async move {
            Ok(creds.access_token)
        })
        .await;

    // Nothing to refresh with; the user must re-authorize
    assert!(matches!(result, Err(AppError::ExternalAuth(_))));
}
