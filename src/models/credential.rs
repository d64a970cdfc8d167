// SPDX-License-Identifier: MIT

//! Credential record binding an internal user identity to a Google
//! OAuth2 credential pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile attributes fetched from the identity provider after authorization.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExternalProfile {
    /// Identity id assigned by the provider
    pub external_id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// A token pair returned by the identity provider.
///
/// `refresh_token` is absent on non-first consent, and some flows omit
/// `expiry` entirely.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

/// Credential record stored per user.
///
/// Keyed by `internal_id`; `external_id` is unique and used to resolve
/// the record on repeat login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredential {
    /// Opaque internal id, generated at first record creation (also the document ID)
    pub internal_id: String,
    /// Identity id assigned by the provider
    pub external_id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    /// Short-lived bearer credential
    pub access_token: String,
    /// Long-lived credential; never erased once set
    pub refresh_token: Option<String>,
    /// Absolute access-token expiry (RFC3339)
    pub token_expiry: Option<String>,
    /// When the record was first created
    pub created_at: String,
    /// Last login or refresh
    pub updated_at: String,
}

impl UserCredential {
    /// Create a new record from a first successful authorization-code exchange.
    pub fn new(profile: &ExternalProfile, tokens: &TokenSet) -> Self {
        let now = crate::time_utils::format_utc_rfc3339(Utc::now());
        Self {
            internal_id: uuid::Uuid::new_v4().to_string(),
            external_id: profile.external_id.clone(),
            email: profile.email.clone(),
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            token_expiry: tokens.expiry.map(crate::time_utils::format_utc_rfc3339),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Apply a repeat login: profile fields are overwritten unconditionally,
    /// the access token and expiry move together, and a previously stored
    /// refresh token survives a login that omits one.
    pub fn apply_login(&mut self, profile: &ExternalProfile, tokens: &TokenSet) {
        self.email = profile.email.clone();
        self.display_name = profile.display_name.clone();
        self.avatar_url = profile.avatar_url.clone();

        self.access_token = tokens.access_token.clone();
        self.token_expiry = tokens.expiry.map(crate::time_utils::format_utc_rfc3339);
        if let Some(refresh) = &tokens.refresh_token {
            self.refresh_token = Some(refresh.clone());
        }
        self.updated_at = crate::time_utils::format_utc_rfc3339(Utc::now());
    }

    /// Apply a token refresh. The refresh token itself is replaced only if
    /// the provider returned a new one.
    pub fn apply_refresh(&mut self, tokens: &TokenSet) {
        self.access_token = tokens.access_token.clone();
        self.token_expiry = tokens.expiry.map(crate::time_utils::format_utc_rfc3339);
        if let Some(refresh) = &tokens.refresh_token {
            self.refresh_token = Some(refresh.clone());
        }
        self.updated_at = crate::time_utils::format_utc_rfc3339(Utc::now());
    }

    /// Parse the stored expiry, if any.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.token_expiry
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile(id: &str, email: &str) -> ExternalProfile {
        ExternalProfile {
            external_id: id.to_string(),
            email: email.to_string(),
            display_name: "Test User".to_string(),
            avatar_url: None,
        }
    }

    #[test]
    fn test_login_without_refresh_token_preserves_stored_one() {
        let t1 = Utc::now() + Duration::hours(1);
        let t2 = Utc::now() + Duration::hours(2);

        let mut cred = UserCredential::new(
            &profile("g1", "a@x.com"),
            &TokenSet {
                access_token: "A1".to_string(),
                refresh_token: Some("R1".to_string()),
                expiry: Some(t1),
            },
        );

        cred.apply_login(
            &profile("g1", "a@x.com"),
            &TokenSet {
                access_token: "A2".to_string(),
                refresh_token: None,
                expiry: Some(t2),
            },
        );

        assert_eq!(cred.access_token, "A2");
        assert_eq!(cred.refresh_token.as_deref(), Some("R1"));
        assert_eq!(
            cred.token_expiry.as_deref(),
            Some(crate::time_utils::format_utc_rfc3339(t2).as_str())
        );
    }

    #[test]
    fn test_login_overwrites_profile_fields() {
        let mut cred = UserCredential::new(
            &profile("g1", "old@x.com"),
            &TokenSet {
                access_token: "A1".to_string(),
                refresh_token: Some("R1".to_string()),
                expiry: None,
            },
        );

        let mut new_profile = profile("g1", "new@x.com");
        new_profile.avatar_url = Some("https://example.com/p.png".to_string());

        cred.apply_login(
            &new_profile,
            &TokenSet {
                access_token: "A2".to_string(),
                refresh_token: Some("R2".to_string()),
                expiry: None,
            },
        );

        assert_eq!(cred.email, "new@x.com");
        assert_eq!(cred.avatar_url.as_deref(), Some("https://example.com/p.png"));
        assert_eq!(cred.refresh_token.as_deref(), Some("R2"));
    }

    #[test]
    fn test_refresh_updates_access_and_expiry_together() {
        let t1 = Utc::now() - Duration::minutes(1);
        let t2 = Utc::now() + Duration::hours(1);

        let mut cred = UserCredential::new(
            &profile("g1", "a@x.com"),
            &TokenSet {
                access_token: "A1".to_string(),
                refresh_token: Some("R1".to_string()),
                expiry: Some(t1),
            },
        );

        cred.apply_refresh(&TokenSet {
            access_token: "A2".to_string(),
            refresh_token: None,
            expiry: Some(t2),
        });

        assert_eq!(cred.access_token, "A2");
        assert_eq!(cred.expiry(), Some(t2.with_nanosecond_zeroed()));
        assert_eq!(cred.refresh_token.as_deref(), Some("R1"));
    }

    #[test]
    fn test_refresh_replaces_refresh_token_when_provider_rotates() {
        let mut cred = UserCredential::new(
            &profile("g1", "a@x.com"),
            &TokenSet {
                access_token: "A1".to_string(),
                refresh_token: Some("R1".to_string()),
                expiry: None,
            },
        );

        cred.apply_refresh(&TokenSet {
            access_token: "A2".to_string(),
            refresh_token: Some("R2".to_string()),
            expiry: None,
        });

        assert_eq!(cred.refresh_token.as_deref(), Some("R2"));
    }

    #[test]
    fn test_internal_ids_are_unique() {
        let tokens = TokenSet {
            access_token: "A1".to_string(),
            refresh_token: None,
            expiry: None,
        };
        let a = UserCredential::new(&profile("g1", "a@x.com"), &tokens);
        let b = UserCredential::new(&profile("g2", "b@x.com"), &tokens);
        assert_ne!(a.internal_id, b.internal_id);
    }

    trait NanosecondZeroed {
        fn with_nanosecond_zeroed(self) -> Self;
    }

    impl NanosecondZeroed for DateTime<Utc> {
        /// Stored expiries round-trip through RFC3339 with whole seconds.
        fn with_nanosecond_zeroed(self) -> Self {
            DateTime::from_timestamp(self.timestamp(), 0).unwrap()
        }
    }
}
