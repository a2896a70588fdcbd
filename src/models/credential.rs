//! Netatmo credential model stored per user.

use serde::{Deserialize, Serialize};

/// Per-user Netatmo OAuth credentials, stored at `users/{uid}`.
///
/// `expires_at` is epoch milliseconds. A record with an access token but no
/// expiry is treated as expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Identity-provider user ID (also the document ID)
    pub uid: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub enabled: bool,
}

impl CredentialRecord {
    /// Build a record from a token endpoint response received at `now_ms`.
    pub fn from_token_response(uid: &str, enabled: bool, token: &TokenResponse, now_ms: i64) -> Self {
        Self {
            uid: uid.to_string(),
            access_token: Some(token.access_token.clone()),
            refresh_token: Some(token.refresh_token.clone()),
            expires_at: Some(now_ms + token.expires_in * 1000),
            enabled,
        }
    }
}

/// Token response from the Netatmo token endpoint (both grants).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Vec<String>,
}

/// A merge write observed on the credential store.
#[derive(Debug, Clone)]
pub struct CredentialChange {
    pub uid: String,
    pub record: CredentialRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token_response_computes_expiry_in_millis() {
        let token = TokenResponse {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_in: 10800,
            scope: vec!["read_station".to_string()],
        };

        let record = CredentialRecord::from_token_response("uid-1", true, &token, 1_000);

        assert_eq!(record.expires_at, Some(1_000 + 10_800_000));
        assert_eq!(record.access_token.as_deref(), Some("access"));
        assert_eq!(record.refresh_token.as_deref(), Some("refresh"));
        assert!(record.enabled);
    }

    #[test]
    fn test_missing_fields_deserialize_as_empty() {
        let record: CredentialRecord = serde_json::from_str(r#"{"uid":"u"}"#).unwrap();
        assert_eq!(record.access_token, None);
        assert_eq!(record.expires_at, None);
        assert!(!record.enabled);
    }
}
