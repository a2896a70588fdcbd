// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Netatmo token lifecycle.
//!
//! `classify` is the pure transition table over a stored credential record.
//! `TokenService` executes it: it reads the record, refreshes expired tokens,
//! merge-writes the result and only then hands the token out.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{CredentialChange, CredentialRecord, TokenResponse};
use crate::services::netatmo::NetatmoClient;
use crate::services::oauth::{verify_callback, AuthorizationCallback, OAuthStateStore};
use crate::time_utils::now_millis;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Where a stored credential record stands at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    /// No record or no access token: the user must authorize.
    Unauthenticated,
    /// Access token usable as-is.
    Valid(CredentialRecord),
    /// Access token expired, refresh token available.
    Expired {
        record: CredentialRecord,
        refresh_token: String,
    },
}

/// Classify `record` at `now_ms` (epoch milliseconds).
///
/// Fails with `MissingRefreshToken` when the token expired and cannot be refreshed.
pub fn classify(record: Option<&CredentialRecord>, now_ms: i64) -> Result<TokenState, AppError> {
    let Some(record) = record.filter(|r| r.access_token.is_some()) else {
        return Ok(TokenState::Unauthenticated);
    };

    let expired = record.expires_at.map_or(true, |expires_at| expires_at <= now_ms);
    if !expired {
        return Ok(TokenState::Valid(record.clone()));
    }

    match &record.refresh_token {
        Some(refresh_token) => Ok(TokenState::Expired {
            record: record.clone(),
            refresh_token: refresh_token.clone(),
        }),
        None => Err(AppError::MissingRefreshToken),
    }
}

/// Record that replaces `previous` after a successful refresh at `now_ms`.
pub fn refreshed_record(
    previous: &CredentialRecord,
    token: &TokenResponse,
    now_ms: i64,
) -> CredentialRecord {
    CredentialRecord::from_token_response(&previous.uid, previous.enabled, token, now_ms)
}

/// Outcome of resolving a user's credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The user must go through the authorization flow.
    NoToken,
    /// Credentials to use for API calls.
    Token {
        record: CredentialRecord,
        refreshed: bool,
    },
}

impl Resolution {
    pub fn access_token(&self) -> Option<&str> {
        match self {
            Resolution::Token { record, .. } => record.access_token.as_deref(),
            Resolution::NoToken => None,
        }
    }
}

/// Shared per-user refresh locks.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Token lifecycle service shared by all requests.
#[derive(Clone)]
pub struct TokenService {
    client: NetatmoClient,
    db: FirestoreDb,
    states: OAuthStateStore,
    /// Per-user mutex serializing refreshes within this instance.
    refresh_locks: RefreshLocks,
}

impl TokenService {
    pub fn new(client: NetatmoClient, db: FirestoreDb, states: OAuthStateStore) -> Self {
        Self {
            client,
            db,
            states,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Resolve the effective credentials for `uid` at `now_ms`.
    ///
    /// A refreshed record is merge-written before this returns.
    pub async fn resolve(&self, uid: &str, now_ms: i64) -> Result<Resolution, AppError> {
        let record = self.db.get_credentials(uid).await?;
        match classify(record.as_ref(), now_ms)? {
            TokenState::Unauthenticated => return Ok(Resolution::NoToken),
            TokenState::Valid(record) => {
                return Ok(Resolution::Token {
                    record,
                    refreshed: false,
                })
            }
            TokenState::Expired { .. } => {}
        }

        let lock = self
            .refresh_locks
            .entry(uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        // Another task may have refreshed while we waited
        let result = match self.db.get_credentials(uid).await {
            Ok(record) => self.resolve_record(record.as_ref(), now_ms).await,
            Err(e) => Err(e),
        };

        drop(guard);
        // Only the map and this task hold the lock: nobody is waiting on it
        self.refresh_locks
            .remove_if(uid, |_, held| Arc::strong_count(held) == 2);

        result
    }

    /// Number of users with a refresh lock currently allocated.
    pub fn refresh_lock_count(&self) -> usize {
        self.refresh_locks.len()
    }

    /// Run the transition table on an already-loaded record.
    pub async fn resolve_record(
        &self,
        record: Option<&CredentialRecord>,
        now_ms: i64,
    ) -> Result<Resolution, AppError> {
        match classify(record, now_ms)? {
            TokenState::Unauthenticated => Ok(Resolution::NoToken),
            TokenState::Valid(record) => Ok(Resolution::Token {
                record,
                refreshed: false,
            }),
            TokenState::Expired {
                record,
                refresh_token,
            } => {
                tracing::info!(uid = %record.uid, "Netatmo access token expired, refreshing");

                let token = self.client.refresh_token(&refresh_token).await?;
                let updated = refreshed_record(&record, &token, now_ms);
                self.db.merge_credentials(&record.uid, &updated).await?;

                tracing::info!(uid = %record.uid, expires_at = ?updated.expires_at, "Netatmo token refreshed");
                Ok(Resolution::Token {
                    record: updated,
                    refreshed: true,
                })
            }
        }
    }

    /// Access token for API calls.
    ///
    /// Store read failures, missing refresh tokens and refresh tokens Netatmo
    /// rejects all become `AuthorizationRequired`. A refresh that failed for
    /// any other reason (Netatmo down, timeout) is returned as-is: the stored
    /// credentials may still be good.
    pub async fn usable_access_token(&self, uid: &str) -> Result<String, AppError> {
        match self.resolve(uid, now_millis()).await {
            Ok(resolution) => resolution
                .access_token()
                .map(str::to_string)
                .ok_or(AppError::AuthorizationRequired),
            Err(e) if e.is_token_error() || matches!(e, AppError::StoreReadFailure(_)) => {
                tracing::warn!(uid, error = %e, "No usable Netatmo token");
                Err(AppError::AuthorizationRequired)
            }
            Err(e) => {
                tracing::error!(uid, error = %e, "Netatmo token refresh failed");
                Err(e)
            }
        }
    }

    /// Stored record for `uid`; read failures count as no data.
    pub async fn stored_credentials(&self, uid: &str) -> Option<CredentialRecord> {
        match self.db.get_credentials(uid).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(uid, error = %e, "Failed to read credentials, treating as absent");
                None
            }
        }
    }

    // ─── Authorization Flow ──────────────────────────────────────────────────

    /// Authorization URL for `uid` with a freshly issued state.
    pub fn begin_authorization(&self, uid: &str) -> Result<String, AppError> {
        let state = self.states.issue(uid)?;
        Ok(self.client.authorize_url(&state))
    }

    /// Handle the authorization callback for `uid`.
    ///
    /// The issued state is consumed before anything else, so a replayed
    /// callback always fails.
    pub async fn complete_authorization(
        &self,
        uid: &str,
        callback: &AuthorizationCallback,
        now_ms: i64,
    ) -> Result<CredentialRecord, AppError> {
        let expected = self.states.take(uid);
        let code = verify_callback(callback, expected.as_deref())?;

        let token = self.client.exchange_code(code).await?;

        let enabled = self
            .stored_credentials(uid)
            .await
            .map(|existing| existing.enabled)
            .unwrap_or(true);
        let record = CredentialRecord::from_token_response(uid, enabled, &token, now_ms);
        self.db.merge_credentials(uid, &record).await?;

        tracing::info!(uid, scopes = ?token.scope, "Netatmo authorization completed");
        Ok(record)
    }

    /// Forget any pending authorization for `uid` (sign-out).
    pub fn discard_authorization(&self, uid: &str) {
        self.states.take(uid);
    }

    /// Drop expired pending states. Returns how many were removed.
    pub fn purge_expired_states(&self) -> usize {
        self.states.purge_expired()
    }

    // ─── Change Listener ─────────────────────────────────────────────────────

    /// Refresh expired tokens as credential changes arrive.
    ///
    /// Returns when the change feed closes.
    pub async fn run_change_listener(self, mut changes: broadcast::Receiver<CredentialChange>) {
        loop {
            let change = match changes.recv().await {
                Ok(change) => change,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Credential change listener lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if let Err(e) = self.resolve(&change.uid, now_millis()).await {
                tracing::warn!(uid = %change.uid, error = %e, "Refresh after credential change failed");
            }
        }
        tracing::info!("Credential change listener stopped");
    }
}
