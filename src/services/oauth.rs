// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth authorization flow helpers: single-use CSRF state and callback checks.

use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

const STATE_BYTES: usize = 32;

/// OAuth2 error codes the authorization server may return on the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationErrorCode {
    InvalidRequest,
    InvalidClient,
    UnauthorizedClient,
    RedirectUriMismatch,
    AccessDenied,
    UnsupportedResponseType,
    InvalidScope,
}

impl AuthorizationErrorCode {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "invalid_request" => Some(Self::InvalidRequest),
            "invalid_client" => Some(Self::InvalidClient),
            "unauthorized_client" => Some(Self::UnauthorizedClient),
            "redirect_uri_mismatch" => Some(Self::RedirectUriMismatch),
            "access_denied" => Some(Self::AccessDenied),
            "unsupported_response_type" => Some(Self::UnsupportedResponseType),
            "invalid_scope" => Some(Self::InvalidScope),
            _ => None,
        }
    }

    /// Static text shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidRequest => "The request is missing a required parameter, includes an unsupported parameter or parameter value, or is otherwise malformed.",
            Self::InvalidClient => "The client identifier provided is invalid.",
            Self::UnauthorizedClient => "The client is not authorized to use the requested response type.",
            Self::RedirectUriMismatch => "The redirection URI provided does not match a pre-registered value.",
            Self::AccessDenied => "The end-user or authorization server denied the request.",
            Self::UnsupportedResponseType => "The requested response type is not supported by the authorization server.",
            Self::InvalidScope => "The requested scope is invalid, unknown, or malformed.",
        }
    }
}

/// Query parameters Netatmo appends to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationCallback {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Check a callback against the state issued for the session.
///
/// Returns the authorization code to exchange.
pub fn verify_callback<'a>(
    callback: &'a AuthorizationCallback,
    expected_state: Option<&str>,
) -> Result<&'a str, AppError> {
    if let Some(code) = &callback.error {
        return Err(AppError::AuthorizationDenied { code: code.clone() });
    }

    let matches = match (callback.state.as_deref(), expected_state) {
        (Some(received), Some(expected)) => {
            bool::from(received.as_bytes().ct_eq(expected.as_bytes()))
        }
        _ => false,
    };
    if !matches {
        return Err(AppError::StateMismatch);
    }

    callback
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))
}

struct PendingState {
    state: String,
    issued_at: Instant,
}

/// Short-lived, single-use mapping from session to expected OAuth state.
#[derive(Clone)]
pub struct OAuthStateStore {
    pending: Arc<DashMap<String, PendingState>>,
    ttl: Duration,
    rng: SystemRandom,
}

impl OAuthStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            ttl,
            rng: SystemRandom::new(),
        }
    }

    /// Issue a fresh state for `session_id`, replacing any previous one.
    pub fn issue(&self, session_id: &str) -> Result<String, AppError> {
        let mut bytes = [0u8; STATE_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Random state generation failed")))?;
        let state = URL_SAFE_NO_PAD.encode(bytes);

        self.pending.insert(
            session_id.to_string(),
            PendingState {
                state: state.clone(),
                issued_at: Instant::now(),
            },
        );
        Ok(state)
    }

    /// Remove and return the state for `session_id`. Expired states are dropped.
    pub fn take(&self, session_id: &str) -> Option<String> {
        let (_, pending) = self.pending.remove(session_id)?;
        if pending.issued_at.elapsed() >= self.ttl {
            tracing::info!(session_id, "Discarding expired OAuth state");
            return None;
        }
        Some(pending.state)
    }

    /// Drop every expired state. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, pending| pending.issued_at.elapsed() < self.ttl);
        before - self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
