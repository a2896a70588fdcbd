// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Netatmo OAuth authorization routes.
//!
//! Start and callback run behind the session middleware: the pending state
//! is keyed by the signed-in user, so a callback from another session can
//! never consume it.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, session_uid, AuthUser, SESSION_COOKIE};
use crate::services::oauth::AuthorizationCallback;
use crate::time_utils::now_millis;
use crate::AppState;

/// Routes that need a session. The auth middleware is applied in routes/mod.rs.
pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/netatmo", get(auth_start))
        .route("/auth/netatmo/callback", get(auth_callback))
}

/// Routes reachable without a session.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/logout", post(logout))
}

/// Start OAuth flow - redirect to Netatmo authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Redirect> {
    let auth_url = state.tokens.begin_authorization(&user.uid)?;

    tracing::info!(
        uid = %user.uid,
        client_id = %state.config.netatmo_client_id,
        "Starting OAuth flow, redirecting to Netatmo"
    );

    Ok(Redirect::temporary(&auth_url))
}

fn session_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// OAuth callback - exchange the code, store tokens, renew the session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
    Query(params): Query<AuthorizationCallback>,
) -> Result<(CookieJar, Redirect)> {
    if let Some(error) = &params.error {
        tracing::warn!(uid = %user.uid, error = %error, "OAuth error from Netatmo");
    }

    let record = state
        .tokens
        .complete_authorization(&user.uid, &params, now_millis())
        .await?;

    tracing::info!(
        uid = %record.uid,
        expires_at = ?record.expires_at,
        "OAuth successful, tokens stored"
    );

    let jwt = create_jwt(&user.uid, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;
    let secure = state.config.frontend_url.starts_with("https://");

    Ok((
        jar.add(session_cookie(jwt, secure)),
        Redirect::temporary(&state.config.frontend_url),
    ))
}

/// Sign out: drop any pending authorization and clear the session cookie.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> (CookieJar, StatusCode) {
    if let Some(uid) = session_uid(&jar, &headers, &state.config.jwt_signing_key) {
        state.tokens.discard_authorization(&uid);
        tracing::info!(uid = %uid, "User signed out");
    }

    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}
