// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result, AUTHORIZE_PATH};
use crate::middleware::auth::AuthUser;
use crate::models::{ChartSpec, DerivedRecord, Scale, SeriesKind};
use crate::services::dashboard::{DashboardQuery, DashboardView};
use crate::services::token::Resolution;
use crate::time_utils::{format_utc_rfc3339, now_millis};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/dashboard/{view}", get(get_dashboard))
        .route("/api/measures/{series}", get(get_measures))
}

// ─── Credential Status ───────────────────────────────────────

/// Current user's Netatmo credential status.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub uid: String,
    /// Whether a usable Netatmo access token exists
    pub authorized: bool,
    pub enabled: Option<bool>,
    /// Access token expiry (RFC3339)
    pub expires_at: Option<String>,
    /// Where to send the user when `authorized` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorize_path: Option<String>,
}

/// Get the current user's credential status.
///
/// Resolving the credentials refreshes an expired token as a side effect.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<MeResponse> {
    let resolution = match state.tokens.resolve(&user.uid, now_millis()).await {
        Ok(resolution) => resolution,
        Err(e) => {
            tracing::warn!(uid = %user.uid, error = %e, "Credential resolution failed");
            Resolution::NoToken
        }
    };

    let response = match resolution {
        Resolution::Token { record, refreshed } => {
            if refreshed {
                tracing::debug!(uid = %user.uid, "Token refreshed on status check");
            }
            MeResponse {
                uid: user.uid,
                authorized: true,
                enabled: Some(record.enabled),
                expires_at: record
                    .expires_at
                    .and_then(DateTime::from_timestamp_millis)
                    .map(format_utc_rfc3339),
                authorize_path: None,
            }
        }
        Resolution::NoToken => {
            let enabled = state
                .tokens
                .stored_credentials(&user.uid)
                .await
                .map(|r| r.enabled);
            MeResponse {
                uid: user.uid,
                authorized: false,
                enabled,
                expires_at: None,
                authorize_path: Some(AUTHORIZE_PATH.to_string()),
            }
        }
    };

    Json(response)
}

// ─── Dashboards ──────────────────────────────────────────────

/// Chart spec for a dashboard view.
async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(view): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ChartSpec>> {
    let view = DashboardView::parse(&view)
        .ok_or_else(|| AppError::NotFound(format!("Unknown dashboard view: {}", view)))?;

    let chart = state.dashboard.chart_for(&user.uid, view, &query).await?;
    Ok(Json(chart))
}

// ─── Raw Measures ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MeasuresQuery {
    #[serde(default)]
    pub scale: Option<Scale>,
    pub date_begin: Option<i64>,
    pub date_end: Option<i64>,
}

/// One derived record as returned over the API.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeasureRecord {
    pub timestamp: i64,
    /// RFC3339, UTC
    pub date: String,
    pub fields: BTreeMap<String, f64>,
}

impl From<DerivedRecord> for MeasureRecord {
    fn from(record: DerivedRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            date: format_utc_rfc3339(record.date),
            fields: record
                .fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }
}

/// Derived records for one series.
async fn get_measures(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(series): Path<String>,
    Query(query): Query<MeasuresQuery>,
) -> Result<Json<Vec<MeasureRecord>>> {
    let kind = SeriesKind::parse(&series)
        .ok_or_else(|| AppError::NotFound(format!("Unknown series: {}", series)))?;

    let scale = query.scale.unwrap_or(Scale::OneDay);
    let (default_begin, default_end) = state.dashboard.default_range(match scale {
        Scale::OneDay => DashboardView::Daily,
        Scale::OneMonth => DashboardView::Monthly,
    });
    let date_begin = query.date_begin.unwrap_or(default_begin);
    let date_end = query.date_end.unwrap_or(default_end);
    if date_begin > date_end {
        return Err(AppError::BadRequest(
            "date_begin must not be after date_end".to_string(),
        ));
    }

    let records = state
        .dashboard
        .records_for(&user.uid, kind, scale, date_begin, date_end)
        .await?;

    Ok(Json(records.into_iter().map(MeasureRecord::from).collect()))
}
