// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Netatmo Dashboard API Server
//!
//! Keeps Netatmo OAuth2 credentials fresh in Firestore and serves boiler
//! and weather charts built from the Netatmo measurement API.

use netatmo_dashboard::{config::Config, db::FirestoreDb, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired OAuth states are swept.
const STATE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Netatmo dashboard API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    let state = Arc::new(AppState::new(config.clone(), db)?);
    tracing::info!(
        api = %config.netatmo_api_url,
        offset_minutes = config.label_utc_offset_minutes,
        "Netatmo services initialized"
    );

    // Refresh expired tokens whenever a credential record changes
    let listener_tokens = state.tokens.clone();
    tokio::spawn(listener_tokens.run_change_listener(state.db.subscribe()));
    let mut credential_listener = state.db.watch_credentials().await?;

    let purge_tokens = state.tokens.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = purge_tokens.purge_expired_states();
            if purged > 0 {
                tracing::debug!(purged, "Purged expired OAuth states");
            }
        }
    });

    // Build router
    let app = netatmo_dashboard::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;

    if let Some(credential_listener) = credential_listener.as_mut() {
        credential_listener.shutdown().await?;
    }
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("netatmo_dashboard=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
