// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Netatmo dashboard: boiler and weather charts from the Netatmo API
//!
//! This crate provides the backend API that keeps each user's Netatmo
//! OAuth2 tokens fresh and turns `getmeasure` series into chart specs.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{DashboardService, MeasurementAggregator, NetatmoClient, OAuthStateStore, TokenService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub tokens: TokenService,
    pub dashboard: DashboardService,
}

impl AppState {
    /// Wire services together from config and an opened database.
    pub fn new(config: Config, db: FirestoreDb) -> Result<Self, error::AppError> {
        let client = NetatmoClient::new(&config)?;
        let states = OAuthStateStore::new(config.oauth_state_ttl);
        let tokens = TokenService::new(client.clone(), db.clone(), states);
        let aggregator = MeasurementAggregator::new(client, config.measure_timeout_retries);
        let dashboard = DashboardService::new(tokens.clone(), aggregator, config.clone());

        Ok(Self {
            config,
            db,
            tokens,
            dashboard,
        })
    }
}
