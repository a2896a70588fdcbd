// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod aggregator;
pub mod dashboard;
pub mod netatmo;
pub mod oauth;
pub mod token;

pub use aggregator::MeasurementAggregator;
pub use dashboard::{ChartLayout, DashboardQuery, DashboardService, DashboardView};
pub use netatmo::NetatmoClient;
pub use oauth::{AuthorizationCallback, AuthorizationErrorCode, OAuthStateStore};
pub use token::{Resolution, TokenService, TokenState};
