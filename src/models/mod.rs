// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod chart;
pub mod credential;
pub mod measure;

pub use chart::{ChartSpec, ThresholdMode};
pub use credential::{CredentialChange, CredentialRecord, TokenResponse};
pub use measure::{
    DerivedRecord, MeasureRequest, MeasureResponse, MeasurementSeries, SamplePoint, Scale,
    SeriesKind, SeriesSource,
};
