//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables (Cloud Run secret bindings
//! in production, a `.env` file for local development).

use crate::models::{SeriesKind, SeriesSource};
use chrono::NaiveDate;
use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Accepted label offsets in minutes: anything short of a full day.
const LABEL_OFFSET_RANGE: RangeInclusive<i32> = -1439..=1439;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Netatmo application ---
    /// Netatmo OAuth client ID
    pub netatmo_client_id: String,
    /// Netatmo OAuth client secret
    pub netatmo_client_secret: String,
    /// Redirect URI registered with Netatmo (points at /auth/netatmo/callback)
    pub netatmo_redirect_uri: String,
    /// Base URL of the Netatmo API (overridable for tests)
    pub netatmo_api_url: String,

    // --- Devices ---
    pub boiler_device_id: String,
    pub boiler_module_id: String,
    pub weather_device_id: String,
    pub weather_outdoor_module_id: String,
    pub weather_indoor_module_id: String,

    // --- Service ---
    /// Frontend URL for redirects and CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// JWT signing key shared with the identity provider (raw bytes)
    pub jwt_signing_key: Vec<u8>,

    // --- Tuning ---
    /// Timeout applied to every outbound HTTP call
    pub http_timeout: Duration,
    /// Extra attempts for a measurement fetch that timed out
    pub measure_timeout_retries: u32,
    /// Lifetime of an issued OAuth state
    pub oauth_state_ttl: Duration,
    /// Offset applied when formatting chart labels
    pub label_utc_offset_minutes: i32,
    /// First month shown on the daily dashboard
    pub daily_history_start: NaiveDate,
    /// First month shown on the monthly dashboard
    pub monthly_history_start: NaiveDate,
}

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            netatmo_client_id: "test_client_id".to_string(),
            netatmo_client_secret: "test_secret".to_string(),
            netatmo_redirect_uri: "http://localhost:8080/auth/netatmo/callback".to_string(),
            netatmo_api_url: "http://127.0.0.1:9".to_string(),
            boiler_device_id: "70:ee:50:00:00:01".to_string(),
            boiler_module_id: "04:00:00:00:00:01".to_string(),
            weather_device_id: "70:ee:50:00:00:02".to_string(),
            weather_outdoor_module_id: "02:00:00:00:00:02".to_string(),
            weather_indoor_module_id: "03:00:00:00:00:03".to_string(),
            frontend_url: "http://localhost:4200".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            http_timeout: Duration::from_secs(5),
            measure_timeout_retries: 1,
            oauth_state_ttl: Duration::from_secs(600),
            label_utc_offset_minutes: 0,
            daily_history_start: first_of_month(2020, 1),
            monthly_history_start: first_of_month(2017, 1),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            netatmo_client_id: required("NETATMO_CLIENT_ID")?,
            netatmo_client_secret: required("NETATMO_CLIENT_SECRET")?,
            netatmo_redirect_uri: required("NETATMO_REDIRECT_URI")?,
            netatmo_api_url: env::var("NETATMO_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://api.netatmo.com".to_string()),

            boiler_device_id: required("BOILER_DEVICE_ID")?,
            boiler_module_id: required("BOILER_MODULE_ID")?,
            weather_device_id: required("WEATHER_DEVICE_ID")?,
            weather_outdoor_module_id: required("WEATHER_OUTDOOR_MODULE_ID")?,
            weather_indoor_module_id: required("WEATHER_INDOOR_MODULE_ID")?,

            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:4200".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parsed("PORT", 8080)?,
            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),

            http_timeout: Duration::from_millis(parsed("HTTP_TIMEOUT_MS", 10_000)?),
            measure_timeout_retries: parsed("MEASURE_TIMEOUT_RETRIES", 1)?,
            oauth_state_ttl: Duration::from_secs(parsed("OAUTH_STATE_TTL_SECS", 600)?),
            label_utc_offset_minutes: label_offset_minutes("LABEL_UTC_OFFSET_MINUTES")?,
            daily_history_start: month("DAILY_HISTORY_START", "2020-01")?,
            monthly_history_start: month("MONTHLY_HISTORY_START", "2017-01")?,
        })
    }

    /// Device and module a series is read from.
    pub fn source_for(&self, kind: SeriesKind) -> SeriesSource {
        let (device_id, module_id) = match kind {
            SeriesKind::Boiler => (&self.boiler_device_id, &self.boiler_module_id),
            SeriesKind::Outdoor => (&self.weather_device_id, &self.weather_outdoor_module_id),
            SeriesKind::Indoor => (&self.weather_device_id, &self.weather_indoor_module_id),
        };
        SeriesSource {
            device_id: device_id.clone(),
            module_id: module_id.clone(),
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

fn label_offset_minutes(name: &'static str) -> Result<i32, ConfigError> {
    let minutes: i32 = parsed(name, 0)?;
    if LABEL_OFFSET_RANGE.contains(&minutes) {
        Ok(minutes)
    } else {
        Err(ConfigError::Invalid(name, minutes.to_string()))
    }
}

/// Parse a `YYYY-MM` month into its first day.
fn month(name: &'static str, default: &str) -> Result<NaiveDate, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_month(&raw).ok_or(ConfigError::Invalid(name, raw))
}

pub(crate) fn parse_month(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d").ok()
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
