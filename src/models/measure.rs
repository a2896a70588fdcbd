//! Measurement series and derived chart records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Series the dashboard knows how to fetch and reshape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SeriesKind {
    /// Thermostat boiler on/off durations
    Boiler,
    /// Outdoor module of the weather station
    Outdoor,
    /// Indoor (bedroom) module of the weather station
    Indoor,
}

impl SeriesKind {
    pub const ALL: [SeriesKind; 3] = [SeriesKind::Boiler, SeriesKind::Outdoor, SeriesKind::Indoor];

    /// Comma-joined `type` parameter sent to `getmeasure`.
    pub fn measure_types(self) -> &'static str {
        match self {
            SeriesKind::Boiler => "sum_boiler_on,sum_boiler_off",
            SeriesKind::Outdoor => "Temperature,Humidity,min_temp,max_temp,rain",
            SeriesKind::Indoor => "Temperature,Humidity,min_temp,max_temp",
        }
    }

    /// Field names for each position of a raw sample array.
    pub fn sample_fields(self) -> &'static [&'static str] {
        match self {
            SeriesKind::Boiler => &["boiler_on", "boiler_off"],
            SeriesKind::Outdoor => &["temperature", "humidity", "min_temp", "max_temp", "rain"],
            SeriesKind::Indoor => &["temperature", "humidity", "min_temp", "max_temp"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SeriesKind::Boiler => "boiler",
            SeriesKind::Outdoor => "outdoor",
            SeriesKind::Indoor => "indoor",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == raw)
    }
}

/// Aggregation granularity requested from Netatmo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scale {
    #[serde(rename = "1day")]
    OneDay,
    #[serde(rename = "1month")]
    OneMonth,
}

impl Scale {
    pub fn as_str(self) -> &'static str {
        match self {
            Scale::OneDay => "1day",
            Scale::OneMonth => "1month",
        }
    }
}

/// Device/module pair a series is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSource {
    pub device_id: String,
    pub module_id: String,
}

/// Parameters of one `getmeasure` call.
#[derive(Debug, Clone)]
pub struct MeasureRequest {
    pub kind: SeriesKind,
    pub source: SeriesSource,
    pub scale: Scale,
    /// Epoch seconds
    pub date_begin: i64,
    /// Epoch seconds
    pub date_end: i64,
}

/// Raw `getmeasure` response with `optimize=false`.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasureResponse {
    /// Timestamp string → samples, in no particular order
    #[serde(default)]
    pub body: HashMap<String, Vec<Option<f64>>>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One timestamped sample tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePoint {
    /// Epoch seconds
    pub timestamp: i64,
    pub values: Vec<Option<f64>>,
}

/// Samples of one series, sorted by timestamp ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSeries {
    pub kind: SeriesKind,
    pub points: Vec<SamplePoint>,
}

/// A chart point: semantic field name → derived value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedRecord {
    /// Epoch seconds
    pub timestamp: i64,
    pub date: DateTime<Utc>,
    pub fields: BTreeMap<&'static str, f64>,
}

impl DerivedRecord {
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }
}
