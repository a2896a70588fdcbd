// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Measurement fetching and reshaping.
//!
//! Netatmo returns `{ "<epoch secs>": [samples…] }` with no ordering
//! guarantee. Series are sorted by timestamp before anything else sees them.

use crate::error::AppError;
use crate::models::{
    DerivedRecord, MeasureRequest, MeasureResponse, MeasurementSeries, SamplePoint, SeriesKind,
};
use crate::services::netatmo::NetatmoClient;
use chrono::DateTime;
use std::collections::{BTreeMap, HashMap};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Sort a raw `getmeasure` body into a series.
pub fn reshape(kind: SeriesKind, body: &HashMap<String, Vec<Option<f64>>>) -> MeasurementSeries {
    let mut points: Vec<SamplePoint> = body
        .iter()
        .filter_map(|(key, values)| match key.parse::<i64>() {
            Ok(timestamp) => Some(SamplePoint {
                timestamp,
                values: values.clone(),
            }),
            Err(_) => {
                tracing::warn!(key = %key, series = kind.as_str(), "Skipping non-numeric timestamp");
                None
            }
        })
        .collect();
    points.sort_by_key(|p| p.timestamp);

    MeasurementSeries { kind, points }
}

/// Round to two decimals the way the dashboard always has.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Map each sample tuple onto the series field table.
pub fn derive(series: &MeasurementSeries) -> Vec<DerivedRecord> {
    series
        .points
        .iter()
        .map(|point| DerivedRecord {
            timestamp: point.timestamp,
            date: DateTime::from_timestamp(point.timestamp, 0).unwrap_or_default(),
            fields: derive_fields(series.kind, &point.values),
        })
        .collect()
}

fn derive_fields(kind: SeriesKind, values: &[Option<f64>]) -> BTreeMap<&'static str, f64> {
    match kind {
        SeriesKind::Boiler => {
            // Missing samples count as zero seconds
            let on_hours = values.first().copied().flatten().unwrap_or(0.0) / SECONDS_PER_HOUR;
            let off_hours = values.get(1).copied().flatten().unwrap_or(0.0) / SECONDS_PER_HOUR;

            // Total rounds the unrounded sum, not the rounded parts.
            BTreeMap::from([
                ("boiler_on", round2(on_hours)),
                ("boiler_off", round2(off_hours)),
                ("total", (on_hours + off_hours).round()),
            ])
        }
        SeriesKind::Outdoor | SeriesKind::Indoor => kind
            .sample_fields()
            .iter()
            .zip(values)
            .filter_map(|(field, value)| value.map(|v| (*field, v)))
            .collect(),
    }
}

/// Fetches series from Netatmo and reshapes them.
#[derive(Clone)]
pub struct MeasurementAggregator {
    client: NetatmoClient,
    /// Extra attempts after a timeout
    timeout_retries: u32,
}

impl MeasurementAggregator {
    pub fn new(client: NetatmoClient, timeout_retries: u32) -> Self {
        Self {
            client,
            timeout_retries,
        }
    }

    /// Fetch one series, retrying only on timeout.
    pub async fn fetch_series(
        &self,
        access_token: &str,
        request: &MeasureRequest,
    ) -> Result<MeasurementSeries, AppError> {
        let mut attempt = 0;
        let response: MeasureResponse = loop {
            match self.client.get_measure(access_token, request).await {
                Ok(response) => break response,
                Err(e) if e.is_retryable() && attempt < self.timeout_retries => {
                    attempt += 1;
                    tracing::warn!(
                        series = request.kind.as_str(),
                        attempt,
                        error = %e,
                        "Measure request timed out, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        let series = reshape(request.kind, &response.body);
        tracing::debug!(
            series = request.kind.as_str(),
            points = series.points.len(),
            "Fetched measurement series"
        );
        Ok(series)
    }

    /// Fetch and derive chart records for one series.
    pub async fn fetch_records(
        &self,
        access_token: &str,
        request: &MeasureRequest,
    ) -> Result<Vec<DerivedRecord>, AppError> {
        let series = self.fetch_series(access_token, request).await?;
        Ok(derive(&series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(entries: &[(&str, &[f64])]) -> HashMap<String, Vec<Option<f64>>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().copied().map(Some).collect()))
            .collect()
    }

    #[test]
    fn test_reshape_sorts_ascending() {
        let series = reshape(
            SeriesKind::Boiler,
            &body(&[("200", &[1.0, 2.0]), ("100", &[3.0, 4.0])]),
        );

        let timestamps: Vec<i64> = series.points.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![100, 200]);
        assert_eq!(series.points[0].values, vec![Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_reshape_skips_bad_keys() {
        let series = reshape(
            SeriesKind::Indoor,
            &body(&[("abc", &[1.0]), ("300", &[20.5])]),
        );
        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].timestamp, 300);
    }

    #[test]
    fn test_boiler_conversion() {
        let series = reshape(SeriesKind::Boiler, &body(&[("100", &[3600.0, 7200.0])]));
        let records = derive(&series);

        assert_eq!(records[0].get("boiler_on"), Some(1.0));
        assert_eq!(records[0].get("boiler_off"), Some(2.0));
        assert_eq!(records[0].get("total"), Some(3.0));
    }

    #[test]
    fn test_boiler_total_rounds_unrounded_sum() {
        // 1.6h + 1.6h: sum 3.2 rounds to 3
        let series = reshape(
            SeriesKind::Boiler,
            &body(&[("1", &[5760.0, 5760.0]), ("2", &[1800.0, 0.0])]),
        );
        let records = derive(&series);

        assert_eq!(records[0].get("boiler_on"), Some(1.6));
        assert_eq!(records[0].get("total"), Some(3.0));
        // 0.5h rounds half away from zero
        assert_eq!(records[1].get("boiler_on"), Some(0.5));
        assert_eq!(records[1].get("total"), Some(1.0));
    }

    #[test]
    fn test_boiler_missing_sample_is_zero() {
        let mut raw = HashMap::new();
        raw.insert("10".to_string(), vec![Some(7200.0), None]);
        let records = derive(&reshape(SeriesKind::Boiler, &raw));

        assert_eq!(records[0].get("boiler_off"), Some(0.0));
        assert_eq!(records[0].get("total"), Some(2.0));
    }

    #[test]
    fn test_weather_field_order() {
        let series = reshape(
            SeriesKind::Outdoor,
            &body(&[("1577836800", &[4.5, 88.0, 1.2, 7.9, 0.3])]),
        );
        let record = &derive(&series)[0];

        assert_eq!(record.get("temperature"), Some(4.5));
        assert_eq!(record.get("humidity"), Some(88.0));
        assert_eq!(record.get("min_temp"), Some(1.2));
        assert_eq!(record.get("max_temp"), Some(7.9));
        assert_eq!(record.get("rain"), Some(0.3));
        assert_eq!(record.date.timestamp(), 1_577_836_800);
    }

    #[test]
    fn test_indoor_has_no_rain_and_skips_nulls() {
        let mut raw = HashMap::new();
        raw.insert("5".to_string(), vec![Some(19.0), None, Some(18.0), Some(21.0), Some(9.0)]);
        let record = &derive(&reshape(SeriesKind::Indoor, &raw))[0];

        assert_eq!(record.get("temperature"), Some(19.0));
        assert_eq!(record.get("humidity"), None);
        assert_eq!(record.get("rain"), None);
        assert_eq!(record.fields.len(), 3);
    }
}
