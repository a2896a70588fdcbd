// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard views.
//!
//! Each view is a `ChartLayout`: which series to fetch, at what scale, and
//! how to turn derived records into chart datasets. The service fetches the
//! series concurrently, builds the chart and applies the request's filters.

use crate::config::Config;
use crate::error::AppError;
use crate::models::chart::{
    Axis, AxisPosition, ChartColor, ChartKind, Dataset, DatasetRender,
};
use crate::models::{ChartSpec, DerivedRecord, MeasureRequest, Scale, SeriesKind, ThresholdMode};
use crate::services::aggregator::MeasurementAggregator;
use crate::services::token::TokenService;
use crate::time_utils::{end_of_month, format_label, label_offset, start_of_month};
use chrono::{FixedOffset, NaiveDate, Utc};
use futures_util::future::join_all;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

/// Dataset template: one field of one series.
#[derive(Debug, Clone, Copy)]
pub struct DatasetLayout {
    pub label: &'static str,
    pub series: SeriesKind,
    pub field: &'static str,
    pub color: ChartColor,
    pub render: DatasetRender,
    pub axis: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct AxisLayout {
    pub id: &'static str,
    pub position: AxisPosition,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// Static description of a dashboard view.
#[derive(Debug, Clone, Copy)]
pub struct ChartLayout {
    pub title: &'static str,
    pub kind: ChartKind,
    pub scale: Scale,
    pub datasets: &'static [DatasetLayout],
    pub axes: &'static [AxisLayout],
    pub label_threshold: f64,
    pub stacked: bool,
}

const BOILER_DATASETS: [DatasetLayout; 3] = [
    DatasetLayout {
        label: "Sum boiler on",
        series: SeriesKind::Boiler,
        field: "boiler_on",
        color: ChartColor::Red,
        render: DatasetRender::Bar,
        axis: Some("A"),
    },
    DatasetLayout {
        label: "Sum boiler off",
        series: SeriesKind::Boiler,
        field: "boiler_off",
        color: ChartColor::Green,
        render: DatasetRender::Bar,
        axis: Some("A"),
    },
    DatasetLayout {
        label: "Total Hrs",
        series: SeriesKind::Boiler,
        field: "total",
        color: ChartColor::Grey,
        render: DatasetRender::Bar,
        axis: Some("A"),
    },
];

impl ChartLayout {
    pub const DAILY: ChartLayout = ChartLayout {
        title: "Netatmo Boiler/Weather dashboard - Daily",
        kind: ChartKind::Bar,
        scale: Scale::OneDay,
        datasets: &[
            BOILER_DATASETS[0],
            BOILER_DATASETS[1],
            BOILER_DATASETS[2],
            DatasetLayout {
                label: "Weather Temp",
                series: SeriesKind::Outdoor,
                field: "temperature",
                color: ChartColor::Purple,
                render: DatasetRender::Line,
                axis: Some("B"),
            },
            DatasetLayout {
                label: "Bedroom Temp",
                series: SeriesKind::Indoor,
                field: "temperature",
                color: ChartColor::Blue,
                render: DatasetRender::Line,
                axis: Some("B"),
            },
        ],
        axes: &[
            AxisLayout {
                id: "A",
                position: AxisPosition::Left,
                min: 0.0,
                max: 26.0,
                step: 1.0,
            },
            AxisLayout {
                id: "B",
                position: AxisPosition::Right,
                min: 0.0,
                max: 45.0,
                step: 1.0,
            },
        ],
        label_threshold: 0.0,
        stacked: true,
    };

    pub const MONTHLY: ChartLayout = ChartLayout {
        title: "Netatmo Boiler dashboard - Monthly",
        kind: ChartKind::HorizontalBar,
        scale: Scale::OneMonth,
        datasets: &[
            DatasetLayout {
                axis: None,
                ..BOILER_DATASETS[0]
            },
            DatasetLayout {
                axis: None,
                ..BOILER_DATASETS[1]
            },
            DatasetLayout {
                axis: None,
                ..BOILER_DATASETS[2]
            },
        ],
        axes: &[],
        label_threshold: 1.0,
        stacked: true,
    };

    /// Series this layout reads, in fetch order.
    pub fn series(&self) -> Vec<SeriesKind> {
        let kinds: BTreeSet<SeriesKind> = self.datasets.iter().map(|d| d.series).collect();
        kinds.into_iter().collect()
    }
}

/// Dashboard views exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardView {
    Daily,
    Monthly,
}

impl DashboardView {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "daily" => Some(Self::Daily),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn layout(self) -> &'static ChartLayout {
        match self {
            Self::Daily => &ChartLayout::DAILY,
            Self::Monthly => &ChartLayout::MONTHLY,
        }
    }
}

/// Build a chart from derived records keyed by series.
///
/// Labels are the sorted union of every series' timestamps. A series with
/// no point at a label contributes `None` there.
pub fn build_chart(
    layout: &ChartLayout,
    records: &HashMap<SeriesKind, Vec<DerivedRecord>>,
    offset: FixedOffset,
) -> ChartSpec {
    let timestamps: Vec<i64> = layout
        .series()
        .iter()
        .filter_map(|kind| records.get(kind))
        .flatten()
        .map(|r| r.timestamp)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let by_timestamp: HashMap<SeriesKind, HashMap<i64, &DerivedRecord>> = records
        .iter()
        .map(|(kind, rows)| (*kind, rows.iter().map(|r| (r.timestamp, r)).collect()))
        .collect();

    let datasets = layout
        .datasets
        .iter()
        .map(|d| {
            let rows = by_timestamp.get(&d.series);
            let data = timestamps
                .iter()
                .map(|ts| rows.and_then(|rows| rows.get(ts)).and_then(|r| r.get(d.field)))
                .collect();
            let is_line = d.render == DatasetRender::Line;

            Dataset {
                label: d.label.to_string(),
                series: d.series,
                field: d.field.to_string(),
                data,
                color: d.color.rgb().to_string(),
                render: d.render,
                fill: !is_line,
                border_width: if is_line { 2.0 } else { 1.0 },
                axis: d.axis.map(str::to_string),
            }
        })
        .collect();

    ChartSpec {
        title: layout.title.to_string(),
        kind: layout.kind,
        labels: timestamps.iter().map(|ts| format_label(*ts, offset)).collect(),
        window: None,
        datasets,
        axes: layout
            .axes
            .iter()
            .map(|a| Axis {
                id: a.id.to_string(),
                position: a.position,
                suggested_min: a.min,
                suggested_max: a.max,
                step_size: a.step,
            })
            .collect(),
        label_threshold: layout.label_threshold,
        stacked: layout.stacked,
    }
}

/// Query parameters accepted by the dashboard endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    /// Epoch seconds; defaults to the view's history start
    pub date_begin: Option<i64>,
    /// Epoch seconds; defaults to the end of the current month
    pub date_end: Option<i64>,
    pub threshold: Option<f64>,
    pub mode: Option<ThresholdMode>,
    pub from: Option<usize>,
    pub to: Option<usize>,
}

/// Builds dashboard charts for a user.
#[derive(Clone)]
pub struct DashboardService {
    tokens: TokenService,
    aggregator: MeasurementAggregator,
    config: Config,
}

impl DashboardService {
    pub fn new(tokens: TokenService, aggregator: MeasurementAggregator, config: Config) -> Self {
        Self {
            tokens,
            aggregator,
            config,
        }
    }

    fn history_start(&self, view: DashboardView) -> NaiveDate {
        match view {
            DashboardView::Daily => self.config.daily_history_start,
            DashboardView::Monthly => self.config.monthly_history_start,
        }
    }

    /// Default `(date_begin, date_end)` for a view.
    pub fn default_range(&self, view: DashboardView) -> (i64, i64) {
        let offset = label_offset(self.config.label_utc_offset_minutes);
        (
            start_of_month(self.history_start(view), offset),
            end_of_month(Utc::now(), offset),
        )
    }

    /// Measure request for one series of a view.
    pub fn request_for(
        &self,
        kind: SeriesKind,
        scale: Scale,
        date_begin: i64,
        date_end: i64,
    ) -> MeasureRequest {
        MeasureRequest {
            kind,
            source: self.config.source_for(kind),
            scale,
            date_begin,
            date_end,
        }
    }

    /// Resolve the user's token, fetch the view's series and build the chart.
    pub async fn chart_for(
        &self,
        uid: &str,
        view: DashboardView,
        query: &DashboardQuery,
    ) -> Result<ChartSpec, AppError> {
        if query.threshold.is_some() && query.mode.is_none() {
            return Err(AppError::BadRequest(
                "mode is required with threshold".to_string(),
            ));
        }

        let layout = view.layout();
        let (default_begin, default_end) = self.default_range(view);
        let date_begin = query.date_begin.unwrap_or(default_begin);
        let date_end = query.date_end.unwrap_or(default_end);
        if date_begin > date_end {
            return Err(AppError::BadRequest(
                "date_begin must not be after date_end".to_string(),
            ));
        }

        let access_token = self.tokens.usable_access_token(uid).await?;

        let kinds = layout.series();
        let fetches = kinds.iter().map(|kind| {
            let request = self.request_for(*kind, layout.scale, date_begin, date_end);
            let access_token = access_token.as_str();
            async move {
                match self.aggregator.fetch_records(access_token, &request).await {
                    Ok(rows) => (request.kind, rows),
                    Err(e) => {
                        tracing::error!(
                            uid,
                            series = request.kind.as_str(),
                            error = %e,
                            "Series fetch failed, rendering it empty"
                        );
                        (request.kind, Vec::new())
                    }
                }
            }
        });
        let records: HashMap<SeriesKind, Vec<DerivedRecord>> =
            join_all(fetches).await.into_iter().collect();

        let mut chart = build_chart(
            layout,
            &records,
            label_offset(self.config.label_utc_offset_minutes),
        );

        if let (Some(value), Some(mode)) = (query.threshold, query.mode) {
            chart.apply_threshold(value, mode);
        }
        if query.from.is_some() || query.to.is_some() {
            let from = query.from.unwrap_or(0);
            let to = query.to.unwrap_or(chart.labels.len());
            chart.restrict_labels(from, to);
        }

        tracing::debug!(
            uid,
            view = ?view,
            labels = chart.labels.len(),
            "Built dashboard chart"
        );
        Ok(chart)
    }

    /// Derived records for one series, for the raw measures endpoint.
    pub async fn records_for(
        &self,
        uid: &str,
        kind: SeriesKind,
        scale: Scale,
        date_begin: i64,
        date_end: i64,
    ) -> Result<Vec<DerivedRecord>, AppError> {
        let access_token = self.tokens.usable_access_token(uid).await?;
        let request = self.request_for(kind, scale, date_begin, date_end);
        self.aggregator.fetch_records(&access_token, &request).await
    }
}
