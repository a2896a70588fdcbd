//! Declarative chart specs consumed by the browser chart renderer.
//!
//! A spec carries every label and data point. Filters mutate it in place:
//! the threshold filter zeroes failing points, the label window only records
//! which slice of labels is displayed.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::SeriesKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub enum ChartKind {
    Bar,
    HorizontalBar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub enum DatasetRender {
    Bar,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub enum AxisPosition {
    Left,
    Right,
}

/// Named palette shared by all dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Grey,
}

impl ChartColor {
    pub fn rgb(self) -> &'static str {
        match self {
            ChartColor::Red => "rgb(255, 99, 132)",
            ChartColor::Orange => "rgb(255, 159, 64)",
            ChartColor::Yellow => "rgb(255, 205, 86)",
            ChartColor::Green => "rgb(75, 192, 192)",
            ChartColor::Blue => "rgb(54, 162, 235)",
            ChartColor::Purple => "rgb(153, 102, 255)",
            ChartColor::Grey => "rgb(201, 203, 207)",
        }
    }
}

/// Comparison kept by the threshold filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    LessThanOrEqual,
    GreaterThanOrEqual,
}

impl ThresholdMode {
    fn keeps(self, point: f64, threshold: f64) -> bool {
        match self {
            ThresholdMode::LessThanOrEqual => point <= threshold,
            ThresholdMode::GreaterThanOrEqual => point >= threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct Axis {
    pub id: String,
    pub position: AxisPosition,
    pub suggested_min: f64,
    pub suggested_max: f64,
    pub step_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct Dataset {
    pub label: String,
    pub series: SeriesKind,
    pub field: String,
    /// One entry per chart label; `None` where the series has no point
    pub data: Vec<Option<f64>>,
    pub color: String,
    pub render: DatasetRender,
    pub fill: bool,
    pub border_width: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis: Option<String>,
}

/// Half-open `[from, to)` slice of labels to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
pub struct LabelWindow {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChartSpec {
    pub title: String,
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub window: Option<LabelWindow>,
    pub datasets: Vec<Dataset>,
    pub axes: Vec<Axis>,
    /// Data labels are drawn only for points above this value
    pub label_threshold: f64,
    pub stacked: bool,
}

impl ChartSpec {
    /// Replace every point failing `mode` against `value` with 0, in all datasets.
    pub fn apply_threshold(&mut self, value: f64, mode: ThresholdMode) {
        for dataset in &mut self.datasets {
            for point in dataset.data.iter_mut().flatten() {
                if !mode.keeps(*point, value) {
                    *point = 0.0;
                }
            }
        }
    }

    /// Display only labels in `[from, to)`, clamped to the label count.
    pub fn restrict_labels(&mut self, from: usize, to: usize) {
        let len = self.labels.len();
        let to = to.min(len);
        let from = from.min(to);
        self.window = Some(LabelWindow { from, to });
    }

    /// Labels currently displayed.
    pub fn displayed_labels(&self) -> &[String] {
        match self.window {
            Some(LabelWindow { from, to }) => &self.labels[from..to],
            None => &self.labels,
        }
    }

    pub fn dataset(&self, label: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.label == label)
    }
}
