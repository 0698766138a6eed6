//! Chart and table payloads handed to the rendering layer.
//!
//! Bars are already sorted for plotting. Line series keep every requested
//! day, with `None` where the indicator was omitted; gaps are never
//! interpolated.

use serde::{Deserialize, Serialize};

use crate::data::TradingDay;
use crate::indicators::QualityStockCandidate;
use crate::series::{IndicatorSeries, RankingResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarEntry {
    pub label: String,
    pub value: f64,
}

/// Ordered (label, value) bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarChartPayload {
    pub title: String,
    pub bars: Vec<BarEntry>,
}

impl BarChartPayload {
    /// Bars in ranking order, labelled by entity name.
    pub fn from_ranking(title: impl Into<String>, ranking: &RankingResult) -> Self {
        Self {
            title: title.into(),
            bars: ranking
                .entries
                .iter()
                .map(|e| BarEntry {
                    label: e.name.clone(),
                    value: e.value,
                })
                .collect(),
        }
    }
}

/// One line of a line chart, aligned with the requested days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<(TradingDay, Option<f64>)>,
}

impl From<&IndicatorSeries> for LineSeries {
    fn from(series: &IndicatorSeries) -> Self {
        Self {
            name: series.name.clone(),
            points: series.aligned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineChartPayload {
    pub title: String,
    pub series: Vec<LineSeries>,
}

impl LineChartPayload {
    pub fn new<'a>(title: impl Into<String>, series: impl IntoIterator<Item = &'a IndicatorSeries>) -> Self {
        Self {
            title: title.into(),
            series: series.into_iter().map(LineSeries::from).collect(),
        }
    }

    /// Days with a value in at least one series.
    pub fn valid_days(&self) -> usize {
        let Some(first) = self.series.first() else {
            return 0;
        };
        (0..first.points.len())
            .filter(|&i| {
                self.series
                    .iter()
                    .any(|s| s.points.get(i).is_some_and(|(_, v)| v.is_some()))
            })
            .count()
    }
}

/// Screened candidates with every criterion populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePayload {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<QualityStockCandidate>,
}

impl TablePayload {
    pub fn quality_candidates(title: impl Into<String>, rows: Vec<QualityStockCandidate>) -> Self {
        let columns = [
            "代码",
            "名称",
            "收盘价",
            "总市值",
            "市值达标",
            "趋势向上",
            "波动率",
            "近期波动率",
            "波动达标",
            "相对位置",
            "位置达标",
        ];
        Self {
            title: title.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }
}

/// Every payload of one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSet {
    pub bars: Vec<BarChartPayload>,
    pub lines: Vec<LineChartPayload>,
    pub tables: Vec<TablePayload>,
}
