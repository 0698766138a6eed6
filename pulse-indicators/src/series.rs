//! Result shapes shared by all calculators: rankings and time series.
//!
//! # Omission
//! A day without a valid value never appears as a point. It is recorded in
//! [`IndicatorSeries::omitted`] with the reason, and the requested day axis
//! is kept so that charts can show the gap.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::data::{EntitySnapshot, TradingDay};

/// `numerator / denominator × 100`, or `None` for a degenerate denominator.
pub(crate) fn percentage(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return None;
    }
    let value = numerator * 100.0 / denominator;
    value.is_finite().then_some(value)
}

// ============================================================================
// Rankings
// ============================================================================

/// Metric a ranking is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    /// Net capital inflow (yuan)
    NetInflow,
    /// Net inflow as a percentage of turnover
    InflowRate,
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetInflow => write!(f, "净流入"),
            Self::InflowRate => write!(f, "净流入率"),
        }
    }
}

/// One entry of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntity {
    pub id: String,
    pub name: String,
    pub value: f64,
}

/// Entities ordered by a metric, descending, ties by ascending id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    pub metric: RankingMetric,
    pub entries: Vec<RankedEntity>,
}

impl RankingResult {
    /// Rank `(snapshot, value)` pairs and keep the first `k`.
    pub(crate) fn from_values<'a>(
        metric: RankingMetric,
        values: impl IntoIterator<Item = (&'a EntitySnapshot, f64)>,
        k: usize,
    ) -> Self {
        let mut entries: Vec<RankedEntity> = values
            .into_iter()
            .map(|(snapshot, value)| RankedEntity {
                id: snapshot.id().to_string(),
                name: snapshot.name().to_string(),
                value,
            })
            .collect();

        entries.sort_by(compare_ranked);
        entries.truncate(k);

        Self { metric, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.id.as_str()).collect()
    }
}

/// Descending by value, then ascending by id.
pub(crate) fn compare_ranked(a: &RankedEntity, b: &RankedEntity) -> Ordering {
    b.value.total_cmp(&a.value).then_with(|| a.id.cmp(&b.id))
}

/// Descending by a value, then ascending by id, for snapshots.
pub(crate) fn compare_desc_by<F>(key: F) -> impl Fn(&&EntitySnapshot, &&EntitySnapshot) -> Ordering
where
    F: Fn(&EntitySnapshot) -> f64,
{
    move |a, b| key(b).total_cmp(&key(a)).then_with(|| a.id().cmp(b.id()))
}

// ============================================================================
// Time Series
// ============================================================================

/// One value of a rolling indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: TradingDay,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(date: TradingDay, value: f64) -> Self {
        Self { date, value }
    }
}

/// Why a day has no point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OmitReason {
    /// Source data for the day could not be retrieved
    MissingData,
    /// The day had data but not enough of it (no gainers, no limit-up base...)
    InsufficientData,
    /// The ratio denominator was zero
    ZeroDenominator,
    /// The whole series had fewer valid points than required
    BelowMinimumDays,
}

impl fmt::Display for OmitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingData => write!(f, "missing data"),
            Self::InsufficientData => write!(f, "insufficient data"),
            Self::ZeroDenominator => write!(f, "zero denominator"),
            Self::BelowMinimumDays => write!(f, "below minimum valid days"),
        }
    }
}

/// A day of the requested axis that produced no point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmittedDay {
    pub date: TradingDay,
    pub reason: OmitReason,
}

/// A rolling indicator over a requested range of trading days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub name: String,
    /// Every requested trading day, ascending
    pub days: Vec<TradingDay>,
    /// One point per valid day, ascending
    pub points: Vec<TimeSeriesPoint>,
    pub omitted: Vec<OmittedDay>,
}

impl IndicatorSeries {
    pub fn new(name: impl Into<String>, days: Vec<TradingDay>) -> Self {
        Self {
            name: name.into(),
            days,
            points: Vec::new(),
            omitted: Vec::new(),
        }
    }

    pub fn push(&mut self, date: TradingDay, value: f64) {
        self.points.push(TimeSeriesPoint::new(date, value));
    }

    pub fn omit(&mut self, date: TradingDay, reason: OmitReason) {
        tracing::debug!(series = %self.name, day = %date, reason = %reason, "Point omitted");
        self.omitted.push(OmittedDay { date, reason });
    }

    /// Record a day's outcome.
    pub fn record(&mut self, date: TradingDay, outcome: std::result::Result<f64, OmitReason>) {
        match outcome {
            Ok(value) => self.push(date, value),
            Err(reason) => self.omit(date, reason),
        }
    }

    /// Drop every point when fewer than `min_valid_days` exist.
    pub fn enforce_min_valid_days(&mut self, min_valid_days: usize) {
        if self.points.len() >= min_valid_days {
            return;
        }
        tracing::warn!(
            series = %self.name,
            valid = self.points.len(),
            required = min_valid_days,
            "Series below minimum valid days, all points omitted"
        );
        let dropped: Vec<TradingDay> = self.points.drain(..).map(|p| p.date).collect();
        for date in dropped {
            self.omitted.push(OmittedDay {
                date,
                reason: OmitReason::BelowMinimumDays,
            });
        }
        self.omitted.sort_by_key(|o| o.date);
    }

    pub fn latest(&self) -> Option<&TimeSeriesPoint> {
        self.points.last()
    }

    pub fn value_on(&self, date: TradingDay) -> Option<f64> {
        self.points.iter().find(|p| p.date == date).map(|p| p.value)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Values aligned with `days`, `None` where the day was omitted.
    pub fn aligned(&self) -> Vec<(TradingDay, Option<f64>)> {
        self.days
            .iter()
            .map(|day| (*day, self.value_on(*day)))
            .collect()
    }
}
