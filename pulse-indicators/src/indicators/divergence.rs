//! Divergence index: the share of top gainers with net capital outflow.
//!
//! A price rise that is not backed by inflow is fragile. When a large part
//! of the day's strongest gainers see money leaving, the rally is likely to
//! pull back.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::DivergenceConfig;
use crate::data::{DailySnapshots, EntitySnapshot, SnapshotWindow, TradingDay};
use crate::series::{compare_desc_by, percentage, IndicatorSeries, OmitReason};

/// Pullback risk implied by a divergence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "低"),
            Self::Medium => write!(f, "中"),
            Self::High => write!(f, "高"),
        }
    }
}

/// One day's divergence computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceReading {
    pub date: TradingDay,
    /// Gainers examined (the denominator)
    pub gainers: usize,
    /// Examined gainers with negative net inflow
    pub outflow_count: usize,
    /// Divergence index (%)
    pub value: f64,
    pub risk: RiskLevel,
    /// Value reached the pullback warning threshold
    pub warning: bool,
}

/// Divergence series plus the per-day details behind each point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceSeries {
    pub series: IndicatorSeries,
    pub readings: Vec<DivergenceReading>,
}

impl DivergenceSeries {
    pub fn latest(&self) -> Option<&DivergenceReading> {
        self.readings.last()
    }

    /// Days that reached the warning threshold.
    pub fn warnings(&self) -> Vec<&DivergenceReading> {
        self.readings.iter().filter(|r| r.warning).collect()
    }
}

/// Computes the divergence index per day and over a rolling window.
#[derive(Debug, Clone, Default)]
pub struct DivergenceIndexCalculator {
    config: DivergenceConfig,
}

impl DivergenceIndexCalculator {
    pub fn new(config: DivergenceConfig) -> Self {
        Self { config }
    }

    pub fn risk_level(&self, value: f64) -> RiskLevel {
        if value >= self.config.warning_threshold {
            RiskLevel::High
        } else if value >= self.config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// The day's top gainers that report a net inflow, strongest first.
    fn top_gainers<'a>(&self, day: &'a DailySnapshots) -> Vec<&'a EntitySnapshot> {
        let mut gainers: Vec<&EntitySnapshot> = day
            .stocks()
            .filter(|s| s.pct_change() > 0.0 && s.net_inflow().is_some())
            .collect();
        gainers.sort_by(compare_desc_by(EntitySnapshot::pct_change));
        gainers.truncate(self.config.gainer_count);
        gainers
    }

    /// Divergence for one day.
    ///
    /// The denominator is the number of gainers actually examined, which is
    /// below `gainer_count` on thin days.
    pub fn compute_day(&self, day: &DailySnapshots) -> Result<DivergenceReading, OmitReason> {
        let gainers = self.top_gainers(day);
        if gainers.is_empty() {
            return Err(OmitReason::InsufficientData);
        }

        let outflow_count = gainers
            .iter()
            .filter(|s| matches!(s.net_inflow(), Some(flow) if flow < 0.0))
            .count();
        let value = percentage(outflow_count as f64, gainers.len() as f64)
            .ok_or(OmitReason::ZeroDenominator)?;

        tracing::debug!(
            day = %day.day(),
            gainers = gainers.len(),
            outflow = outflow_count,
            value,
            "Divergence computed"
        );

        Ok(DivergenceReading {
            date: day.day(),
            gainers: gainers.len(),
            outflow_count,
            value,
            risk: self.risk_level(value),
            warning: value >= self.config.warning_threshold,
        })
    }

    /// Divergence over the last `window` days of `snapshots`.
    pub fn compute_series(&self, snapshots: &SnapshotWindow, min_valid_days: usize) -> DivergenceSeries {
        let days = snapshots.tail_days(self.config.window).to_vec();
        let mut series = IndicatorSeries::new("背离指数", days.clone());
        let mut readings = Vec::new();

        for day in days {
            let outcome = match snapshots.get(day) {
                Some(daily) => self.compute_day(daily),
                None => Err(OmitReason::MissingData),
            };
            match outcome {
                Ok(reading) => {
                    series.push(day, reading.value);
                    readings.push(reading);
                }
                Err(reason) => series.omit(day, reason),
            }
        }

        series.enforce_min_valid_days(min_valid_days);
        if series.is_empty() {
            readings.clear();
        }

        if let Some(latest) = readings.last().filter(|r| r.warning) {
            tracing::warn!(
                day = %latest.date,
                value = latest.value,
                threshold = self.config.warning_threshold,
                "Divergence index at pullback warning level"
            );
        }

        DivergenceSeries { series, readings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SnapshotRecord;

    fn day(d: u32) -> TradingDay {
        TradingDay::from_ymd(2024, 7, d).unwrap()
    }

    /// `gainers` rising stocks, the first `negative` with outflow, plus `losers` falling ones.
    fn daily(d: u32, gainers: usize, negative: usize, losers: usize) -> DailySnapshots {
        let mut snaps = Vec::new();
        for i in 0..gainers {
            let flow = if i < negative { -1.0e6 } else { 1.0e6 };
            snaps.push(
                EntitySnapshot::try_from(SnapshotRecord {
                    id: format!("G{:03}", i),
                    net_inflow: Some(flow),
                    pct_change: 10.0 - i as f64 * 0.01,
                    close: 10.0,
                    ..Default::default()
                })
                .unwrap(),
            );
        }
        for i in 0..losers {
            snaps.push(
                EntitySnapshot::try_from(SnapshotRecord {
                    id: format!("L{:03}", i),
                    net_inflow: Some(-5.0e6),
                    pct_change: -1.0,
                    close: 10.0,
                    ..Default::default()
                })
                .unwrap(),
            );
        }
        DailySnapshots::from_snapshots(day(d), snaps)
    }

    #[test]
    fn test_fifty_gainers_fifteen_negative() {
        let calc = DivergenceIndexCalculator::default();
        let reading = calc.compute_day(&daily(1, 50, 15, 10)).unwrap();
        assert_eq!(reading.value, 30.0);
        assert_eq!(reading.gainers, 50);
        assert!(reading.warning);
        assert_eq!(reading.risk, RiskLevel::High);
    }

    #[test]
    fn test_denominator_shrinks_with_fewer_gainers() {
        let calc = DivergenceIndexCalculator::default();
        let reading = calc.compute_day(&daily(1, 40, 12, 30)).unwrap();
        assert_eq!(reading.gainers, 40);
        assert_eq!(reading.value, 30.0);
    }

    #[test]
    fn test_only_top_gainers_examined() {
        let calc = DivergenceIndexCalculator::default();
        // 60 gainers; the 10 weakest carry no outflow
        let reading = calc.compute_day(&daily(1, 60, 10, 0)).unwrap();
        assert_eq!(reading.gainers, 50);
        assert_eq!(reading.value, 20.0);
        assert_eq!(reading.risk, RiskLevel::Medium);
        assert!(!reading.warning);
    }

    #[test]
    fn test_no_gainers_omitted() {
        let calc = DivergenceIndexCalculator::default();
        assert_eq!(
            calc.compute_day(&daily(1, 0, 0, 20)),
            Err(OmitReason::InsufficientData)
        );
    }

    #[test]
    fn test_warning_threshold_configurable() {
        let calc = DivergenceIndexCalculator::new(DivergenceConfig {
            warning_threshold: 40.0,
            ..Default::default()
        });
        let reading = calc.compute_day(&daily(1, 50, 15, 0)).unwrap();
        assert!(!reading.warning);
        assert_eq!(reading.risk, RiskLevel::Medium);
    }

    #[test]
    fn test_series_omits_missing_and_empty_days() {
        let calc = DivergenceIndexCalculator::new(DivergenceConfig {
            window: 4,
            ..Default::default()
        });
        let window = SnapshotWindow::from_days(
            (1..=5).map(day).collect(),
            vec![daily(1, 10, 1, 0), daily(2, 10, 2, 0), daily(4, 0, 0, 5), daily(5, 10, 5, 0)],
        );

        let result = calc.compute_series(&window, 1);
        assert_eq!(result.series.days, vec![day(2), day(3), day(4), day(5)]);
        let values: Vec<f64> = result.series.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![20.0, 50.0]);
        assert_eq!(result.series.omitted.len(), 2);
        assert_eq!(result.series.omitted[0].reason, OmitReason::MissingData);
        assert_eq!(result.series.omitted[1].reason, OmitReason::InsufficientData);
        assert_eq!(result.warnings().len(), 1);
    }
}
