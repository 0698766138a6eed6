//! Capital concentration index.
//!
//! Share of the market's net inflow captured by the top decile of
//! inflow-ranked stocks. Only positive inflows count toward the shares, so
//! the index stays within [0, 100].

use serde::{Deserialize, Serialize};

use crate::config::ConcentrationConfig;
use crate::data::{DailySnapshots, SnapshotWindow, TradingDay};
use crate::series::{percentage, IndicatorSeries, OmitReason};

/// One day's concentration computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationReading {
    pub date: TradingDay,
    /// Stocks with a reported net inflow
    pub stock_count: usize,
    /// Size of the top group
    pub top_count: usize,
    /// Positive inflow of the top group (yuan)
    pub top_inflow: f64,
    /// Positive inflow of the whole market (yuan)
    pub total_inflow: f64,
    /// Concentration index (%)
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationSeries {
    pub series: IndicatorSeries,
    pub readings: Vec<ConcentrationReading>,
}

impl ConcentrationSeries {
    pub fn latest(&self) -> Option<&ConcentrationReading> {
        self.readings.last()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConcentrationIndexCalculator {
    config: ConcentrationConfig,
}

impl ConcentrationIndexCalculator {
    pub fn new(config: ConcentrationConfig) -> Self {
        Self { config }
    }

    /// Size of the top group for `n` stocks: ceil(top% × n), at least 1.
    pub fn top_count(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let count = (self.config.top_percent * n as f64 / 100.0).ceil() as usize;
        count.clamp(1, n)
    }

    pub fn compute_day(&self, day: &DailySnapshots) -> Result<ConcentrationReading, OmitReason> {
        let mut flows: Vec<(&str, f64)> = day
            .stocks()
            .filter_map(|s| s.net_inflow().map(|flow| (s.id(), flow)))
            .collect();
        if flows.is_empty() {
            return Err(OmitReason::InsufficientData);
        }

        flows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let top_count = self.top_count(flows.len());

        let top_inflow: f64 = flows[..top_count].iter().map(|(_, f)| f.max(0.0)).sum();
        let total_inflow: f64 = flows.iter().map(|(_, f)| f.max(0.0)).sum();

        let value = percentage(top_inflow, total_inflow).ok_or(OmitReason::ZeroDenominator)?;

        Ok(ConcentrationReading {
            date: day.day(),
            stock_count: flows.len(),
            top_count,
            top_inflow,
            total_inflow,
            value,
        })
    }

    pub fn compute_series(&self, snapshots: &SnapshotWindow, min_valid_days: usize) -> ConcentrationSeries {
        let days = snapshots.tail_days(self.config.window).to_vec();
        let mut series = IndicatorSeries::new("资金集中度", days.clone());
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

        ConcentrationSeries { series, readings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EntitySnapshot, SnapshotRecord};

    fn day(d: u32) -> TradingDay {
        TradingDay::from_ymd(2024, 8, d).unwrap()
    }

    fn daily(d: u32, flows: &[Option<f64>]) -> DailySnapshots {
        DailySnapshots::from_snapshots(
            day(d),
            flows.iter().enumerate().map(|(i, flow)| {
                EntitySnapshot::try_from(SnapshotRecord {
                    id: format!("{:06}.SH", 600000 + i),
                    net_inflow: *flow,
                    pct_change: 0.0,
                    close: 10.0,
                    ..Default::default()
                })
                .unwrap()
            }),
        )
    }

    #[test]
    fn test_top_count() {
        let calc = ConcentrationIndexCalculator::default();
        assert_eq!(calc.top_count(0), 0);
        assert_eq!(calc.top_count(9), 1);
        assert_eq!(calc.top_count(10), 1);
        assert_eq!(calc.top_count(11), 2);
        assert_eq!(calc.top_count(100), 10);
    }

    #[test]
    fn test_small_positive_market_uses_single_largest() {
        let calc = ConcentrationIndexCalculator::default();
        let reading = calc
            .compute_day(&daily(1, &[Some(10.0), Some(30.0), Some(60.0)]))
            .unwrap();
        assert_eq!(reading.top_count, 1);
        assert_eq!(reading.top_inflow, 60.0);
        assert_eq!(reading.value, 60.0);
    }

    #[test]
    fn test_missing_flows_excluded() {
        let calc = ConcentrationIndexCalculator::default();
        let reading = calc
            .compute_day(&daily(1, &[Some(50.0), None, Some(50.0), None]))
            .unwrap();
        assert_eq!(reading.stock_count, 2);
        assert_eq!(reading.value, 50.0);
    }

    #[test]
    fn test_value_within_bounds_with_outflows() {
        let calc = ConcentrationIndexCalculator::default();
        let flows: Vec<Option<f64>> = (0..25)
            .map(|i| Some(if i % 3 == 0 { -40.0 } else { i as f64 }))
            .collect();
        let reading = calc.compute_day(&daily(1, &flows)).unwrap();
        assert_eq!(reading.top_count, 3);
        assert!(reading.value >= 0.0 && reading.value <= 100.0);
    }

    #[test]
    fn test_zero_denominator_omitted() {
        let calc = ConcentrationIndexCalculator::default();
        assert_eq!(
            calc.compute_day(&daily(1, &[Some(-5.0), Some(0.0)])),
            Err(OmitReason::ZeroDenominator)
        );
        assert_eq!(
            calc.compute_day(&daily(1, &[None, None])),
            Err(OmitReason::InsufficientData)
        );
    }

    #[test]
    fn test_series_idempotent() {
        let calc = ConcentrationIndexCalculator::new(ConcentrationConfig {
            window: 3,
            ..Default::default()
        });
        let window = SnapshotWindow::from_days(
            (1..=3).map(day).collect(),
            vec![daily(1, &[Some(1.0), Some(2.0)]), daily(3, &[Some(4.0), Some(4.0)])],
        );

        let first = calc.compute_series(&window, 1);
        let second = calc.compute_series(&window, 1);
        assert_eq!(first, second);
        assert_eq!(first.series.len(), 2);
        assert_eq!(first.series.value_on(day(3)), Some(50.0));
    }
}
