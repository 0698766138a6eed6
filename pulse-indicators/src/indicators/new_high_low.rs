//! New N-day highs and lows.
//!
//! A stock makes a new high when its close is strictly above every close of
//! the preceding lookback window, and a new low when strictly below every
//! one. Stocks with too short a history are skipped, not counted as either.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::quality::{QualityScreen, QualityScreener};
use crate::config::NewHighLowConfig;
use crate::data::{DailySnapshots, PricePoint, TradingDay};
use crate::series::{IndicatorSeries, OmitReason};

/// Close histories keyed by entity id, ascending by date.
pub type PriceHistories = BTreeMap<String, Vec<PricePoint>>;

/// Where a close sits relative to its lookback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extreme {
    NewHigh,
    NewLow,
    Neither,
}

/// New highs and lows on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHighLowCount {
    pub date: TradingDay,
    pub new_highs: usize,
    pub new_lows: usize,
    /// Stocks with enough history to be compared
    pub evaluated: usize,
    /// Stocks without a close on the day or with too short a history
    pub skipped: usize,
    /// Ids of the new-high stocks, ascending
    pub new_high_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHighLowSeries {
    pub highs: IndicatorSeries,
    pub lows: IndicatorSeries,
    /// New highs minus new lows
    pub net: IndicatorSeries,
    pub counts: Vec<NewHighLowCount>,
}

impl NewHighLowSeries {
    pub fn latest(&self) -> Option<&NewHighLowCount> {
        self.counts.last()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewHighLowTracker {
    config: NewHighLowConfig,
}

impl NewHighLowTracker {
    pub fn new(config: NewHighLowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NewHighLowConfig {
        &self.config
    }

    /// Classify the close of `day` against the preceding closes.
    ///
    /// Returns `None` when the history has no close on `day` or fewer than
    /// `min_history` closes before it.
    pub fn classify(&self, history: &[PricePoint], day: TradingDay) -> Option<Extreme> {
        let idx = history.iter().position(|p| p.date == day)?;
        let preceding = &history[..idx];
        if preceding.is_empty() || preceding.len() < self.config.min_history {
            return None;
        }

        let span = self.config.comparison_span();
        let window = &preceding[preceding.len().saturating_sub(span)..];
        let close = history[idx].close;

        let max = window.iter().map(|p| p.close).fold(f64::NEG_INFINITY, f64::max);
        let min = window.iter().map(|p| p.close).fold(f64::INFINITY, f64::min);

        Some(if close > max {
            Extreme::NewHigh
        } else if close < min {
            Extreme::NewLow
        } else {
            Extreme::Neither
        })
    }

    /// Count new highs and lows over every history on `day`.
    pub fn count_new_highs_lows(&self, histories: &PriceHistories, day: TradingDay) -> NewHighLowCount {
        let mut count = NewHighLowCount {
            date: day,
            new_highs: 0,
            new_lows: 0,
            evaluated: 0,
            skipped: 0,
            new_high_ids: Vec::new(),
        };

        for (id, history) in histories {
            match self.classify(history, day) {
                Some(extreme) => {
                    count.evaluated += 1;
                    match extreme {
                        Extreme::NewHigh => {
                            count.new_highs += 1;
                            count.new_high_ids.push(id.clone());
                        }
                        Extreme::NewLow => count.new_lows += 1,
                        Extreme::Neither => {}
                    }
                }
                None => count.skipped += 1,
            }
        }

        tracing::debug!(
            day = %day,
            highs = count.new_highs,
            lows = count.new_lows,
            evaluated = count.evaluated,
            skipped = count.skipped,
            "New highs/lows counted"
        );
        count
    }

    /// Daily counts over the last `series_window` of `days`.
    ///
    /// A day on which no stock could be evaluated is omitted.
    pub fn compute_series(
        &self,
        histories: &PriceHistories,
        days: &[TradingDay],
        min_valid_days: usize,
    ) -> NewHighLowSeries {
        let axis: Vec<TradingDay> = days[days.len().saturating_sub(self.config.series_window)..].to_vec();
        let mut highs = IndicatorSeries::new("新高数量", axis.clone());
        let mut lows = IndicatorSeries::new("新低数量", axis.clone());
        let mut net = IndicatorSeries::new("净新高数量", axis.clone());
        let mut counts = Vec::new();

        for day in axis {
            let count = self.count_new_highs_lows(histories, day);
            if count.evaluated == 0 {
                highs.omit(day, OmitReason::InsufficientData);
                lows.omit(day, OmitReason::InsufficientData);
                net.omit(day, OmitReason::InsufficientData);
                continue;
            }
            highs.push(day, count.new_highs as f64);
            lows.push(day, count.new_lows as f64);
            net.push(day, count.new_highs as f64 - count.new_lows as f64);
            counts.push(count);
        }

        highs.enforce_min_valid_days(min_valid_days);
        lows.enforce_min_valid_days(min_valid_days);
        net.enforce_min_valid_days(min_valid_days);
        if highs.is_empty() {
            counts.clear();
        }

        NewHighLowSeries {
            highs,
            lows,
            net,
            counts,
        }
    }

    /// Screen the new-high stocks of `count` against the quality criteria.
    pub fn screen_quality_new_highs(
        &self,
        day: &DailySnapshots,
        histories: &PriceHistories,
        count: &NewHighLowCount,
    ) -> QualityScreen {
        QualityScreener::new(self.config.quality.clone()).screen(day, histories, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> TradingDay {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        TradingDay::new(start + chrono::Duration::days(d as i64))
    }

    fn history(closes: &[f64]) -> Vec<PricePoint> {
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| PricePoint::new(day(i as u32), *close))
            .collect()
    }

    fn tracker(lookback: usize, min_history: usize) -> NewHighLowTracker {
        NewHighLowTracker::new(NewHighLowConfig {
            lookback,
            min_history,
            series_window: 3,
            ..Default::default()
        })
    }

    #[test]
    fn test_strictly_above_max_is_new_high() {
        let t = tracker(3, 3);
        let h = history(&[10.0, 12.0, 11.0, 12.5]);
        assert_eq!(t.classify(&h, day(3)), Some(Extreme::NewHigh));

        let equal = history(&[10.0, 12.0, 11.0, 12.0]);
        assert_eq!(t.classify(&equal, day(3)), Some(Extreme::Neither));
    }

    #[test]
    fn test_lookback_excludes_older_closes() {
        let t = tracker(2, 2);
        // 15.0 lies outside the two preceding closes
        let h = history(&[15.0, 10.0, 11.0, 12.0]);
        assert_eq!(t.classify(&h, day(3)), Some(Extreme::NewHigh));

        let low = history(&[5.0, 10.0, 11.0, 9.0]);
        assert_eq!(t.classify(&low, day(3)), Some(Extreme::NewLow));
    }

    #[test]
    fn test_include_today_shortens_comparison() {
        let t = NewHighLowTracker::new(NewHighLowConfig {
            lookback: 3,
            min_history: 1,
            include_today: true,
            ..Default::default()
        });
        let h = history(&[20.0, 10.0, 11.0, 12.0]);
        assert_eq!(t.classify(&h, day(3)), Some(Extreme::NewHigh));
    }

    #[test]
    fn test_short_history_skipped() {
        let t = tracker(3, 3);
        let mut histories = PriceHistories::new();
        histories.insert("A".into(), history(&[10.0, 11.0, 12.0, 13.0]));
        histories.insert("B".into(), history(&[10.0, 11.0]));
        histories.insert("C".into(), history(&[13.0, 12.0, 11.0, 10.0]));

        let count = t.count_new_highs_lows(&histories, day(3));
        assert_eq!(count.new_highs, 1);
        assert_eq!(count.new_lows, 1);
        assert_eq!(count.evaluated, 2);
        assert_eq!(count.skipped, 1);
        assert_eq!(count.new_high_ids, vec!["A".to_string()]);
    }

    #[test]
    fn test_series_omits_unevaluable_days() {
        let t = tracker(2, 2);
        let mut histories = PriceHistories::new();
        histories.insert("A".into(), history(&[10.0, 11.0, 12.0, 13.0]));

        let days: Vec<TradingDay> = (0..4).map(day).collect();
        let series = t.compute_series(&histories, &days, 1);
        assert_eq!(series.highs.days, vec![day(1), day(2), day(3)]);
        assert_eq!(series.highs.len(), 2);
        assert_eq!(series.highs.omitted[0].date, day(1));
        assert_eq!(series.highs.value_on(day(3)), Some(1.0));
        assert_eq!(series.lows.value_on(day(3)), Some(0.0));
    }

    #[test]
    fn test_net_series_is_highs_minus_lows() {
        let t = tracker(2, 2);
        let mut histories = PriceHistories::new();
        histories.insert("A".into(), history(&[10.0, 11.0, 12.0, 13.0]));
        histories.insert("B".into(), history(&[13.0, 12.0, 11.0, 10.0]));
        histories.insert("C".into(), history(&[12.0, 11.0, 10.0, 9.0]));

        let days: Vec<TradingDay> = (0..4).map(day).collect();
        let series = t.compute_series(&histories, &days, 1);
        assert_eq!(series.net.name, "净新高数量");
        assert_eq!(series.net.value_on(day(3)), Some(-1.0));
        assert_eq!(series.net.value_on(day(2)), Some(-1.0));
        // Day 1 has no stock with two preceding closes
        assert!(series.net.value_on(day(1)).is_none());
        assert_eq!(series.net.omitted[0].reason, OmitReason::InsufficientData);
    }
}
