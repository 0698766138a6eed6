//! Limit-up promotion rate.
//!
//! Each entity's limit-up status over consecutive trading days is a
//! two-state sequence. The promotion rate for t → t+1 is the share of
//! entities limit-up on t that are limit-up again on t+1. The board ladder
//! splits that base by streak length: first-board entities (limit-up on t
//! but not t−1) and second-board entities (limit-up on t−1 and t, not t−2).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::PromotionConfig;
use crate::data::{LimitUpWindow, TradingDay};
use crate::series::{percentage, IndicatorSeries, OmitReason};

/// Counts behind one promotion rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionCount {
    /// Entities in the base set on t
    pub base: usize,
    /// Of those, still limit-up on t+1
    pub promoted: usize,
}

impl PromotionCount {
    fn between(base: &BTreeSet<String>, next: &BTreeSet<String>) -> Self {
        Self {
            base: base.len(),
            promoted: base.intersection(next).count(),
        }
    }

    /// Rate in percent, `None` for an empty base.
    pub fn rate(&self) -> Option<f64> {
        percentage(self.promoted as f64, self.base as f64)
    }
}

/// One day-to-day transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionTransition {
    pub from: TradingDay,
    pub to: TradingDay,
    pub overall: PromotionCount,
    /// First board → second board, when t−1 is available
    pub first_to_second: Option<PromotionCount>,
    /// Second board → third board, when t−1 and t−2 are available
    pub second_to_third: Option<PromotionCount>,
}

/// Promotion rate series, each point dated on the arrival day t+1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionSeries {
    pub overall: IndicatorSeries,
    pub first_to_second: IndicatorSeries,
    pub second_to_third: IndicatorSeries,
    pub transitions: Vec<PromotionTransition>,
}

impl PromotionSeries {
    pub fn latest(&self) -> Option<&PromotionTransition> {
        self.transitions.last()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromotionRateCalculator {
    config: PromotionConfig,
}

impl PromotionRateCalculator {
    pub fn new(config: PromotionConfig) -> Self {
        Self { config }
    }

    /// Rate of entities in `today` that remain in `next` (%).
    pub fn rate(today: &BTreeSet<String>, next: &BTreeSet<String>) -> Option<f64> {
        PromotionCount::between(today, next).rate()
    }

    /// Transition from `days[i]` to `days[i + 1]`, with the board ladder
    /// when earlier days are available.
    fn transition(&self, sets: &LimitUpWindow, days: &[TradingDay], i: usize) -> Option<PromotionTransition> {
        let (from, to) = (days[i], days[i + 1]);
        let today = sets.get(from)?;
        let next = sets.get(to)?;

        let prev = i.checked_sub(1).and_then(|j| sets.get(days[j]));
        let prev2 = i.checked_sub(2).and_then(|j| sets.get(days[j]));

        let first_to_second = prev.map(|prev| {
            let first_board: BTreeSet<String> = today.difference(prev).cloned().collect();
            PromotionCount::between(&first_board, next)
        });

        let second_to_third = match (prev, prev2) {
            (Some(prev), Some(prev2)) => {
                let second_board: BTreeSet<String> = today
                    .intersection(prev)
                    .filter(|id| !prev2.contains(*id))
                    .cloned()
                    .collect();
                Some(PromotionCount::between(&second_board, next))
            }
            _ => None,
        };

        Some(PromotionTransition {
            from,
            to,
            overall: PromotionCount::between(today, next),
            first_to_second,
            second_to_third,
        })
    }

    /// Promotion rates over the last `window` transitions of `sets`.
    pub fn compute_series(&self, sets: &LimitUpWindow, min_valid_days: usize) -> PromotionSeries {
        let days = sets.days();
        let transitions_available = days.len().saturating_sub(1);
        let first = transitions_available.saturating_sub(self.config.window);

        let axis: Vec<TradingDay> = days.iter().skip(first + 1).copied().collect();
        let mut overall = IndicatorSeries::new("连板晋级率", axis.clone());
        let mut first_to_second = IndicatorSeries::new("一进二晋级率", axis.clone());
        let mut second_to_third = IndicatorSeries::new("二进三晋级率", axis);
        let mut transitions = Vec::new();

        for i in first..transitions_available {
            let to = days[i + 1];
            let Some(transition) = self.transition(sets, days, i) else {
                overall.omit(to, OmitReason::MissingData);
                first_to_second.omit(to, OmitReason::MissingData);
                second_to_third.omit(to, OmitReason::MissingData);
                continue;
            };

            overall.record(to, transition.overall.rate().ok_or(OmitReason::InsufficientData));
            first_to_second.record(
                to,
                match transition.first_to_second {
                    Some(count) => count.rate().ok_or(OmitReason::InsufficientData),
                    None => Err(OmitReason::MissingData),
                },
            );
            second_to_third.record(
                to,
                match transition.second_to_third {
                    Some(count) => count.rate().ok_or(OmitReason::InsufficientData),
                    None => Err(OmitReason::MissingData),
                },
            );
            transitions.push(transition);
        }

        overall.enforce_min_valid_days(min_valid_days);
        first_to_second.enforce_min_valid_days(min_valid_days);
        second_to_third.enforce_min_valid_days(min_valid_days);

        tracing::debug!(
            transitions = transitions.len(),
            points = overall.len(),
            "Promotion rates computed"
        );

        PromotionSeries {
            overall,
            first_to_second,
            second_to_third,
            transitions,
        }
    }
}
