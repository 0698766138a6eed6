//! Market breadth: advancing, flat and declining stock counts.

use serde::{Deserialize, Serialize};

use crate::data::{DailySnapshots, TradingDay};
use crate::error::{IndicatorError, Result};

/// Advance/decline counts of one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreadthCounts {
    pub day: TradingDay,
    pub advancing: usize,
    pub flat: usize,
    pub declining: usize,
}

impl BreadthCounts {
    /// Count stocks by the sign of their price change.
    pub fn from_snapshots(day: &DailySnapshots) -> Result<Self> {
        let mut counts = Self {
            day: day.day(),
            advancing: 0,
            flat: 0,
            declining: 0,
        };

        for stock in day.stocks() {
            let change = stock.pct_change();
            if change > 0.0 {
                counts.advancing += 1;
            } else if change < 0.0 {
                counts.declining += 1;
            } else {
                counts.flat += 1;
            }
        }

        if counts.total() == 0 {
            return Err(IndicatorError::InsufficientData(format!(
                "no stock snapshots on {}",
                day.day()
            )));
        }
        Ok(counts)
    }

    pub fn total(&self) -> usize {
        self.advancing + self.flat + self.declining
    }

    /// Advancing stocks as a share of all stocks (%).
    pub fn advance_ratio(&self) -> f64 {
        self.advancing as f64 / self.total().max(1) as f64 * 100.0
    }
}

/// Breadth of a day, with the change from the previous trading day when
/// that day is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBreadth {
    pub today: BreadthCounts,
    pub previous: Option<BreadthCounts>,
}

impl MarketBreadth {
    pub fn compute(today: &DailySnapshots, previous: Option<&DailySnapshots>) -> Result<Self> {
        let today = BreadthCounts::from_snapshots(today)?;
        let previous = previous.and_then(|p| BreadthCounts::from_snapshots(p).ok());
        Ok(Self { today, previous })
    }

    /// Change in advancing count from the previous day.
    pub fn advancing_change(&self) -> Option<i64> {
        self.previous
            .map(|p| self.today.advancing as i64 - p.advancing as i64)
    }

    /// Change in declining count from the previous day.
    pub fn declining_change(&self) -> Option<i64> {
        self.previous
            .map(|p| self.today.declining as i64 - p.declining as i64)
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "上涨 {} / 平盘 {} / 下跌 {}",
            self.today.advancing, self.today.flat, self.today.declining
        );
        if let (Some(up), Some(down)) = (self.advancing_change(), self.declining_change()) {
            line.push_str(&format!(" (较前日 上涨 {:+}, 下跌 {:+})", up, down));
        }
        line
    }
}
