//! Trading calendar resolution.
//!
//! Every rolling indicator uses trading days as its time axis. Requested
//! dates that fall on weekends or holidays resolve backwards to the latest
//! trading session on or before them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::data::{MarketDataSource, SourceError, TradingDay};
use crate::error::{IndicatorError, Result};

/// An ordered set of open trading sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradingCalendar {
    days: BTreeSet<TradingDay>,
}

impl TradingCalendar {
    pub fn new(days: impl IntoIterator<Item = TradingDay>) -> Self {
        Self {
            days: days.into_iter().collect(),
        }
    }

    pub fn contains(&self, day: TradingDay) -> bool {
        self.days.contains(&day)
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// All trading days, ascending.
    pub fn iter(&self) -> impl Iterator<Item = TradingDay> + '_ {
        self.days.iter().copied()
    }

    /// Latest trading day on or before `date`.
    pub fn resolve(&self, date: NaiveDate) -> Option<TradingDay> {
        self.days.range(..=TradingDay::new(date)).next_back().copied()
    }

    /// The trading day immediately before `day`.
    pub fn previous(&self, day: TradingDay) -> Option<TradingDay> {
        self.days.range(..day).next_back().copied()
    }

    /// The last `count` trading days ending at the day `date` resolves to,
    /// in ascending order. Shorter when the calendar runs out.
    pub fn recent_days(&self, date: NaiveDate, count: usize) -> Vec<TradingDay> {
        let mut days: Vec<TradingDay> = self
            .days
            .range(..=TradingDay::new(date))
            .rev()
            .take(count)
            .copied()
            .collect();
        days.reverse();
        days
    }
}

/// Applies trading-day semantics on top of a market data source.
pub struct TradingCalendarResolver<'a> {
    source: &'a dyn MarketDataSource,
}

impl<'a> TradingCalendarResolver<'a> {
    pub fn new(source: &'a dyn MarketDataSource) -> Self {
        Self { source }
    }

    /// Resolve a requested date to a trading day.
    ///
    /// Fails with `InvalidDate` when the source knows no trading day on or
    /// before `date`.
    pub async fn resolve(&self, date: NaiveDate) -> Result<TradingDay> {
        match self.source.resolve_trading_day(date).await {
            Ok(day) if day.date() <= date => Ok(day),
            Ok(day) => Err(IndicatorError::InvalidDate {
                date,
                reason: format!("source resolved to later day {}", day),
            }),
            Err(SourceError::DataNotAvailable(reason)) | Err(SourceError::InvalidRequest(reason)) => {
                Err(IndicatorError::InvalidDate { date, reason })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The `count` most recent trading days ending at `day`, ascending.
    ///
    /// The result is sorted and deduplicated, and never contains a day
    /// after `day`.
    pub async fn recent_days(&self, day: TradingDay, count: usize) -> Result<Vec<TradingDay>> {
        if count == 0 {
            return Err(IndicatorError::invalid_parameter(
                "count",
                "at least one trading day must be requested",
            ));
        }

        let days = self
            .source
            .list_recent_trading_days(day.date(), count)
            .await?;

        let ordered: BTreeSet<TradingDay> = days.into_iter().filter(|d| *d <= day).collect();
        let mut days: Vec<TradingDay> = ordered.into_iter().collect();
        if days.len() > count {
            days.drain(..days.len() - count);
        }

        if days.is_empty() {
            return Err(IndicatorError::InsufficientData(format!(
                "no trading days on or before {}",
                day
            )));
        }

        tracing::debug!(
            end = %day,
            requested = count,
            returned = days.len(),
            "Resolved trading day window"
        );

        Ok(days)
    }
}
