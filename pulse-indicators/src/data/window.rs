//! Per-day retrieval over a window of trading days.
//!
//! Requests for independent days are issued with bounded concurrency and
//! re-assembled in date order. A day whose retrieval fails, or that comes
//! back empty, is recorded as missing; it never becomes a zero-valued day.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use super::{DailySnapshots, MarketDataSource, SourceError, TradingDay};

/// Fetch one item per day, keeping the input order of `days`.
pub(crate) async fn fetch_by_day<T, F, Fut>(
    days: &[TradingDay],
    max_concurrent: usize,
    fetch: F,
) -> Vec<(TradingDay, Result<T, SourceError>)>
where
    F: Fn(TradingDay) -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    stream::iter(days.iter().copied().map(|day| {
        let request = fetch(day);
        async move { (day, request.await) }
    }))
    .buffered(max_concurrent.max(1))
    .collect()
    .await
}

// ============================================================================
// Snapshot Window
// ============================================================================

/// Snapshots for an ordered window of trading days.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotWindow {
    days: Vec<TradingDay>,
    snapshots: BTreeMap<TradingDay, DailySnapshots>,
    missing: Vec<TradingDay>,
}

impl SnapshotWindow {
    /// An empty window over `days`; every day starts out missing.
    pub fn new(days: Vec<TradingDay>) -> Self {
        let days: Vec<TradingDay> = days
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            missing: days.clone(),
            days,
            snapshots: BTreeMap::new(),
        }
    }

    /// Build a window from already-retrieved days.
    pub fn from_days(days: Vec<TradingDay>, available: impl IntoIterator<Item = DailySnapshots>) -> Self {
        let mut window = Self::new(days);
        for daily in available {
            window.insert(daily);
        }
        window
    }

    /// Retrieve snapshots for every day of the window.
    pub async fn fetch(source: &dyn MarketDataSource, days: Vec<TradingDay>, max_concurrent: usize) -> Self {
        let mut window = Self::new(days);
        let results = fetch_by_day(&window.days, max_concurrent, move |day| source.daily_snapshots(day)).await;

        for (day, result) in results {
            match result {
                Ok(daily) if daily.is_empty() => {
                    tracing::warn!(day = %day, source = source.name(), "Empty snapshot set, day treated as missing");
                }
                Ok(daily) if daily.day() != day => {
                    tracing::warn!(
                        day = %day,
                        returned = %daily.day(),
                        "Source returned snapshots for another day, treated as missing"
                    );
                }
                Ok(daily) => window.insert(daily),
                Err(e) => {
                    tracing::warn!(day = %day, source = source.name(), error = %e, "Snapshot retrieval failed, day treated as missing");
                }
            }
        }

        tracing::debug!(
            days = window.days.len(),
            missing = window.missing.len(),
            "Snapshot window fetched"
        );
        window
    }

    /// Store a day's snapshots; ignored for days outside the window or empty sets.
    pub fn insert(&mut self, daily: DailySnapshots) {
        let day = daily.day();
        if daily.is_empty() || self.days.binary_search(&day).is_err() {
            return;
        }
        self.missing.retain(|d| *d != day);
        self.snapshots.insert(day, daily);
    }

    /// Every day of the window, ascending (including missing ones).
    pub fn days(&self) -> &[TradingDay] {
        &self.days
    }

    /// Days with no usable snapshots.
    pub fn missing(&self) -> &[TradingDay] {
        &self.missing
    }

    pub fn get(&self, day: TradingDay) -> Option<&DailySnapshots> {
        self.snapshots.get(&day)
    }

    pub fn last_day(&self) -> Option<TradingDay> {
        self.days.last().copied()
    }

    /// The last `count` days of the window, ascending.
    pub fn tail_days(&self, count: usize) -> &[TradingDay] {
        let start = self.days.len().saturating_sub(count);
        &self.days[start..]
    }

    /// The day before `day` within the window.
    pub fn previous_day(&self, day: TradingDay) -> Option<TradingDay> {
        let idx = self.days.binary_search(&day).ok()?;
        idx.checked_sub(1).map(|i| self.days[i])
    }
}

// ============================================================================
// Limit-Up Window
// ============================================================================

/// Limit-up sets for an ordered window of trading days.
///
/// An empty set is a valid observation (no limit-up entity that day); only
/// failed retrievals are missing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LimitUpWindow {
    days: Vec<TradingDay>,
    sets: BTreeMap<TradingDay, BTreeSet<String>>,
}

impl LimitUpWindow {
    pub fn new(days: Vec<TradingDay>) -> Self {
        let days = days
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            days,
            sets: BTreeMap::new(),
        }
    }

    pub async fn fetch(source: &dyn MarketDataSource, days: Vec<TradingDay>, max_concurrent: usize) -> Self {
        let mut window = Self::new(days);
        let results = fetch_by_day(&window.days, max_concurrent, move |day| source.limit_up_entities(day)).await;

        for (day, result) in results {
            match result {
                Ok(set) => {
                    window.sets.insert(day, set);
                }
                Err(e) => {
                    tracing::warn!(day = %day, error = %e, "Limit-up retrieval failed, day treated as missing");
                }
            }
        }
        window
    }

    /// Record the limit-up set observed on `day`.
    pub fn insert<I, S>(&mut self, day: TradingDay, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.days.binary_search(&day).is_ok() {
            self.sets.insert(day, ids.into_iter().map(Into::into).collect());
        }
    }

    pub fn days(&self) -> &[TradingDay] {
        &self.days
    }

    pub fn get(&self, day: TradingDay) -> Option<&BTreeSet<String>> {
        self.sets.get(&day)
    }

    pub fn missing(&self) -> Vec<TradingDay> {
        self.days
            .iter()
            .filter(|d| !self.sets.contains_key(d))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemorySource;

    fn day(d: u32) -> TradingDay {
        TradingDay::from_ymd(2024, 5, d).unwrap()
    }

    #[test]
    fn test_window_dedups_and_sorts() {
        let window = SnapshotWindow::new(vec![day(3), day(1), day(2), day(1)]);
        assert_eq!(window.days(), &[day(1), day(2), day(3)]);
        assert_eq!(window.missing().len(), 3);
        assert_eq!(window.tail_days(2), &[day(2), day(3)]);
        assert_eq!(window.previous_day(day(2)), Some(day(1)));
        assert_eq!(window.previous_day(day(1)), None);
    }

    #[test]
    fn test_insert_ignores_empty_and_foreign_days() {
        let mut window = SnapshotWindow::new(vec![day(1), day(2)]);
        window.insert(DailySnapshots::new(day(1)));
        window.insert(DailySnapshots::new(day(9)));
        assert_eq!(window.missing(), &[day(1), day(2)]);
        assert!(window.get(day(9)).is_none());
    }

    #[tokio::test]
    async fn test_fetch_preserves_order_and_records_missing() {
        let source = InMemorySource::builder()
            .calendar((1..=6).map(day))
            .limit_up(day(1), ["A"])
            .limit_up(day(2), Vec::<String>::new())
            .limit_up(day(4), ["A", "B"])
            .failing_day(day(4))
            .build();

        let window = LimitUpWindow::fetch(&source, (1..=4).map(day).collect(), 2).await;
        assert_eq!(window.days(), &[day(1), day(2), day(3), day(4)]);
        assert_eq!(window.missing(), vec![day(3), day(4)]);
        assert!(window.get(day(2)).unwrap().is_empty());

        let snapshots = SnapshotWindow::fetch(&source, (1..=4).map(day).collect(), 3).await;
        assert_eq!(snapshots.missing().len(), 4);
    }
}
