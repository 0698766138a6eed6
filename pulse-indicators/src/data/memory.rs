//! In-memory market data source.
//!
//! Holds a trading calendar and pre-loaded snapshots in memory. Used by the
//! binary (loaded from a JSON fixture) and by tests, where individual days
//! can be marked as failing to exercise the missing-day path.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::{
    DailySnapshots, EntitySnapshot, MarketDataSource, PricePoint, SnapshotRecord, SourceError,
    TradingDay,
};
use crate::calendar::TradingCalendar;
use crate::error::Result;

// ============================================================================
// Fixture Format
// ============================================================================

/// Serialized form of an in-memory source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketFixture {
    /// Open trading sessions
    pub calendar: Vec<TradingDay>,
    /// Snapshot records per trading day
    #[serde(default)]
    pub snapshots: BTreeMap<TradingDay, Vec<SnapshotRecord>>,
    /// Industry id → constituent stock ids
    #[serde(default)]
    pub constituents: BTreeMap<String, Vec<String>>,
    /// Limit-up entity ids per trading day
    #[serde(default)]
    pub limit_up: BTreeMap<TradingDay, Vec<String>>,
    /// Explicit price histories; entities without one use their snapshot closes
    #[serde(default)]
    pub price_history: BTreeMap<String, Vec<PricePoint>>,
    /// Days whose snapshot retrieval fails
    #[serde(default)]
    pub failing_days: Vec<TradingDay>,
}

// ============================================================================
// In-Memory Source
// ============================================================================

/// Market data source backed by in-memory maps.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    calendar: TradingCalendar,
    snapshots: BTreeMap<TradingDay, DailySnapshots>,
    constituents: BTreeMap<String, BTreeSet<String>>,
    limit_up: BTreeMap<TradingDay, BTreeSet<String>>,
    price_history: BTreeMap<String, Vec<PricePoint>>,
    failing_days: BTreeSet<TradingDay>,
}

impl InMemorySource {
    pub fn builder() -> InMemorySourceBuilder {
        InMemorySourceBuilder::default()
    }

    /// Build from a deserialized fixture, validating every snapshot record.
    pub fn from_fixture(fixture: MarketFixture) -> Result<Self> {
        let mut builder = Self::builder().calendar(fixture.calendar);

        for (day, records) in fixture.snapshots {
            builder = builder.day(DailySnapshots::from_records(day, records)?);
        }
        for (industry, members) in fixture.constituents {
            builder = builder.constituents(industry, members);
        }
        for (day, ids) in fixture.limit_up {
            builder = builder.limit_up(day, ids);
        }
        for (id, history) in fixture.price_history {
            builder = builder.price_history(id, history);
        }
        for day in fixture.failing_days {
            builder = builder.failing_day(day);
        }

        Ok(builder.build())
    }

    /// Load a JSON fixture file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        let fixture: MarketFixture = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))?;

        let source = Self::from_fixture(fixture)?;
        tracing::info!(
            path = %path.display(),
            trading_days = source.calendar.len(),
            snapshot_days = source.snapshots.len(),
            "Loaded market fixture"
        );
        Ok(source)
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    /// Closes of an entity taken from the stored snapshots.
    fn snapshot_closes(&self, entity_id: &str, end: TradingDay) -> Vec<PricePoint> {
        self.snapshots
            .range(..=end)
            .filter(|(day, _)| !self.failing_days.contains(day))
            .filter_map(|(day, daily)| {
                daily
                    .get(entity_id)
                    .map(|s| PricePoint::new(*day, s.close()))
            })
            .collect()
    }
}

#[async_trait]
impl MarketDataSource for InMemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn resolve_trading_day(&self, date: NaiveDate) -> std::result::Result<TradingDay, SourceError> {
        self.calendar
            .resolve(date)
            .ok_or_else(|| SourceError::DataNotAvailable(format!("no trading day on or before {}", date)))
    }

    async fn list_recent_trading_days(
        &self,
        date: NaiveDate,
        count: usize,
    ) -> std::result::Result<Vec<TradingDay>, SourceError> {
        Ok(self.calendar.recent_days(date, count))
    }

    async fn daily_snapshots(&self, day: TradingDay) -> std::result::Result<DailySnapshots, SourceError> {
        if self.failing_days.contains(&day) {
            return Err(SourceError::Unavailable(format!("snapshots for {} failed", day)));
        }
        self.snapshots
            .get(&day)
            .cloned()
            .ok_or_else(|| SourceError::DataNotAvailable(format!("no snapshots for {}", day)))
    }

    async fn industry_constituents(
        &self,
        industry_id: &str,
    ) -> std::result::Result<BTreeSet<String>, SourceError> {
        self.constituents
            .get(industry_id)
            .cloned()
            .ok_or_else(|| SourceError::DataNotAvailable(format!("unknown industry {}", industry_id)))
    }

    async fn limit_up_entities(&self, day: TradingDay) -> std::result::Result<BTreeSet<String>, SourceError> {
        if self.failing_days.contains(&day) {
            return Err(SourceError::Unavailable(format!("limit-up list for {} failed", day)));
        }
        self.limit_up
            .get(&day)
            .cloned()
            .ok_or_else(|| SourceError::DataNotAvailable(format!("no limit-up list for {}", day)))
    }

    async fn price_history(
        &self,
        entity_id: &str,
        end: TradingDay,
        window: usize,
    ) -> std::result::Result<Vec<PricePoint>, SourceError> {
        let mut history: Vec<PricePoint> = match self.price_history.get(entity_id) {
            Some(points) => points.iter().filter(|p| p.date <= end).copied().collect(),
            None => self.snapshot_closes(entity_id, end),
        };

        if history.is_empty() {
            return Err(SourceError::DataNotAvailable(format!(
                "no price history for {}",
                entity_id
            )));
        }

        if history.len() > window {
            history.drain(..history.len() - window);
        }
        Ok(history)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`InMemorySource`].
#[derive(Debug, Default)]
pub struct InMemorySourceBuilder {
    source: InMemorySource,
}

impl InMemorySourceBuilder {
    /// Add trading days to the calendar.
    pub fn calendar(mut self, days: impl IntoIterator<Item = TradingDay>) -> Self {
        let mut all: Vec<TradingDay> = self.source.calendar.iter().collect();
        all.extend(days);
        self.source.calendar = TradingCalendar::new(all);
        self
    }

    /// Add a day of snapshots; the day also joins the calendar.
    pub fn day(mut self, daily: DailySnapshots) -> Self {
        let day = daily.day();
        self.source.snapshots.insert(day, daily);
        self.calendar([day])
    }

    /// Add validated snapshots for one day.
    pub fn snapshots(self, day: TradingDay, snapshots: impl IntoIterator<Item = EntitySnapshot>) -> Self {
        self.day(DailySnapshots::from_snapshots(day, snapshots))
    }

    pub fn constituents<I, S>(mut self, industry: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source
            .constituents
            .insert(industry.into(), members.into_iter().map(Into::into).collect());
        self
    }

    pub fn limit_up<I, S>(mut self, day: TradingDay, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source
            .limit_up
            .insert(day, ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn price_history(mut self, entity_id: impl Into<String>, mut history: Vec<PricePoint>) -> Self {
        history.sort_by_key(|p| p.date);
        self.source.price_history.insert(entity_id.into(), history);
        self
    }

    /// Make snapshot and limit-up retrieval fail for `day`.
    pub fn failing_day(mut self, day: TradingDay) -> Self {
        self.source.failing_days.insert(day);
        self
    }

    pub fn build(self) -> InMemorySource {
        self.source
    }
}
