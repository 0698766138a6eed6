//! Core market data types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use crate::error::{IndicatorError, Result};

// ============================================================================
// Trading Day
// ============================================================================

/// A calendar date confirmed to be a market trading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradingDay(NaiveDate);

impl TradingDay {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Build from year/month/day, `None` if the date does not exist.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for TradingDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for TradingDay {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

// ============================================================================
// Entity Snapshot
// ============================================================================

/// Kind of entity a snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Stock,
    Industry,
    Index,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stock => write!(f, "个股"),
            Self::Industry => write!(f, "行业"),
            Self::Index => write!(f, "指数"),
        }
    }
}

/// Raw, unvalidated snapshot fields as delivered by a data source.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SnapshotRecord {
    /// Entity code (e.g., "600000.SH", "BK0475")
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: EntityKind,
    /// Net capital inflow (yuan)
    #[serde(default)]
    pub net_inflow: Option<f64>,
    /// Traded value (yuan)
    #[serde(default)]
    pub turnover: Option<f64>,
    /// Price change (%)
    pub pct_change: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
    /// Total market capitalization (yuan)
    #[serde(default)]
    pub market_cap: Option<f64>,
}

/// One entity on one trading day.
///
/// Constructed only through validation, immutable afterwards. Capital-flow
/// fields are optional because providers do not report them for every
/// entity; a missing value is never read as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRecord")]
pub struct EntitySnapshot {
    id: String,
    name: String,
    kind: EntityKind,
    net_inflow: Option<f64>,
    turnover: Option<f64>,
    pct_change: f64,
    close: f64,
    volume: f64,
    market_cap: Option<f64>,
}

fn check_finite(id: &str, field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(IndicatorError::InvalidSnapshot {
            id: id.to_string(),
            reason: format!("{} is not a finite number", field),
        })
    }
}

impl TryFrom<SnapshotRecord> for EntitySnapshot {
    type Error = IndicatorError;

    fn try_from(record: SnapshotRecord) -> Result<Self> {
        let id = record.id.trim().to_string();
        if id.is_empty() {
            return Err(IndicatorError::InvalidSnapshot {
                id: record.id,
                reason: "empty identifier".into(),
            });
        }

        check_finite(&id, "pct_change", record.pct_change)?;
        check_finite(&id, "close", record.close)?;
        check_finite(&id, "volume", record.volume)?;
        for (field, value) in [
            ("net_inflow", record.net_inflow),
            ("turnover", record.turnover),
            ("market_cap", record.market_cap),
        ] {
            if let Some(v) = value {
                check_finite(&id, field, v)?;
            }
        }

        if record.close <= 0.0 {
            return Err(IndicatorError::InvalidSnapshot {
                id,
                reason: format!("close must be positive, got {}", record.close),
            });
        }
        if record.volume < 0.0 {
            return Err(IndicatorError::InvalidSnapshot {
                id,
                reason: format!("volume must not be negative, got {}", record.volume),
            });
        }
        if matches!(record.market_cap, Some(cap) if cap < 0.0) {
            return Err(IndicatorError::InvalidSnapshot {
                id,
                reason: "market_cap must not be negative".into(),
            });
        }

        let name = if record.name.trim().is_empty() {
            id.clone()
        } else {
            record.name
        };

        Ok(Self {
            id,
            name,
            kind: record.kind,
            net_inflow: record.net_inflow,
            turnover: record.turnover,
            pct_change: record.pct_change,
            close: record.close,
            volume: record.volume,
            market_cap: record.market_cap,
        })
    }
}

impl EntitySnapshot {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn net_inflow(&self) -> Option<f64> {
        self.net_inflow
    }

    pub fn turnover(&self) -> Option<f64> {
        self.turnover
    }

    pub fn pct_change(&self) -> f64 {
        self.pct_change
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn market_cap(&self) -> Option<f64> {
        self.market_cap
    }

    /// Net inflow as a percentage of turnover, `None` when turnover ≤ 0 or
    /// either input is missing.
    pub fn inflow_rate(&self) -> Option<f64> {
        match (self.net_inflow, self.turnover) {
            (Some(flow), Some(turnover)) if turnover > 0.0 => Some(flow / turnover * 100.0),
            _ => None,
        }
    }
}

// ============================================================================
// Daily Snapshots
// ============================================================================

/// Every snapshot retrieved for one trading day, keyed by entity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshots {
    day: TradingDay,
    entities: BTreeMap<String, EntitySnapshot>,
}

impl DailySnapshots {
    pub fn new(day: TradingDay) -> Self {
        Self {
            day,
            entities: BTreeMap::new(),
        }
    }

    /// Build from validated snapshots; later duplicates replace earlier ones.
    pub fn from_snapshots(day: TradingDay, snapshots: impl IntoIterator<Item = EntitySnapshot>) -> Self {
        let mut daily = Self::new(day);
        for snapshot in snapshots {
            daily.insert(snapshot);
        }
        daily
    }

    /// Build from raw records, validating each one.
    pub fn from_records(day: TradingDay, records: impl IntoIterator<Item = SnapshotRecord>) -> Result<Self> {
        let snapshots = records
            .into_iter()
            .map(EntitySnapshot::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_snapshots(day, snapshots))
    }

    pub fn insert(&mut self, snapshot: EntitySnapshot) {
        self.entities.insert(snapshot.id.clone(), snapshot);
    }

    pub fn day(&self) -> TradingDay {
        self.day
    }

    pub fn get(&self, id: &str) -> Option<&EntitySnapshot> {
        self.entities.get(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All snapshots in ascending id order.
    pub fn iter(&self) -> btree_map::Values<'_, String, EntitySnapshot> {
        self.entities.values()
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &EntitySnapshot> {
        self.entities.values().filter(move |s| s.kind == kind)
    }

    pub fn stocks(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.of_kind(EntityKind::Stock)
    }

    pub fn industries(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.of_kind(EntityKind::Industry)
    }
}

// ============================================================================
// Price History
// ============================================================================

/// One close of an entity's daily price history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: TradingDay,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: TradingDay, close: f64) -> Self {
        Self { date, close }
    }
}
