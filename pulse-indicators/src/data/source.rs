//! Market data source abstraction.
//!
//! Defines the `MarketDataSource` trait the indicator engine consumes. Any
//! provider (remote API, local cache, in-memory fixture) implements it; the
//! engine never retries a failed call, it treats the affected day or
//! entity as missing.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use thiserror::Error;

use super::{DailySnapshots, PricePoint, TradingDay};

// ============================================================================
// Source Error
// ============================================================================

/// Errors reported by a market data source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded
    #[error("Rate limited{}", retry_suffix(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// Data not available for the requested day or entity
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Source is temporarily unavailable
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

fn retry_suffix(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs
        .map(|secs| format!(", retry after {} seconds", secs))
        .unwrap_or_default()
}

impl SourceError {
    /// Check if the error is transient (the caller may try again later)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }
}

// ============================================================================
// Market Data Source Trait
// ============================================================================

/// Contract between the indicator engine and whatever retrieves market data.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &str;

    /// Map a calendar date to the latest trading day on or before it.
    ///
    /// Returns `DataNotAvailable` when no such trading day exists.
    async fn resolve_trading_day(&self, date: NaiveDate) -> Result<TradingDay, SourceError>;

    /// The last `count` trading days ending at and including `date`, ascending.
    async fn list_recent_trading_days(
        &self,
        date: NaiveDate,
        count: usize,
    ) -> Result<Vec<TradingDay>, SourceError>;

    /// Snapshots of every entity the source knows for one day (may be partial).
    async fn daily_snapshots(&self, day: TradingDay) -> Result<DailySnapshots, SourceError>;

    /// Constituent stock ids of an industry.
    async fn industry_constituents(&self, industry_id: &str) -> Result<BTreeSet<String>, SourceError>;

    /// Ids of entities closing at the daily price limit.
    async fn limit_up_entities(&self, day: TradingDay) -> Result<BTreeSet<String>, SourceError>;

    /// Up to `window` closes ending at `end`, ascending by date.
    async fn price_history(
        &self,
        entity_id: &str,
        end: TradingDay,
        window: usize,
    ) -> Result<Vec<PricePoint>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_display() {
        assert_eq!(
            SourceError::RateLimited {
                retry_after_secs: Some(30)
            }
            .to_string(),
            "Rate limited, retry after 30 seconds"
        );
        assert_eq!(
            SourceError::RateLimited {
                retry_after_secs: None
            }
            .to_string(),
            "Rate limited"
        );
        assert_eq!(
            SourceError::DataNotAvailable("2024-01-01".into()).to_string(),
            "Data not available: 2024-01-01"
        );
    }

    #[test]
    fn test_source_error_recoverable() {
        assert!(SourceError::Network("timeout".into()).is_recoverable());
        assert!(SourceError::Unavailable("maintenance".into()).is_recoverable());
        assert!(!SourceError::DataNotAvailable("x".into()).is_recoverable());
        assert!(!SourceError::InvalidRequest("x".into()).is_recoverable());
    }
}
