//! Error types for the indicator engine.

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::SourceError;

/// Result type alias for indicator operations.
pub type Result<T> = std::result::Result<T, IndicatorError>;

/// Errors raised by the indicator engine.
///
/// Degenerate denominators are never errors: ratio helpers return `None`
/// and the affected point is omitted from its series.
#[derive(Debug, Error)]
pub enum IndicatorError {
    /// The requested date does not resolve to any trading day
    #[error("Invalid date {date}: {reason}")]
    InvalidDate { date: NaiveDate, reason: String },

    /// A snapshot set is empty or below the minimum a computation needs
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// An industry code cannot be resolved to any constituent stock
    #[error("Cannot resolve constituents of industry {industry}: {reason}")]
    ConstituentResolution { industry: String, reason: String },

    /// A snapshot record failed constructor validation
    #[error("Invalid snapshot {id}: {reason}")]
    InvalidSnapshot { id: String, reason: String },

    /// A configuration parameter makes no sense (zero window, inverted bounds)
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The market data source failed
    #[error("Data source error: {0}")]
    Source(#[from] SourceError),
}

impl IndicatorError {
    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the whole run must stop on this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidDate { .. } | Self::InvalidParameter { .. })
    }
}
