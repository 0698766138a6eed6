//! Configuration management for the market pulse engine.
//!
//! The engine reads a single configuration file at `~/.market-pulse/config.json`,
//! optionally extended by an `indicators.json` file in the same directory.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables (PULSE_* prefix)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PULSE_LOG_LEVEL` → observability.log_level
//! - `PULSE_LOG_FORMAT` → observability.log_format
//! - `PULSE_MAX_CONCURRENT_REQUESTS` → source.max_concurrent_requests

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config_loader::load_modular_config;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".market-pulse"),
        |dirs| dirs.home_dir().join(".market-pulse"),
    )
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Market data source settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Indicator overrides (windows, counts, thresholds)
    #[serde(default)]
    pub indicators: IndicatorsConfig,
}

impl Config {
    /// Load configuration from the default directory.
    ///
    /// A missing directory or file yields the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from_dir(&config_dir())
    }

    /// Load configuration from a directory holding `config.json` and,
    /// optionally, `indicators.json`.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        if !dir.join("config.json").exists() && !dir.join("indicators.json").exists() {
            tracing::info!(dir = %dir.display(), "Config files not found, using defaults");
            return Ok(Self::default());
        }

        let value = load_modular_config(Some(dir.to_path_buf()))?;
        serde_json::from_value(value)
            .with_context(|| format!("Failed to parse config from {}", dir.display()))
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("PULSE_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.observability.log_level = level;
            }
        }
        if let Ok(format) = std::env::var("PULSE_LOG_FORMAT") {
            if !format.trim().is_empty() {
                self.observability.log_format = format;
            }
        }
        if let Ok(value) = std::env::var("PULSE_MAX_CONCURRENT_REQUESTS") {
            if let Ok(n) = value.parse() {
                self.source.max_concurrent_requests = n;
            }
        }
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets pinned to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Source Configuration
// ============================================================================

/// Settings for talking to the market data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Maximum number of per-day or per-entity requests in flight.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

fn default_max_concurrent_requests() -> usize {
    4
}

// ============================================================================
// Indicator Overrides
// ============================================================================

/// Optional overrides for indicator parameters.
///
/// Every field is optional; unset fields fall back to the defaults of the
/// indicator engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndicatorsConfig {
    /// Minimum number of valid days a rolling series needs before it is reported
    #[serde(default)]
    pub min_valid_days: Option<usize>,

    // === Capital flow ranking ===
    /// Number of entities in each capital flow ranking
    #[serde(default)]
    pub ranking_top_k: Option<usize>,

    /// Number of hot industries to cross-analyze
    #[serde(default)]
    pub hot_industry_count: Option<usize>,

    /// Number of constituent stocks ranked per industry
    #[serde(default)]
    pub stocks_per_industry: Option<usize>,

    // === Divergence index ===
    /// Number of top gainers examined each day
    #[serde(default)]
    pub divergence_gainer_count: Option<usize>,

    /// Rolling window length (trading days)
    #[serde(default)]
    pub divergence_window: Option<usize>,

    /// Index value at or above which a pullback warning is raised (%)
    #[serde(default)]
    pub divergence_warning_threshold: Option<f64>,

    /// Index value at or above which the risk level is medium (%)
    #[serde(default)]
    pub divergence_medium_threshold: Option<f64>,

    // === Concentration index ===
    /// Rolling window length (trading days)
    #[serde(default)]
    pub concentration_window: Option<usize>,

    /// Share of inflow-ranked stocks treated as the top group (%)
    #[serde(default)]
    pub concentration_top_percent: Option<f64>,

    // === Promotion rate ===
    /// Number of day-to-day transitions in the series
    #[serde(default)]
    pub promotion_window: Option<usize>,

    // === New highs / lows ===
    /// Lookback window for new highs and lows (trading days)
    #[serde(default)]
    pub new_high_lookback: Option<usize>,

    /// Minimum preceding closes a stock needs to be evaluated
    #[serde(default)]
    pub new_high_min_history: Option<usize>,

    /// Whether today's close belongs to the lookback window
    #[serde(default)]
    pub new_high_include_today: Option<bool>,

    /// Number of days in the new high/low count series
    #[serde(default)]
    pub new_high_series_window: Option<usize>,

    /// Market capitalization floor for the quality screen
    #[serde(default)]
    pub quality_market_cap_floor: Option<f64>,

    /// Moving average window of the uptrend test
    #[serde(default)]
    pub quality_trend_ma_window: Option<usize>,

    /// When set, the uptrend test requires a rising moving average over this
    /// many days instead of a close above it
    #[serde(default)]
    pub quality_trend_slope_days: Option<usize>,

    /// Bound on the standard deviation of daily returns
    #[serde(default)]
    pub quality_volatility_bound: Option<f64>,

    /// Bound on the standard deviation of the most recent daily returns
    #[serde(default)]
    pub quality_recent_volatility_bound: Option<f64>,

    /// Window over which the relative position is measured
    #[serde(default)]
    pub quality_position_window: Option<usize>,

    /// Relative position (0-1) a candidate must exceed
    #[serde(default)]
    pub quality_min_relative_position: Option<f64>,

    /// Relative position (0-1) a candidate must not exceed
    #[serde(default)]
    pub quality_max_relative_position: Option<f64>,

    // === Technical indicators ===
    /// MACD fast EMA period
    #[serde(default)]
    pub macd_fast: Option<usize>,

    /// MACD slow EMA period
    #[serde(default)]
    pub macd_slow: Option<usize>,

    /// MACD signal EMA period
    #[serde(default)]
    pub macd_signal: Option<usize>,

    /// Multiplier applied to the MACD histogram
    #[serde(default)]
    pub macd_histogram_multiplier: Option<f64>,

    /// RSI period
    #[serde(default)]
    pub rsi_period: Option<usize>,

    /// Periods of the displayed RSI lines
    #[serde(default)]
    pub rsi_periods: Option<Vec<usize>>,

    /// RSI level above which the market is overbought
    #[serde(default)]
    pub rsi_overbought: Option<f64>,

    /// RSI level below which the market is oversold
    #[serde(default)]
    pub rsi_oversold: Option<f64>,

    /// Entity (usually a broad index) the technical indicators run on
    #[serde(default)]
    pub technical_entity: Option<String>,

    /// Number of closes fetched for the technical indicators
    #[serde(default)]
    pub technical_history_days: Option<usize>,
}

// ============================================================================
// Tests
// ============================================================================
