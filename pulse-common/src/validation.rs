//! Configuration validation.
//!
//! Checks that configured values are present and within valid ranges before
//! the indicator engine is built from them.

use thiserror::Error;

use crate::config::{Config, IndicatorsConfig, ObservabilityConfig, SourceConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }
        if let Err(e) = self.source.validate() {
            errors.push(e);
        }
        if let Err(e) = self.indicators.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for SourceConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.max_concurrent_requests == 0 {
            return Err(ValidationError::InvalidValue {
                field: "source.max_concurrent_requests".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn positive_window(value: Option<usize>, field: &str) -> ValidationResult<()> {
    match value {
        Some(0) => Err(ValidationError::InvalidValue {
            field: format!("indicators.{}", field),
            reason: "must be at least 1".into(),
        }),
        _ => Ok(()),
    }
}

fn unit_interval(value: Option<f64>, field: &str) -> ValidationResult<()> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(ValidationError::InvalidValue {
            field: format!("indicators.{}", field),
            reason: format!("{} is outside [0, 1]", v),
        }),
        _ => Ok(()),
    }
}

fn non_negative(value: Option<f64>, field: &str) -> ValidationResult<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ValidationError::InvalidValue {
            field: format!("indicators.{}", field),
            reason: format!("{} must be a non-negative number", v),
        }),
        _ => Ok(()),
    }
}

impl Validate for IndicatorsConfig {
    fn validate(&self) -> ValidationResult<()> {
        let windows = [
            (self.min_valid_days, "min_valid_days"),
            (self.ranking_top_k, "ranking_top_k"),
            (self.hot_industry_count, "hot_industry_count"),
            (self.stocks_per_industry, "stocks_per_industry"),
            (self.divergence_gainer_count, "divergence_gainer_count"),
            (self.divergence_window, "divergence_window"),
            (self.concentration_window, "concentration_window"),
            (self.promotion_window, "promotion_window"),
            (self.new_high_lookback, "new_high_lookback"),
            (self.new_high_series_window, "new_high_series_window"),
            (self.quality_trend_ma_window, "quality_trend_ma_window"),
            (self.quality_position_window, "quality_position_window"),
            (self.macd_fast, "macd_fast"),
            (self.macd_slow, "macd_slow"),
            (self.macd_signal, "macd_signal"),
            (self.rsi_period, "rsi_period"),
            (self.technical_history_days, "technical_history_days"),
        ];
        for (value, field) in windows {
            positive_window(value, field)?;
        }

        if let Some(periods) = &self.rsi_periods {
            if periods.contains(&0) {
                return Err(ValidationError::InvalidValue {
                    field: "indicators.rsi_periods".into(),
                    reason: "every period must be at least 1".into(),
                });
            }
        }

        if let Some(pct) = self.concentration_top_percent {
            if !(pct > 0.0 && pct <= 100.0) {
                return Err(ValidationError::InvalidValue {
                    field: "indicators.concentration_top_percent".into(),
                    reason: format!("{} is outside (0, 100]", pct),
                });
            }
        }

        non_negative(self.divergence_warning_threshold, "divergence_warning_threshold")?;
        non_negative(self.divergence_medium_threshold, "divergence_medium_threshold")?;
        non_negative(self.quality_market_cap_floor, "quality_market_cap_floor")?;
        non_negative(self.rsi_overbought, "rsi_overbought")?;
        non_negative(self.rsi_oversold, "rsi_oversold")?;
        if let Some(days) = self.quality_trend_slope_days {
            if days < 2 {
                return Err(ValidationError::InvalidValue {
                    field: "indicators.quality_trend_slope_days".into(),
                    reason: "a slope needs at least 2 points".into(),
                });
            }
        }
        non_negative(self.quality_volatility_bound, "quality_volatility_bound")?;
        non_negative(
            self.quality_recent_volatility_bound,
            "quality_recent_volatility_bound",
        )?;
        unit_interval(
            self.quality_min_relative_position,
            "quality_min_relative_position",
        )?;
        unit_interval(
            self.quality_max_relative_position,
            "quality_max_relative_position",
        )?;

        if let (Some(medium), Some(warning)) = (
            self.divergence_medium_threshold,
            self.divergence_warning_threshold,
        ) {
            if medium > warning {
                return Err(ValidationError::Conflict {
                    reason: format!(
                        "divergence_medium_threshold {} exceeds divergence_warning_threshold {}",
                        medium, warning
                    ),
                });
            }
        }

        if let (Some(min), Some(max)) = (
            self.quality_min_relative_position,
            self.quality_max_relative_position,
        ) {
            if min > max {
                return Err(ValidationError::Conflict {
                    reason: format!(
                        "quality_min_relative_position {} exceeds quality_max_relative_position {}",
                        min, max
                    ),
                });
            }
        }

        if let (Some(oversold), Some(overbought)) = (self.rsi_oversold, self.rsi_overbought) {
            if oversold >= overbought {
                return Err(ValidationError::Conflict {
                    reason: format!(
                        "rsi_oversold {} must be below rsi_overbought {}",
                        oversold, overbought
                    ),
                });
            }
        }

        if let (Some(fast), Some(slow)) = (self.macd_fast, self.macd_slow) {
            if fast >= slow {
                return Err(ValidationError::Conflict {
                    reason: format!("macd_fast {} must be below macd_slow {}", fast, slow),
                });
            }
        }

        Ok(())
    }
}
