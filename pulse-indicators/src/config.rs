//! Resolved configuration for every indicator.
//!
//! `pulse_common::IndicatorsConfig` carries optional overrides; this module
//! turns them into fully-populated, typed sections handed to each
//! calculator at construction.

use pulse_common::config::Config;
use serde::{Deserialize, Serialize};

use crate::error::{IndicatorError, Result};

// ============================================================================
// Sections
// ============================================================================

/// Capital flow ranking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Entities per ranking
    pub top_k: usize,
    /// Hot industries fed to the cross analysis
    pub hot_industry_count: usize,
    /// Constituent stocks ranked per industry
    pub stocks_per_industry: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            hot_industry_count: 3,
            stocks_per_industry: 10,
        }
    }
}

/// Divergence index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceConfig {
    /// Top gainers examined per day
    pub gainer_count: usize,
    /// Rolling window (trading days)
    pub window: usize,
    /// Pullback warning threshold (%)
    pub warning_threshold: f64,
    /// Medium risk threshold (%)
    pub medium_threshold: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            gainer_count: 50,
            window: 20,
            warning_threshold: 30.0,
            medium_threshold: 20.0,
        }
    }
}

/// Concentration index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationConfig {
    pub window: usize,
    /// Share of inflow-ranked stocks forming the top group (%)
    pub top_percent: f64,
}

impl Default for ConcentrationConfig {
    fn default() -> Self {
        Self {
            window: 20,
            top_percent: 10.0,
        }
    }
}

/// Promotion rate settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionConfig {
    /// Day-to-day transitions in the series
    pub window: usize,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self { window: 20 }
    }
}

/// Uptrend predicate of the quality screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrendTest {
    /// Today's close is above its own moving average
    CloseAboveMa { window: usize },
    /// The moving average has a positive least-squares slope over `slope_days`
    RisingMa { ma_window: usize, slope_days: usize },
}

impl TrendTest {
    /// Closes needed to evaluate the predicate.
    pub fn required_history(&self) -> usize {
        match *self {
            Self::CloseAboveMa { window } => window,
            Self::RisingMa {
                ma_window,
                slope_days,
            } => ma_window + slope_days - 1,
        }
    }
}

impl Default for TrendTest {
    fn default() -> Self {
        Self::CloseAboveMa { window: 20 }
    }
}

/// Quality criteria applied to new-high stocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScreenConfig {
    /// Minimum total market capitalization (yuan)
    pub market_cap_floor: f64,
    pub trend: TrendTest,
    /// Daily returns used for the volatility test
    pub volatility_window: usize,
    /// Upper bound (exclusive) for the standard deviation of daily returns
    pub volatility_bound: f64,
    pub recent_volatility_window: usize,
    pub recent_volatility_bound: f64,
    /// Closes spanning the high/low range for the relative position
    pub position_window: usize,
    /// Relative position (0-1) a candidate must exceed
    pub min_relative_position: f64,
    /// Relative position (0-1) a candidate must not exceed
    pub max_relative_position: Option<f64>,
}

impl Default for QualityScreenConfig {
    fn default() -> Self {
        Self {
            market_cap_floor: 1.5e10,
            trend: TrendTest::default(),
            volatility_window: 30,
            volatility_bound: 0.03,
            recent_volatility_window: 5,
            recent_volatility_bound: 0.02,
            position_window: 250,
            min_relative_position: 0.5,
            max_relative_position: None,
        }
    }
}

impl QualityScreenConfig {
    /// Closes needed to evaluate every criterion.
    pub fn required_history(&self) -> usize {
        self.trend
            .required_history()
            .max(self.volatility_window + 1)
            .max(self.recent_volatility_window + 1)
            .max(self.position_window)
    }
}

/// New high / new low settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHighLowConfig {
    /// Lookback window (trading days)
    pub lookback: usize,
    /// Minimum preceding closes for a stock to be evaluated
    pub min_history: usize,
    /// Whether today's close belongs to the lookback window
    pub include_today: bool,
    /// Days in the daily count series
    pub series_window: usize,
    pub quality: QualityScreenConfig,
}

impl Default for NewHighLowConfig {
    fn default() -> Self {
        Self {
            lookback: 30,
            min_history: 20,
            include_today: false,
            series_window: 30,
            quality: QualityScreenConfig::default(),
        }
    }
}

impl NewHighLowConfig {
    /// Preceding closes compared with today's close.
    pub fn comparison_span(&self) -> usize {
        if self.include_today {
            self.lookback.saturating_sub(1).max(1)
        } else {
            self.lookback
        }
    }

    /// Closes per stock needed for the series and the quality screen.
    pub fn required_history(&self) -> usize {
        (self.comparison_span() + self.series_window).max(self.quality.required_history())
    }
}

/// MACD and RSI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalConfig {
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Scale of the histogram; 2.0 gives the convention of domestic charting tools
    pub histogram_multiplier: f64,
    /// RSI period the top/bottom signals read
    pub rsi_period: usize,
    /// Periods of the displayed RSI lines
    pub rsi_periods: Vec<usize>,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// Entity the indicators run on
    pub entity_id: String,
    /// Closes fetched for the entity
    pub history_days: usize,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            histogram_multiplier: 1.0,
            rsi_period: 14,
            rsi_periods: vec![6, 12, 24],
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            entity_id: "000001.SH".into(),
            history_days: 120,
        }
    }
}

// ============================================================================
// Analysis Config
// ============================================================================

/// Fully-resolved configuration for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub ranking: RankingConfig,
    pub divergence: DivergenceConfig,
    pub concentration: ConcentrationConfig,
    pub promotion: PromotionConfig,
    pub new_high_low: NewHighLowConfig,
    pub technical: TechnicalConfig,
    /// Fewest valid points a rolling series needs to be reported
    pub min_valid_days: usize,
    /// Requests in flight against the data source
    pub max_concurrent_requests: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ranking: RankingConfig::default(),
            divergence: DivergenceConfig::default(),
            concentration: ConcentrationConfig::default(),
            promotion: PromotionConfig::default(),
            new_high_low: NewHighLowConfig::default(),
            technical: TechnicalConfig::default(),
            min_valid_days: 1,
            max_concurrent_requests: 4,
        }
    }
}

impl AnalysisConfig {
    /// Apply the overrides of the root configuration to the defaults.
    pub fn from_config(config: &Config) -> Self {
        let o = &config.indicators;
        let d = Self::default();

        let trend_window = o
            .quality_trend_ma_window
            .unwrap_or(match d.new_high_low.quality.trend {
                TrendTest::CloseAboveMa { window } => window,
                TrendTest::RisingMa { ma_window, .. } => ma_window,
            });
        let trend = match o.quality_trend_slope_days {
            Some(slope_days) => TrendTest::RisingMa {
                ma_window: trend_window,
                slope_days,
            },
            None => TrendTest::CloseAboveMa {
                window: trend_window,
            },
        };

        let quality = QualityScreenConfig {
            market_cap_floor: o
                .quality_market_cap_floor
                .unwrap_or(d.new_high_low.quality.market_cap_floor),
            trend,
            volatility_bound: o
                .quality_volatility_bound
                .unwrap_or(d.new_high_low.quality.volatility_bound),
            recent_volatility_bound: o
                .quality_recent_volatility_bound
                .unwrap_or(d.new_high_low.quality.recent_volatility_bound),
            position_window: o
                .quality_position_window
                .unwrap_or(d.new_high_low.quality.position_window),
            min_relative_position: o
                .quality_min_relative_position
                .unwrap_or(d.new_high_low.quality.min_relative_position),
            max_relative_position: o
                .quality_max_relative_position
                .or(d.new_high_low.quality.max_relative_position),
            ..d.new_high_low.quality.clone()
        };

        Self {
            ranking: RankingConfig {
                top_k: o.ranking_top_k.unwrap_or(d.ranking.top_k),
                hot_industry_count: o.hot_industry_count.unwrap_or(d.ranking.hot_industry_count),
                stocks_per_industry: o
                    .stocks_per_industry
                    .unwrap_or(d.ranking.stocks_per_industry),
            },
            divergence: DivergenceConfig {
                gainer_count: o
                    .divergence_gainer_count
                    .unwrap_or(d.divergence.gainer_count),
                window: o.divergence_window.unwrap_or(d.divergence.window),
                warning_threshold: o
                    .divergence_warning_threshold
                    .unwrap_or(d.divergence.warning_threshold),
                medium_threshold: o
                    .divergence_medium_threshold
                    .unwrap_or(d.divergence.medium_threshold),
            },
            concentration: ConcentrationConfig {
                window: o.concentration_window.unwrap_or(d.concentration.window),
                top_percent: o
                    .concentration_top_percent
                    .unwrap_or(d.concentration.top_percent),
            },
            promotion: PromotionConfig {
                window: o.promotion_window.unwrap_or(d.promotion.window),
            },
            new_high_low: NewHighLowConfig {
                lookback: o.new_high_lookback.unwrap_or(d.new_high_low.lookback),
                min_history: o.new_high_min_history.unwrap_or(d.new_high_low.min_history),
                include_today: o
                    .new_high_include_today
                    .unwrap_or(d.new_high_low.include_today),
                series_window: o
                    .new_high_series_window
                    .unwrap_or(d.new_high_low.series_window),
                quality,
            },
            technical: TechnicalConfig {
                macd_fast: o.macd_fast.unwrap_or(d.technical.macd_fast),
                macd_slow: o.macd_slow.unwrap_or(d.technical.macd_slow),
                macd_signal: o.macd_signal.unwrap_or(d.technical.macd_signal),
                histogram_multiplier: o
                    .macd_histogram_multiplier
                    .unwrap_or(d.technical.histogram_multiplier),
                rsi_period: o.rsi_period.unwrap_or(d.technical.rsi_period),
                rsi_periods: o
                    .rsi_periods
                    .clone()
                    .unwrap_or(d.technical.rsi_periods),
                rsi_overbought: o.rsi_overbought.unwrap_or(d.technical.rsi_overbought),
                rsi_oversold: o.rsi_oversold.unwrap_or(d.technical.rsi_oversold),
                entity_id: o
                    .technical_entity
                    .clone()
                    .unwrap_or(d.technical.entity_id),
                history_days: o
                    .technical_history_days
                    .unwrap_or(d.technical.history_days),
            },
            min_valid_days: o.min_valid_days.unwrap_or(d.min_valid_days),
            max_concurrent_requests: config.source.max_concurrent_requests,
        }
    }

    /// Reject parameters no calculator can work with.
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("ranking.top_k", self.ranking.top_k),
            ("ranking.stocks_per_industry", self.ranking.stocks_per_industry),
            ("divergence.gainer_count", self.divergence.gainer_count),
            ("divergence.window", self.divergence.window),
            ("concentration.window", self.concentration.window),
            ("promotion.window", self.promotion.window),
            ("new_high_low.lookback", self.new_high_low.lookback),
            ("new_high_low.series_window", self.new_high_low.series_window),
            ("quality.volatility_window", self.new_high_low.quality.volatility_window),
            (
                "quality.recent_volatility_window",
                self.new_high_low.quality.recent_volatility_window,
            ),
            ("quality.position_window", self.new_high_low.quality.position_window),
            ("technical.macd_fast", self.technical.macd_fast),
            ("technical.macd_signal", self.technical.macd_signal),
            ("technical.rsi_period", self.technical.rsi_period),
            ("technical.history_days", self.technical.history_days),
            ("min_valid_days", self.min_valid_days),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(IndicatorError::invalid_parameter(name, "must be at least 1"));
            }
        }

        if self.technical.rsi_periods.contains(&0) {
            return Err(IndicatorError::invalid_parameter(
                "technical.rsi_periods",
                "every period must be at least 1",
            ));
        }

        if !(self.concentration.top_percent > 0.0 && self.concentration.top_percent <= 100.0) {
            return Err(IndicatorError::invalid_parameter(
                "concentration.top_percent",
                format!("{} is outside (0, 100]", self.concentration.top_percent),
            ));
        }
        if self.technical.macd_fast >= self.technical.macd_slow {
            return Err(IndicatorError::invalid_parameter(
                "technical.macd_fast",
                "must be below technical.macd_slow",
            ));
        }
        match self.new_high_low.quality.trend {
            TrendTest::CloseAboveMa { window: 0 } | TrendTest::RisingMa { ma_window: 0, .. } => {
                return Err(IndicatorError::invalid_parameter(
                    "quality.trend",
                    "moving average window must be at least 1",
                ));
            }
            TrendTest::RisingMa { slope_days, .. } if slope_days < 2 => {
                return Err(IndicatorError::invalid_parameter(
                    "quality.trend",
                    "a slope needs at least 2 points",
                ));
            }
            _ => {}
        }
        if let Some(max) = self.new_high_low.quality.max_relative_position {
            if max < self.new_high_low.quality.min_relative_position {
                return Err(IndicatorError::invalid_parameter(
                    "quality.max_relative_position",
                    "must not be below min_relative_position",
                ));
            }
        }
        Ok(())
    }

    /// Trading days of snapshots the rolling calculators need.
    pub fn snapshot_window(&self) -> usize {
        self.divergence.window.max(self.concentration.window).max(2)
    }

    /// Trading days of limit-up sets the promotion rates need.
    pub fn limit_up_window(&self) -> usize {
        self.promotion.window + 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_common::config::IndicatorsConfig;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.divergence.gainer_count, 50);
        assert_eq!(config.divergence.warning_threshold, 30.0);
        assert_eq!(config.new_high_low.lookback, 30);
        assert_eq!(config.new_high_low.quality.market_cap_floor, 1.5e10);
        assert_eq!(config.technical.macd_slow, 26);
        assert_eq!(config.technical.rsi_periods, vec![6, 12, 24]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_config_applies_overrides() {
        let root = Config {
            indicators: IndicatorsConfig {
                divergence_window: Some(10),
                concentration_top_percent: Some(5.0),
                quality_trend_ma_window: Some(10),
                quality_trend_slope_days: Some(30),
                macd_histogram_multiplier: Some(2.0),
                rsi_periods: Some(vec![9]),
                ..Default::default()
            },
            ..Default::default()
        };

        let config = AnalysisConfig::from_config(&root);
        assert_eq!(config.divergence.window, 10);
        assert_eq!(config.divergence.gainer_count, 50);
        assert_eq!(config.concentration.top_percent, 5.0);
        assert_eq!(
            config.new_high_low.quality.trend,
            TrendTest::RisingMa {
                ma_window: 10,
                slope_days: 30
            }
        );
        assert_eq!(config.technical.histogram_multiplier, 2.0);
        assert_eq!(config.technical.rsi_periods, vec![9]);
        assert_eq!(config.technical.rsi_period, 14);
        assert_eq!(config.max_concurrent_requests, 4);
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = AnalysisConfig::default();
        config.promotion.window = 0;
        assert!(matches!(
            config.validate(),
            Err(IndicatorError::InvalidParameter { name, .. }) if name == "promotion.window"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_rsi_period() {
        let mut config = AnalysisConfig::default();
        config.technical.rsi_periods = vec![6, 0];
        assert!(matches!(
            config.validate(),
            Err(IndicatorError::InvalidParameter { name, .. }) if name == "technical.rsi_periods"
        ));
    }

    #[test]
    fn test_required_history() {
        let config = NewHighLowConfig::default();
        assert_eq!(config.comparison_span(), 30);
        assert_eq!(config.required_history(), 250);

        let trend = TrendTest::RisingMa {
            ma_window: 20,
            slope_days: 30,
        };
        assert_eq!(trend.required_history(), 49);
    }

    #[test]
    fn test_include_today_shrinks_span() {
        let config = NewHighLowConfig {
            include_today: true,
            ..Default::default()
        };
        assert_eq!(config.comparison_span(), 29);
    }
}
