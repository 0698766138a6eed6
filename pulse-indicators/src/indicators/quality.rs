//! Quality screen for new-high stocks.
//!
//! Implements a multi-stage funnel:
//! 1. New high: the day's new-high stocks
//! 2. Market cap: total market capitalization at or above the floor
//! 3. Trend: the configured moving-average test
//! 4. Volatility: standard deviation of daily returns within bound, over
//!    both the long and the recent window
//! 5. Relative position: today's close within the high/low range of the
//!    position window

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::new_high_low::{NewHighLowCount, PriceHistories};
use crate::config::{QualityScreenConfig, TrendTest};
use crate::data::{DailySnapshots, EntitySnapshot, PricePoint, TradingDay};

// ============================================================================
// Filter Stage
// ============================================================================

/// Funnel stage identifier for tracking where stocks are eliminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStage {
    /// Stocks evaluated for a new high
    NewHigh,
    /// Market capitalization floor
    MarketCap,
    /// Uptrend confirmation
    Trend,
    /// Realized volatility bounds
    Volatility,
    /// Position within the high/low range
    RelativePosition,
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewHigh => write!(f, "创新高"),
            Self::MarketCap => write!(f, "市值筛选"),
            Self::Trend => write!(f, "趋势筛选"),
            Self::Volatility => write!(f, "波动率筛选"),
            Self::RelativePosition => write!(f, "相对位置筛选"),
        }
    }
}

/// Result of one funnel stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub stage: FilterStage,
    /// Number of stocks that passed this stage
    pub passed: usize,
    /// Number of stocks eliminated at this stage
    pub eliminated: usize,
    /// Elimination rate (%)
    pub elimination_rate: f64,
}

impl FilterResult {
    pub fn new(stage: FilterStage, input_count: usize, passed_count: usize) -> Self {
        let eliminated = input_count.saturating_sub(passed_count);
        let elimination_rate = if input_count > 0 {
            (eliminated as f64 / input_count as f64) * 100.0
        } else {
            0.0
        };

        Self {
            stage,
            passed: passed_count,
            eliminated,
            elimination_rate,
        }
    }
}

// ============================================================================
// Candidate
// ============================================================================

/// A new-high stock with every screening criterion evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityStockCandidate {
    pub snapshot: EntitySnapshot,
    pub market_cap_ok: bool,
    pub uptrend: bool,
    /// Std dev of daily returns over the volatility window
    pub volatility: Option<f64>,
    /// Std dev of daily returns over the recent window
    pub recent_volatility: Option<f64>,
    pub volatility_ok: bool,
    /// (close − low) / (high − low) over the position window, in [0, 1]
    pub relative_position: Option<f64>,
    pub position_ok: bool,
    pub passed: bool,
}

impl QualityStockCandidate {
    pub fn id(&self) -> &str {
        self.snapshot.id()
    }
}

/// Outcome of screening one day's new highs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScreen {
    pub date: TradingDay,
    /// Stocks passing every criterion, best relative position first
    pub passed: Vec<QualityStockCandidate>,
    /// Every evaluated new-high stock, by id
    pub candidates: Vec<QualityStockCandidate>,
    pub funnel: Vec<FilterResult>,
}

impl QualityScreen {
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("优质新高筛选 {}", self.date)];
        for stage in &self.funnel {
            lines.push(format!(
                "  {}: 通过 {} 淘汰 {} ({:.1}%)",
                stage.stage, stage.passed, stage.eliminated, stage.elimination_rate
            ));
        }
        lines.join("\n")
    }
}

// ============================================================================
// Screener
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct QualityScreener {
    config: QualityScreenConfig,
}

impl QualityScreener {
    pub fn new(config: QualityScreenConfig) -> Self {
        Self { config }
    }

    /// Evaluate one stock given its closes up to and including the day.
    pub fn evaluate(&self, snapshot: &EntitySnapshot, closes: &[f64]) -> QualityStockCandidate {
        let market_cap_ok = snapshot
            .market_cap()
            .is_some_and(|cap| cap >= self.config.market_cap_floor);
        let uptrend = self.uptrend(closes);

        let volatility = return_volatility(closes, self.config.volatility_window);
        let recent_volatility = return_volatility(closes, self.config.recent_volatility_window);
        let volatility_ok = volatility.is_some_and(|v| v < self.config.volatility_bound)
            && recent_volatility.is_some_and(|v| v < self.config.recent_volatility_bound);

        let relative_position = relative_position(closes, self.config.position_window);
        let position_ok = relative_position.is_some_and(|p| {
            p > self.config.min_relative_position
                && self.config.max_relative_position.map_or(true, |max| p <= max)
        });

        QualityStockCandidate {
            snapshot: snapshot.clone(),
            market_cap_ok,
            uptrend,
            volatility,
            recent_volatility,
            volatility_ok,
            relative_position,
            position_ok,
            passed: market_cap_ok && uptrend && volatility_ok && position_ok,
        }
    }

    fn uptrend(&self, closes: &[f64]) -> bool {
        let Some(&close) = closes.last() else {
            return false;
        };
        match self.config.trend {
            TrendTest::CloseAboveMa { window } => {
                moving_average(closes, window).is_some_and(|ma| close > ma)
            }
            TrendTest::RisingMa {
                ma_window,
                slope_days,
            } => {
                if closes.len() < ma_window + slope_days - 1 {
                    return false;
                }
                let start = closes.len() - slope_days;
                let averages: Vec<f64> = (start..closes.len())
                    .filter_map(|end| moving_average(&closes[..=end], ma_window))
                    .collect();
                least_squares_slope(&averages).is_some_and(|slope| slope > 0.0)
            }
        }
    }

    /// Screen the new-high stocks of `count`.
    pub fn screen(&self, day: &DailySnapshots, histories: &PriceHistories, count: &NewHighLowCount) -> QualityScreen {
        let mut candidates = Vec::new();
        for id in &count.new_high_ids {
            let Some(snapshot) = day.get(id) else {
                tracing::debug!(id = %id, day = %day.day(), "New-high stock has no snapshot, not screened");
                continue;
            };
            let closes = histories
                .get(id)
                .map(|h| closes_until(h, day.day()))
                .unwrap_or_default();
            candidates.push(self.evaluate(snapshot, &closes));
        }

        let mut funnel = vec![FilterResult::new(FilterStage::NewHigh, count.evaluated, candidates.len())];
        let mut remaining: Vec<&QualityStockCandidate> = candidates.iter().collect();
        let stages: [(FilterStage, fn(&QualityStockCandidate) -> bool); 4] = [
            (FilterStage::MarketCap, |c| c.market_cap_ok),
            (FilterStage::Trend, |c| c.uptrend),
            (FilterStage::Volatility, |c| c.volatility_ok),
            (FilterStage::RelativePosition, |c| c.position_ok),
        ];
        for (stage, keep) in stages {
            let input = remaining.len();
            remaining.retain(|c| keep(c));
            funnel.push(FilterResult::new(stage, input, remaining.len()));
        }

        let mut passed: Vec<QualityStockCandidate> = remaining.into_iter().cloned().collect();
        passed.sort_by(|a, b| {
            let pa = a.relative_position.unwrap_or(f64::NEG_INFINITY);
            let pb = b.relative_position.unwrap_or(f64::NEG_INFINITY);
            pb.total_cmp(&pa).then_with(|| a.id().cmp(b.id()))
        });

        tracing::info!(
            day = %day.day(),
            new_highs = candidates.len(),
            passed = passed.len(),
            "Quality screen completed"
        );

        QualityScreen {
            date: day.day(),
            passed,
            candidates,
            funnel,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Closes dated on or before `day`; empty unless the last one is on `day`.
fn closes_until(history: &[PricePoint], day: TradingDay) -> Vec<f64> {
    let closes: Vec<&PricePoint> = history.iter().filter(|p| p.date <= day).collect();
    match closes.last() {
        Some(last) if last.date == day => closes.iter().map(|p| p.close).collect(),
        _ => Vec::new(),
    }
}

/// Mean of the last `window` closes, `None` without a full window.
fn moving_average(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    Some(closes[closes.len() - window..].iter().mean())
}

/// Sample std dev of the daily returns among the last `window + 1` closes.
///
/// Uses whatever shorter history exists, down to two returns.
fn return_volatility(closes: &[f64], window: usize) -> Option<f64> {
    let tail = &closes[closes.len().saturating_sub(window + 1)..];
    let returns: Vec<f64> = tail
        .windows(2)
        .filter(|pair| pair[0] > 0.0)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return None;
    }
    let std = returns.iter().std_dev();
    std.is_finite().then_some(std)
}

/// Position of the last close within the high/low range of the last
/// `window` closes. `None` for a flat range.
fn relative_position(closes: &[f64], window: usize) -> Option<f64> {
    let close = *closes.last()?;
    let tail = &closes[closes.len().saturating_sub(window)..];
    let high = tail.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low = tail.iter().copied().fold(f64::INFINITY, f64::min);
    let range = high - low;
    (range > 0.0).then(|| (close - low) / range)
}

fn least_squares_slope(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().mean();
    let (num, den) = values.iter().enumerate().fold((0.0, 0.0), |(num, den), (i, y)| {
        let dx = i as f64 - mean_x;
        (num + dx * (y - mean_y), den + dx * dx)
    });
    Some(num / den)
}
