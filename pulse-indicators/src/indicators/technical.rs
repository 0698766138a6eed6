//! MACD and RSI on a single price series, plus the signals derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::TechnicalConfig;
use crate::data::{PricePoint, TradingDay};
use crate::error::{IndicatorError, Result};
use crate::series::{IndicatorSeries, OmitReason};

// ============================================================================
// Moving Averages
// ============================================================================

/// Exponential moving average seeded with the first value.
#[derive(Debug, Clone)]
struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    fn new(period: usize) -> Self {
        Self {
            alpha: 2.0 / (period as f64 + 1.0),
            value: None,
        }
    }

    fn next(&mut self, input: f64) -> f64 {
        let value = match self.value {
            Some(prev) => self.alpha * input + (1.0 - self.alpha) * prev,
            None => input,
        };
        self.value = Some(value);
        value
    }
}

/// Wilder's smoothed average gain and loss.
#[derive(Debug, Clone)]
struct WilderRsi {
    period: usize,
    prev_close: Option<f64>,
    seed_gain: f64,
    seed_loss: f64,
    seen: usize,
    avg: Option<(f64, f64)>,
}

impl WilderRsi {
    fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            seed_gain: 0.0,
            seed_loss: 0.0,
            seen: 0,
            avg: None,
        }
    }

    /// Feed a close. Returns the RSI once `period` changes have been seen;
    /// `Err` while warming up or when there was no movement at all.
    fn next(&mut self, close: f64) -> std::result::Result<f64, OmitReason> {
        let Some(prev) = self.prev_close.replace(close) else {
            return Err(OmitReason::InsufficientData);
        };
        let change = close - prev;
        let (gain, loss) = (change.max(0.0), (-change).max(0.0));
        let n = self.period as f64;

        let (avg_gain, avg_loss) = match self.avg {
            Some((g, l)) => ((g * (n - 1.0) + gain) / n, (l * (n - 1.0) + loss) / n),
            None => {
                self.seed_gain += gain;
                self.seed_loss += loss;
                self.seen += 1;
                if self.seen < self.period {
                    return Err(OmitReason::InsufficientData);
                }
                (self.seed_gain / n, self.seed_loss / n)
            }
        };
        self.avg = Some((avg_gain, avg_loss));

        if avg_loss == 0.0 {
            return if avg_gain > 0.0 {
                Ok(100.0)
            } else {
                Err(OmitReason::ZeroDenominator)
            };
        }
        Ok(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdPoint {
    pub date: TradingDay,
    /// Fast EMA minus slow EMA (DIF)
    pub macd: f64,
    /// EMA of the MACD line (DEA)
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdSeries {
    pub macd: IndicatorSeries,
    pub signal: IndicatorSeries,
    pub histogram: IndicatorSeries,
    pub points: Vec<MacdPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    GoldenCross,
    DeathCross,
    Overbought,
    Oversold,
    /// MACD and RSI both call a top
    Top,
    /// MACD and RSI both call a bottom
    Bottom,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoldenCross => write!(f, "MACD金叉"),
            Self::DeathCross => write!(f, "MACD死叉"),
            Self::Overbought => write!(f, "RSI超买"),
            Self::Oversold => write!(f, "RSI超卖"),
            Self::Top => write!(f, "潜在顶部"),
            Self::Bottom => write!(f, "潜在底部"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSignal {
    pub date: TradingDay,
    pub kind: SignalKind,
}

/// MACD, RSI and signals for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAnalysis {
    pub entity_id: String,
    pub macd: MacdSeries,
    /// RSI over `rsi_period`, the one the signals read
    pub rsi: IndicatorSeries,
    /// RSI over each of `rsi_periods`
    pub rsi_lines: Vec<IndicatorSeries>,
    pub signals: Vec<TechnicalSignal>,
}

impl TechnicalAnalysis {
    /// Top and bottom calls only.
    pub fn turning_points(&self) -> Vec<&TechnicalSignal> {
        self.signals
            .iter()
            .filter(|s| matches!(s.kind, SignalKind::Top | SignalKind::Bottom))
            .collect()
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct TechnicalIndicatorEngine {
    config: TechnicalConfig,
}

impl TechnicalIndicatorEngine {
    pub fn new(config: TechnicalConfig) -> Self {
        Self { config }
    }

    /// MACD over `prices`; the first `macd_slow` points are omitted while
    /// the slow EMA settles.
    pub fn macd(&self, prices: &[PricePoint]) -> MacdSeries {
        let days: Vec<TradingDay> = prices.iter().map(|p| p.date).collect();
        let mut result = MacdSeries {
            macd: IndicatorSeries::new("DIF", days.clone()),
            signal: IndicatorSeries::new("DEA", days.clone()),
            histogram: IndicatorSeries::new("MACD", days),
            points: Vec::new(),
        };

        let mut fast = Ema::new(self.config.macd_fast);
        let mut slow = Ema::new(self.config.macd_slow);
        let mut signal = Ema::new(self.config.macd_signal);

        for (i, price) in prices.iter().enumerate() {
            let macd = fast.next(price.close) - slow.next(price.close);
            let signal_value = signal.next(macd);
            if i < self.config.macd_slow {
                for series in [&mut result.macd, &mut result.signal, &mut result.histogram] {
                    series.omit(price.date, OmitReason::InsufficientData);
                }
                continue;
            }

            let histogram = (macd - signal_value) * self.config.histogram_multiplier;
            result.macd.push(price.date, macd);
            result.signal.push(price.date, signal_value);
            result.histogram.push(price.date, histogram);
            result.points.push(MacdPoint {
                date: price.date,
                macd,
                signal: signal_value,
                histogram,
            });
        }
        result
    }

    /// Wilder RSI over `prices` with the signal period.
    pub fn rsi(&self, prices: &[PricePoint]) -> IndicatorSeries {
        self.rsi_with_period(prices, self.config.rsi_period)
    }

    /// Wilder RSI over `prices`; the first point is at index `period`.
    pub fn rsi_with_period(&self, prices: &[PricePoint], period: usize) -> IndicatorSeries {
        let days: Vec<TradingDay> = prices.iter().map(|p| p.date).collect();
        let mut series = IndicatorSeries::new(format!("RSI{}", period), days);
        let mut rsi = WilderRsi::new(period);
        for price in prices {
            series.record(price.date, rsi.next(price.close));
        }
        series
    }

    /// One RSI series per configured period.
    pub fn rsi_lines(&self, prices: &[PricePoint]) -> Vec<IndicatorSeries> {
        self.config
            .rsi_periods
            .iter()
            .map(|&period| self.rsi_with_period(prices, period))
            .collect()
    }

    /// Crosses, RSI zones and combined top/bottom calls.
    ///
    /// A MACD bottom is a golden cross below the zero axis with a rising
    /// histogram; an RSI bottom is a reading below oversold that rose from
    /// the previous day. A bottom is called when both agree on the same day.
    /// Tops mirror this.
    pub fn signals(&self, macd: &MacdSeries, rsi: &IndicatorSeries) -> Vec<TechnicalSignal> {
        let mut signals = Vec::new();

        for pair in macd.points.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            let golden = prev.macd <= prev.signal && cur.macd > cur.signal;
            let death = prev.macd >= prev.signal && cur.macd < cur.signal;
            let histogram_rising = cur.histogram > prev.histogram;

            let rsi_now = rsi.value_on(cur.date);
            let rsi_prev = rsi.value_on(prev.date);
            let rsi_bottom = matches!((rsi_now, rsi_prev), (Some(now), Some(before)) if now < self.config.rsi_oversold && now > before);
            let rsi_top = matches!((rsi_now, rsi_prev), (Some(now), Some(before)) if now > self.config.rsi_overbought && now < before);

            if golden {
                signals.push(TechnicalSignal {
                    date: cur.date,
                    kind: SignalKind::GoldenCross,
                });
                if cur.macd < 0.0 && histogram_rising && rsi_bottom {
                    signals.push(TechnicalSignal {
                        date: cur.date,
                        kind: SignalKind::Bottom,
                    });
                }
            }
            if death {
                signals.push(TechnicalSignal {
                    date: cur.date,
                    kind: SignalKind::DeathCross,
                });
                if cur.macd > 0.0 && cur.histogram < prev.histogram && rsi_top {
                    signals.push(TechnicalSignal {
                        date: cur.date,
                        kind: SignalKind::Top,
                    });
                }
            }
        }

        for point in &rsi.points {
            let kind = if point.value > self.config.rsi_overbought {
                SignalKind::Overbought
            } else if point.value < self.config.rsi_oversold {
                SignalKind::Oversold
            } else {
                continue;
            };
            signals.push(TechnicalSignal {
                date: point.date,
                kind,
            });
        }

        signals.sort_by_key(|s| s.date);
        signals
    }

    /// Full analysis of one entity's closes.
    pub fn analyze(&self, entity_id: &str, prices: &[PricePoint]) -> Result<TechnicalAnalysis> {
        if prices.len() <= self.config.macd_slow.max(self.config.rsi_period) {
            return Err(IndicatorError::InsufficientData(format!(
                "{} closes for {}, need more than {}",
                prices.len(),
                entity_id,
                self.config.macd_slow.max(self.config.rsi_period)
            )));
        }

        let macd = self.macd(prices);
        let rsi = self.rsi(prices);
        let rsi_lines = self.rsi_lines(prices);
        let signals = self.signals(&macd, &rsi);

        tracing::info!(
            entity = entity_id,
            points = macd.points.len(),
            signals = signals.len(),
            "Technical indicators computed"
        );

        Ok(TechnicalAnalysis {
            entity_id: entity_id.to_string(),
            macd,
            rsi,
            rsi_lines,
            signals,
        })
    }
}
