//! Rolling market-health indicators.
//!
//! Every calculator is constructed from its configuration section and is a
//! pure function of the snapshots, limit-up sets or price histories passed
//! in. Days without a valid value are omitted from the resulting series.

mod concentration;
mod divergence;
mod new_high_low;
mod promotion;
mod quality;
mod technical;

pub use concentration::{ConcentrationIndexCalculator, ConcentrationReading, ConcentrationSeries};
pub use divergence::{DivergenceIndexCalculator, DivergenceReading, DivergenceSeries, RiskLevel};
pub use new_high_low::{Extreme, NewHighLowCount, NewHighLowSeries, NewHighLowTracker, PriceHistories};
pub use promotion::{PromotionCount, PromotionRateCalculator, PromotionSeries, PromotionTransition};
pub use quality::{FilterResult, FilterStage, QualityScreen, QualityScreener, QualityStockCandidate};
pub use technical::{
    MacdPoint, MacdSeries, SignalKind, TechnicalAnalysis, TechnicalIndicatorEngine, TechnicalSignal,
};
