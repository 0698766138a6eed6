//! Market Pulse Indicators
//!
//! Daily and rolling market-health indicators for A-shares, computed from
//! per-entity capital-flow and price snapshots.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────────────┐
//! │  Calendar    │──▶│  Data windows    │──▶│  Flow / Indicators   │
//! │  Resolver    │   │  (per-day fetch) │   │  (pure calculators)  │
//! └──────────────┘   └──────────────────┘   └──────────┬───────────┘
//!                                                      ▼
//!                                           ┌──────────────────────┐
//!                                           │  MarketHealthReport  │
//!                                           │  → chart payloads    │
//!                                           └──────────────────────┘
//! ```
//!
//! # Indicators
//!
//! - **Capital flow**: net inflow and inflow-rate rankings, hot industries
//!   and their top constituent stocks, market breadth
//! - **Divergence**: share of top gainers with net outflow
//! - **Concentration**: share of net inflow captured by the top decile
//! - **Promotion rate**: limit-up persistence across consecutive days
//! - **New highs/lows**: N-day breakouts and a quality screen of new highs
//! - **Technical**: MACD and RSI with cross and zone signals
//!
//! # Missing Data
//! A day whose data cannot be retrieved, or whose ratio has no valid
//! denominator, is omitted from its series. It is never reported as zero.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod calendar;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod flow;
pub mod indicators;
pub mod payload;
pub mod report;
pub mod series;

pub use calendar::{TradingCalendar, TradingCalendarResolver};
pub use config::AnalysisConfig;
pub use data::{InMemorySource, MarketDataSource, SourceError, TradingDay};
pub use engine::MarketPulseEngine;
pub use error::{IndicatorError, Result};
pub use report::{AnalysisFailure, AnalysisKind, MarketHealthReport};
pub use series::{IndicatorSeries, RankingResult, TimeSeriesPoint};
