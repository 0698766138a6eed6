//! Capital flow analysis: single-day rankings, industry cross analysis and
//! market breadth.

mod breadth;
mod cross;
mod ranker;

pub use breadth::{BreadthCounts, MarketBreadth};
pub use cross::{CrossAnalysis, IndustryFailure, IndustryStockCrossAnalyzer, IndustryStockRanking};
pub use ranker::CapitalFlowRanker;
