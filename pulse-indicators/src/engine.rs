//! Analysis engine.
//!
//! Orchestrates one run for a requested date:
//! 1. Resolve the date to a trading day (fatal on failure)
//! 2. Retrieve snapshot and limit-up windows with bounded concurrency
//! 3. Rank capital flows and cross-analyze the hot industries
//! 4. Compute the rolling indicators
//! 5. Count new highs/lows and screen the new-high stocks
//! 6. Run the technical indicators on the configured entity
//!
//! Every analysis after step 1 fails on its own: the failure is logged and
//! recorded in the report, and the run continues.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use pulse_common::logging::generate_run_id;

use crate::calendar::TradingCalendarResolver;
use crate::config::AnalysisConfig;
use crate::data::{LimitUpWindow, MarketDataSource, SnapshotWindow, TradingDay};
use crate::error::{IndicatorError, Result};
use crate::flow::{CapitalFlowRanker, IndustryStockCrossAnalyzer, MarketBreadth};
use crate::indicators::{
    ConcentrationIndexCalculator, DivergenceIndexCalculator, NewHighLowTracker, PriceHistories,
    PromotionRateCalculator, TechnicalIndicatorEngine,
};
use crate::report::{AnalysisKind, MarketHealthReport};

/// Runs every analysis against one data source.
pub struct MarketPulseEngine {
    source: Arc<dyn MarketDataSource>,
    config: AnalysisConfig,
    ranker: CapitalFlowRanker,
    cross: IndustryStockCrossAnalyzer,
    divergence: DivergenceIndexCalculator,
    concentration: ConcentrationIndexCalculator,
    promotion: PromotionRateCalculator,
    new_high_low: NewHighLowTracker,
    technical: TechnicalIndicatorEngine,
}

impl MarketPulseEngine {
    /// Create an engine; rejects configurations no calculator can use.
    pub fn new(source: Arc<dyn MarketDataSource>, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;

        let ranker = CapitalFlowRanker::new(config.ranking.clone());
        let cross = IndustryStockCrossAnalyzer::new(ranker.clone(), config.max_concurrent_requests);

        Ok(Self {
            source,
            ranker,
            cross,
            divergence: DivergenceIndexCalculator::new(config.divergence.clone()),
            concentration: ConcentrationIndexCalculator::new(config.concentration.clone()),
            promotion: PromotionRateCalculator::new(config.promotion.clone()),
            new_high_low: NewHighLowTracker::new(config.new_high_low.clone()),
            technical: TechnicalIndicatorEngine::new(config.technical.clone()),
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run every analysis for `date`.
    ///
    /// Only an unresolvable date fails the run.
    pub async fn run(&self, date: NaiveDate) -> Result<MarketHealthReport> {
        let started = Instant::now();
        let run_id = generate_run_id();
        let source = self.source.as_ref();

        tracing::info!(run_id = %run_id, date = %date, source = source.name(), "Starting market health analysis");

        let resolver = TradingCalendarResolver::new(source);
        let day = resolver.resolve(date).await?;
        if day.date() != date {
            tracing::info!(requested = %date, resolved = %day, "Requested date resolved to earlier trading day");
        }

        let mut report = MarketHealthReport::new(run_id.clone(), date, day);

        let span = self
            .config
            .snapshot_window()
            .max(self.config.limit_up_window())
            .max(self.config.new_high_low.series_window);
        let calendar = match resolver.recent_days(day, span).await {
            Ok(days) => days,
            Err(e) => {
                tracing::warn!(day = %day, error = %e, "Trading day window unavailable, analysing the resolved day only");
                vec![day]
            }
        };

        // Phase 1: retrieval
        let snapshots = SnapshotWindow::fetch(
            source,
            tail(&calendar, self.config.snapshot_window()),
            self.config.max_concurrent_requests,
        )
        .await;
        let limit_up = LimitUpWindow::fetch(
            source,
            tail(&calendar, self.config.limit_up_window()),
            self.config.max_concurrent_requests,
        )
        .await;
        tracing::info!(
            snapshot_days = snapshots.days().len(),
            snapshot_missing = snapshots.missing().len(),
            limit_up_missing = limit_up.missing().len(),
            "Phase 1 (retrieval) complete"
        );

        // Phase 2: single-day flow analysis
        self.analyze_flows(&mut report, &snapshots, day).await;

        // Phase 3: rolling indicators
        let min_days = self.config.min_valid_days;

        let divergence = self.divergence.compute_series(&snapshots, min_days);
        if divergence.series.is_empty() {
            report.record_failure(AnalysisKind::Divergence, "no valid day in window");
        }
        report.divergence = Some(divergence);

        let concentration = self.concentration.compute_series(&snapshots, min_days);
        if concentration.series.is_empty() {
            report.record_failure(AnalysisKind::Concentration, "no valid day in window");
        }
        report.concentration = Some(concentration);

        let promotion = self.promotion.compute_series(&limit_up, min_days);
        if promotion.overall.is_empty() {
            report.record_failure(AnalysisKind::Promotion, "no valid transition in window");
        }
        report.promotion = Some(promotion);

        tracing::info!("Phase 3 (rolling indicators) complete");

        // Phase 4: new highs/lows and quality screen
        self.analyze_new_highs(&mut report, &snapshots, &calendar, day).await;

        // Phase 5: technical indicators
        let entity = &self.config.technical.entity_id;
        let analysis = source
            .price_history(entity, day, self.config.technical.history_days)
            .await
            .map_err(IndicatorError::from)
            .and_then(|prices| self.technical.analyze(entity, &prices));
        match analysis {
            Ok(technical) => report.technical = Some(technical),
            Err(e) => report.record_failure(AnalysisKind::Technical, e),
        }

        tracing::info!(
            run_id = %run_id,
            day = %day,
            failures = report.failures.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Market health analysis complete"
        );

        Ok(report)
    }

    async fn analyze_flows(&self, report: &mut MarketHealthReport, snapshots: &SnapshotWindow, day: TradingDay) {
        let Some(today) = snapshots.get(day) else {
            for kind in [
                AnalysisKind::Breadth,
                AnalysisKind::StockRanking,
                AnalysisKind::IndustryRanking,
                AnalysisKind::CrossAnalysis,
            ] {
                report.record_failure(kind, format!("no snapshots for {}", day));
            }
            return;
        };

        let previous = snapshots
            .previous_day(day)
            .and_then(|prev| snapshots.get(prev));
        match MarketBreadth::compute(today, previous) {
            Ok(breadth) => report.breadth = Some(breadth),
            Err(e) => report.record_failure(AnalysisKind::Breadth, e),
        }

        match self.ranker.rank_stocks(today) {
            Ok(ranking) => report.stock_ranking = Some(ranking),
            Err(e) => report.record_failure(AnalysisKind::StockRanking, e),
        }
        if let Ok(ranking) = self.ranker.rank_stocks_by_rate(today) {
            report.stock_rate_ranking = Some(ranking);
        }

        match self.ranker.rank_industries(today) {
            Ok(ranking) => report.industry_ranking = Some(ranking),
            Err(e) => report.record_failure(AnalysisKind::IndustryRanking, e),
        }

        match self.ranker.hot_industries(today) {
            Ok(hot) if !hot.is_empty() => {
                tracing::debug!(industries = ?hot, "Hot industries selected");
                report.cross = Some(self.cross.analyze(self.source.as_ref(), &hot, today).await);
            }
            Ok(_) => report.record_failure(AnalysisKind::CrossAnalysis, "no industry with net inflow"),
            Err(e) => report.record_failure(AnalysisKind::CrossAnalysis, e),
        }

        tracing::info!("Phase 2 (capital flow) complete");
    }

    async fn analyze_new_highs(
        &self,
        report: &mut MarketHealthReport,
        snapshots: &SnapshotWindow,
        calendar: &[TradingDay],
        day: TradingDay,
    ) {
        let Some(today) = snapshots.get(day) else {
            report.record_failure(AnalysisKind::NewHighLow, format!("no snapshots for {}", day));
            report.record_failure(AnalysisKind::QualityScreen, format!("no snapshots for {}", day));
            return;
        };

        let ids: Vec<String> = today.stocks().map(|s| s.id().to_string()).collect();
        let histories = self
            .price_histories(ids, day, self.new_high_low.config().required_history())
            .await;

        let series = self.new_high_low.compute_series(
            &histories,
            &tail(calendar, self.config.new_high_low.series_window),
            self.config.min_valid_days,
        );
        if series.highs.is_empty() {
            report.record_failure(AnalysisKind::NewHighLow, "no stock with enough history");
        }
        report.new_high_low = Some(series);

        let count = self.new_high_low.count_new_highs_lows(&histories, day);
        if count.evaluated == 0 {
            report.record_failure(AnalysisKind::QualityScreen, "no stock with enough history");
        } else {
            report.quality_screen = Some(self.new_high_low.screen_quality_new_highs(today, &histories, &count));
        }

        tracing::info!(
            stocks = histories.len(),
            new_highs = count.new_highs,
            new_lows = count.new_lows,
            "Phase 4 (new highs/lows) complete"
        );
    }

    /// Closes for every id, fetched with bounded concurrency. Failed
    /// lookups are left out.
    async fn price_histories(&self, ids: Vec<String>, day: TradingDay, window: usize) -> PriceHistories {
        let source = self.source.as_ref();
        let results: Vec<_> = stream::iter(ids.into_iter().map(|id| async move {
            let history = source.price_history(&id, day, window).await;
            (id, history)
        }))
        .buffered(self.config.max_concurrent_requests.max(1))
        .collect()
        .await;

        let mut histories = PriceHistories::new();
        for (id, result) in results {
            match result {
                Ok(history) if !history.is_empty() => {
                    histories.insert(id, history);
                }
                Ok(_) => tracing::debug!(id = %id, "Empty price history"),
                Err(e) => tracing::warn!(id = %id, error = %e, "Price history unavailable"),
            }
        }
        histories
    }
}

/// The last `count` days of `days`.
fn tail(days: &[TradingDay], count: usize) -> Vec<TradingDay> {
    days[days.len().saturating_sub(count)..].to_vec()
}
