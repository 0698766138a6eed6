//! End-to-end tests of the analysis engine over an in-memory market.
//!
//! The synthetic market has 60 stocks, 4 industries and an index over 25
//! consecutive trading days:
//! - stock `Snn` gains `(50 - nn) × 0.2` percent every day, so S00..S49 are gainers
//! - S00..S14 have net outflow, the rest inflow growing with `nn`
//! - even stocks climb steadily, odd stocks fall steadily
//! - S00..S04 are large caps, the rest small caps
//! - the limit-up set alternates between {S00,S01,S02} and {S01,S02,S03}

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use pulse_indicators::config::{AnalysisConfig, NewHighLowConfig, QualityScreenConfig, TrendTest};
use pulse_indicators::data::{
    DailySnapshots, EntityKind, InMemorySource, InMemorySourceBuilder, MarketDataSource, PricePoint,
    SnapshotRecord, SourceError, TradingDay,
};
use pulse_indicators::series::OmitReason;
use pulse_indicators::{AnalysisKind, IndicatorError, MarketPulseEngine};

// ============================================================================
// Fixture
// ============================================================================

const DAYS: i64 = 25;
const STOCKS: usize = 60;

fn date(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, 2).unwrap() + chrono::Duration::days(offset)
}

fn day(offset: i64) -> TradingDay {
    TradingDay::new(date(offset))
}

fn stock_id(i: usize) -> String {
    format!("S{:02}", i)
}

fn stock_record(i: usize, d: i64) -> SnapshotRecord {
    let close = if i % 2 == 0 {
        10.0 + d as f64 * 0.1
    } else {
        20.0 - d as f64 * 0.1
    };
    let net_inflow = if i < 15 { -1.0e7 } else { 1.0e7 * (i + 1) as f64 };
    SnapshotRecord {
        id: stock_id(i),
        name: format!("股票{:02}", i),
        kind: EntityKind::Stock,
        net_inflow: Some(net_inflow),
        turnover: Some(1.0e9),
        pct_change: (50.0 - i as f64) * 0.2,
        close,
        volume: 1.0e6,
        market_cap: Some(if i < 5 { 5.0e10 } else { 1.0e9 }),
    }
}

fn industry_record(id: &str, name: &str, net_inflow: f64) -> SnapshotRecord {
    SnapshotRecord {
        id: id.into(),
        name: name.into(),
        kind: EntityKind::Industry,
        net_inflow: Some(net_inflow),
        turnover: Some(5.0e10),
        pct_change: 1.0,
        close: 1000.0,
        ..Default::default()
    }
}

fn market() -> InMemorySourceBuilder {
    let mut builder = InMemorySource::builder();

    for d in 0..DAYS {
        let mut records: Vec<SnapshotRecord> = (0..STOCKS).map(|i| stock_record(i, d)).collect();
        records.push(industry_record("BK01", "半导体", 3.0e9));
        records.push(industry_record("BK02", "银行", 2.0e9));
        records.push(industry_record("BK03", "电力", 1.0e9));
        records.push(industry_record("BK04", "地产", -1.0e9));
        builder = builder.day(DailySnapshots::from_records(day(d), records).unwrap());

        let limit_up = if d % 2 == 0 {
            ["S00", "S01", "S02"]
        } else {
            ["S01", "S02", "S03"]
        };
        builder = builder.limit_up(day(d), limit_up);
    }

    // BK03 has no constituent list
    builder = builder
        .constituents("BK01", (0..10).map(stock_id))
        .constituents("BK02", (10..20).map(stock_id))
        .constituents("BK04", (20..30).map(stock_id));

    let index_history: Vec<PricePoint> = (0..60)
        .map(|i| {
            let d = TradingDay::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() + chrono::Duration::days(i));
            PricePoint::new(d, 3000.0 + 100.0 * (i as f64 * 0.2).sin())
        })
        .collect();
    builder.price_history("000001.SH", index_history)
}

fn config() -> AnalysisConfig {
    AnalysisConfig {
        new_high_low: NewHighLowConfig {
            lookback: 10,
            min_history: 10,
            include_today: false,
            series_window: 5,
            quality: QualityScreenConfig {
                trend: TrendTest::CloseAboveMa { window: 5 },
                volatility_window: 10,
                recent_volatility_window: 5,
                position_window: 20,
                ..Default::default()
            },
        },
        ..Default::default()
    }
}

fn engine(source: InMemorySource) -> MarketPulseEngine {
    MarketPulseEngine::new(Arc::new(source), config()).unwrap()
}

// ============================================================================
// Full Run
// ============================================================================

#[tokio::test]
async fn test_full_run_on_healthy_market() {
    let engine = engine(market().build());
    let report = engine.run(date(DAYS - 1)).await.unwrap();

    assert_eq!(report.trading_day, day(DAYS - 1));
    assert!(report.failures.is_empty(), "unexpected failures: {:?}", report.failures);

    let breadth = report.breadth.as_ref().unwrap();
    assert_eq!(breadth.today.advancing, 50);
    assert_eq!(breadth.today.flat, 1);
    assert_eq!(breadth.today.declining, 9);
    assert_eq!(breadth.advancing_change(), Some(0));

    let stocks = report.stock_ranking.as_ref().unwrap();
    assert_eq!(stocks.ids()[..3], ["S59", "S58", "S57"]);
    let industries = report.industry_ranking.as_ref().unwrap();
    assert_eq!(industries.ids(), vec!["BK01", "BK02", "BK03", "BK04"]);

    let divergence = report.divergence.as_ref().unwrap();
    assert_eq!(divergence.series.len(), 20);
    assert!(divergence.series.points.iter().all(|p| p.value == 30.0));
    assert!(divergence.latest().unwrap().warning);

    let concentration = report.concentration.as_ref().unwrap();
    assert_eq!(concentration.series.len(), 20);
    let expected = 345.0 * 100.0 / 1710.0;
    for point in &concentration.series.points {
        assert!((point.value - expected).abs() < 1e-9);
        assert!((0.0..=100.0).contains(&point.value));
    }

    let promotion = report.promotion.as_ref().unwrap();
    assert_eq!(promotion.overall.len(), 20);
    for point in &promotion.overall.points {
        assert!((point.value - 200.0 / 3.0).abs() < 1e-9);
    }

    let technical = report.technical.as_ref().unwrap();
    assert_eq!(technical.entity_id, "000001.SH");
    assert_eq!(technical.macd.points.len(), 60 - 26);
    assert_eq!(technical.rsi_lines.len(), 3);

    let charts = report.charts();
    let rsi = charts.lines.iter().find(|l| l.title == "000001.SH RSI").unwrap();
    assert_eq!(rsi.series.len(), 4);
    let highs_lows = charts.lines.iter().find(|l| l.title == "新高新低数量").unwrap();
    assert_eq!(highs_lows.series.len(), 3);
}

#[tokio::test]
async fn test_cross_analysis_reports_failed_industry() {
    let engine = engine(market().build());
    let report = engine.run(date(DAYS - 1)).await.unwrap();

    let cross = report.cross.as_ref().unwrap();
    assert_eq!(cross.industries.len(), 2);
    assert_eq!(cross.failed.len(), 1);
    assert_eq!(cross.failed[0].industry_id, "BK03");

    let semis = cross.get("BK01").unwrap();
    assert_eq!(semis.constituent_count, 10);
    assert_eq!(semis.ranking.len(), 10);
    // S00..S09 all carry the same outflow; ties resolve by id
    assert_eq!(semis.ranking.ids()[0], "S00");

    let banks = cross.get("BK02").unwrap();
    assert_eq!(banks.ranking.ids()[0], "S19");
}

#[tokio::test]
async fn test_new_highs_and_quality_screen() {
    let engine = engine(market().build());
    let report = engine.run(date(DAYS - 1)).await.unwrap();

    let series = report.new_high_low.as_ref().unwrap();
    assert_eq!(series.highs.len(), 5);
    let latest = series.latest().unwrap();
    assert_eq!(latest.new_highs, 30);
    assert_eq!(latest.new_lows, 30);
    assert_eq!(series.net.value_on(day(DAYS - 1)), Some(0.0));

    let screen = report.quality_screen.as_ref().unwrap();
    let passed: Vec<&str> = screen.passed.iter().map(|c| c.id()).collect();
    assert_eq!(passed, vec!["S00", "S02", "S04"]);
    assert_eq!(screen.candidates.len(), 30);

    // Small caps are new highs but fail the market-cap floor only
    let small = screen.candidates.iter().find(|c| c.id() == "S06").unwrap();
    assert!(!small.market_cap_ok);
    assert!(small.uptrend && small.volatility_ok && small.position_ok);
    assert!(latest.new_high_ids.contains(&"S06".to_string()));
}

#[tokio::test]
async fn test_weekend_resolves_to_previous_trading_day() {
    // Two days past the last session
    let engine = engine(market().build());
    let report = engine.run(date(DAYS + 1)).await.unwrap();

    assert_eq!(report.requested_date, date(DAYS + 1));
    assert_eq!(report.trading_day, day(DAYS - 1));
}

// ============================================================================
// Missing Data
// ============================================================================

#[tokio::test]
async fn test_missing_day_is_omitted_not_zero() {
    let missing = day(DAYS - 5);
    let engine = engine(market().failing_day(missing).build());
    let report = engine.run(date(DAYS - 1)).await.unwrap();

    let divergence = report.divergence.as_ref().unwrap();
    assert_eq!(divergence.series.days.len(), 20);
    assert_eq!(divergence.series.len(), 19);
    assert!(divergence.series.value_on(missing).is_none());
    assert_eq!(divergence.series.omitted[0].date, missing);
    assert_eq!(divergence.series.omitted[0].reason, OmitReason::MissingData);
    assert!(divergence.series.points.iter().all(|p| p.value != 0.0));

    let concentration = report.concentration.as_ref().unwrap();
    assert_eq!(concentration.series.len(), 19);

    // Both transitions touching the missing day are lost
    let promotion = report.promotion.as_ref().unwrap();
    assert_eq!(promotion.overall.len(), 18);

    let line = report
        .charts()
        .lines
        .into_iter()
        .find(|l| l.title == "量价背离指数")
        .unwrap();
    assert!(line.series[0].points.contains(&(missing, None)));
}

#[tokio::test]
async fn test_rolling_series_stay_within_window() {
    let engine = engine(market().build());
    let report = engine.run(date(DAYS - 1)).await.unwrap();
    let window: BTreeSet<TradingDay> = (DAYS - 20..DAYS).map(day).collect();

    for series in [
        &report.divergence.as_ref().unwrap().series,
        &report.concentration.as_ref().unwrap().series,
        &report.promotion.as_ref().unwrap().overall,
    ] {
        assert!(series.len() <= 20, "{} too long", series.name);
        assert!(series.points.iter().all(|p| window.contains(&p.date)));
        assert!(series.points.windows(2).all(|w| w[0].date < w[1].date));
    }
}

#[tokio::test]
async fn test_min_valid_days_suppresses_sparse_series() {
    let mut builder = market();
    for d in 0..DAYS - 3 {
        builder = builder.failing_day(day(d));
    }
    let mut config = config();
    config.min_valid_days = 5;
    let engine = MarketPulseEngine::new(Arc::new(builder.build()), config).unwrap();

    let report = engine.run(date(DAYS - 1)).await.unwrap();
    let divergence = report.divergence.as_ref().unwrap();
    assert!(divergence.series.is_empty());
    assert!(divergence
        .series
        .omitted
        .iter()
        .any(|o| o.reason == OmitReason::BelowMinimumDays));
    assert!(report.failed(AnalysisKind::Divergence));
}

#[tokio::test]
async fn test_runs_are_idempotent() {
    let engine = engine(market().failing_day(day(10)).build());
    let first = engine.run(date(DAYS - 1)).await.unwrap();
    let second = engine.run(date(DAYS - 1)).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.stock_ranking, second.stock_ranking);
    assert_eq!(first.cross, second.cross);
    assert_eq!(first.divergence, second.divergence);
    assert_eq!(first.concentration, second.concentration);
    assert_eq!(first.promotion, second.promotion);
    assert_eq!(first.new_high_low, second.new_high_low);
    assert_eq!(first.quality_screen, second.quality_screen);
    assert_eq!(first.technical, second.technical);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_invalid_date_is_fatal() {
    let engine = engine(market().build());
    let err = engine.run(date(-10)).await.unwrap_err();

    assert!(matches!(err, IndicatorError::InvalidDate { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = config();
    config.divergence.window = 0;
    let result = MarketPulseEngine::new(Arc::new(market().build()), config);
    assert!(matches!(result, Err(IndicatorError::InvalidParameter { .. })));
}

/// Source whose calendar works but whose market data is down.
struct OutageSource {
    inner: InMemorySource,
}

#[async_trait]
impl MarketDataSource for OutageSource {
    fn name(&self) -> &str {
        "outage"
    }

    async fn resolve_trading_day(&self, date: NaiveDate) -> Result<TradingDay, SourceError> {
        self.inner.resolve_trading_day(date).await
    }

    async fn list_recent_trading_days(&self, date: NaiveDate, count: usize) -> Result<Vec<TradingDay>, SourceError> {
        self.inner.list_recent_trading_days(date, count).await
    }

    async fn daily_snapshots(&self, _day: TradingDay) -> Result<DailySnapshots, SourceError> {
        Err(SourceError::Network("connection reset".into()))
    }

    async fn industry_constituents(&self, _industry_id: &str) -> Result<BTreeSet<String>, SourceError> {
        Err(SourceError::Network("connection reset".into()))
    }

    async fn limit_up_entities(&self, _day: TradingDay) -> Result<BTreeSet<String>, SourceError> {
        Err(SourceError::RateLimited {
            retry_after_secs: Some(60),
        })
    }

    async fn price_history(
        &self,
        _entity_id: &str,
        _end: TradingDay,
        _window: usize,
    ) -> Result<Vec<PricePoint>, SourceError> {
        Err(SourceError::Unavailable("maintenance".into()))
    }
}

#[tokio::test]
async fn test_outage_degrades_without_failing_run() {
    let source = OutageSource {
        inner: market().build(),
    };
    let engine = MarketPulseEngine::new(Arc::new(source), config()).unwrap();
    let report = engine.run(date(DAYS - 1)).await.unwrap();

    assert!(report.breadth.is_none());
    assert!(report.cross.is_none());
    assert!(report.technical.is_none());
    for kind in [
        AnalysisKind::Breadth,
        AnalysisKind::StockRanking,
        AnalysisKind::CrossAnalysis,
        AnalysisKind::Divergence,
        AnalysisKind::Concentration,
        AnalysisKind::Promotion,
        AnalysisKind::NewHighLow,
        AnalysisKind::Technical,
    ] {
        assert!(report.failed(kind), "{} should be recorded as failed", kind);
    }

    // Rolling series keep their axis and report every day as missing
    let divergence = report.divergence.as_ref().unwrap();
    assert_eq!(divergence.series.days.len(), 20);
    assert!(divergence
        .series
        .omitted
        .iter()
        .all(|o| o.reason == OmitReason::MissingData));
}
