//! Market health report: every result of one analysis run.
//!
//! The report is the hand-off point to rendering and PDF assembly. It can be
//! serialized as a whole, summarized as markdown, or converted to chart and
//! table payloads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::TradingDay;
use crate::flow::{CrossAnalysis, MarketBreadth};
use crate::indicators::{
    ConcentrationSeries, DivergenceSeries, NewHighLowSeries, PromotionSeries, QualityScreen, TechnicalAnalysis,
};
use crate::payload::{BarChartPayload, ChartSet, LineChartPayload, TablePayload};
use crate::series::RankingResult;

// ============================================================================
// Failures
// ============================================================================

/// Analyses making up a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Breadth,
    StockRanking,
    IndustryRanking,
    CrossAnalysis,
    Divergence,
    Concentration,
    Promotion,
    NewHighLow,
    QualityScreen,
    Technical,
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Breadth => write!(f, "市场宽度"),
            Self::StockRanking => write!(f, "个股资金排名"),
            Self::IndustryRanking => write!(f, "行业资金排名"),
            Self::CrossAnalysis => write!(f, "热门行业个股"),
            Self::Divergence => write!(f, "量价背离"),
            Self::Concentration => write!(f, "资金集中度"),
            Self::Promotion => write!(f, "连板晋级率"),
            Self::NewHighLow => write!(f, "新高新低"),
            Self::QualityScreen => write!(f, "优质新高"),
            Self::Technical => write!(f, "技术指标"),
        }
    }
}

/// An analysis that produced no result in this run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFailure {
    pub analysis: AnalysisKind,
    pub reason: String,
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketHealthReport {
    pub run_id: String,
    /// Date the caller asked for
    pub requested_date: NaiveDate,
    /// Trading day the date resolved to
    pub trading_day: TradingDay,
    pub generated_at: DateTime<Utc>,
    pub breadth: Option<MarketBreadth>,
    pub stock_ranking: Option<RankingResult>,
    pub stock_rate_ranking: Option<RankingResult>,
    pub industry_ranking: Option<RankingResult>,
    pub cross: Option<CrossAnalysis>,
    pub divergence: Option<DivergenceSeries>,
    pub concentration: Option<ConcentrationSeries>,
    pub promotion: Option<PromotionSeries>,
    pub new_high_low: Option<NewHighLowSeries>,
    pub quality_screen: Option<QualityScreen>,
    pub technical: Option<TechnicalAnalysis>,
    pub failures: Vec<AnalysisFailure>,
}

impl MarketHealthReport {
    pub fn new(run_id: impl Into<String>, requested_date: NaiveDate, trading_day: TradingDay) -> Self {
        Self {
            run_id: run_id.into(),
            requested_date,
            trading_day,
            generated_at: Utc::now(),
            breadth: None,
            stock_ranking: None,
            stock_rate_ranking: None,
            industry_ranking: None,
            cross: None,
            divergence: None,
            concentration: None,
            promotion: None,
            new_high_low: None,
            quality_screen: None,
            technical: None,
            failures: Vec::new(),
        }
    }

    /// Record an analysis that could not produce a result.
    pub fn record_failure(&mut self, analysis: AnalysisKind, reason: impl fmt::Display) {
        tracing::warn!(analysis = %analysis, reason = %reason, "Analysis skipped");
        self.failures.push(AnalysisFailure {
            analysis,
            reason: reason.to_string(),
        });
    }

    pub fn failed(&self, analysis: AnalysisKind) -> bool {
        self.failures.iter().any(|f| f.analysis == analysis)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Markdown summary of the latest readings.
    pub fn summary(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "# 市场健康度报告 {}\n\n**运行ID**: {}\n**生成时间**: {}\n\n",
            self.trading_day,
            self.run_id,
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        ));
        if self.requested_date != self.trading_day.date() {
            md.push_str(&format!(
                "> 请求日期 {} 非交易日，使用最近交易日 {}\n\n",
                self.requested_date, self.trading_day
            ));
        }

        if let Some(breadth) = &self.breadth {
            md.push_str(&format!("## 市场宽度\n\n{}\n\n", breadth.summary()));
        }

        if let Some(ranking) = &self.industry_ranking {
            md.push_str("## 行业资金净流入\n\n");
            for (i, e) in ranking.entries.iter().enumerate() {
                md.push_str(&format!("{}. {} ({}) {:.2}亿\n", i + 1, e.name, e.id, e.value / 1e8));
            }
            md.push('\n');
        }

        if let Some(cross) = &self.cross {
            md.push_str("## 热门行业个股\n\n");
            for industry in &cross.industries {
                md.push_str(&format!("### {}\n\n", industry.industry_name));
                for e in &industry.ranking.entries {
                    md.push_str(&format!("- {} ({}) {:.2}亿\n", e.name, e.id, e.value / 1e8));
                }
                md.push('\n');
            }
            for failure in &cross.failed {
                md.push_str(&format!("- {} 无法解析: {}\n", failure.industry_id, failure.reason));
            }
        }

        md.push_str("## 指标\n\n");
        md.push_str("| 指标 | 最新值 | 有效天数 |\n|------|--------|----------|\n");
        if let Some(d) = &self.divergence {
            let latest = d
                .latest()
                .map(|r| format!("{:.1}% (风险{})", r.value, r.risk))
                .unwrap_or_else(|| "-".into());
            md.push_str(&format!("| 量价背离 | {} | {} |\n", latest, d.series.len()));
        }
        if let Some(c) = &self.concentration {
            let latest = c
                .latest()
                .map(|r| format!("{:.1}%", r.value))
                .unwrap_or_else(|| "-".into());
            md.push_str(&format!("| 资金集中度 | {} | {} |\n", latest, c.series.len()));
        }
        if let Some(p) = &self.promotion {
            let latest = p
                .overall
                .latest()
                .map(|pt| format!("{:.1}%", pt.value))
                .unwrap_or_else(|| "-".into());
            md.push_str(&format!("| 连板晋级率 | {} | {} |\n", latest, p.overall.len()));
        }
        if let Some(n) = &self.new_high_low {
            let latest = n
                .latest()
                .map(|c| {
                    format!(
                        "新高 {} / 新低 {} / 净新高 {}",
                        c.new_highs,
                        c.new_lows,
                        c.new_highs as i64 - c.new_lows as i64
                    )
                })
                .unwrap_or_else(|| "-".into());
            md.push_str(&format!("| 新高新低 | {} | {} |\n", latest, n.highs.len()));
        }
        md.push('\n');

        if let Some(screen) = &self.quality_screen {
            md.push_str(&format!("## {}\n\n", screen.summary()));
            for c in &screen.passed {
                md.push_str(&format!(
                    "- {} ({}) 相对位置 {:.2}\n",
                    c.snapshot.name(),
                    c.id(),
                    c.relative_position.unwrap_or_default()
                ));
            }
            md.push('\n');
        }

        if let Some(technical) = &self.technical {
            md.push_str(&format!("## 技术指标 {}\n\n", technical.entity_id));
            for signal in technical.signals.iter().rev().take(5) {
                md.push_str(&format!("- {} {}\n", signal.date, signal.kind));
            }
            md.push('\n');
        }

        if !self.failures.is_empty() {
            md.push_str("## 未完成分析\n\n");
            for f in &self.failures {
                md.push_str(&format!("- {}: {}\n", f.analysis, f.reason));
            }
        }

        md
    }

    /// Chart and table payloads for every available result.
    pub fn charts(&self) -> ChartSet {
        let mut charts = ChartSet::default();

        if let Some(r) = &self.industry_ranking {
            charts.bars.push(BarChartPayload::from_ranking("行业资金净流入", r));
        }
        if let Some(r) = &self.stock_ranking {
            charts.bars.push(BarChartPayload::from_ranking("个股资金净流入", r));
        }
        if let Some(r) = &self.stock_rate_ranking {
            charts.bars.push(BarChartPayload::from_ranking("个股净流入率", r));
        }
        if let Some(cross) = &self.cross {
            for industry in &cross.industries {
                charts.bars.push(BarChartPayload::from_ranking(
                    format!("{} 个股资金净流入", industry.industry_name),
                    &industry.ranking,
                ));
            }
        }

        if let Some(d) = &self.divergence {
            charts.lines.push(LineChartPayload::new("量价背离指数", [&d.series]));
        }
        if let Some(c) = &self.concentration {
            charts.lines.push(LineChartPayload::new("资金集中度", [&c.series]));
        }
        if let Some(p) = &self.promotion {
            charts.lines.push(LineChartPayload::new(
                "连板晋级率",
                [&p.overall, &p.first_to_second, &p.second_to_third],
            ));
        }
        if let Some(n) = &self.new_high_low {
            charts.lines.push(LineChartPayload::new("新高新低数量", [&n.highs, &n.lows, &n.net]));
        }
        if let Some(t) = &self.technical {
            charts.lines.push(LineChartPayload::new(
                format!("{} MACD", t.entity_id),
                [&t.macd.macd, &t.macd.signal, &t.macd.histogram],
            ));
            charts.lines.push(LineChartPayload::new(
                format!("{} RSI", t.entity_id),
                std::iter::once(&t.rsi).chain(&t.rsi_lines),
            ));
        }

        if let Some(screen) = &self.quality_screen {
            charts
                .tables
                .push(TablePayload::quality_candidates("优质新高股票", screen.passed.clone()));
        }

        charts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::IndicatorSeries;

    fn day() -> TradingDay {
        TradingDay::from_ymd(2024, 10, 11).unwrap()
    }

    #[test]
    fn test_failures_recorded() {
        let mut report = MarketHealthReport::new("run-1", day().date(), day());
        report.record_failure(AnalysisKind::Technical, "no price history");

        assert!(report.failed(AnalysisKind::Technical));
        assert!(!report.failed(AnalysisKind::Divergence));
        assert!(report.summary().contains("技术指标: no price history"));
    }

    #[test]
    fn test_summary_notes_resolved_date() {
        let requested = NaiveDate::from_ymd_opt(2024, 10, 12).unwrap();
        let report = MarketHealthReport::new("run-1", requested, day());
        assert!(report.summary().contains("使用最近交易日 2024-10-11"));
    }

    #[test]
    fn test_charts_and_json() {
        let mut report = MarketHealthReport::new("run-1", day().date(), day());
        let mut series = IndicatorSeries::new("资金集中度", vec![day()]);
        series.push(day(), 42.0);
        report.concentration = Some(ConcentrationSeries {
            series,
            readings: Vec::new(),
        });

        let charts = report.charts();
        assert!(charts.bars.is_empty());
        assert_eq!(charts.lines.len(), 1);
        assert_eq!(charts.lines[0].series[0].points, vec![(day(), Some(42.0))]);

        let parsed: MarketHealthReport = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(parsed.run_id, "run-1");
        assert_eq!(parsed.concentration, report.concentration);
    }
}
