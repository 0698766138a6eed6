//! Industry → constituent stock cross analysis.
//!
//! For each hot industry, resolve its constituents and rank them by the
//! day's net inflow. A failing industry is reported and skipped; the others
//! proceed.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use super::CapitalFlowRanker;
use crate::data::{DailySnapshots, EntitySnapshot, MarketDataSource, TradingDay};
use crate::error::IndicatorError;
use crate::series::RankingResult;

/// Ranking of one industry's constituents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryStockRanking {
    pub industry_id: String,
    pub industry_name: String,
    /// Constituents the source listed
    pub constituent_count: usize,
    /// Constituents with a same-day net inflow
    pub ranked_count: usize,
    pub ranking: RankingResult,
}

/// An industry left out of the cross analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryFailure {
    pub industry_id: String,
    pub reason: String,
}

/// Result of a cross analysis: partial results plus failed industries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossAnalysis {
    pub day: TradingDay,
    pub industries: Vec<IndustryStockRanking>,
    pub failed: Vec<IndustryFailure>,
}

impl CrossAnalysis {
    pub fn get(&self, industry_id: &str) -> Option<&IndustryStockRanking> {
        self.industries.iter().find(|i| i.industry_id == industry_id)
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} industries ranked, {} failed",
            self.day,
            self.industries.len(),
            self.failed.len()
        )
    }
}

/// Ranks the top stocks of each hot industry.
#[derive(Debug, Clone)]
pub struct IndustryStockCrossAnalyzer {
    ranker: CapitalFlowRanker,
    stocks_per_industry: usize,
    max_concurrent: usize,
}

impl IndustryStockCrossAnalyzer {
    pub fn new(ranker: CapitalFlowRanker, max_concurrent: usize) -> Self {
        let stocks_per_industry = ranker.config().stocks_per_industry;
        Self {
            ranker,
            stocks_per_industry,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Override the per-industry stock count.
    pub fn with_stocks_per_industry(mut self, k: usize) -> Self {
        self.stocks_per_industry = k;
        self
    }

    /// Rank the constituents of every industry in `industries`.
    ///
    /// `day` holds the same-day snapshots the constituents are looked up in;
    /// constituents without a snapshot or a net inflow are left out.
    pub async fn analyze(
        &self,
        source: &dyn MarketDataSource,
        industries: &[String],
        day: &DailySnapshots,
    ) -> CrossAnalysis {
        let lookups = stream::iter(industries.iter().map(|industry| async move {
            (industry.as_str(), source.industry_constituents(industry).await)
        }))
        .buffered(self.max_concurrent)
        .collect::<Vec<_>>()
        .await;

        let mut analysis = CrossAnalysis {
            day: day.day(),
            industries: Vec::new(),
            failed: Vec::new(),
        };

        for (industry, lookup) in lookups {
            let result = lookup
                .map_err(|e| IndicatorError::ConstituentResolution {
                    industry: industry.to_string(),
                    reason: e.to_string(),
                })
                .and_then(|constituents| self.rank_industry(industry, &constituents, day));

            match result {
                Ok(ranking) => {
                    tracing::debug!(
                        industry = %industry,
                        constituents = ranking.constituent_count,
                        ranked = ranking.ranked_count,
                        "Industry constituents ranked"
                    );
                    analysis.industries.push(ranking);
                }
                Err(e) => {
                    tracing::warn!(industry = %industry, error = %e, "Industry skipped in cross analysis");
                    analysis.failed.push(IndustryFailure {
                        industry_id: industry.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            day = %analysis.day,
            ranked = analysis.industries.len(),
            failed = analysis.failed.len(),
            "Cross analysis completed"
        );
        analysis
    }

    /// Rank one industry's resolved constituents against the day's snapshots.
    pub fn rank_industry<'c, I>(
        &self,
        industry: &str,
        constituents: I,
        day: &DailySnapshots,
    ) -> Result<IndustryStockRanking, IndicatorError>
    where
        I: IntoIterator<Item = &'c String>,
    {
        let constituents: Vec<&String> = constituents.into_iter().collect();
        if constituents.is_empty() {
            return Err(IndicatorError::ConstituentResolution {
                industry: industry.to_string(),
                reason: "no constituents".into(),
            });
        }

        let available: Vec<&EntitySnapshot> = constituents
            .iter()
            .filter_map(|id| day.get(id))
            .filter(|s| s.net_inflow().is_some())
            .collect();
        let ranked_count = available.len();

        let ranking = self
            .ranker
            .rank_by_net_inflow(available, self.stocks_per_industry)
            .map_err(|_| {
                IndicatorError::InsufficientData(format!(
                    "none of the {} constituents of {} has a net inflow on {}",
                    constituents.len(),
                    industry,
                    day.day()
                ))
            })?;

        let industry_name = day
            .get(industry)
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| industry.to_string());

        Ok(IndustryStockRanking {
            industry_id: industry.to_string(),
            industry_name,
            constituent_count: constituents.len(),
            ranked_count,
            ranking,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RankingConfig;
    use crate::data::{EntityKind, InMemorySource, SnapshotRecord};

    fn day() -> TradingDay {
        TradingDay::from_ymd(2024, 6, 5).unwrap()
    }

    fn stock(id: &str, flow: Option<f64>) -> EntitySnapshot {
        EntitySnapshot::try_from(SnapshotRecord {
            id: id.into(),
            net_inflow: flow,
            pct_change: 1.0,
            close: 10.0,
            ..Default::default()
        })
        .unwrap()
    }

    fn snapshots() -> DailySnapshots {
        let bank = EntitySnapshot::try_from(SnapshotRecord {
            id: "BK0475".into(),
            name: "银行".into(),
            kind: EntityKind::Industry,
            net_inflow: Some(1.0e9),
            pct_change: 1.0,
            close: 1000.0,
            ..Default::default()
        })
        .unwrap();
        DailySnapshots::from_snapshots(
            day(),
            vec![
                bank,
                stock("600000.SH", Some(2.0e7)),
                stock("600036.SH", Some(5.0e7)),
                stock("601398.SH", None),
                stock("600519.SH", Some(9.0e7)),
            ],
        )
    }

    fn analyzer(k: usize) -> IndustryStockCrossAnalyzer {
        IndustryStockCrossAnalyzer::new(
            CapitalFlowRanker::new(RankingConfig {
                stocks_per_industry: k,
                ..Default::default()
            }),
            2,
        )
    }

    #[test]
    fn test_rank_industry_excludes_missing_constituents() {
        let constituents: Vec<String> = ["600000.SH", "600036.SH", "601398.SH", "601988.SH"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let ranking = analyzer(10)
            .rank_industry("BK0475", &constituents, &snapshots())
            .unwrap();
        assert_eq!(ranking.industry_name, "银行");
        assert_eq!(ranking.constituent_count, 4);
        assert_eq!(ranking.ranked_count, 2);
        assert_eq!(ranking.ranking.ids(), vec!["600036.SH", "600000.SH"]);
    }

    #[tokio::test]
    async fn test_analyze_reports_partial_results() {
        let source = InMemorySource::builder()
            .day(snapshots())
            .constituents("BK0475", ["600000.SH", "600036.SH"])
            .constituents("BK0438", ["600519.SH"])
            .constituents("BK0999", Vec::<String>::new())
            .build();

        let industries: Vec<String> = ["BK0475", "BK0404", "BK0438", "BK0999"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let analysis = analyzer(1).analyze(&source, &industries, &snapshots()).await;

        assert_eq!(analysis.industries.len(), 2);
        assert_eq!(analysis.industries[0].industry_id, "BK0475");
        assert_eq!(analysis.industries[0].ranking.ids(), vec!["600036.SH"]);
        assert_eq!(analysis.get("BK0438").unwrap().ranking.ids(), vec!["600519.SH"]);

        let failed: Vec<&str> = analysis.failed.iter().map(|f| f.industry_id.as_str()).collect();
        assert_eq!(failed, vec!["BK0404", "BK0999"]);
    }
}
