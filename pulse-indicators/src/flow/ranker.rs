//! Capital flow ranking for a single trading day.

use crate::config::RankingConfig;
use crate::data::{DailySnapshots, EntitySnapshot};
use crate::error::{IndicatorError, Result};
use crate::series::{RankingMetric, RankingResult};

/// Ranks entities by net inflow and by inflow rate.
#[derive(Debug, Clone, Default)]
pub struct CapitalFlowRanker {
    config: RankingConfig,
}

impl CapitalFlowRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    fn collect<'a, I>(snapshots: I) -> Result<Vec<&'a EntitySnapshot>>
    where
        I: IntoIterator<Item = &'a EntitySnapshot>,
    {
        let snapshots: Vec<&EntitySnapshot> = snapshots.into_iter().collect();
        if snapshots.is_empty() {
            return Err(IndicatorError::InsufficientData(
                "no snapshots to rank".into(),
            ));
        }
        Ok(snapshots)
    }

    /// Top `k` entities by net inflow.
    ///
    /// Entities without a reported inflow are left out of the ranking.
    pub fn rank_by_net_inflow<'a, I>(&self, snapshots: I, k: usize) -> Result<RankingResult>
    where
        I: IntoIterator<Item = &'a EntitySnapshot>,
    {
        let snapshots = Self::collect(snapshots)?;
        let excluded = snapshots.iter().filter(|s| s.net_inflow().is_none()).count();
        if excluded > 0 {
            tracing::debug!(excluded, "Entities without net inflow left out of ranking");
        }

        Ok(RankingResult::from_values(
            RankingMetric::NetInflow,
            snapshots
                .into_iter()
                .filter_map(|s| s.net_inflow().map(|flow| (s, flow))),
            k,
        ))
    }

    /// Top `k` entities by `net_inflow / turnover × 100`.
    ///
    /// Entities with turnover ≤ 0 or missing inputs are left out.
    pub fn rank_by_inflow_rate<'a, I>(&self, snapshots: I, k: usize) -> Result<RankingResult>
    where
        I: IntoIterator<Item = &'a EntitySnapshot>,
    {
        let snapshots = Self::collect(snapshots)?;

        Ok(RankingResult::from_values(
            RankingMetric::InflowRate,
            snapshots
                .into_iter()
                .filter_map(|s| s.inflow_rate().map(|rate| (s, rate))),
            k,
        ))
    }

    /// Stock ranking by net inflow with the configured `top_k`.
    pub fn rank_stocks(&self, day: &DailySnapshots) -> Result<RankingResult> {
        self.rank_by_net_inflow(day.stocks(), self.config.top_k)
    }

    /// Stock ranking by inflow rate with the configured `top_k`.
    pub fn rank_stocks_by_rate(&self, day: &DailySnapshots) -> Result<RankingResult> {
        self.rank_by_inflow_rate(day.stocks(), self.config.top_k)
    }

    /// Industry ranking by net inflow with the configured `top_k`.
    pub fn rank_industries(&self, day: &DailySnapshots) -> Result<RankingResult> {
        self.rank_by_net_inflow(day.industries(), self.config.top_k)
    }

    /// The hottest industries of the day, by net inflow.
    pub fn hot_industries(&self, day: &DailySnapshots) -> Result<Vec<String>> {
        let ranking = self.rank_by_net_inflow(day.industries(), self.config.hot_industry_count)?;
        Ok(ranking.entries.into_iter().map(|e| e.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{EntityKind, SnapshotRecord, TradingDay};

    fn snap(id: &str, flow: Option<f64>, turnover: Option<f64>) -> EntitySnapshot {
        EntitySnapshot::try_from(SnapshotRecord {
            id: id.into(),
            net_inflow: flow,
            turnover,
            pct_change: 1.0,
            close: 10.0,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_rank_by_net_inflow() {
        let ranker = CapitalFlowRanker::default();
        let snaps = vec![
            snap("600000.SH", Some(3.0e7), None),
            snap("600036.SH", Some(-1.0e7), None),
            snap("000001.SZ", Some(8.0e7), None),
            snap("000002.SZ", None, None),
        ];

        let ranking = ranker.rank_by_net_inflow(&snaps, 2).unwrap();
        assert_eq!(ranking.metric, RankingMetric::NetInflow);
        assert_eq!(ranking.ids(), vec!["000001.SZ", "600000.SH"]);
        assert_eq!(ranking.entries[0].value, 8.0e7);
    }

    #[test]
    fn test_identical_inflow_ordered_by_id() {
        let ranker = CapitalFlowRanker::default();
        let snaps = vec![
            snap("600519.SH", Some(1.0e8), None),
            snap("000858.SZ", Some(1.0e8), None),
        ];

        for _ in 0..3 {
            let ranking = ranker.rank_by_net_inflow(&snaps, 10).unwrap();
            assert_eq!(ranking.ids(), vec!["000858.SZ", "600519.SH"]);
        }
    }

    #[test]
    fn test_rank_by_inflow_rate_excludes_zero_turnover() {
        let ranker = CapitalFlowRanker::default();
        let snaps = vec![
            snap("A", Some(1.0e6), Some(1.0e8)),
            snap("B", Some(5.0e6), Some(0.0)),
            snap("C", Some(2.0e6), Some(1.0e7)),
            snap("D", Some(2.0e6), None),
        ];

        let ranking = ranker.rank_by_inflow_rate(&snaps, 10).unwrap();
        assert_eq!(ranking.ids(), vec!["C", "A"]);
        assert!((ranking.entries[0].value - 20.0).abs() < 1e-9);
        assert!((ranking.entries[1].value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_is_insufficient_data() {
        let ranker = CapitalFlowRanker::default();
        let empty: Vec<EntitySnapshot> = Vec::new();
        assert!(matches!(
            ranker.rank_by_net_inflow(&empty, 5),
            Err(IndicatorError::InsufficientData(_))
        ));
        assert!(matches!(
            ranker.rank_by_inflow_rate(&empty, 5),
            Err(IndicatorError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_hot_industries() {
        let ranker = CapitalFlowRanker::new(RankingConfig {
            hot_industry_count: 2,
            ..Default::default()
        });
        let industry = |id: &str, flow: f64| {
            EntitySnapshot::try_from(SnapshotRecord {
                id: id.into(),
                kind: EntityKind::Industry,
                net_inflow: Some(flow),
                pct_change: 0.5,
                close: 1000.0,
                ..Default::default()
            })
            .unwrap()
        };
        let day = DailySnapshots::from_snapshots(
            TradingDay::from_ymd(2024, 6, 3).unwrap(),
            vec![
                industry("BK0475", 5.0e8),
                industry("BK0477", 9.0e8),
                industry("BK0478", -2.0e8),
                snap("600000.SH", Some(9.9e9), None),
            ],
        );

        assert_eq!(ranker.hot_industries(&day).unwrap(), vec!["BK0477", "BK0475"]);
        assert_eq!(ranker.rank_industries(&day).unwrap().len(), 3);
    }
}
