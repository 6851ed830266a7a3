// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ranking and quality filtering of aggregated episodes.
//!
//! With an external reranker configured, its normalised scores decide the
//! order; on any provider failure, timeout or empty post-threshold result the
//! pipeline falls back to the internal algorithm (fused score, adaptive
//! threshold, score-gap cutoff, confidence floor and optional relevance judge).

pub mod fusion;

use std::sync::Arc;
use std::time::Duration;

use recall_config::model::RankingConfig;
use recall_core::types::JudgeCandidate;
use recall_core::{RecallError, RelevanceJudge, RerankAdapter};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::EpisodeWithProvenance;
use fusion::{FiredStrategies, confidence, fused_score, gap_cutoff, quality_threshold};

/// Per-query knobs of the ranking stage.
#[derive(Debug, Clone)]
pub struct RankOptions {
    /// Apply threshold, cliff cutoff, confidence floor and judge.
    pub adaptive_filtering: bool,
    /// Overrides the adaptive quality threshold.
    pub score_threshold: Option<f64>,
    /// Ask the relevance judge about uncertain result sets.
    pub llm_validation: bool,
    /// Overrides the upper bound of the uncertain confidence band.
    pub llm_quality_threshold: Option<f64>,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            adaptive_filtering: true,
            score_threshold: None,
            llm_validation: false,
            llm_quality_threshold: None,
        }
    }
}

/// Which algorithm produced the final order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMethod {
    Internal,
    External { provider: String },
}

/// Why a ranking produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    NoCandidates,
    BelowQualityThreshold,
    LowConfidence,
    RejectedByJudge,
}

#[derive(Debug, Clone)]
pub struct RankOutcome {
    pub episodes: Vec<EpisodeWithProvenance>,
    pub method: RankingMethod,
    pub confidence: Option<f64>,
    pub empty_reason: Option<EmptyReason>,
}

impl RankOutcome {
    fn empty(reason: EmptyReason, confidence: Option<f64>) -> Self {
        Self {
            episodes: Vec::new(),
            method: RankingMethod::Internal,
            confidence,
            empty_reason: Some(reason),
        }
    }
}

/// Ranks aggregated episodes with an optional external reranker and judge.
pub struct RankingPipeline {
    config: RankingConfig,
    reranker: Option<Arc<dyn RerankAdapter>>,
    rerank_threshold: f64,
    judge: Option<Arc<dyn RelevanceJudge>>,
    provider_timeout: Duration,
}

impl RankingPipeline {
    pub fn new(config: RankingConfig) -> Self {
        Self {
            config,
            reranker: None,
            rerank_threshold: 0.0,
            judge: None,
            provider_timeout: Duration::from_secs(3),
        }
    }

    /// Use an external reranker; results below `threshold` (normalised) are dropped.
    pub fn with_reranker(mut self, reranker: Arc<dyn RerankAdapter>, threshold: f64) -> Self {
        self.reranker = Some(reranker);
        self.rerank_threshold = threshold;
        self
    }

    pub fn with_judge(mut self, judge: Arc<dyn RelevanceJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Time budget for each reranker or judge call.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    /// Rank episodes, best first.
    pub async fn rank(
        &self,
        query: &str,
        mut episodes: Vec<EpisodeWithProvenance>,
        options: &RankOptions,
    ) -> RankOutcome {
        for e in &mut episodes {
            e.first_level_score = fused_score(e, &self.config);
            e.rerank_score = e.first_level_score;
        }
        episodes.retain(|e| e.first_level_score > 0.0);
        if episodes.is_empty() {
            debug!("no scored candidates to rank");
            return RankOutcome::empty(EmptyReason::NoCandidates, None);
        }

        if let Some(reranker) = &self.reranker {
            match self.rerank_external(reranker.as_ref(), query, &episodes).await {
                Ok(ranked) if !ranked.is_empty() => {
                    return RankOutcome {
                        episodes: ranked,
                        method: RankingMethod::External {
                            provider: reranker.name().to_string(),
                        },
                        confidence: None,
                        empty_reason: None,
                    };
                }
                Ok(_) => {
                    info!(provider = reranker.name(), "reranker kept nothing above threshold, using internal ranking");
                    metrics::counter!("recall_rerank_fallbacks_total", "reason" => "empty").increment(1);
                }
                Err(e) => {
                    warn!(provider = reranker.name(), error = %e, "reranker failed, using internal ranking");
                    metrics::counter!("recall_rerank_fallbacks_total", "reason" => "error").increment(1);
                }
            }
        }

        self.rank_internal(query, episodes, options).await
    }

    async fn rerank_external(
        &self,
        reranker: &dyn RerankAdapter,
        query: &str,
        episodes: &[EpisodeWithProvenance],
    ) -> Result<Vec<EpisodeWithProvenance>, RecallError> {
        let documents: Vec<String> = episodes.iter().map(|e| e.episode.content.clone()).collect();
        let scores = tokio::time::timeout(self.provider_timeout, reranker.rerank(query, &documents))
            .await
            .map_err(|_| RecallError::Timeout {
                duration: self.provider_timeout,
            })??;

        let mut ranked: Vec<EpisodeWithProvenance> = scores
            .into_iter()
            .filter_map(|s| {
                let normalized = reranker.normalize(s.relevance_score);
                (normalized >= self.rerank_threshold)
                    .then(|| episodes.get(s.index).cloned())
                    .flatten()
                    .map(|mut e| {
                        e.rerank_score = normalized;
                        e
                    })
            })
            .collect();
        ranked.sort_by(|a, b| b.rerank_score.total_cmp(&a.rerank_score));
        ranked.dedup_by(|a, b| a.episode.id == b.episode.id);
        Ok(ranked)
    }

    async fn rank_internal(
        &self,
        query: &str,
        mut episodes: Vec<EpisodeWithProvenance>,
        options: &RankOptions,
    ) -> RankOutcome {
        episodes.sort_by(|a, b| b.first_level_score.total_cmp(&a.first_level_score));
        if !options.adaptive_filtering {
            return RankOutcome {
                episodes,
                method: RankingMethod::Internal,
                confidence: None,
                empty_reason: None,
            };
        }

        let fired = FiredStrategies::of(&episodes);
        let threshold = options
            .score_threshold
            .unwrap_or_else(|| quality_threshold(fired, &self.config));
        episodes.retain(|e| e.first_level_score >= threshold);
        if episodes.is_empty() {
            debug!(threshold, "all candidates below quality threshold");
            return RankOutcome::empty(EmptyReason::BelowQualityThreshold, None);
        }

        let scores: Vec<f64> = episodes.iter().map(|e| e.first_level_score).collect();
        let keep = gap_cutoff(&scores, self.config.min_results, self.config.cliff_ratio);
        episodes.truncate(keep);

        let confidence = confidence(&episodes, &self.config);
        if confidence < self.config.confidence_floor {
            info!(confidence, floor = self.config.confidence_floor, "confidence below floor, returning no memories");
            return RankOutcome::empty(EmptyReason::LowConfidence, Some(confidence));
        }

        let ceiling = options
            .llm_quality_threshold
            .unwrap_or(self.config.uncertain_ceiling);
        if options.llm_validation && confidence < ceiling {
            if let Some(judge) = &self.judge {
                episodes = match self.validate(judge.as_ref(), query, episodes).await {
                    Some(kept) => kept,
                    None => {
                        info!(confidence, "relevance judge rejected every candidate");
                        return RankOutcome::empty(EmptyReason::RejectedByJudge, Some(confidence));
                    }
                };
            }
        }

        RankOutcome {
            episodes,
            method: RankingMethod::Internal,
            confidence: Some(confidence),
            empty_reason: None,
        }
    }

    /// Keep the candidates the judge accepts. `None` means it accepted none.
    ///
    /// Judge failures keep every candidate.
    async fn validate(
        &self,
        judge: &dyn RelevanceJudge,
        query: &str,
        episodes: Vec<EpisodeWithProvenance>,
    ) -> Option<Vec<EpisodeWithProvenance>> {
        let top_n = self.config.llm_top_n.min(episodes.len());
        let candidates: Vec<JudgeCandidate> = episodes[..top_n]
            .iter()
            .enumerate()
            .map(|(index, e)| JudgeCandidate {
                index,
                content: e.episode.content.clone(),
                facts: e.top_facts(5),
            })
            .collect();

        match tokio::time::timeout(self.provider_timeout, judge.judge(query, &candidates)).await {
            Ok(Ok(indices)) if indices.is_empty() => None,
            Ok(Ok(indices)) => {
                let kept: Vec<EpisodeWithProvenance> = episodes
                    .into_iter()
                    .take(top_n)
                    .enumerate()
                    .filter(|(i, _)| indices.contains(i))
                    .map(|(_, e)| e)
                    .collect();
                if kept.is_empty() { None } else { Some(kept) }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "relevance judge failed, keeping all candidates");
                Some(episodes)
            }
            Err(_) => {
                warn!(timeout = ?self.provider_timeout, "relevance judge timed out, keeping all candidates");
                Some(episodes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use recall_core::PluginAdapter;
    use recall_core::types::{AdapterType, HealthStatus, RerankScore};

    use super::*;
    use crate::aggregate::aggregate;
    use crate::search::{EpisodeCandidate, StrategyKind};
    use crate::store::test_support::episode;

    fn candidates(kind: StrategyKind, scores: &[(&str, f64)]) -> (StrategyKind, Vec<EpisodeCandidate>) {
        (
            kind,
            scores
                .iter()
                .map(|(id, score)| EpisodeCandidate {
                    episode: episode(id, &format!("content of {id}"), None, vec![1.0]),
                    score: *score,
                    statement_count: 0,
                    top_statements: Vec::new(),
                    invalidated_statements: Vec::new(),
                    entity_match_count: 0,
                })
                .collect(),
        )
    }

    struct FixedReranker(Result<Vec<RerankScore>, ()>);

    #[async_trait]
    impl PluginAdapter for FixedReranker {
        fn name(&self) -> &str {
            "fixed"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 1)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Reranker
        }
        async fn health_check(&self) -> Result<HealthStatus, RecallError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl RerankAdapter for FixedReranker {
        async fn rerank(&self, _: &str, _: &[String]) -> Result<Vec<RerankScore>, RecallError> {
            self.0.clone().map_err(|_| RecallError::provider("boom"))
        }
    }

    struct FixedJudge(Result<Vec<usize>, ()>);

    #[async_trait]
    impl RelevanceJudge for FixedJudge {
        async fn judge(&self, _: &str, _: &[JudgeCandidate]) -> Result<Vec<usize>, RecallError> {
            self.0.clone().map_err(|_| RecallError::provider("judge down"))
        }
    }

    fn graph_set() -> Vec<EpisodeWithProvenance> {
        // Graph score 1.6 x weight 5.0 = 8.0 fused for a..e, 0.4 x 5.0 = 2.0 for f.
        aggregate(vec![candidates(
            StrategyKind::EpisodeGraph,
            &[("a", 1.6), ("b", 1.6), ("c", 1.6), ("d", 1.6), ("e", 1.6), ("f", 0.4)],
        )])
    }

    #[tokio::test]
    async fn internal_ranking_cuts_at_cliff() {
        let pipeline = RankingPipeline::new(RankingConfig::default());
        let options = RankOptions {
            score_threshold: Some(0.0),
            ..RankOptions::default()
        };
        let outcome = pipeline.rank("q", graph_set(), &options).await;
        assert_eq!(outcome.episodes.len(), 5);
        assert_eq!(outcome.method, RankingMethod::Internal);
        assert!(outcome.episodes.iter().all(|e| (e.first_level_score - 8.0).abs() < 1e-9));
    }

    #[tokio::test]
    async fn low_confidence_returns_empty() {
        let pipeline = RankingPipeline::new(RankingConfig::default());
        // Keyword-only, fused 0.2 * 1.0 < floor * expected max.
        let set = aggregate(vec![candidates(StrategyKind::Keyword, &[("a", 1.0)])]);
        let outcome = pipeline.rank("q", set, &RankOptions::default()).await;
        assert!(outcome.episodes.is_empty());
        assert_eq!(outcome.empty_reason, Some(EmptyReason::BelowQualityThreshold));

        let set = aggregate(vec![candidates(StrategyKind::Keyword, &[("a", 1.0)])]);
        let options = RankOptions {
            score_threshold: Some(0.0),
            ..RankOptions::default()
        };
        let outcome = pipeline.rank("q", set, &options).await;
        assert_eq!(outcome.empty_reason, Some(EmptyReason::LowConfidence));
    }

    #[tokio::test]
    async fn adaptive_filtering_off_keeps_everything_sorted() {
        let pipeline = RankingPipeline::new(RankingConfig::default());
        let options = RankOptions {
            adaptive_filtering: false,
            ..RankOptions::default()
        };
        let set = aggregate(vec![candidates(
            StrategyKind::StatementVector,
            &[("low", 0.1), ("high", 0.9)],
        )]);
        let outcome = pipeline.rank("q", set, &options).await;
        let ids: Vec<&str> = outcome.episodes.iter().map(|e| e.episode.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
    }

    #[tokio::test]
    async fn external_reranker_orders_and_thresholds() {
        let reranker = Arc::new(FixedReranker(Ok(vec![
            RerankScore { index: 5, relevance_score: 0.95 },
            RerankScore { index: 0, relevance_score: 0.5 },
            RerankScore { index: 1, relevance_score: 0.1 },
        ])));
        let pipeline = RankingPipeline::new(RankingConfig::default()).with_reranker(reranker, 0.3);
        let outcome = pipeline.rank("q", graph_set(), &RankOptions::default()).await;
        let ids: Vec<&str> = outcome.episodes.iter().map(|e| e.episode.id.as_str()).collect();
        assert_eq!(ids, vec!["f", "a"]);
        assert_eq!(outcome.episodes[0].rerank_score, 0.95);
        assert_eq!(
            outcome.method,
            RankingMethod::External {
                provider: "fixed".into()
            }
        );
    }

    #[tokio::test]
    async fn broken_reranker_falls_back_to_internal() {
        let internal = RankingPipeline::new(RankingConfig::default());
        let options = RankOptions {
            score_threshold: Some(0.0),
            ..RankOptions::default()
        };
        let expected = internal.rank("q", graph_set(), &options).await;

        for reranker in [
            FixedReranker(Err(())),
            FixedReranker(Ok(Vec::new())),
            FixedReranker(Ok(vec![RerankScore { index: 0, relevance_score: 0.01 }])),
        ] {
            let pipeline = RankingPipeline::new(RankingConfig::default())
                .with_reranker(Arc::new(reranker), 0.3);
            let outcome = pipeline.rank("q", graph_set(), &options).await;
            assert_eq!(outcome.method, RankingMethod::Internal);
            let got: Vec<&str> = outcome.episodes.iter().map(|e| e.episode.id.as_str()).collect();
            let want: Vec<&str> = expected.episodes.iter().map(|e| e.episode.id.as_str()).collect();
            assert_eq!(got, want);
        }
    }

    #[tokio::test]
    async fn judge_filters_uncertain_results() {
        // Vector-dominant fused 1.5 * 1.0 = 1.5 against expected max 3 => confidence 0.5.
        let set = || {
            aggregate(vec![candidates(
                StrategyKind::StatementVector,
                &[("a", 1.0), ("b", 1.0), ("c", 1.0)],
            )])
        };
        let options = RankOptions {
            llm_validation: true,
            ..RankOptions::default()
        };

        let pipeline = RankingPipeline::new(RankingConfig::default())
            .with_judge(Arc::new(FixedJudge(Ok(vec![2, 0]))));
        let outcome = pipeline.rank("q", set(), &options).await;
        let ids: Vec<&str> = outcome.episodes.iter().map(|e| e.episode.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!((outcome.confidence.unwrap() - 0.5).abs() < 1e-9);

        let pipeline = RankingPipeline::new(RankingConfig::default())
            .with_judge(Arc::new(FixedJudge(Ok(Vec::new()))));
        let outcome = pipeline.rank("q", set(), &options).await;
        assert_eq!(outcome.empty_reason, Some(EmptyReason::RejectedByJudge));

        let pipeline = RankingPipeline::new(RankingConfig::default())
            .with_judge(Arc::new(FixedJudge(Err(()))));
        let outcome = pipeline.rank("q", set(), &options).await;
        assert_eq!(outcome.episodes.len(), 3);
    }
}
