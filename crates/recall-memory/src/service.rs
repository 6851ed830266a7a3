// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The search entry point.
//!
//! A query is embedded once (together with its chunks), resolved to query
//! entities, then fanned out to every retrieval strategy concurrently. The
//! merged candidates are ranked, limited, optionally re-sorted by recency,
//! compacted per session and trimmed to the token budget.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use recall_config::RecallConfig;
use recall_config::model::{BfsConfig, EpisodeGraphConfig, SearchConfig};
use recall_core::types::EmbeddingInput;
use recall_core::{EmbeddingAdapter, RecallError, RelevanceJudge, RerankAdapter};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::aggregate::{EpisodeWithProvenance, aggregate};
use crate::budget::{TokenCounter, apply_token_budget};
use crate::compaction::substitute_compacts;
use crate::embedder::HttpEmbedder;
use crate::query_entities::{QueryEntityResolver, chunk_query};
use crate::ranking::{EmptyReason, RankOptions, RankingMethod, RankingPipeline};
use crate::rerank::build_reranker;
use crate::response::{MemoryEntry, SearchResponse, StructuredResponse, collect_invalidated};
use crate::search::{
    BfsSearch, EpisodeCandidate, EpisodeGraphSearch, EpisodeVectorSearch, KeywordSearch,
    RetrievalStrategy, SearchContext, StatementVectorSearch, StrategyKind,
};
use crate::store::{GraphStore, StatementFilter};
use crate::types::Entity;
use crate::validity::TemporalWindow;

/// Result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Relevance,
    /// Newest first; applied after relevance filtering.
    Recency,
}

/// Caller-supplied options of one search.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchOptions {
    /// Maximum results (defaults to `search.default_limit`).
    pub limit: Option<usize>,
    /// BFS depth (defaults to `search.max_bfs_depth`).
    pub max_bfs_depth: Option<usize>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Reference time; wins over `end_time`.
    pub valid_at: Option<DateTime<Utc>>,
    pub include_invalidated: bool,
    pub entity_types: Vec<String>,
    pub predicate_types: Vec<String>,
    pub labels: Vec<String>,
    pub score_threshold: Option<f64>,
    pub adaptive_filtering: bool,
    /// JSON body instead of formatted text.
    pub structured: bool,
    pub llm_validation: bool,
    pub llm_quality_threshold: Option<f64>,
    pub sort: SortOrder,
    /// Keep only episodes tied to at least one query entity (when any were found).
    pub require_entity_match: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: None,
            max_bfs_depth: None,
            start_time: None,
            end_time: None,
            valid_at: None,
            include_invalidated: false,
            entity_types: Vec::new(),
            predicate_types: Vec::new(),
            labels: Vec::new(),
            score_threshold: None,
            adaptive_filtering: true,
            structured: false,
            llm_validation: false,
            llm_quality_threshold: None,
            sort: SortOrder::Relevance,
            require_entity_match: false,
        }
    }
}

/// A response plus what happened on the way, for logs and callers that care.
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub response: SearchResponse,
    pub method: Option<RankingMethod>,
    pub confidence: Option<f64>,
    pub empty_reason: Option<EmptyReason>,
    pub query_entities: Vec<Entity>,
    /// Strategies that errored or ran out of time.
    pub failed_strategies: Vec<StrategyKind>,
    /// Entries dropped by the token budget.
    pub dropped_for_budget: usize,
    pub elapsed: Duration,
}

/// Hybrid multi-strategy search over one graph store.
pub struct SearchService {
    store: GraphStore,
    embedder: Arc<dyn EmbeddingAdapter>,
    ranking: RankingPipeline,
    search: SearchConfig,
    bfs: BfsConfig,
    episode_graph: EpisodeGraphConfig,
    token_counter: TokenCounter,
}

impl SearchService {
    pub fn new(store: GraphStore, embedder: Arc<dyn EmbeddingAdapter>, config: &RecallConfig) -> Self {
        Self {
            store,
            embedder,
            ranking: RankingPipeline::new(config.ranking.clone())
                .with_provider_timeout(Duration::from_millis(config.rerank.timeout_ms)),
            search: config.search.clone(),
            bfs: config.bfs.clone(),
            episode_graph: config.episode_graph.clone(),
            token_counter: TokenCounter::default(),
        }
    }

    /// Open the configured database and HTTP adapters.
    pub async fn from_config(config: &RecallConfig) -> Result<Self, RecallError> {
        let store =
            GraphStore::open(&config.storage.database_path, config.storage.wal_mode).await?;
        let embedder: Arc<dyn EmbeddingAdapter> = Arc::new(HttpEmbedder::new(&config.embedding)?);
        let mut service = Self::new(store, embedder.clone(), config);
        if let Some(reranker) = build_reranker(&config.rerank, embedder)? {
            info!(provider = reranker.name(), "external reranking enabled");
            service = service.with_reranker(reranker, config.rerank.threshold());
        }
        Ok(service)
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn RerankAdapter>, threshold: f64) -> Self {
        self.ranking = self.ranking.with_reranker(reranker, threshold);
        self
    }

    pub fn with_judge(mut self, judge: Arc<dyn RelevanceJudge>) -> Self {
        self.ranking = self.ranking.with_judge(judge);
        self
    }

    pub fn with_token_counter(mut self, counter: TokenCounter) -> Self {
        self.token_counter = counter;
        self
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Search a user's memory. Only an empty `user_id` is an error; every
    /// other failure degrades to fewer (or no) results.
    pub async fn search(
        &self,
        query: &str,
        user_id: &str,
        options: &SearchOptions,
    ) -> Result<SearchResponse, RecallError> {
        Ok(self.search_with_report(query, user_id, options).await?.response)
    }

    pub async fn search_with_report(
        &self,
        query: &str,
        user_id: &str,
        options: &SearchOptions,
    ) -> Result<SearchReport, RecallError> {
        if user_id.trim().is_empty() {
            return Err(RecallError::Internal("search requires a user id".to_string()));
        }
        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.search.query_deadline_ms);
        let mut report = SearchReport {
            response: SearchResponse::empty(options.structured),
            method: None,
            confidence: None,
            empty_reason: None,
            query_entities: Vec::new(),
            failed_strategies: Vec::new(),
            dropped_for_budget: 0,
            elapsed: Duration::ZERO,
        };

        let query = query.trim();
        if query.is_empty() {
            debug!("empty query, nothing to search");
            report.empty_reason = Some(EmptyReason::NoCandidates);
            return Ok(self.finish(report, started));
        }

        let Some((embedding, chunk_embeddings)) = self.embed_query(query, deadline).await else {
            report.empty_reason = Some(EmptyReason::NoCandidates);
            return Ok(self.finish(report, started));
        };

        let resolver = QueryEntityResolver::new(
            self.store.clone(),
            self.search.entity_threshold,
            self.search.entity_top_k,
        );
        report.query_entities = match resolver.resolve(user_id, &chunk_embeddings).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(error = %e, "query entity resolution failed, continuing without entities");
                Vec::new()
            }
        };
        debug!(entities = report.query_entities.len(), "resolved query entities");

        let ctx = SearchContext {
            query: query.to_string(),
            user_id: user_id.to_string(),
            embedding,
            query_entities: report.query_entities.clone(),
            filter: StatementFilter {
                user_id: user_id.to_string(),
                window: TemporalWindow::resolve(
                    options.valid_at,
                    options.start_time,
                    options.end_time,
                    options.include_invalidated,
                ),
                entity_types: options.entity_types.clone(),
                predicate_names: options.predicate_types.clone(),
            },
            labels: options.labels.clone(),
            top_statements: self.search.top_statements,
        };

        let depth = options.max_bfs_depth.unwrap_or(self.search.max_bfs_depth);
        let strategies = self.strategies(depth);
        let results = futures::future::join_all(
            strategies
                .iter()
                .map(|s| self.run_strategy(s.as_ref(), &ctx, deadline)),
        )
        .await;

        let mut fired = Vec::with_capacity(results.len());
        for (kind, result) in results {
            match result {
                Some(candidates) => fired.push((kind, candidates)),
                None => report.failed_strategies.push(kind),
            }
        }
        if report.failed_strategies.len() == strategies.len() {
            warn!("every retrieval strategy failed");
        }

        let mut merged = aggregate(fired);
        if options.require_entity_match && !ctx.query_entities.is_empty() {
            let ids = ctx.query_entity_ids();
            merged.retain(|e| touches_query_entity(e, &ids));
        }
        let invalidated_facts = if options.include_invalidated {
            collect_invalidated(&merged)
        } else {
            Vec::new()
        };

        let outcome = self
            .ranking
            .rank(query, merged, &rank_options(options))
            .await;
        report.method = Some(outcome.method.clone());
        report.confidence = outcome.confidence;
        report.empty_reason = outcome.empty_reason;
        if outcome.episodes.is_empty() {
            info!(reason = ?outcome.empty_reason, "no relevant memories");
            return Ok(self.finish(report, started));
        }

        let limit = options.limit.unwrap_or(self.search.default_limit);
        let mut entries: Vec<MemoryEntry> = outcome
            .episodes
            .iter()
            .take(limit)
            .map(MemoryEntry::from)
            .collect();
        if options.sort == SortOrder::Recency {
            entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }

        let entries = match substitute_compacts(&self.store, user_id, entries.clone()).await {
            Ok(compacted) => compacted,
            Err(e) => {
                warn!(error = %e, "session compaction failed, returning raw episodes");
                entries
            }
        };
        let (entries, dropped) = apply_token_budget(
            entries,
            self.search.token_budget,
            options.structured,
            &self.token_counter,
        );
        report.dropped_for_budget = dropped;

        let recalled: Vec<String> = entries
            .iter()
            .filter(|e| !e.is_compact)
            .map(|e| e.id.clone())
            .collect();
        if let Err(e) = self.store.increment_recall_count(&recalled).await {
            warn!(error = %e, "failed to update recall counts");
        }

        info!(
            results = entries.len(),
            invalidated = invalidated_facts.len(),
            confidence = ?report.confidence,
            "search complete"
        );
        report.response = SearchResponse::render(
            StructuredResponse {
                episodes: entries,
                invalidated_facts,
            },
            options.structured,
        );
        Ok(self.finish(report, started))
    }

    fn strategies(&self, max_depth: usize) -> Vec<Box<dyn RetrievalStrategy>> {
        let s = &self.search;
        vec![
            Box::new(EpisodeGraphSearch::new(
                self.store.clone(),
                self.episode_graph.clone(),
            )),
            Box::new(BfsSearch::new(self.store.clone(), self.bfs.clone(), max_depth)),
            Box::new(StatementVectorSearch::new(
                self.store.clone(),
                s.statement_vector_threshold,
                s.statement_vector_limit,
            )),
            Box::new(EpisodeVectorSearch::new(
                self.store.clone(),
                s.episode_vector_threshold,
                s.episode_vector_limit,
            )),
            Box::new(KeywordSearch::new(self.store.clone(), s.keyword_limit)),
        ]
    }

    /// One strategy under its own timeout and the query deadline.
    /// `None` means it failed; the failure is logged and counted.
    async fn run_strategy(
        &self,
        strategy: &dyn RetrievalStrategy,
        ctx: &SearchContext,
        deadline: Instant,
    ) -> (StrategyKind, Option<Vec<EpisodeCandidate>>) {
        let kind = strategy.kind();
        let until = deadline.min(Instant::now() + Duration::from_millis(self.search.strategy_timeout_ms));
        let started = Instant::now();
        match tokio::time::timeout_at(until, strategy.search(ctx)).await {
            Ok(Ok(candidates)) => {
                debug!(
                    strategy = kind.as_str(),
                    episodes = candidates.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "strategy finished"
                );
                (kind, Some(candidates))
            }
            Ok(Err(e)) => {
                warn!(strategy = kind.as_str(), error = %e, "retrieval strategy failed");
                metrics::counter!("recall_strategy_failures_total", "strategy" => kind.as_str(), "reason" => "error").increment(1);
                (kind, None)
            }
            Err(_) => {
                warn!(strategy = kind.as_str(), "retrieval strategy timed out");
                metrics::counter!("recall_strategy_failures_total", "strategy" => kind.as_str(), "reason" => "timeout").increment(1);
                (kind, None)
            }
        }
    }

    /// Embed the query and its chunks in one call. `None` on failure.
    async fn embed_query(&self, query: &str, deadline: Instant) -> Option<(Vec<f32>, Vec<Vec<f32>>)> {
        let mut texts = vec![query.to_string()];
        texts.extend(chunk_query(query));
        let expected = texts.len();

        let output = match tokio::time::timeout_at(deadline, self.embedder.embed(EmbeddingInput { texts })).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(error = %e, "query embedding failed");
                return None;
            }
            Err(_) => {
                warn!("query embedding ran past the deadline");
                return None;
            }
        };
        if output.embeddings.len() != expected {
            warn!(expected, got = output.embeddings.len(), "embedder returned wrong number of vectors");
            return None;
        }
        let mut embeddings = output.embeddings.into_iter();
        let query_embedding = embeddings.next()?;
        Some((query_embedding, embeddings.collect()))
    }

    fn finish(&self, mut report: SearchReport, started: Instant) -> SearchReport {
        report.elapsed = started.elapsed();
        metrics::histogram!("recall_search_latency_seconds").record(report.elapsed.as_secs_f64());
        report
    }
}

fn rank_options(options: &SearchOptions) -> RankOptions {
    RankOptions {
        adaptive_filtering: options.adaptive_filtering,
        score_threshold: options.score_threshold,
        llm_validation: options.llm_validation,
        llm_quality_threshold: options.llm_quality_threshold,
    }
}

fn touches_query_entity(episode: &EpisodeWithProvenance, entity_ids: &[String]) -> bool {
    episode.entity_match_count > 0
        || episode.statements.iter().any(|s| {
            s.statement
                .entity_ids()
                .iter()
                .any(|id| entity_ids.iter().any(|q| q == id))
        })
}
