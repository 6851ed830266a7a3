// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Recall memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages. Every
//! scoring constant used by search and ranking lives here so that callers
//! can pass alternate weightings explicitly.

use serde::{Deserialize, Serialize};

/// Top-level Recall configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecallConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Graph database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote embedding endpoint settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval strategy settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Graph traversal (BFS) settings.
    #[serde(default)]
    pub bfs: BfsConfig,

    /// Episode-subgraph search settings.
    #[serde(default)]
    pub episode_graph: EpisodeGraphConfig,

    /// Fused ranking and quality filter settings.
    #[serde(default)]
    pub ranking: RankingConfig,

    /// External reranking provider settings.
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Statement deduplication / contradiction settings.
    #[serde(default)]
    pub resolution: ResolutionConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite graph store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("recall").join("recall.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("recall.db"))
        .display()
        .to_string()
}

fn default_true() -> bool {
    true
}

/// OpenAI-compatible embedding endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Base URL of the embeddings API (the `/embeddings` path is appended).
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    /// Embedding model name.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// API key sent as a bearer token. Can also be set via `RECALL_EMBEDDING_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Expected vector dimensionality.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            api_key: None,
            dimensions: default_embedding_dimensions(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> usize {
    1536
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

/// Retrieval strategy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Maximum statements returned by keyword search (noisier than vector search).
    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: usize,

    /// Maximum statements returned by statement vector search.
    #[serde(default = "default_statement_vector_limit")]
    pub statement_vector_limit: usize,

    /// Minimum cosine similarity for statement vector search.
    #[serde(default = "default_half")]
    pub statement_vector_threshold: f64,

    /// Maximum episodes returned by episode vector search.
    #[serde(default = "default_episode_vector_limit")]
    pub episode_vector_limit: usize,

    /// Minimum cosine similarity for episode vector search.
    #[serde(default = "default_half")]
    pub episode_vector_threshold: f64,

    /// Minimum cosine similarity between a query chunk and an entity name.
    #[serde(default = "default_half")]
    pub entity_threshold: f64,

    /// Entities kept per query chunk.
    #[serde(default = "default_entity_top_k")]
    pub entity_top_k: usize,

    /// Default BFS depth when the query does not specify one.
    #[serde(default = "default_max_bfs_depth")]
    pub max_bfs_depth: usize,

    /// Per-strategy timeout in milliseconds.
    #[serde(default = "default_strategy_timeout_ms")]
    pub strategy_timeout_ms: u64,

    /// Overall deadline for the retrieval fan-out in milliseconds.
    #[serde(default = "default_query_deadline_ms")]
    pub query_deadline_ms: u64,

    /// Default number of results when the query does not specify a limit.
    #[serde(default = "default_result_limit")]
    pub default_limit: usize,

    /// Token budget for the serialized response.
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Statements carried per strategy candidate.
    #[serde(default = "default_top_statements")]
    pub top_statements: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keyword_limit: default_keyword_limit(),
            statement_vector_limit: default_statement_vector_limit(),
            statement_vector_threshold: default_half(),
            episode_vector_limit: default_episode_vector_limit(),
            episode_vector_threshold: default_half(),
            entity_threshold: default_half(),
            entity_top_k: default_entity_top_k(),
            max_bfs_depth: default_max_bfs_depth(),
            strategy_timeout_ms: default_strategy_timeout_ms(),
            query_deadline_ms: default_query_deadline_ms(),
            default_limit: default_result_limit(),
            token_budget: default_token_budget(),
            top_statements: default_top_statements(),
        }
    }
}

fn default_keyword_limit() -> usize {
    20
}

fn default_statement_vector_limit() -> usize {
    50
}

fn default_half() -> f64 {
    0.5
}

fn default_episode_vector_limit() -> usize {
    20
}

fn default_entity_top_k() -> usize {
    3
}

fn default_max_bfs_depth() -> usize {
    3
}

fn default_strategy_timeout_ms() -> u64 {
    5_000
}

fn default_query_deadline_ms() -> u64 {
    8_000
}

fn default_result_limit() -> usize {
    20
}

fn default_token_budget() -> usize {
    10_000
}

fn default_top_statements() -> usize {
    5
}

/// Bounded, relevance-guided BFS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BfsConfig {
    /// Exploration threshold at depth 0.
    #[serde(default = "default_exploration_base")]
    pub exploration_base: f64,

    /// Added to the exploration threshold per depth level.
    #[serde(default = "default_exploration_step")]
    pub exploration_step: f64,

    /// Minimum relevance of any statement returned by BFS.
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,

    /// Stop expanding once more than this many kept statements clear the
    /// relevance threshold.
    #[serde(default = "default_early_stop_cap")]
    pub early_stop_cap: usize,

    /// Score multiplier per hop, starting at hop 1. Must strictly decrease.
    #[serde(default = "default_hop_multipliers")]
    pub hop_multipliers: Vec<f64>,

    /// Multiplier for hops past the end of `hop_multipliers`.
    #[serde(default = "default_beyond_multiplier")]
    pub beyond_multiplier: f64,
}

impl Default for BfsConfig {
    fn default() -> Self {
        Self {
            exploration_base: default_exploration_base(),
            exploration_step: default_exploration_step(),
            relevance_threshold: default_relevance_threshold(),
            early_stop_cap: default_early_stop_cap(),
            hop_multipliers: default_hop_multipliers(),
            beyond_multiplier: default_beyond_multiplier(),
        }
    }
}

impl BfsConfig {
    /// Minimum relevance for a statement to join the frontier at `depth` (0-based).
    pub fn exploration_threshold(&self, depth: usize) -> f64 {
        self.exploration_base + self.exploration_step * depth as f64
    }

    /// Score multiplier for a statement reached at `hop` (1-based).
    pub fn hop_multiplier(&self, hop: usize) -> f64 {
        hop.checked_sub(1)
            .and_then(|i| self.hop_multipliers.get(i))
            .copied()
            .unwrap_or(self.beyond_multiplier)
    }
}

fn default_exploration_base() -> f64 {
    0.30
}

fn default_exploration_step() -> f64 {
    0.15
}

fn default_relevance_threshold() -> f64 {
    0.65
}

fn default_early_stop_cap() -> usize {
    50
}

fn default_hop_multipliers() -> Vec<f64> {
    vec![2.0, 1.3, 1.0]
}

fn default_beyond_multiplier() -> f64 {
    0.8
}

/// Episode-subgraph search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EpisodeGraphConfig {
    /// Weight of each distinct query entity touched by the episode.
    #[serde(default = "default_entity_weight")]
    pub entity_weight: f64,

    /// Minimum mean relevance of entity-matched statements.
    #[serde(default = "default_half")]
    pub min_avg_relevance: f64,
}

impl Default for EpisodeGraphConfig {
    fn default() -> Self {
        Self {
            entity_weight: default_entity_weight(),
            min_avg_relevance: default_half(),
        }
    }
}

fn default_entity_weight() -> f64 {
    2.0
}

/// Per-strategy weights of the hierarchical fused score.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyWeights {
    #[serde(default = "default_graph_weight")]
    pub episode_graph: f64,
    #[serde(default = "default_bfs_weight")]
    pub bfs: f64,
    #[serde(default = "default_vector_weight")]
    pub vector: f64,
    #[serde(default = "default_vector_weight")]
    pub episode_vector: f64,
    #[serde(default = "default_bm25_weight")]
    pub bm25: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            episode_graph: default_graph_weight(),
            bfs: default_bfs_weight(),
            vector: default_vector_weight(),
            episode_vector: default_vector_weight(),
            bm25: default_bm25_weight(),
        }
    }
}

fn default_graph_weight() -> f64 {
    5.0
}

fn default_bfs_weight() -> f64 {
    3.0
}

fn default_vector_weight() -> f64 {
    1.5
}

fn default_bm25_weight() -> f64 {
    0.2
}

/// Ranking and quality filter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RankingConfig {
    /// Fused score weights.
    #[serde(default)]
    pub weights: StrategyWeights,

    /// Concentration bonus factor: `score *= 1 + ln(1 + statements) * factor`.
    #[serde(default = "default_concentration_factor")]
    pub concentration_factor: f64,

    /// Apply the entity-match multiplier.
    #[serde(default)]
    pub entity_match_boost: bool,

    /// Entity-match factor: `score *= 1 + entity_matches * factor`.
    #[serde(default = "default_entity_match_factor")]
    pub entity_match_factor: f64,

    /// Quality threshold when graph or BFS search produced results.
    #[serde(default = "default_graph_quality_threshold")]
    pub graph_quality_threshold: f64,

    /// Quality threshold when only vector searches produced results.
    #[serde(default = "default_vector_quality_threshold")]
    pub vector_quality_threshold: f64,

    /// Quality threshold when only keyword search produced results.
    #[serde(default = "default_keyword_quality_threshold")]
    pub keyword_quality_threshold: f64,

    /// Results always kept before the score-gap cutoff may trigger.
    #[serde(default = "default_min_results")]
    pub min_results: usize,

    /// Relative drop between neighbours that counts as a cliff.
    #[serde(default = "default_cliff_ratio")]
    pub cliff_ratio: f64,

    /// Below this confidence the result is empty.
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,

    /// Below this confidence (and above the floor) the relevance judge runs.
    #[serde(default = "default_uncertain_ceiling")]
    pub uncertain_ceiling: f64,

    /// Expected average fused score when episode-graph search dominates.
    #[serde(default = "default_graph_expected_max")]
    pub graph_expected_max: f64,

    /// Expected average fused score when BFS dominates.
    #[serde(default = "default_bfs_expected_max")]
    pub bfs_expected_max: f64,

    /// Expected average fused score when vector search dominates.
    #[serde(default = "default_vector_expected_max")]
    pub vector_expected_max: f64,

    /// Expected average fused score when only keyword search fired.
    #[serde(default = "default_keyword_expected_max")]
    pub keyword_expected_max: f64,

    /// Candidates shown to the relevance judge.
    #[serde(default = "default_llm_top_n")]
    pub llm_top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: StrategyWeights::default(),
            concentration_factor: default_concentration_factor(),
            entity_match_boost: false,
            entity_match_factor: default_entity_match_factor(),
            graph_quality_threshold: default_graph_quality_threshold(),
            vector_quality_threshold: default_vector_quality_threshold(),
            keyword_quality_threshold: default_keyword_quality_threshold(),
            min_results: default_min_results(),
            cliff_ratio: default_cliff_ratio(),
            confidence_floor: default_confidence_floor(),
            uncertain_ceiling: default_uncertain_ceiling(),
            graph_expected_max: default_graph_expected_max(),
            bfs_expected_max: default_bfs_expected_max(),
            vector_expected_max: default_vector_expected_max(),
            keyword_expected_max: default_keyword_expected_max(),
            llm_top_n: default_llm_top_n(),
        }
    }
}

fn default_concentration_factor() -> f64 {
    0.3
}

fn default_entity_match_factor() -> f64 {
    0.5
}

fn default_graph_quality_threshold() -> f64 {
    5.0
}

fn default_vector_quality_threshold() -> f64 {
    1.0
}

fn default_keyword_quality_threshold() -> f64 {
    0.3
}

fn default_min_results() -> usize {
    3
}

fn default_cliff_ratio() -> f64 {
    0.5
}

fn default_confidence_floor() -> f64 {
    0.3
}

fn default_uncertain_ceiling() -> f64 {
    0.7
}

fn default_graph_expected_max() -> f64 {
    25.0
}

fn default_bfs_expected_max() -> f64 {
    15.0
}

fn default_vector_expected_max() -> f64 {
    3.0
}

fn default_keyword_expected_max() -> f64 {
    1.0
}

fn default_llm_top_n() -> usize {
    10
}

/// Which external reranking provider to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankProvider {
    /// No external reranking; the internal algorithm ranks.
    #[default]
    None,
    /// Remote cross-encoder scoring API.
    Remote,
    /// Local scorer over the configured embedding adapter.
    Embedding,
}

/// External reranking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RerankConfig {
    /// Provider selection.
    #[serde(default)]
    pub provider: RerankProvider,

    /// Base URL of the remote rerank API (the `/rerank` path is appended).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key for the remote provider.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Remote rerank model name.
    #[serde(default = "default_rerank_model")]
    pub model: String,

    /// Timeout for one rerank call in milliseconds.
    #[serde(default = "default_rerank_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum normalized score kept from the remote provider.
    #[serde(default = "default_remote_threshold")]
    pub remote_threshold: f64,

    /// Minimum normalized score kept from the embedding provider.
    #[serde(default = "default_embedding_threshold")]
    pub embedding_threshold: f64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            provider: RerankProvider::None,
            endpoint: None,
            api_key: None,
            model: default_rerank_model(),
            timeout_ms: default_rerank_timeout_ms(),
            remote_threshold: default_remote_threshold(),
            embedding_threshold: default_embedding_threshold(),
        }
    }
}

impl RerankConfig {
    /// Relevance threshold for the selected provider.
    pub fn threshold(&self) -> f64 {
        match self.provider {
            RerankProvider::Embedding => self.embedding_threshold,
            _ => self.remote_threshold,
        }
    }
}

fn default_rerank_model() -> String {
    "rerank-english-v3.0".to_string()
}

fn default_rerank_timeout_ms() -> u64 {
    3_000
}

fn default_remote_threshold() -> f64 {
    0.3
}

fn default_embedding_threshold() -> f64 {
    0.75
}

/// Statement deduplication / contradiction configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResolutionConfig {
    /// Minimum fact-embedding similarity for an existing statement to be
    /// compared against a new one.
    #[serde(default = "default_resolution_threshold")]
    pub similarity_threshold: f64,

    /// Maximum existing statements shown to the classifier per candidate.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_resolution_threshold(),
            max_candidates: default_max_candidates(),
        }
    }
}

fn default_resolution_threshold() -> f64 {
    0.85
}

fn default_max_candidates() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exploration_threshold_grows_with_depth() {
        let bfs = BfsConfig::default();
        assert!((bfs.exploration_threshold(0) - 0.30).abs() < 1e-9);
        assert!((bfs.exploration_threshold(1) - 0.45).abs() < 1e-9);
        assert!((bfs.exploration_threshold(2) - 0.60).abs() < 1e-9);
    }

    #[test]
    fn hop_multiplier_falls_back_past_the_table() {
        let bfs = BfsConfig::default();
        assert_eq!(bfs.hop_multiplier(1), 2.0);
        assert_eq!(bfs.hop_multiplier(2), 1.3);
        assert_eq!(bfs.hop_multiplier(3), 1.0);
        assert_eq!(bfs.hop_multiplier(4), 0.8);
        assert_eq!(bfs.hop_multiplier(9), 0.8);
    }

    #[test]
    fn rerank_threshold_follows_provider() {
        let mut rerank = RerankConfig::default();
        assert_eq!(rerank.threshold(), 0.3);
        rerank.provider = RerankProvider::Embedding;
        assert_eq!(rerank.threshold(), 0.75);
    }
}
