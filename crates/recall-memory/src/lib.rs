// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temporal knowledge-graph memory with hybrid multi-strategy retrieval.
//!
//! Episodes (conversation turns, document chunks) attest reified statements
//! whose validity windows decide what is true at a given time. A query runs
//! five retrieval strategies concurrently, merges their episodes with
//! provenance and ranks them with either an external reranker or the internal
//! multi-factor algorithm.
//!
//! ## Architecture
//!
//! - **GraphStore**: SQLite persistence with BLOB vectors and FTS5
//! - **StatementResolver**: duplicate / contradiction handling at ingestion
//! - **QueryEntityResolver**: query chunks to graph entities
//! - **Strategies**: episode graph, BFS, statement vector, episode vector, keyword
//! - **RankingPipeline**: fused score, adaptive threshold, cliff cutoff, confidence
//! - **SearchService**: the fan-out / fan-in entry point

pub mod aggregate;
pub mod budget;
pub mod compaction;
pub mod embedder;
pub mod query_entities;
pub mod ranking;
pub mod rerank;
pub mod resolution;
pub mod response;
pub mod search;
pub mod service;
pub mod store;
pub mod types;
pub mod validity;

pub use aggregate::{EpisodeWithProvenance, aggregate};
pub use budget::{TokenCounter, apply_token_budget};
pub use embedder::HttpEmbedder;
pub use query_entities::QueryEntityResolver;
pub use ranking::{RankOptions, RankOutcome, RankingPipeline};
pub use rerank::{EmbeddingReranker, RemoteReranker, build_reranker};
pub use resolution::{CandidateStatement, IngestReport, StatementResolver};
pub use response::{InvalidatedFact, MemoryEntry, SearchResponse, StructuredResponse};
pub use search::{RetrievalStrategy, StrategyKind};
pub use service::{SearchOptions, SearchReport, SearchService, SortOrder};
pub use store::{GraphStore, StatementFilter, VectorNamespace, VectorQuery};
pub use types::*;
pub use validity::TemporalWindow;
