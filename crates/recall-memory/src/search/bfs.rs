// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relevance-guided breadth-first traversal from the query entities.
//!
//! Each hop level fetches the valid statements adjacent to the frontier,
//! scores them against the query in one batch, and keeps only those above a
//! threshold that rises with depth. Kept statements extend the frontier
//! through their subject and object entities. Expansion stops at the depth
//! limit, on an empty frontier, or once enough strongly relevant statements
//! have been collected. Only statements at or above the final relevance
//! threshold are returned, weighted by hop distance.

use std::collections::HashSet;

use async_trait::async_trait;
use recall_config::model::BfsConfig;
use recall_core::RecallError;
use tracing::debug;

use super::{
    EpisodeCandidate, RetrievalStrategy, SearchContext, StrategyKind, group_by_episode,
    mean_candidate, sort_candidates,
};
use crate::store::GraphStore;
use crate::types::{Statement, score_batch};

/// A statement admitted during traversal.
#[derive(Debug, Clone)]
pub struct Reached {
    pub statement: Statement,
    pub relevance: f64,
    /// 1-based hop distance from the seed entities.
    pub hop: usize,
}

/// Outcome of one traversal.
#[derive(Debug, Default)]
pub struct Traversal {
    pub reached: Vec<Reached>,
    /// Statements outside the query window met along the way (with relevance).
    pub invalidated: Vec<(Statement, f64)>,
    pub levels_explored: usize,
    pub stopped_early: bool,
}

pub struct BfsSearch {
    store: GraphStore,
    config: BfsConfig,
    max_depth: usize,
}

impl BfsSearch {
    pub fn new(store: GraphStore, config: BfsConfig, max_depth: usize) -> Self {
        Self {
            store,
            config,
            max_depth,
        }
    }

    /// Run the hop-by-hop expansion and return every admitted statement.
    pub async fn traverse(&self, ctx: &SearchContext) -> Result<Traversal, RecallError> {
        let mut traversal = Traversal::default();
        let mut visited: HashSet<String> = ctx.query_entities.iter().map(|e| e.id.clone()).collect();
        let mut frontier: Vec<String> = visited.iter().cloned().collect();
        let mut seen_statements: Vec<String> = Vec::new();
        let window = ctx.filter.window;

        for depth in 0..self.max_depth {
            if frontier.is_empty() {
                break;
            }
            traversal.levels_explored = depth + 1;

            let statements = self
                .store
                .statements_adjacent_to(&ctx.filter, &frontier, &seen_statements)
                .await?;
            seen_statements.extend(statements.iter().map(|s| s.id.clone()));

            let relevance = score_batch(
                &ctx.embedding,
                statements.iter().map(|s| s.fact_embedding.as_slice()),
            );
            let threshold = self.config.exploration_threshold(depth);
            let mut next = Vec::new();

            for (statement, rel) in statements.into_iter().zip(relevance) {
                if !window.admits(statement.valid_at, statement.invalid_at) {
                    if rel >= self.config.relevance_threshold {
                        traversal.invalidated.push((statement, rel));
                    }
                    continue;
                }
                if rel < threshold {
                    continue;
                }
                for id in [&statement.subject_id, &statement.object_id] {
                    if visited.insert(id.clone()) {
                        next.push(id.clone());
                    }
                }
                traversal.reached.push(Reached {
                    statement,
                    relevance: rel,
                    hop: depth + 1,
                });
            }

            let strong = traversal
                .reached
                .iter()
                .filter(|r| r.relevance >= self.config.relevance_threshold)
                .count();
            if strong > self.config.early_stop_cap {
                traversal.stopped_early = depth + 1 < self.max_depth;
                break;
            }
            frontier = next;
        }

        debug!(
            reached = traversal.reached.len(),
            levels = traversal.levels_explored,
            stopped_early = traversal.stopped_early,
            "bfs traversal finished"
        );
        Ok(traversal)
    }
}

#[async_trait]
impl RetrievalStrategy for BfsSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Bfs
    }

    async fn search(&self, ctx: &SearchContext) -> Result<Vec<EpisodeCandidate>, RecallError> {
        if ctx.query_entities.is_empty() {
            return Ok(Vec::new());
        }
        let traversal = self.traverse(ctx).await?;

        let mut scored: Vec<(Statement, f64)> = traversal
            .reached
            .into_iter()
            .filter(|r| r.relevance >= self.config.relevance_threshold)
            .map(|r| {
                let weighted = r.relevance * self.config.hop_multiplier(r.hop);
                (r.statement, weighted)
            })
            .collect();
        scored.extend(traversal.invalidated);

        let groups = group_by_episode(&self.store, ctx, scored).await?;
        let mut candidates: Vec<EpisodeCandidate> = groups
            .into_iter()
            .map(|g| mean_candidate(g, ctx.top_statements))
            .collect();
        sort_candidates(&mut candidates);
        Ok(candidates)
    }
}
