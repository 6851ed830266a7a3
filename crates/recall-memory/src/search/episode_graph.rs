// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity-anchored dense-subgraph scoring.
//!
//! Rewards episodes that are densely and relevantly about the query entities:
//!
//! ```text
//! score = entity_match_count * entity_weight
//!       + (matched_statements / total_statements) * entity_match_count
//!       + avg_relevance(matched statements)
//! ```

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use recall_config::model::EpisodeGraphConfig;
use recall_core::RecallError;

use super::{
    EpisodeCandidate, RetrievalStrategy, SearchContext, StrategyKind, group_by_episode, mean,
    sort_candidates, top_by_score,
};
use crate::store::GraphStore;
use crate::types::{Statement, score_batch};

pub struct EpisodeGraphSearch {
    store: GraphStore,
    config: EpisodeGraphConfig,
}

impl EpisodeGraphSearch {
    pub fn new(store: GraphStore, config: EpisodeGraphConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl RetrievalStrategy for EpisodeGraphSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EpisodeGraph
    }

    async fn search(&self, ctx: &SearchContext) -> Result<Vec<EpisodeCandidate>, RecallError> {
        let query_ids = ctx.query_entity_ids();
        if query_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query_set: HashSet<&str> = query_ids.iter().map(String::as_str).collect();

        let statements = self
            .store
            .statements_adjacent_to(&ctx.filter, &query_ids, &[])
            .await?;
        let relevance = score_batch(
            &ctx.embedding,
            statements.iter().map(|s| s.fact_embedding.as_slice()),
        );
        let scored: Vec<(Statement, f64)> = statements.into_iter().zip(relevance).collect();

        let groups = group_by_episode(&self.store, ctx, scored).await?;
        let episode_ids: Vec<String> = groups.iter().map(|g| g.episode.id.clone()).collect();
        let totals: HashMap<String, usize> = self.store.statement_counts(&episode_ids).await?;

        let mut candidates = Vec::new();
        for group in groups {
            let entity_match_count = group
                .valid
                .iter()
                .flat_map(|s| s.statement.entity_ids())
                .filter(|id| query_set.contains(id))
                .collect::<HashSet<&str>>()
                .len();
            let matched = group.valid.len();
            let avg_relevance = mean(group.valid.iter().map(|s| s.score));

            if entity_match_count == 0 || avg_relevance < self.config.min_avg_relevance {
                continue;
            }

            let total = totals
                .get(&group.episode.id)
                .copied()
                .unwrap_or(matched)
                .max(matched);
            let connectivity = matched as f64 / total as f64 * entity_match_count as f64;
            let score = entity_match_count as f64 * self.config.entity_weight
                + connectivity
                + avg_relevance;

            candidates.push(EpisodeCandidate {
                episode: group.episode,
                score,
                statement_count: matched,
                top_statements: top_by_score(group.valid, ctx.top_statements),
                invalidated_statements: group.invalidated,
                entity_match_count,
            });
        }
        sort_candidates(&mut candidates);
        Ok(candidates)
    }
}
