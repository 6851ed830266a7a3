// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cosine search over whole-episode content embeddings.
//!
//! Catches broad queries where no single statement is a close match.

use std::collections::HashMap;

use async_trait::async_trait;
use recall_core::RecallError;

use super::{EpisodeCandidate, RetrievalStrategy, SearchContext, StrategyKind, sort_candidates};
use crate::store::{GraphStore, VectorNamespace, VectorQuery};

pub struct EpisodeVectorSearch {
    store: GraphStore,
    threshold: f64,
    limit: usize,
}

impl EpisodeVectorSearch {
    pub fn new(store: GraphStore, threshold: f64, limit: usize) -> Self {
        Self {
            store,
            threshold,
            limit,
        }
    }
}

#[async_trait]
impl RetrievalStrategy for EpisodeVectorSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EpisodeVector
    }

    async fn search(&self, ctx: &SearchContext) -> Result<Vec<EpisodeCandidate>, RecallError> {
        let hits = self
            .store
            .vector_search(VectorQuery {
                namespace: VectorNamespace::EpisodeContent,
                user_id: ctx.user_id.clone(),
                embedding: ctx.embedding.clone(),
                threshold: self.threshold,
                limit: self.limit,
                exclude_ids: Vec::new(),
            })
            .await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = hits.iter().map(|(id, _)| id.clone()).collect();
        let scores: HashMap<String, f64> = hits.into_iter().collect();
        let mut candidates: Vec<EpisodeCandidate> = self
            .store
            .get_episodes(&ctx.user_id, &ids)
            .await?
            .into_iter()
            .filter(|e| ctx.admits_episode(e))
            .map(|episode| EpisodeCandidate {
                score: scores.get(&episode.id).copied().unwrap_or(0.0),
                episode,
                statement_count: 0,
                top_statements: Vec::new(),
                invalidated_statements: Vec::new(),
                entity_match_count: 0,
            })
            .collect();
        sort_candidates(&mut candidates);
        Ok(candidates)
    }
}
