// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cosine search over statement fact embeddings.

use async_trait::async_trait;
use recall_core::RecallError;

use super::{
    EpisodeCandidate, RetrievalStrategy, SearchContext, StrategyKind, group_by_episode,
    mean_candidate, sort_candidates,
};
use crate::store::GraphStore;

pub struct StatementVectorSearch {
    store: GraphStore,
    threshold: f64,
    limit: usize,
}

impl StatementVectorSearch {
    pub fn new(store: GraphStore, threshold: f64, limit: usize) -> Self {
        Self {
            store,
            threshold,
            limit,
        }
    }
}

#[async_trait]
impl RetrievalStrategy for StatementVectorSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StatementVector
    }

    async fn search(&self, ctx: &SearchContext) -> Result<Vec<EpisodeCandidate>, RecallError> {
        let hits = self
            .store
            .search_statements_by_vector(&ctx.filter, &ctx.embedding, self.threshold, self.limit)
            .await?;
        let groups = group_by_episode(&self.store, ctx, hits).await?;
        let mut candidates: Vec<EpisodeCandidate> = groups
            .into_iter()
            .map(|g| mean_candidate(g, ctx.top_statements))
            .collect();
        sort_candidates(&mut candidates);
        Ok(candidates)
    }
}
