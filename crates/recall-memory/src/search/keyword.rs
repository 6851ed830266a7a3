// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! BM25 keyword search over statement facts.

use async_trait::async_trait;
use recall_core::RecallError;

use super::{
    EpisodeCandidate, RetrievalStrategy, SearchContext, StrategyKind, group_by_episode,
    mean_candidate, sort_candidates,
};
use crate::store::GraphStore;

/// Full-text match; episode score is the mean BM25 of its matched statements.
pub struct KeywordSearch {
    store: GraphStore,
    limit: usize,
}

impl KeywordSearch {
    pub fn new(store: GraphStore, limit: usize) -> Self {
        Self { store, limit }
    }
}

#[async_trait]
impl RetrievalStrategy for KeywordSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Keyword
    }

    async fn search(&self, ctx: &SearchContext) -> Result<Vec<EpisodeCandidate>, RecallError> {
        let hits = self
            .store
            .search_statements_fts(&ctx.filter, &ctx.query, self.limit)
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

#[cfg(test)]
mod tests {
    use super::super::fixtures::{context, graph};
    use super::*;

    #[tokio::test]
    async fn matches_words_and_hides_invalidated_facts() {
        let store = graph().await;
        let search = KeywordSearch::new(store.clone(), 20);
        let ctx = context(&store, "where does Alice work", vec![1.0, 0.0, 0.0], &[]).await;

        let results = search.search(&ctx).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|c| c.episode.id.as_str()).collect();
        assert!(ids.contains(&"ep_new_job"));
        assert!(ids.contains(&"ep_food"));
        // The Acme fact was invalidated before the reference time.
        assert!(!ids.contains(&"ep_old_job"));
        assert!(results.iter().all(|c| c.score > 0.0));
    }

    #[tokio::test]
    async fn punctuation_only_query_returns_nothing() {
        let store = graph().await;
        let search = KeywordSearch::new(store.clone(), 20);
        let ctx = context(&store, "?!", vec![1.0, 0.0, 0.0], &[]).await;
        assert!(search.search(&ctx).await.unwrap().is_empty());
    }
}
