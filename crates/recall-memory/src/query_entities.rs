// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolves a free-text query to the graph entities it mentions.
//!
//! The query is split into unigrams, bigrams and the full string; each chunk
//! embedding is matched against entity name embeddings and the hits are
//! unioned by entity id.

use std::collections::HashSet;

use recall_core::RecallError;

use crate::store::{GraphStore, VectorNamespace, VectorQuery};
use crate::types::Entity;

/// Unigrams, bigrams and the full query, deduplicated, in that order.
pub fn chunk_query(query: &str) -> Vec<String> {
    let words: Vec<String> = query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect();

    let mut seen = HashSet::new();
    let mut chunks = Vec::new();
    let mut push = |chunk: String| {
        if seen.insert(chunk.to_lowercase()) {
            chunks.push(chunk);
        }
    };

    for word in &words {
        push(word.clone());
    }
    for pair in words.windows(2) {
        push(format!("{} {}", pair[0], pair[1]));
    }
    let full = query.trim();
    if !full.is_empty() {
        push(full.to_string());
    }
    chunks
}

/// Matches chunk embeddings against the entity-name index.
#[derive(Clone)]
pub struct QueryEntityResolver {
    store: GraphStore,
    threshold: f64,
    top_k: usize,
}

impl QueryEntityResolver {
    pub fn new(store: GraphStore, threshold: f64, top_k: usize) -> Self {
        Self {
            store,
            threshold,
            top_k,
        }
    }

    /// Union of the top-k entity matches of every chunk embedding.
    ///
    /// An empty result is a valid outcome, not an error.
    pub async fn resolve(
        &self,
        user_id: &str,
        chunk_embeddings: &[Vec<f32>],
    ) -> Result<Vec<Entity>, RecallError> {
        let mut ids: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for embedding in chunk_embeddings {
            let hits = self
                .store
                .vector_search(VectorQuery {
                    namespace: VectorNamespace::EntityName,
                    user_id: user_id.to_string(),
                    embedding: embedding.clone(),
                    threshold: self.threshold,
                    limit: self.top_k,
                    exclude_ids: Vec::new(),
                })
                .await?;
            for (id, _) in hits {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut entities = self.store.get_entities(&ids).await?;
        entities.sort_by_key(|e| ids.iter().position(|id| *id == e.id));
        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::entity;

    #[test]
    fn chunks_are_words_bigrams_and_full_query() {
        let chunks = chunk_query("Where does Alice work?");
        assert_eq!(
            chunks,
            vec![
                "Where",
                "does",
                "Alice",
                "work",
                "Where does",
                "does Alice",
                "Alice work",
                "Where does Alice work?",
            ]
        );
    }

    #[test]
    fn single_word_query_is_not_duplicated() {
        assert_eq!(chunk_query("  tea "), vec!["tea"]);
        assert!(chunk_query("   ").is_empty());
    }

    #[tokio::test]
    async fn resolve_unions_and_dedups_across_chunks() {
        let store = GraphStore::open_in_memory().await.unwrap();
        store
            .insert_entity(&entity("alice", "Alice", None, vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .insert_entity(&entity("acme", "Acme", None, vec![0.0, 1.0, 0.0]))
            .await
            .unwrap();
        store
            .insert_entity(&entity("tea", "tea", None, vec![0.0, 0.0, 1.0]))
            .await
            .unwrap();

        let resolver = QueryEntityResolver::new(store, 0.5, 3);
        let found = resolver
            .resolve(
                "u1",
                &[vec![1.0, 0.1, 0.0], vec![0.9, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
            )
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "acme"]);

        let none = resolver.resolve("u1", &[vec![-1.0, -1.0, -1.0]]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn each_chunk_contributes_only_its_own_top_k() {
        let store = GraphStore::open_in_memory().await.unwrap();
        for (id, emb) in [
            ("e1", vec![1.0, 0.0]),
            ("e2", vec![0.99, 0.1]),
            ("e3", vec![0.97, 0.2]),
            ("e4", vec![0.95, 0.3]),
            ("e5", vec![0.9, 0.4]),
        ] {
            store.insert_entity(&entity(id, id, None, emb)).await.unwrap();
        }

        let resolver = QueryEntityResolver::new(store, 0.5, 3);
        let found = resolver
            .resolve("u1", &[vec![1.0, 0.0], vec![1.0, 0.0]])
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2", "e3"]);
    }
}
