// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval strategies.
//!
//! Every strategy implements [`RetrievalStrategy`] and returns
//! episode-grouped candidates with a strategy-local score. Strategies are
//! side-effect free and independent, so the service can run them concurrently.

pub mod bfs;
pub mod episode_graph;
pub mod episode_vector;
pub mod keyword;
pub mod statement_vector;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use recall_core::RecallError;
use serde::Serialize;
use strum::{Display, EnumIter, IntoStaticStr};

use crate::store::{GraphStore, StatementFilter};
use crate::types::{Entity, Episode, Statement};

pub use bfs::BfsSearch;
pub use episode_graph::EpisodeGraphSearch;
pub use episode_vector::EpisodeVectorSearch;
pub use keyword::KeywordSearch;
pub use statement_vector::StatementVectorSearch;

/// Identifies a retrieval strategy in scores, logs and metrics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    EpisodeGraph,
    Bfs,
    StatementVector,
    EpisodeVector,
    Keyword,
}

impl StrategyKind {
    /// Label value used for metrics.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Everything a strategy needs to know about one query.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub query: String,
    pub user_id: String,
    pub embedding: Vec<f32>,
    pub query_entities: Vec<Entity>,
    pub filter: StatementFilter,
    /// Episodes must carry at least one of these labels (empty = any).
    pub labels: Vec<String>,
    /// Maximum statements kept per candidate.
    pub top_statements: usize,
}

impl SearchContext {
    pub fn query_entity_ids(&self) -> Vec<String> {
        self.query_entities.iter().map(|e| e.id.clone()).collect()
    }

    /// Episode passes the label filter and was ingested inside the query window.
    pub fn admits_episode(&self, episode: &Episode) -> bool {
        let window = &self.filter.window;
        let in_window = episode.valid_at <= window.reference_time
            && window.start_time.is_none_or(|start| episode.valid_at >= start);
        let labelled = self.labels.is_empty()
            || episode.label_ids.iter().any(|l| self.labels.contains(l));
        in_window && labelled
    }
}

/// A statement with the score a strategy assigned it.
#[derive(Debug, Clone)]
pub struct ScoredStatement {
    pub statement: Statement,
    pub score: f64,
}

/// One episode as seen by one strategy.
#[derive(Debug, Clone)]
pub struct EpisodeCandidate {
    pub episode: Episode,
    pub score: f64,
    /// Matched statements valid at the reference time.
    pub statement_count: usize,
    /// Best matched statements, at most `top_statements`.
    pub top_statements: Vec<ScoredStatement>,
    /// Matched statements outside the query window; never ranked.
    pub invalidated_statements: Vec<ScoredStatement>,
    /// Distinct query entities touched (entity-anchored strategies only).
    pub entity_match_count: usize,
}

/// A retrieval strategy over the graph store.
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn search(&self, ctx: &SearchContext) -> Result<Vec<EpisodeCandidate>, RecallError>;
}

/// Statements of one episode, split by validity.
pub(crate) struct EpisodeGroup {
    pub episode: Episode,
    pub valid: Vec<ScoredStatement>,
    pub invalidated: Vec<ScoredStatement>,
}

/// Group scored statements under the episodes that attest them.
///
/// Statements outside the query window go to `invalidated`; episodes failing
/// the label or window filter are dropped.
pub(crate) async fn group_by_episode(
    store: &GraphStore,
    ctx: &SearchContext,
    scored: Vec<(Statement, f64)>,
) -> Result<Vec<EpisodeGroup>, RecallError> {
    if scored.is_empty() {
        return Ok(Vec::new());
    }
    let statement_ids: Vec<String> = scored.iter().map(|(s, _)| s.id.clone()).collect();
    let provenance = store.episodes_for_statements(&statement_ids).await?;

    let mut episode_ids: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for ids in provenance.values() {
        for id in ids {
            if seen.insert(id.clone()) {
                episode_ids.push(id.clone());
            }
        }
    }
    let episodes: HashMap<String, Episode> = store
        .get_episodes(&ctx.user_id, &episode_ids)
        .await?
        .into_iter()
        .filter(|e| ctx.admits_episode(e))
        .map(|e| (e.id.clone(), e))
        .collect();

    let window = ctx.filter.window;
    let mut groups: HashMap<String, EpisodeGroup> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for (statement, score) in scored {
        let Some(owners) = provenance.get(&statement.id) else {
            continue;
        };
        let valid = window.admits(statement.valid_at, statement.invalid_at);
        for episode_id in owners {
            let Some(episode) = episodes.get(episode_id) else {
                continue;
            };
            let group = groups.entry(episode_id.clone()).or_insert_with(|| {
                order.push(episode_id.clone());
                EpisodeGroup {
                    episode: episode.clone(),
                    valid: Vec::new(),
                    invalidated: Vec::new(),
                }
            });
            let entry = ScoredStatement {
                statement: statement.clone(),
                score,
            };
            if valid {
                group.valid.push(entry);
            } else {
                group.invalidated.push(entry);
            }
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|id| groups.remove(&id))
        .collect())
}

/// Candidate whose score is the mean of its valid statement scores.
pub(crate) fn mean_candidate(group: EpisodeGroup, top_n: usize) -> EpisodeCandidate {
    let score = mean(group.valid.iter().map(|s| s.score));
    let statement_count = group.valid.len();
    EpisodeCandidate {
        episode: group.episode,
        score,
        statement_count,
        top_statements: top_by_score(group.valid, top_n),
        invalidated_statements: group.invalidated,
        entity_match_count: 0,
    }
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

pub(crate) fn top_by_score(mut statements: Vec<ScoredStatement>, n: usize) -> Vec<ScoredStatement> {
    statements.sort_by(|a, b| b.score.total_cmp(&a.score));
    statements.truncate(n);
    statements
}

/// Best candidates first.
pub(crate) fn sort_candidates(candidates: &mut [EpisodeCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! A tiny employment graph shared by the strategy tests.
    //!
    //! Embeddings are 3-dimensional: axis 0 = work, axis 1 = food, axis 2 = travel.

    use super::*;
    use crate::store::test_support::{at, entity, episode, filter_at, statement};

    pub async fn graph() -> GraphStore {
        let store = GraphStore::open_in_memory().await.unwrap();
        for (id, name, ty, emb) in [
            ("alice", "Alice", Some("Person"), vec![0.6, 0.4, 0.2]),
            ("works_at", "works at", None, vec![1.0, 0.0, 0.0]),
            ("acme", "Acme", Some("Company"), vec![1.0, 0.0, 0.1]),
            ("initech", "Initech", Some("Company"), vec![1.0, 0.1, 0.0]),
            ("likes", "likes", None, vec![0.0, 1.0, 0.0]),
            ("sushi", "sushi", Some("Food"), vec![0.0, 1.0, 0.0]),
            ("located_in", "located in", None, vec![0.0, 0.0, 1.0]),
            ("berlin", "Berlin", Some("City"), vec![0.0, 0.0, 1.0]),
        ] {
            store.insert_entity(&entity(id, name, ty, emb)).await.unwrap();
        }

        let mut old_job = statement(
            "s_acme",
            ("alice", "works_at", "acme"),
            "Alice works at Acme",
            vec![1.0, 0.0, 0.0],
            2,
        );
        old_job.invalid_at = Some(at(6));
        old_job.invalidated_by = Some("s_initech".into());
        for s in [
            old_job,
            statement(
                "s_initech",
                ("alice", "works_at", "initech"),
                "Alice works at Initech",
                vec![0.95, 0.05, 0.0],
                6,
            ),
            statement(
                "s_sushi",
                ("alice", "likes", "sushi"),
                "Alice likes sushi",
                vec![0.0, 1.0, 0.0],
                3,
            ),
            statement(
                "s_berlin",
                ("initech", "located_in", "berlin"),
                "Initech is located in Berlin",
                vec![0.7, 0.0, 0.7],
                4,
            ),
        ] {
            store.insert_statement(&s).await.unwrap();
        }

        for (id, content, emb) in [
            ("ep_old_job", "Alice said she works at Acme", vec![1.0, 0.0, 0.0]),
            ("ep_new_job", "Alice joined Initech", vec![0.9, 0.1, 0.0]),
            ("ep_food", "Alice loves sushi", vec![0.0, 1.0, 0.0]),
            ("ep_city", "Initech moved to Berlin", vec![0.5, 0.0, 0.8]),
        ] {
            store
                .insert_episode(&episode(id, content, Some("sess-1"), emb))
                .await
                .unwrap();
        }
        for (ep, st) in [
            ("ep_old_job", "s_acme"),
            ("ep_new_job", "s_initech"),
            ("ep_food", "s_sushi"),
            ("ep_city", "s_berlin"),
        ] {
            store.link_episode_to_statement(ep, st).await.unwrap();
        }
        store
    }

    pub async fn context(store: &GraphStore, query: &str, embedding: Vec<f32>, entity_ids: &[&str]) -> SearchContext {
        let ids: Vec<String> = entity_ids.iter().map(|s| s.to_string()).collect();
        SearchContext {
            query: query.to_string(),
            user_id: "u1".into(),
            embedding,
            query_entities: store.get_entities(&ids).await.unwrap(),
            filter: filter_at(10),
            labels: Vec::new(),
            top_statements: 5,
        }
    }
}
