// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Merges per-strategy candidates into one record per episode.
//!
//! [`aggregate`] is a pure fold over strategy outputs: the result is a union
//! keyed by episode id, ordered by first appearance, with each strategy's
//! score recorded in its own slot and statements deduplicated by id.

use std::collections::HashMap;

use serde::Serialize;

use crate::search::{EpisodeCandidate, ScoredStatement, StrategyKind};
use crate::types::{Episode, Statement};

/// Per-strategy scores of one episode (0.0 = strategy did not return it).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StrategyScores {
    pub episode_graph: f64,
    pub bfs: f64,
    pub vector: f64,
    pub episode_vector: f64,
    pub bm25: f64,
}

impl StrategyScores {
    pub fn get(&self, kind: StrategyKind) -> f64 {
        match kind {
            StrategyKind::EpisodeGraph => self.episode_graph,
            StrategyKind::Bfs => self.bfs,
            StrategyKind::StatementVector => self.vector,
            StrategyKind::EpisodeVector => self.episode_vector,
            StrategyKind::Keyword => self.bm25,
        }
    }

    fn slot(&mut self, kind: StrategyKind) -> &mut f64 {
        match kind {
            StrategyKind::EpisodeGraph => &mut self.episode_graph,
            StrategyKind::Bfs => &mut self.bfs,
            StrategyKind::StatementVector => &mut self.vector,
            StrategyKind::EpisodeVector => &mut self.episode_vector,
            StrategyKind::Keyword => &mut self.bm25,
        }
    }
}

/// How many statements (or, for episode vectors, hits) each strategy contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceBreakdown {
    pub episode_graph: usize,
    pub bfs: usize,
    pub vector: usize,
    pub episode_vector: usize,
    pub bm25: usize,
}

impl SourceBreakdown {
    fn slot(&mut self, kind: StrategyKind) -> &mut usize {
        match kind {
            StrategyKind::EpisodeGraph => &mut self.episode_graph,
            StrategyKind::Bfs => &mut self.bfs,
            StrategyKind::StatementVector => &mut self.vector,
            StrategyKind::EpisodeVector => &mut self.episode_vector,
            StrategyKind::Keyword => &mut self.bm25,
        }
    }
}

/// A statement with every strategy that found it.
#[derive(Debug, Clone)]
pub struct ProvenancedStatement {
    pub statement: Statement,
    pub sources: Vec<StrategyKind>,
    pub best_score: f64,
}

/// One episode with everything the strategies said about it.
#[derive(Debug, Clone)]
pub struct EpisodeWithProvenance {
    pub episode: Episode,
    pub scores: StrategyScores,
    pub sources: SourceBreakdown,
    pub statements: Vec<ProvenancedStatement>,
    pub invalidated_statements: Vec<ScoredStatement>,
    /// Largest matched-statement count reported by any strategy.
    pub statement_count: usize,
    pub entity_match_count: usize,
    pub first_level_score: f64,
    pub rerank_score: f64,
}

impl EpisodeWithProvenance {
    fn new(episode: Episode) -> Self {
        Self {
            episode,
            scores: StrategyScores::default(),
            sources: SourceBreakdown::default(),
            statements: Vec::new(),
            invalidated_statements: Vec::new(),
            statement_count: 0,
            entity_match_count: 0,
            first_level_score: 0.0,
            rerank_score: 0.0,
        }
    }

    /// Statement facts, best first, for display to judges and rerankers.
    pub fn top_facts(&self, n: usize) -> Vec<String> {
        let mut statements: Vec<&ProvenancedStatement> = self.statements.iter().collect();
        statements.sort_by(|a, b| b.best_score.total_cmp(&a.best_score));
        statements
            .into_iter()
            .take(n)
            .map(|s| s.statement.fact.clone())
            .collect()
    }

    fn absorb(&mut self, kind: StrategyKind, candidate: EpisodeCandidate) {
        let slot = self.scores.slot(kind);
        *slot = slot.max(candidate.score);
        *self.sources.slot(kind) += match kind {
            StrategyKind::EpisodeVector => 1,
            _ => candidate.top_statements.len(),
        };
        self.statement_count = self.statement_count.max(candidate.statement_count);
        self.entity_match_count = self.entity_match_count.max(candidate.entity_match_count);

        for scored in candidate.top_statements {
            match self
                .statements
                .iter_mut()
                .find(|s| s.statement.id == scored.statement.id)
            {
                Some(existing) => {
                    if !existing.sources.contains(&kind) {
                        existing.sources.push(kind);
                    }
                    existing.best_score = existing.best_score.max(scored.score);
                }
                None => self.statements.push(ProvenancedStatement {
                    statement: scored.statement,
                    sources: vec![kind],
                    best_score: scored.score,
                }),
            }
        }
        for scored in candidate.invalidated_statements {
            if !self
                .invalidated_statements
                .iter()
                .any(|s| s.statement.id == scored.statement.id)
            {
                self.invalidated_statements.push(scored);
            }
        }
    }
}

/// Union of all strategy outputs, one record per episode id.
pub fn aggregate<I>(results: I) -> Vec<EpisodeWithProvenance>
where
    I: IntoIterator<Item = (StrategyKind, Vec<EpisodeCandidate>)>,
{
    let (records, _) = results.into_iter().fold(
        (Vec::<EpisodeWithProvenance>::new(), HashMap::<String, usize>::new()),
        |(mut records, mut index), (kind, candidates)| {
            for candidate in candidates {
                let position = *index
                    .entry(candidate.episode.id.clone())
                    .or_insert_with(|| {
                        records.push(EpisodeWithProvenance::new(candidate.episode.clone()));
                        records.len() - 1
                    });
                records[position].absorb(kind, candidate);
            }
            (records, index)
        },
    );
    records
}
