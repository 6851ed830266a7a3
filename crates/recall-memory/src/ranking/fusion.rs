// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal multi-factor scoring: fused score, adaptive threshold, score-gap
//! cutoff and confidence.

use recall_config::model::RankingConfig;
use serde::Serialize;

use crate::aggregate::EpisodeWithProvenance;

/// Hierarchical fused score of one episode.
///
/// Weighted sum of the strategy scores that contributed, then the
/// concentration bonus and, when enabled, the entity-match multiplier.
pub fn fused_score(episode: &EpisodeWithProvenance, config: &RankingConfig) -> f64 {
    let w = &config.weights;
    let s = &episode.scores;
    let mut score = 0.0;
    for (value, weight) in [
        (s.episode_graph, w.episode_graph),
        (s.bfs, w.bfs),
        (s.vector, w.vector),
        (s.episode_vector, w.episode_vector),
        (s.bm25, w.bm25),
    ] {
        if value > 0.0 {
            score += value * weight;
        }
    }

    score *= 1.0 + (1.0 + episode.statement_count as f64).ln() * config.concentration_factor;
    if config.entity_match_boost {
        score *= 1.0 + episode.entity_match_count as f64 * config.entity_match_factor;
    }
    score
}

/// Which strategy families returned anything for this query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FiredStrategies {
    pub graph: bool,
    pub vector: bool,
    pub keyword: bool,
}

impl FiredStrategies {
    pub fn of(episodes: &[EpisodeWithProvenance]) -> Self {
        episodes.iter().fold(Self::default(), |acc, e| Self {
            graph: acc.graph || e.scores.episode_graph > 0.0 || e.scores.bfs > 0.0,
            vector: acc.vector || e.scores.vector > 0.0 || e.scores.episode_vector > 0.0,
            keyword: acc.keyword || e.scores.bm25 > 0.0,
        })
    }
}

/// Minimum fused score, chosen by the strongest strategy family that fired.
pub fn quality_threshold(fired: FiredStrategies, config: &RankingConfig) -> f64 {
    if fired.graph {
        config.graph_quality_threshold
    } else if fired.vector {
        config.vector_quality_threshold
    } else {
        config.keyword_quality_threshold
    }
}

/// Number of results to keep from a descending score list.
///
/// Never cuts before `min_results`; from there, cuts right after the first
/// consecutive pair whose relative drop exceeds `cliff_ratio`.
pub fn gap_cutoff(scores: &[f64], min_results: usize, cliff_ratio: f64) -> usize {
    for i in min_results.max(1)..scores.len() {
        let prev = scores[i - 1];
        if prev > 0.0 && (prev - scores[i]) / prev > cliff_ratio {
            return i;
        }
    }
    scores.len()
}

/// Strategy whose weighted contribution dominates a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dominant {
    Graph,
    Bfs,
    Vector,
    /// Nothing but keyword matches; BM25 itself is never dominant.
    KeywordOnly,
}

pub fn dominant_strategy(episodes: &[EpisodeWithProvenance], config: &RankingConfig) -> Dominant {
    let w = &config.weights;
    let (graph, bfs, vector) = episodes.iter().fold((0.0, 0.0, 0.0), |(g, b, v), e| {
        (
            g + e.scores.episode_graph * w.episode_graph,
            b + e.scores.bfs * w.bfs,
            v + e.scores.vector * w.vector + e.scores.episode_vector * w.episode_vector,
        )
    });
    if graph <= 0.0 && bfs <= 0.0 && vector <= 0.0 {
        Dominant::KeywordOnly
    } else if graph >= bfs && graph >= vector {
        Dominant::Graph
    } else if bfs >= vector {
        Dominant::Bfs
    } else {
        Dominant::Vector
    }
}

/// Average fused score against the dominant strategy's expected maximum, in `[0, 1]`.
pub fn confidence(episodes: &[EpisodeWithProvenance], config: &RankingConfig) -> f64 {
    if episodes.is_empty() {
        return 0.0;
    }
    let expected = match dominant_strategy(episodes, config) {
        Dominant::Graph => config.graph_expected_max,
        Dominant::Bfs => config.bfs_expected_max,
        Dominant::Vector => config.vector_expected_max,
        Dominant::KeywordOnly => config.keyword_expected_max,
    };
    let avg = episodes.iter().map(|e| e.first_level_score).sum::<f64>() / episodes.len() as f64;
    (avg / expected).clamp(0.0, 1.0)
}
