// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express:
//! similarity thresholds inside `[0, 1]`, non-negative weights, strictly
//! decreasing hop multipliers, and provider settings that depend on each other.

use crate::diagnostic::ConfigError;
use crate::model::{RecallConfig, RerankProvider};

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every error instead of failing on the first one.
pub fn validate_config(config: &RecallConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let unit_values = [
        ("search.statement_vector_threshold", config.search.statement_vector_threshold),
        ("search.episode_vector_threshold", config.search.episode_vector_threshold),
        ("search.entity_threshold", config.search.entity_threshold),
        ("bfs.exploration_base", config.bfs.exploration_base),
        ("bfs.relevance_threshold", config.bfs.relevance_threshold),
        ("episode_graph.min_avg_relevance", config.episode_graph.min_avg_relevance),
        ("ranking.cliff_ratio", config.ranking.cliff_ratio),
        ("ranking.confidence_floor", config.ranking.confidence_floor),
        ("ranking.uncertain_ceiling", config.ranking.uncertain_ceiling),
        ("rerank.remote_threshold", config.rerank.remote_threshold),
        ("rerank.embedding_threshold", config.rerank.embedding_threshold),
        ("resolution.similarity_threshold", config.resolution.similarity_threshold),
    ];
    for (key, value) in unit_values {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::validation(format!(
                "{key} must be between 0.0 and 1.0, got {value}"
            )));
        }
    }

    let weights = &config.ranking.weights;
    let non_negative = [
        ("ranking.weights.episode_graph", weights.episode_graph),
        ("ranking.weights.bfs", weights.bfs),
        ("ranking.weights.vector", weights.vector),
        ("ranking.weights.episode_vector", weights.episode_vector),
        ("ranking.weights.bm25", weights.bm25),
        ("ranking.concentration_factor", config.ranking.concentration_factor),
        ("ranking.entity_match_factor", config.ranking.entity_match_factor),
        ("bfs.exploration_step", config.bfs.exploration_step),
        ("episode_graph.entity_weight", config.episode_graph.entity_weight),
    ];
    for (key, value) in non_negative {
        if value < 0.0 {
            errors.push(ConfigError::validation(format!(
                "{key} must be non-negative, got {value}"
            )));
        }
    }

    let expected_maxima = [
        ("ranking.graph_expected_max", config.ranking.graph_expected_max),
        ("ranking.bfs_expected_max", config.ranking.bfs_expected_max),
        ("ranking.vector_expected_max", config.ranking.vector_expected_max),
        ("ranking.keyword_expected_max", config.ranking.keyword_expected_max),
    ];
    for (key, value) in expected_maxima {
        if value <= 0.0 {
            errors.push(ConfigError::validation(format!(
                "{key} must be positive, got {value}"
            )));
        }
    }

    if config.ranking.confidence_floor >= config.ranking.uncertain_ceiling {
        errors.push(ConfigError::validation(format!(
            "ranking.confidence_floor ({}) must be below ranking.uncertain_ceiling ({})",
            config.ranking.confidence_floor, config.ranking.uncertain_ceiling
        )));
    }

    validate_hop_multipliers(config, &mut errors);

    if config.search.max_bfs_depth == 0 {
        errors.push(ConfigError::validation(
            "search.max_bfs_depth must be at least 1",
        ));
    }

    if config.search.token_budget == 0 {
        errors.push(ConfigError::validation(
            "search.token_budget must be at least 1",
        ));
    }

    if config.rerank.provider == RerankProvider::Remote
        && config
            .rerank
            .endpoint
            .as_deref()
            .is_none_or(|e| e.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "rerank.endpoint is required when rerank.provider = \"remote\"",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_hop_multipliers(config: &RecallConfig, errors: &mut Vec<ConfigError>) {
    let hops = &config.bfs.hop_multipliers;
    let Some(&last) = hops.last() else {
        errors.push(ConfigError::validation(
            "bfs.hop_multipliers must not be empty",
        ));
        return;
    };

    if hops.windows(2).any(|pair| pair[1] >= pair[0]) {
        errors.push(ConfigError::validation(format!(
            "bfs.hop_multipliers must strictly decrease, got {hops:?}"
        )));
    }

    if config.bfs.beyond_multiplier >= last {
        errors.push(ConfigError::validation(format!(
            "bfs.beyond_multiplier ({}) must be below the last hop multiplier ({last})",
            config.bfs.beyond_multiplier
        )));
    }
}
