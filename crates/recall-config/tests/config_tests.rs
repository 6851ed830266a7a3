// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Recall configuration system.

use recall_config::diagnostic::ConfigError;
use recall_config::model::{RecallConfig, RerankProvider};
use recall_config::{load_and_validate_str, load_config_from_path, load_config_from_str};

/// Valid TOML with fields from every section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_recall_config() {
    let toml = r#"
[log]
level = "debug"

[storage]
database_path = "/tmp/recall-test.db"
wal_mode = false

[search]
keyword_limit = 10
statement_vector_threshold = 0.6
token_budget = 4000

[bfs]
hop_multipliers = [3.0, 2.0, 1.0]
beyond_multiplier = 0.5

[ranking]
entity_match_boost = true

[ranking.weights]
bm25 = 0.1

[rerank]
provider = "embedding"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/recall-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.search.keyword_limit, 10);
    assert_eq!(config.search.statement_vector_threshold, 0.6);
    assert_eq!(config.search.token_budget, 4000);
    assert_eq!(config.bfs.hop_multipliers, vec![3.0, 2.0, 1.0]);
    assert!(config.ranking.entity_match_boost);
    assert_eq!(config.ranking.weights.bm25, 0.1);
    // Unspecified weights keep their defaults.
    assert_eq!(config.ranking.weights.episode_graph, 5.0);
    assert_eq!(config.rerank.provider, RerankProvider::Embedding);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty config should load");
    let defaults = RecallConfig::default();
    assert_eq!(config.search.keyword_limit, defaults.search.keyword_limit);
    assert_eq!(config.bfs.relevance_threshold, 0.65);
    assert_eq!(config.resolution.similarity_threshold, 0.85);
    assert_eq!(config.rerank.provider, RerankProvider::None);
}

#[test]
fn unknown_field_in_search_is_rejected() {
    let toml = r#"
[search]
keywrod_limit = 5
"#;
    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = err.to_string();
    assert!(
        err_str.contains("unknown field") || err_str.contains("keywrod_limit"),
        "error should mention the bad key, got: {err_str}"
    );
}

#[test]
fn unknown_field_produces_suggestion() {
    let toml = r#"
[bfs]
early_stop_cp = 10
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "early_stop_cp");
            assert_eq!(suggestion.as_deref(), Some("early_stop_cap"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[search]
keyword_limit = "many"
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn semantic_validation_runs_after_parse() {
    let toml = r#"
[ranking]
confidence_floor = 0.8
uncertain_ceiling = 0.6
"#;
    let errors = load_and_validate_str(toml).expect_err("floor above ceiling");
    assert!(
        errors
            .iter()
            .any(|e| e.to_string().contains("confidence_floor"))
    );
}

#[test]
fn unknown_rerank_provider_is_rejected() {
    let toml = r#"
[rerank]
provider = "magic"
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            r#"
[search]
keyword_limit = 7
"#,
        )?;
        jail.set_env("RECALL_SEARCH_KEYWORD_LIMIT", "11");
        jail.set_env("RECALL_EPISODE_GRAPH_ENTITY_WEIGHT", "3.5");

        let config = load_config_from_path(std::path::Path::new("custom.toml"))?;
        assert_eq!(config.search.keyword_limit, 11);
        assert_eq!(config.episode_graph.entity_weight, 3.5);
        Ok(())
    });
}

#[test]
fn config_serializes_to_json() {
    let json = serde_json::to_value(RecallConfig::default()).unwrap();
    assert_eq!(json["rerank"]["provider"], "none");
    assert_eq!(json["bfs"]["early_stop_cap"], 50);
}
