// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end search over an in-memory graph built through statement resolution.

use std::sync::Arc;

use recall_config::RecallConfig;
use recall_config::model::ResolutionConfig;
use recall_core::Classification;
use recall_memory::ranking::RankingMethod;
use recall_memory::response::NO_MEMORIES;
use recall_memory::{
    SearchOptions, SearchResponse, SearchService, SortOrder, StatementResolver, StrategyKind,
};
use recall_test_utils::{GraphFixture, MockClassifier, MockEmbedder, MockReranker, day};

/// Alice worked at CompanyA, then joined CompanyB; she also likes sushi.
async fn employment_graph() -> GraphFixture {
    let fx = GraphFixture::new(MockEmbedder::new(64).with_vector("zzqx", vec![0.0; 64]))
        .await
        .unwrap();
    let resolver = StatementResolver::new(
        fx.store.clone(),
        Arc::new(MockClassifier::new().with_rule(
            "Alice joined CompanyB",
            "Alice works at CompanyA",
            Classification::Contradiction,
        )),
        ResolutionConfig::default(),
    );

    let jobs = [
        ("ep-1", "Alice told me she works at CompanyA", "sess-a", 2, "CompanyA", "Alice works at CompanyA"),
        ("ep-2", "Alice said she joined CompanyB last week", "sess-b", 6, "CompanyB", "Alice joined CompanyB"),
    ];
    for (id, content, session, d, company, fact) in jobs {
        let episode = fx.episode_value(id, content, Some(session), day(d));
        let candidate = fx
            .candidate(("Alice", "works at", company), fact, day(d))
            .await
            .unwrap();
        resolver.ingest(&episode, vec![candidate]).await.unwrap();
    }

    let episode = fx.episode_value("ep-3", "Alice loves sushi on Fridays", Some("sess-c"), day(4));
    let candidate = fx
        .candidate(("Alice", "likes", "sushi"), "Alice loves sushi", day(4))
        .await
        .unwrap();
    resolver.ingest(&episode, vec![candidate]).await.unwrap();
    fx
}

fn service(fx: &GraphFixture, config: &RecallConfig) -> SearchService {
    SearchService::new(fx.store.clone(), fx.embedder.clone(), config)
}

fn structured(include_invalidated: bool) -> SearchOptions {
    SearchOptions {
        structured: true,
        adaptive_filtering: false,
        include_invalidated,
        ..SearchOptions::default()
    }
}

fn ids(response: &SearchResponse) -> Vec<String> {
    response.entries().iter().map(|e| e.id.clone()).collect()
}

#[tokio::test]
async fn empty_query_gives_the_empty_shape() {
    let fx = employment_graph().await;
    let service = service(&fx, &RecallConfig::default());

    let text = service
        .search("   ", fx.user_id(), &SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(text, SearchResponse::Text(NO_MEMORIES.to_string()));

    let json = service.search("", fx.user_id(), &structured(false)).await.unwrap();
    assert_eq!(
        serde_json::to_value(&json).unwrap(),
        serde_json::json!({"episodes": [], "invalidatedFacts": []})
    );
}

#[tokio::test]
async fn nothing_matching_is_not_an_error() {
    let fx = employment_graph().await;
    let service = service(&fx, &RecallConfig::default());
    let response = service
        .search("zzqx", fx.user_id(), &structured(true))
        .await
        .unwrap();
    assert_eq!(response, SearchResponse::empty(true));
}

#[tokio::test]
async fn empty_user_id_is_rejected() {
    let fx = employment_graph().await;
    let service = service(&fx, &RecallConfig::default());
    assert!(service.search("Alice", " ", &structured(false)).await.is_err());
}

#[tokio::test]
async fn superseded_job_is_hidden_by_default_and_reported_on_request() {
    let fx = employment_graph().await;
    let service = service(&fx, &RecallConfig::default());

    let current = service
        .search("Where does Alice work", fx.user_id(), &structured(false))
        .await
        .unwrap();
    assert!(ids(&current).contains(&"ep-2".to_string()));
    let SearchResponse::Structured(body) = &current else {
        panic!("expected structured response");
    };
    assert!(body.invalidated_facts.is_empty());

    let history = service
        .search("Where does Alice work", fx.user_id(), &structured(true))
        .await
        .unwrap();
    let SearchResponse::Structured(body) = history else {
        panic!("expected structured response");
    };
    let old = body
        .invalidated_facts
        .iter()
        .find(|f| f.fact == "Alice works at CompanyA")
        .expect("CompanyA fact reported as invalidated");
    assert_eq!(old.valid_at, day(2));
    assert_eq!(old.invalid_at, Some(day(6)));
    assert!(body.invalidated_facts.iter().all(|f| f.fact != "Alice joined CompanyB"));
}

#[tokio::test]
async fn text_response_lists_recalled_context() {
    let fx = employment_graph().await;
    let service = service(&fx, &RecallConfig::default());
    let options = SearchOptions {
        adaptive_filtering: false,
        ..SearchOptions::default()
    };
    let SearchResponse::Text(text) = service
        .search("Alice sushi", fx.user_id(), &options)
        .await
        .unwrap()
    else {
        panic!("expected text response");
    };
    assert!(text.contains("## Recalled context"));
    assert!(text.contains("Alice loves sushi on Fridays"));
}

#[tokio::test]
async fn broken_reranker_falls_back_to_internal_ranking() {
    let fx = employment_graph().await;
    let config = RecallConfig::default();
    let options = structured(false);

    let baseline = service(&fx, &config)
        .search_with_report("Where does Alice work", fx.user_id(), &options)
        .await
        .unwrap();
    let with_broken = service(&fx, &config)
        .with_reranker(Arc::new(MockReranker::failing()), 0.3)
        .search_with_report("Where does Alice work", fx.user_id(), &options)
        .await
        .unwrap();

    assert!(!ids(&baseline.response).is_empty());
    assert_eq!(ids(&with_broken.response), ids(&baseline.response));
    assert_eq!(with_broken.method, Some(RankingMethod::Internal));
}

#[tokio::test]
async fn reranker_below_threshold_falls_back_too() {
    let fx = employment_graph().await;
    let report = service(&fx, &RecallConfig::default())
        .with_reranker(Arc::new(MockReranker::new().with_score("Alice", 0.1)), 0.5)
        .search_with_report("Where does Alice work", fx.user_id(), &structured(false))
        .await
        .unwrap();
    assert_eq!(report.method, Some(RankingMethod::Internal));
    assert!(!report.response.entries().is_empty());
}

#[tokio::test]
async fn external_reranker_orders_results() {
    let fx = employment_graph().await;
    let report = service(&fx, &RecallConfig::default())
        .with_reranker(
            Arc::new(
                MockReranker::new()
                    .with_score("CompanyB", 0.9)
                    .with_score("sushi", 0.6),
            ),
            0.3,
        )
        .search_with_report("Where does Alice work", fx.user_id(), &structured(false))
        .await
        .unwrap();

    assert_eq!(
        report.method,
        Some(RankingMethod::External {
            provider: "mock-reranker".to_string()
        })
    );
    let entries = report.response.entries();
    assert_eq!(entries[0].id, "ep-2");
    assert!((entries[0].relevance_score - 0.9).abs() < 1e-9);
    assert!(entries.iter().all(|e| e.relevance_score >= 0.3));
}

#[tokio::test]
async fn recency_sort_is_newest_first() {
    let fx = employment_graph().await;
    let options = SearchOptions {
        sort: SortOrder::Recency,
        ..structured(false)
    };
    let response = service(&fx, &RecallConfig::default())
        .search("Alice", fx.user_id(), &options)
        .await
        .unwrap();
    let entries = response.entries();
    assert!(entries.len() >= 2);
    assert!(entries.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn session_compact_replaces_its_episodes() {
    let fx = employment_graph().await;
    fx.compact("sess-b", "Alice changed jobs and now works at CompanyB")
        .await
        .unwrap();
    let response = service(&fx, &RecallConfig::default())
        .search("Where does Alice work", fx.user_id(), &structured(false))
        .await
        .unwrap();
    let ids = ids(&response);
    assert!(ids.contains(&"compact-sess-b".to_string()));
    assert!(!ids.contains(&"ep-2".to_string()));
    let compact = response
        .entries()
        .iter()
        .find(|e| e.id == "compact-sess-b")
        .unwrap();
    assert!(compact.is_compact);
}

#[tokio::test]
async fn returned_episodes_have_their_recall_count_bumped() {
    let fx = employment_graph().await;
    let response = service(&fx, &RecallConfig::default())
        .search("Alice sushi", fx.user_id(), &structured(false))
        .await
        .unwrap();
    assert!(ids(&response).contains(&"ep-3".to_string()));
    let episode = fx.store.get_episode("ep-3").await.unwrap().unwrap();
    assert_eq!(episode.recall_count, 1);
}

#[tokio::test]
async fn token_budget_drops_from_the_tail() {
    let fx = employment_graph().await;
    let mut config = RecallConfig::default();
    config.search.token_budget = 0;
    let report = service(&fx, &config)
        .search_with_report("Alice", fx.user_id(), &structured(false))
        .await
        .unwrap();
    assert!(report.dropped_for_budget > 0);
    assert!(report.response.entries().is_empty());
}

#[tokio::test]
async fn failing_embedder_degrades_to_empty_response() {
    let fx = employment_graph().await;
    let service = SearchService::new(
        fx.store.clone(),
        Arc::new(MockEmbedder::failing()),
        &RecallConfig::default(),
    );
    let response = service
        .search("Where does Alice work", fx.user_id(), &SearchOptions::default())
        .await
        .unwrap();
    assert_eq!(response, SearchResponse::Text(NO_MEMORIES.to_string()));
}

#[tokio::test]
async fn strategies_past_their_timeout_count_as_empty() {
    let fx = employment_graph().await;
    let mut config = RecallConfig::default();
    config.search.strategy_timeout_ms = 0;
    let report = service(&fx, &config)
        .search_with_report("Where does Alice work", fx.user_id(), &structured(false))
        .await
        .unwrap();
    assert!(report.failed_strategies.contains(&StrategyKind::Keyword));
    assert!(report.failed_strategies.contains(&StrategyKind::EpisodeVector));
    assert_eq!(report.response, SearchResponse::empty(true));
}

#[tokio::test]
async fn the_query_is_embedded_in_a_single_call() {
    let fx = employment_graph().await;
    let before = fx.embedder.calls();
    service(&fx, &RecallConfig::default())
        .search("Where does Alice work", fx.user_id(), &structured(false))
        .await
        .unwrap();
    assert_eq!(fx.embedder.calls() - before, 1);
}
