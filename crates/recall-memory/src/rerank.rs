// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External reranking providers.
//!
//! [`RemoteReranker`] calls a Cohere-compatible `/rerank` API whose scores
//! already lie in `[0, 1]`. [`EmbeddingReranker`] scores documents locally by
//! cosine similarity to the query, using whatever embedding adapter is
//! configured, and maps cosine `[-1, 1]` onto `[0, 1]`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use recall_config::model::{RerankConfig, RerankProvider};
use recall_core::types::{AdapterType, EmbeddingInput, HealthStatus, RerankScore};
use recall_core::{EmbeddingAdapter, PluginAdapter, RecallError, RerankAdapter};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::cosine_similarity;

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankScore>,
}

/// Cross-encoder reranking over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteReranker {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl RemoteReranker {
    pub fn new(config: &RerankConfig) -> Result<Self, RecallError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| RecallError::Config("rerank.endpoint is required for the remote provider".into()))?;

        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert(
                "authorization",
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                    RecallError::Config(format!("invalid rerank API key header value: {e}"))
                })?,
            );
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RecallError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            url: format!("{}/rerank", endpoint.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl PluginAdapter for RemoteReranker {
    fn name(&self) -> &str {
        "remote-reranker"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Reranker
    }

    async fn health_check(&self) -> Result<HealthStatus, RecallError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl RerankAdapter for RemoteReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
    ) -> Result<Vec<RerankScore>, RecallError> {
        let response = self
            .client
            .post(&self.url)
            .json(&RerankRequest {
                model: &self.model,
                query,
                documents,
                top_n: documents.len(),
            })
            .send()
            .await
            .map_err(|e| RecallError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, documents = documents.len(), "rerank response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecallError::provider(format!(
                "rerank API returned {status}: {body}"
            )));
        }

        let parsed: RerankResponse = response.json().await.map_err(|e| RecallError::Provider {
            message: format!("failed to parse rerank response: {e}"),
            source: Some(Box::new(e)),
        })?;
        if let Some(bad) = parsed.results.iter().find(|r| r.index >= documents.len()) {
            return Err(RecallError::provider(format!(
                "rerank result index {} out of range for {} documents",
                bad.index,
                documents.len()
            )));
        }
        Ok(parsed.results)
    }
}

/// Local reranker: cosine similarity between query and document embeddings.
pub struct EmbeddingReranker {
    embedder: Arc<dyn EmbeddingAdapter>,
}

impl EmbeddingReranker {
    pub fn new(embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl PluginAdapter for EmbeddingReranker {
    fn name(&self) -> &str {
        "embedding-reranker"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Reranker
    }

    async fn health_check(&self) -> Result<HealthStatus, RecallError> {
        self.embedder.health_check().await
    }
}

#[async_trait]
impl RerankAdapter for EmbeddingReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
    ) -> Result<Vec<RerankScore>, RecallError> {
        let mut texts = Vec::with_capacity(documents.len() + 1);
        texts.push(query.to_string());
        texts.extend(documents.iter().cloned());

        let output = self.embedder.embed(EmbeddingInput { texts }).await?;
        let Some((query_vec, doc_vecs)) = output.embeddings.split_first() else {
            return Err(RecallError::embedding("embedder returned no vectors"));
        };
        if doc_vecs.len() != documents.len() {
            return Err(RecallError::embedding(format!(
                "expected {} document embeddings, got {}",
                documents.len(),
                doc_vecs.len()
            )));
        }

        let mut scores: Vec<RerankScore> = doc_vecs
            .iter()
            .enumerate()
            .map(|(index, v)| RerankScore {
                index,
                relevance_score: cosine_similarity(query_vec, v),
            })
            .collect();
        scores.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        Ok(scores)
    }

    fn normalize(&self, raw: f64) -> f64 {
        ((raw + 1.0) / 2.0).clamp(0.0, 1.0)
    }
}

/// Build the configured reranker, or `None` when reranking is disabled.
pub fn build_reranker(
    config: &RerankConfig,
    embedder: Arc<dyn EmbeddingAdapter>,
) -> Result<Option<Arc<dyn RerankAdapter>>, RecallError> {
    Ok(match config.provider {
        RerankProvider::None => None,
        RerankProvider::Remote => Some(Arc::new(RemoteReranker::new(config)?)),
        RerankProvider::Embedding => Some(Arc::new(EmbeddingReranker::new(embedder))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_test_utils::MockEmbedder;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn remote_config(endpoint: String) -> RerankConfig {
        RerankConfig {
            provider: RerankProvider::Remote,
            endpoint: Some(endpoint),
            ..RerankConfig::default()
        }
    }

    #[tokio::test]
    async fn remote_reranker_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .and(body_partial_json(serde_json::json!({"query": "tea", "top_n": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"index": 1, "relevance_score": 0.92},
                    {"index": 0, "relevance_score": 0.10}
                ]
            })))
            .mount(&server)
            .await;

        let reranker = RemoteReranker::new(&remote_config(server.uri())).unwrap();
        let scores = reranker
            .rerank("tea", &["coffee".into(), "green tea".into()])
            .await
            .unwrap();
        assert_eq!(scores[0].index, 1);
        assert!((scores[0].relevance_score - 0.92).abs() < 1e-9);
        assert_eq!(reranker.normalize(1.7), 1.0);
    }

    #[tokio::test]
    async fn remote_reranker_rejects_out_of_range_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"index": 5, "relevance_score": 0.9}]
            })))
            .mount(&server)
            .await;

        let reranker = RemoteReranker::new(&remote_config(server.uri())).unwrap();
        assert!(reranker.rerank("q", &["only".into()]).await.is_err());
    }

    #[tokio::test]
    async fn remote_reranker_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let reranker = RemoteReranker::new(&remote_config(server.uri())).unwrap();
        let err = reranker.rerank("q", &["doc".into()]).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn remote_reranker_requires_endpoint() {
        let config = RerankConfig {
            provider: RerankProvider::Remote,
            ..RerankConfig::default()
        };
        assert!(RemoteReranker::new(&config).is_err());
    }

    #[tokio::test]
    async fn embedding_reranker_orders_by_similarity() {
        let embedder = Arc::new(
            MockEmbedder::new(2)
                .with_vector("query", vec![1.0, 0.0])
                .with_vector("near", vec![0.9, 0.1])
                .with_vector("far", vec![-1.0, 0.0]),
        );
        let reranker = EmbeddingReranker::new(embedder);
        let scores = reranker
            .rerank("query", &["far".into(), "near".into()])
            .await
            .unwrap();
        assert_eq!(scores[0].index, 1);
        assert_eq!(reranker.normalize(-1.0), 0.0);
        assert_eq!(reranker.normalize(1.0), 1.0);
        assert!((reranker.normalize(0.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn build_reranker_respects_provider() {
        let embedder: Arc<dyn EmbeddingAdapter> = Arc::new(MockEmbedder::new(2));
        assert!(build_reranker(&RerankConfig::default(), embedder.clone())
            .unwrap()
            .is_none());
        let config = RerankConfig {
            provider: RerankProvider::Embedding,
            ..RerankConfig::default()
        };
        let built = build_reranker(&config, embedder).unwrap().unwrap();
        assert_eq!(built.name(), "embedding-reranker");
    }
}
