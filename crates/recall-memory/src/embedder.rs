// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP embedding adapter for OpenAI-compatible `/embeddings` endpoints.

use std::time::Duration;

use async_trait::async_trait;
use recall_config::model::EmbeddingConfig;
use recall_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use recall_core::{EmbeddingAdapter, PluginAdapter, RecallError};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding adapter that calls a remote embeddings API.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    /// Build a client from the `[embedding]` config section.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, RecallError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert(
                "authorization",
                HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                    RecallError::Config(format!("invalid embedding API key header value: {e}"))
                })?,
            );
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RecallError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            url: format!("{}/embeddings", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl PluginAdapter for HttpEmbedder {
    fn name(&self) -> &str {
        "http-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, RecallError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl EmbeddingAdapter for HttpEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RecallError> {
        if input.texts.is_empty() {
            return Ok(EmbeddingOutput {
                embeddings: Vec::new(),
                dimensions: self.dimensions,
            });
        }

        let response = self
            .client
            .post(&self.url)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: &input.texts,
            })
            .send()
            .await
            .map_err(|e| RecallError::Embedding {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, texts = input.texts.len(), "embedding response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecallError::embedding(format!(
                "embedding API returned {status}: {body}"
            )));
        }

        let mut parsed: EmbeddingResponse =
            response.json().await.map_err(|e| RecallError::Embedding {
                message: format!("failed to parse embedding response: {e}"),
                source: Some(Box::new(e)),
            })?;
        if parsed.data.len() != input.texts.len() {
            return Err(RecallError::embedding(format!(
                "expected {} embeddings, got {}",
                input.texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);

        let dimensions = parsed
            .data
            .first()
            .map(|d| d.embedding.len())
            .unwrap_or(self.dimensions);
        Ok(EmbeddingOutput {
            embeddings: parsed.data.into_iter().map(|d| d.embedding).collect(),
            dimensions,
        })
    }
}

/// Embed a single text through any adapter.
pub async fn embed_one(
    embedder: &dyn EmbeddingAdapter,
    text: &str,
) -> Result<Vec<f32>, RecallError> {
    let output = embedder
        .embed(EmbeddingInput {
            texts: vec![text.to_string()],
        })
        .await?;
    output
        .embeddings
        .into_iter()
        .next()
        .ok_or_else(|| RecallError::embedding("embedder returned no vectors"))
}
