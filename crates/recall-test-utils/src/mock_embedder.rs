// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedding adapter.
//!
//! Texts are embedded as hashed bags of lowercase words, so texts sharing
//! words are similar and the same text always maps to the same vector.
//! Specific texts can be pinned to hand-picked vectors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use recall_core::traits::adapter::PluginAdapter;
use recall_core::traits::embedding::EmbeddingAdapter;
use recall_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use recall_core::RecallError;

/// A mock embedder with bag-of-words vectors and optional pinned vectors.
pub struct MockEmbedder {
    dimensions: usize,
    pinned: HashMap<String, Vec<f32>>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            pinned: HashMap::new(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// An embedder whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(8)
        }
    }

    /// Pin `text` (exact match) to `vector`.
    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.pinned.insert(text.to_string(), vector);
        self
    }

    /// Number of `embed` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector this embedder produces for `text`.
    pub fn vector(&self, text: &str) -> Vec<f32> {
        if let Some(pinned) = self.pinned.get(text) {
            return pinned.clone();
        }
        let mut v = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 1)
        {
            let bucket = (fnv1a(&word.to_lowercase()) % self.dimensions as u64) as usize;
            v[bucket] += 1.0;
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
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
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, RecallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RecallError::embedding("mock embedder configured to fail"));
        }
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.vector(t)).collect(),
            dimensions: self.dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_vector() {
        let e = MockEmbedder::new(32);
        assert_eq!(e.vector("Alice works at Acme"), e.vector("alice WORKS at acme"));
        assert_eq!(e.vector("Alice").iter().sum::<f32>(), 1.0);
    }

    #[test]
    fn pinned_vectors_win() {
        let e = MockEmbedder::new(2).with_vector("query", vec![1.0, 0.0]);
        assert_eq!(e.vector("query"), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn counts_calls_and_fails_on_demand() {
        let e = MockEmbedder::failing();
        assert!(e.embed(EmbeddingInput { texts: vec!["x".into()] }).await.is_err());
        assert_eq!(e.calls(), 1);
    }
}
