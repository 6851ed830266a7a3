// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reranking adapter trait.

use async_trait::async_trait;

use crate::error::RecallError;
use crate::traits::adapter::PluginAdapter;
use crate::types::RerankScore;

/// External relevance scorer for a query and a list of documents.
#[async_trait]
pub trait RerankAdapter: PluginAdapter {
    /// Scores `documents` against `query`. Documents the provider omits are
    /// treated as irrelevant.
    async fn rerank(&self, query: &str, documents: &[String])
    -> Result<Vec<RerankScore>, RecallError>;

    /// Maps a provider-native score onto `[0, 1]`.
    fn normalize(&self, raw: f64) -> f64 {
        raw.clamp(0.0, 1.0)
    }
}
