// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types exchanged with adapters.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of pluggable adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Embedding,
    Reranker,
}

// --- Embedding types ---

/// Input for an embedding adapter. All texts are embedded in one call.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Output from an embedding adapter, one vector per input text in order.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}

// --- Reranking types ---

/// A relevance score assigned by a reranking provider to one input document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankScore {
    /// Position of the document in the request.
    pub index: usize,
    /// Provider-native relevance score.
    pub relevance_score: f64,
}

// --- Relevance judge types ---

/// One candidate shown to the relevance judge.
#[derive(Debug, Clone, Serialize)]
pub struct JudgeCandidate {
    pub index: usize,
    pub content: String,
    /// Strongest facts attested by the candidate episode.
    pub facts: Vec<String>,
}

// --- Statement classification types ---

/// A fact as presented to a statement classifier.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierFact {
    pub fact: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

/// Relationship between a new candidate fact and an existing one.
///
/// A progression (planning then executing, researching then deciding) is
/// `Independent`: both facts can be true at the same time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Same meaning, different wording.
    Duplicate,
    /// The two facts cannot both hold now; the new one supersedes.
    Contradiction,
    /// Both facts can hold simultaneously.
    Independent,
}
