// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graph domain types: entities, reified statements, episodes and session compacts.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A named node of the knowledge graph. Predicates are entities too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub entity_type: Option<String>,
    pub attributes: BTreeMap<String, String>,
    #[serde(skip)]
    pub name_embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A reified subject-predicate-object fact with a validity window.
///
/// Only `invalid_at` and `invalidated_by` change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub id: String,
    pub user_id: String,
    pub subject_id: String,
    pub predicate_id: String,
    pub object_id: String,
    pub fact: String,
    #[serde(skip)]
    pub fact_embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub valid_at: DateTime<Utc>,
    pub invalid_at: Option<DateTime<Utc>>,
    pub invalidated_by: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub aspect: Option<String>,
}

impl Statement {
    /// Whether the statement is true at `t`: `valid_at <= t` and not yet invalidated at `t`.
    pub fn is_valid_at(&self, t: DateTime<Utc>) -> bool {
        crate::validity::is_valid_at(self.valid_at, self.invalid_at, t)
    }

    /// Ids of every entity the statement touches.
    pub fn entity_ids(&self) -> [&str; 3] {
        [&self.subject_id, &self.predicate_id, &self.object_id]
    }
}

/// Kind of ingested content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EpisodeType {
    /// A conversation turn; may be grouped by session.
    Conversation,
    /// A document chunk; never grouped by session.
    Document,
}

impl EpisodeType {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeType::Conversation => "conversation",
            EpisodeType::Document => "document",
        }
    }

    /// Parse from SQLite string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "document" => EpisodeType::Document,
            _ => EpisodeType::Conversation,
        }
    }
}

/// One ingested unit of content (a conversation turn or a document chunk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub user_id: String,
    /// Normalized content.
    pub content: String,
    pub original_content: String,
    #[serde(skip)]
    pub content_embedding: Vec<f32>,
    pub source: String,
    pub session_id: Option<String>,
    pub chunk_index: Option<u32>,
    pub total_chunks: Option<u32>,
    pub episode_type: EpisodeType,
    pub valid_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub label_ids: Vec<String>,
    pub recall_count: u64,
}

/// Cached summary of a conversation session. Derived, never authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactedSession {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub summary: String,
    pub start_time: DateTime<Utc>,
}

/// Convert f32 vector to bytes for SQLite BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert SQLite BLOB back to f32 vector. Trailing partial chunks are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched dimensions or zero-length vectors so that a
/// single malformed embedding never poisons a batch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Scores many embeddings against one query vector in a single pass.
pub fn score_batch<'a, I>(query: &[f32], embeddings: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    embeddings
        .into_iter()
        .map(|e| cosine_similarity(query, e))
        .collect()
}

/// Fixed-width UTC timestamp used for storage; lexical order equals time order.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp, falling back to the Unix epoch on malformed input.
pub fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}
