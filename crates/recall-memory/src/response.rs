// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search response shapes: structured JSON or an agent-readable text block.

use std::collections::HashSet;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::EpisodeWithProvenance;
use crate::types::EpisodeType;

/// Text returned when nothing relevant was found.
pub const NO_MEMORIES: &str = "No relevant memories found.";

/// One recalled item: an episode or a session compact standing in for several.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub label_ids: Vec<String>,
    pub is_compact: bool,
    pub relevance_score: f64,
    #[serde(skip)]
    pub session_id: Option<String>,
    #[serde(skip)]
    pub episode_type: EpisodeType,
    /// Episodes this entry represents (one, or a compact's members).
    #[serde(skip)]
    pub episode_ids: Vec<String>,
}

impl From<&EpisodeWithProvenance> for MemoryEntry {
    fn from(e: &EpisodeWithProvenance) -> Self {
        Self {
            id: e.episode.id.clone(),
            content: e.episode.content.clone(),
            created_at: e.episode.created_at,
            label_ids: e.episode.label_ids.clone(),
            is_compact: false,
            relevance_score: e.rerank_score,
            session_id: e.episode.session_id.clone(),
            episode_type: e.episode.episode_type,
            episode_ids: vec![e.episode.id.clone()],
        }
    }
}

/// A statement that matched the query but is not valid at the reference time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidatedFact {
    pub fact: String,
    pub valid_at: DateTime<Utc>,
    pub invalid_at: Option<DateTime<Utc>>,
    pub relevant_score: f64,
}

/// Collect invalidated statements across all aggregated episodes, best first,
/// deduplicated by statement id.
pub fn collect_invalidated(episodes: &[EpisodeWithProvenance]) -> Vec<InvalidatedFact> {
    let mut seen = HashSet::new();
    let mut facts: Vec<InvalidatedFact> = episodes
        .iter()
        .flat_map(|e| e.invalidated_statements.iter())
        .filter(|s| seen.insert(s.statement.id.clone()))
        .map(|s| InvalidatedFact {
            fact: s.statement.fact.clone(),
            valid_at: s.statement.valid_at,
            invalid_at: s.statement.invalid_at,
            relevant_score: s.score,
        })
        .collect();
    facts.sort_by(|a, b| b.relevant_score.total_cmp(&a.relevant_score));
    facts
}

/// Structured response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredResponse {
    pub episodes: Vec<MemoryEntry>,
    pub invalidated_facts: Vec<InvalidatedFact>,
}

impl StructuredResponse {
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty() && self.invalidated_facts.is_empty()
    }
}

/// What a search returns to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Structured(StructuredResponse),
    Text(String),
}

impl SearchResponse {
    pub fn empty(structured: bool) -> Self {
        if structured {
            SearchResponse::Structured(StructuredResponse::default())
        } else {
            SearchResponse::Text(NO_MEMORIES.to_string())
        }
    }

    pub fn render(body: StructuredResponse, structured: bool) -> Self {
        if structured {
            SearchResponse::Structured(body)
        } else {
            SearchResponse::Text(format_text(&body))
        }
    }

    /// Entries in rank order (empty for the text form).
    pub fn entries(&self) -> &[MemoryEntry] {
        match self {
            SearchResponse::Structured(body) => &body.episodes,
            SearchResponse::Text(_) => &[],
        }
    }
}

impl MemoryEntry {
    /// The entry as it appears under "Recalled context".
    pub fn text_block(&self) -> String {
        let kind = if self.is_compact { "session summary" } else { "episode" };
        format!(
            "\n[{}] ({kind}, relevance {:.2})\n{}\n",
            self.created_at.format("%Y-%m-%d %H:%M"),
            self.relevance_score,
            self.content.trim()
        )
    }

    /// The entry in the form the caller receives: its JSON object or its text block.
    pub fn rendered(&self, structured: bool) -> String {
        if structured {
            serde_json::to_string(self).unwrap_or_else(|_| self.content.clone())
        } else {
            self.text_block()
        }
    }
}

/// Human/agent-readable rendering with recalled context and invalidated facts.
pub fn format_text(body: &StructuredResponse) -> String {
    if body.is_empty() {
        return NO_MEMORIES.to_string();
    }
    let mut out = String::new();
    if !body.episodes.is_empty() {
        out.push_str("## Recalled context\n");
        for entry in &body.episodes {
            out.push_str(&entry.text_block());
        }
    }
    if !body.invalidated_facts.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("## Invalidated facts\n");
        for fact in &body.invalidated_facts {
            let until = fact
                .invalid_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "later".to_string());
            let _ = writeln!(
                out,
                "- {} (valid {} to {until})",
                fact.fact,
                fact.valid_at.format("%Y-%m-%d")
            );
        }
    }
    out
}
