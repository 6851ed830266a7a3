// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replaces a session's ranked episodes with its cached summary.

use std::collections::HashMap;

use recall_core::RecallError;
use tracing::debug;

use crate::response::MemoryEntry;
use crate::store::GraphStore;
use crate::types::{CompactedSession, EpisodeType};

/// Substitute cached session compacts into a ranked list.
///
/// Each session with a compact collapses into one entry at the earliest rank
/// any of its episodes held, scored with the best member score and carrying
/// the union of member labels. Document chunks and sessions without a
/// compact pass through untouched.
pub fn apply_compacts(
    entries: Vec<MemoryEntry>,
    compacts: &HashMap<String, CompactedSession>,
) -> Vec<MemoryEntry> {
    let mut out: Vec<MemoryEntry> = Vec::with_capacity(entries.len());
    let mut slot_of_session: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let compact = entry
            .session_id
            .as_ref()
            .filter(|_| entry.episode_type == EpisodeType::Conversation && !entry.is_compact)
            .and_then(|sid| compacts.get(sid));
        let Some(compact) = compact else {
            out.push(entry);
            continue;
        };

        match slot_of_session.get(&compact.session_id) {
            Some(&slot) => {
                let merged = &mut out[slot];
                merged.relevance_score = merged.relevance_score.max(entry.relevance_score);
                for label in entry.label_ids {
                    if !merged.label_ids.contains(&label) {
                        merged.label_ids.push(label);
                    }
                }
                merged.episode_ids.extend(entry.episode_ids);
            }
            None => {
                slot_of_session.insert(compact.session_id.clone(), out.len());
                out.push(MemoryEntry {
                    id: compact.id.clone(),
                    content: compact.summary.clone(),
                    created_at: compact.start_time,
                    label_ids: entry.label_ids,
                    is_compact: true,
                    relevance_score: entry.relevance_score,
                    session_id: Some(compact.session_id.clone()),
                    episode_type: EpisodeType::Conversation,
                    episode_ids: entry.episode_ids,
                });
            }
        }
    }
    out
}

/// Fetch compacts for every conversation session in `entries`, then substitute.
pub async fn substitute_compacts(
    store: &GraphStore,
    user_id: &str,
    entries: Vec<MemoryEntry>,
) -> Result<Vec<MemoryEntry>, RecallError> {
    let mut compacts = HashMap::new();
    for entry in &entries {
        let Some(session_id) = &entry.session_id else {
            continue;
        };
        if entry.episode_type != EpisodeType::Conversation || compacts.contains_key(session_id) {
            continue;
        }
        if let Some(compact) = store.get_compact_by_session_id(user_id, session_id).await? {
            compacts.insert(session_id.clone(), compact);
        }
    }
    if compacts.is_empty() {
        return Ok(entries);
    }
    let before = entries.len();
    let out = apply_compacts(entries, &compacts);
    debug!(before, after = out.len(), sessions = compacts.len(), "substituted session compacts");
    Ok(out)
}
