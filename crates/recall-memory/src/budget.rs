// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token budget trimming of a relevance-ordered result list.

use std::sync::LazyLock;

use tiktoken_rs::CoreBPE;
use tracing::{debug, warn};

use crate::response::MemoryEntry;

static CL100K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| match tiktoken_rs::cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        warn!(error = %e, "cl100k_base unavailable, estimating tokens from length");
        None
    }
});

/// Counts tokens with the cl100k BPE, or ~4 chars per token when it cannot load.
#[derive(Debug, Clone, Copy, Default)]
pub enum TokenCounter {
    #[default]
    Cl100k,
    Estimate,
}

impl TokenCounter {
    pub fn count(&self, text: &str) -> usize {
        match self {
            TokenCounter::Cl100k => match CL100K.as_ref() {
                Some(bpe) => bpe.encode_with_special_tokens(text).len(),
                None => estimate(text),
            },
            TokenCounter::Estimate => estimate(text),
        }
    }
}

fn estimate(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// How many leading items fit: drops from the tail until the sum is within budget.
pub fn kept_len(token_counts: &[usize], budget: usize) -> usize {
    let mut total: usize = token_counts.iter().sum();
    let mut keep = token_counts.len();
    while total > budget && keep > 0 {
        keep -= 1;
        total -= token_counts[keep];
    }
    keep
}

/// Trim `entries` to `budget` tokens, least relevant first. Each entry is
/// counted as rendered in the response form selected by `structured`.
/// Returns the kept entries and how many were dropped. Entries are never truncated.
pub fn apply_token_budget(
    mut entries: Vec<MemoryEntry>,
    budget: usize,
    structured: bool,
    counter: &TokenCounter,
) -> (Vec<MemoryEntry>, usize) {
    let counts: Vec<usize> = entries
        .iter()
        .map(|e| counter.count(&e.rendered(structured)))
        .collect();
    let keep = kept_len(&counts, budget);
    let dropped = entries.len() - keep;
    if dropped > 0 {
        debug!(
            budget,
            dropped,
            kept_tokens = counts[..keep].iter().sum::<usize>(),
            "trimmed results to token budget"
        );
    }
    entries.truncate(keep);
    (entries, dropped)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;

    use super::*;
    use crate::types::EpisodeType;

    fn entry(id: &str, content: &str) -> MemoryEntry {
        MemoryEntry {
            id: id.into(),
            content: content.into(),
            created_at: Utc::now(),
            label_ids: Vec::new(),
            is_compact: false,
            relevance_score: 1.0,
            session_id: None,
            episode_type: EpisodeType::Conversation,
            episode_ids: vec![id.into()],
        }
    }

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(TokenCounter::Estimate.count(""), 0);
        assert_eq!(TokenCounter::Estimate.count("abc"), 1);
        assert_eq!(TokenCounter::Estimate.count("abcdefghi"), 3);
    }

    #[test]
    fn bpe_counts_something() {
        assert!(TokenCounter::Cl100k.count("Alice works at Initech in Berlin") > 0);
    }

    #[test]
    fn drops_from_the_tail() {
        let entries = vec![
            entry("a", &"x".repeat(40)),
            entry("b", &"x".repeat(40)),
            entry("c", &"x".repeat(40)),
        ];
        let (kept, dropped) = apply_token_budget(entries, 60, false, &TokenCounter::Estimate);
        assert_eq!(dropped, 1);
        assert_eq!(
            kept.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn oversized_first_entry_leaves_nothing() {
        let (kept, dropped) =
            apply_token_budget(vec![entry("a", &"x".repeat(400))], 10, false, &TokenCounter::Estimate);
        assert!(kept.is_empty());
        assert_eq!(dropped, 1);
    }

    #[test]
    fn counts_the_rendered_entry_not_just_its_content() {
        let e = entry("a", "Alice works at Initech");
        let content_only = TokenCounter::Estimate.count(&e.content);
        let as_text = TokenCounter::Estimate.count(&e.rendered(false));
        let as_json = TokenCounter::Estimate.count(&e.rendered(true));
        assert!(as_text > content_only);
        assert!(as_json > content_only);

        // A budget that fits the bare content but not its rendering drops it.
        let (kept, dropped) =
            apply_token_budget(vec![e.clone()], content_only, false, &TokenCounter::Estimate);
        assert!(kept.is_empty());
        assert_eq!(dropped, 1);
        let (kept, _) = apply_token_budget(vec![e], as_json, true, &TokenCounter::Estimate);
        assert_eq!(kept.len(), 1);
    }

    proptest! {
        #[test]
        fn trimming_is_idempotent(
            counts in proptest::collection::vec(0usize..500, 0..30),
            budget in 0usize..5000,
        ) {
            let once = kept_len(&counts, budget);
            let twice = kept_len(&counts[..once], budget);
            prop_assert_eq!(once, twice);
            prop_assert!(counts[..once].iter().sum::<usize>() <= budget);
        }
    }
}
