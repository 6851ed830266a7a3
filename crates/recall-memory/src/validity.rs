// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Temporal validity of statements.
//!
//! A statement holds at time `T` iff `valid_at <= T` and it has not been
//! invalidated at or before `T`. Retrieval evaluates every statement against
//! one reference time per query.

use chrono::{DateTime, Utc};

/// `valid_at <= t && (invalid_at is None || invalid_at > t)`.
pub fn is_valid_at(
    valid_at: DateTime<Utc>,
    invalid_at: Option<DateTime<Utc>>,
    t: DateTime<Utc>,
) -> bool {
    valid_at <= t && invalid_at.is_none_or(|inv| inv > t)
}

/// The time window a query is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalWindow {
    /// Statements must be valid at this instant.
    pub reference_time: DateTime<Utc>,
    /// Statements asserted before this instant are ignored.
    pub start_time: Option<DateTime<Utc>>,
    /// Surface statements that are not valid at `reference_time` (separately
    /// from ranked evidence).
    pub include_invalidated: bool,
}

impl TemporalWindow {
    /// Window for "what is true now".
    pub fn now() -> Self {
        Self {
            reference_time: Utc::now(),
            start_time: None,
            include_invalidated: false,
        }
    }

    /// Reference time resolution: an explicit `valid_at` wins over `end_time`,
    /// which wins over the current time.
    pub fn resolve(
        valid_at: Option<DateTime<Utc>>,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        include_invalidated: bool,
    ) -> Self {
        Self {
            reference_time: valid_at.or(end_time).unwrap_or_else(Utc::now),
            start_time,
            include_invalidated,
        }
    }

    /// Whether the statement window counts as ranked evidence for this query.
    pub fn admits(&self, valid_at: DateTime<Utc>, invalid_at: Option<DateTime<Utc>>) -> bool {
        self.after_start(valid_at) && is_valid_at(valid_at, invalid_at, self.reference_time)
    }

    fn after_start(&self, valid_at: DateTime<Utc>) -> bool {
        self.start_time.is_none_or(|start| valid_at >= start)
    }
}
