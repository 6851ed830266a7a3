// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM relevance judge used in the uncertain-confidence band.

use async_trait::async_trait;

use crate::error::RecallError;
use crate::types::JudgeCandidate;

/// Decides which candidates are actually relevant to a query.
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    /// Returns the `index` values of the candidates judged relevant.
    /// An empty vector means nothing is relevant.
    async fn judge(
        &self,
        query: &str,
        candidates: &[JudgeCandidate],
    ) -> Result<Vec<usize>, RecallError>;
}
