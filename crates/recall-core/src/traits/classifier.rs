// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pluggable duplicate / contradiction classifier for incoming statements.

use async_trait::async_trait;

use crate::error::RecallError;
use crate::types::{Classification, ClassifierFact};

/// Classifies a candidate fact against existing, currently valid facts.
///
/// The deciding question is "could both be true at the same time?". If yes,
/// the pair is not a contradiction. Ambiguous pairs should be reported as
/// [`Classification::Independent`].
#[async_trait]
pub trait StatementClassifier: Send + Sync {
    /// Returns one classification per element of `existing`, in order.
    async fn classify(
        &self,
        candidate: &ClassifierFact,
        existing: &[ClassifierFact],
    ) -> Result<Vec<Classification>, RecallError>;
}
