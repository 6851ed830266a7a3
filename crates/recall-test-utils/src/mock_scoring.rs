// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock reranker, relevance judge and statement classifier.

use async_trait::async_trait;

use recall_core::traits::adapter::PluginAdapter;
use recall_core::types::{
    AdapterType, Classification, ClassifierFact, HealthStatus, JudgeCandidate, RerankScore,
};
use recall_core::{RecallError, RelevanceJudge, RerankAdapter, StatementClassifier};

/// Scores documents by substring rules; the first matching rule wins.
#[derive(Default)]
pub struct MockReranker {
    rules: Vec<(String, f64)>,
    fail: bool,
}

impl MockReranker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents containing `needle` score `score`; others score 0.
    pub fn with_score(mut self, needle: &str, score: f64) -> Self {
        self.rules.push((needle.to_string(), score));
        self
    }

    pub fn failing() -> Self {
        Self {
            rules: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl PluginAdapter for MockReranker {
    fn name(&self) -> &str {
        "mock-reranker"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Reranker
    }

    async fn health_check(&self) -> Result<HealthStatus, RecallError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl RerankAdapter for MockReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
    ) -> Result<Vec<RerankScore>, RecallError> {
        if self.fail {
            return Err(RecallError::provider("mock reranker configured to fail"));
        }
        Ok(documents
            .iter()
            .enumerate()
            .map(|(index, doc)| RerankScore {
                index,
                relevance_score: self
                    .rules
                    .iter()
                    .find(|(needle, _)| doc.contains(needle.as_str()))
                    .map(|(_, score)| *score)
                    .unwrap_or(0.0),
            })
            .collect())
    }
}

/// Accepts candidates whose content contains any of the given needles.
#[derive(Default)]
pub struct MockJudge {
    accept: Vec<String>,
    fail: bool,
}

impl MockJudge {
    pub fn accepting(needles: &[&str]) -> Self {
        Self {
            accept: needles.iter().map(|n| n.to_string()).collect(),
            fail: false,
        }
    }

    /// Rejects everything.
    pub fn rejecting() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            accept: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl RelevanceJudge for MockJudge {
    async fn judge(
        &self,
        _query: &str,
        candidates: &[JudgeCandidate],
    ) -> Result<Vec<usize>, RecallError> {
        if self.fail {
            return Err(RecallError::provider("mock judge configured to fail"));
        }
        Ok(candidates
            .iter()
            .filter(|c| self.accept.iter().any(|n| c.content.contains(n.as_str())))
            .map(|c| c.index)
            .collect())
    }
}

/// Classifies by exact (new fact, existing fact) pairs; anything else is independent.
#[derive(Default)]
pub struct MockClassifier {
    rules: Vec<(String, String, Classification)>,
    fail: bool,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, new_fact: &str, existing_fact: &str, class: Classification) -> Self {
        self.rules
            .push((new_fact.to_string(), existing_fact.to_string(), class));
        self
    }

    pub fn failing() -> Self {
        Self {
            rules: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl StatementClassifier for MockClassifier {
    async fn classify(
        &self,
        candidate: &ClassifierFact,
        existing: &[ClassifierFact],
    ) -> Result<Vec<Classification>, RecallError> {
        if self.fail {
            return Err(RecallError::provider("mock classifier configured to fail"));
        }
        Ok(existing
            .iter()
            .map(|old| {
                self.rules
                    .iter()
                    .find(|(new, prev, _)| *new == candidate.fact && *prev == old.fact)
                    .map(|(_, _, class)| *class)
                    .unwrap_or(Classification::Independent)
            })
            .collect())
    }
}
