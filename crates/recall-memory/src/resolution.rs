// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion-side statement resolution.
//!
//! Each extracted triple is checked against the currently valid statements
//! that look like it (similar fact embedding, or same subject and predicate).
//! A pluggable classifier decides whether the new fact duplicates an existing
//! one, supersedes it, or simply coexists with it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use recall_config::model::ResolutionConfig;
use recall_core::types::ClassifierFact;
use recall_core::{Classification, RecallError, StatementClassifier};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::{GraphStore, StatementFilter};
use crate::types::{Episode, Statement};
use crate::validity::TemporalWindow;

/// A triple extracted from an episode, not yet stored.
#[derive(Debug, Clone)]
pub struct CandidateStatement {
    pub subject_id: String,
    pub predicate_id: String,
    pub object_id: String,
    pub fact: String,
    pub fact_embedding: Vec<f32>,
    pub valid_at: DateTime<Utc>,
    pub attributes: BTreeMap<String, String>,
    pub aspect: Option<String>,
}

/// What happened to one ingestion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// New statements stored.
    pub created: usize,
    /// Candidates folded into an existing statement.
    pub merged: usize,
    /// Existing statements retired by a contradiction.
    pub invalidated: usize,
    /// Candidates skipped (missing entities or a storage failure).
    pub dropped: usize,
}

enum Outcome {
    Created { invalidated: usize },
    Merged,
    Dropped,
}

/// Resolves candidate statements against the graph.
pub struct StatementResolver {
    store: GraphStore,
    classifier: Arc<dyn StatementClassifier>,
    config: ResolutionConfig,
}

impl StatementResolver {
    pub fn new(
        store: GraphStore,
        classifier: Arc<dyn StatementClassifier>,
        config: ResolutionConfig,
    ) -> Self {
        Self {
            store,
            classifier,
            config,
        }
    }

    /// Store `episode` and resolve every candidate extracted from it.
    pub async fn ingest(
        &self,
        episode: &Episode,
        candidates: Vec<CandidateStatement>,
    ) -> Result<IngestReport, RecallError> {
        self.store.insert_episode(episode).await?;
        self.resolve(episode, candidates).await
    }

    /// Resolve candidates of an already stored episode.
    ///
    /// A failing candidate is logged and counted as dropped; the rest of the
    /// batch proceeds.
    pub async fn resolve(
        &self,
        episode: &Episode,
        candidates: Vec<CandidateStatement>,
    ) -> Result<IngestReport, RecallError> {
        let mut report = IngestReport::default();

        for candidate in candidates {
            match self.resolve_one(episode, &candidate).await {
                Ok(Outcome::Created { invalidated }) => {
                    report.created += 1;
                    report.invalidated += invalidated;
                }
                Ok(Outcome::Merged) => report.merged += 1,
                Ok(Outcome::Dropped) => report.dropped += 1,
                Err(e) => {
                    warn!(fact = %candidate.fact, error = %e, "failed to resolve statement");
                    report.dropped += 1;
                }
            }
        }

        if report.merged > 0 {
            match self.store.delete_orphan_entities(&episode.user_id).await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "deleted orphan entities"),
                Err(e) => warn!(error = %e, "orphan entity cleanup failed"),
            }
        }

        info!(
            episode = %episode.id,
            created = report.created,
            merged = report.merged,
            invalidated = report.invalidated,
            dropped = report.dropped,
            "resolved episode statements"
        );
        Ok(report)
    }

    async fn resolve_one(
        &self,
        episode: &Episode,
        candidate: &CandidateStatement,
    ) -> Result<Outcome, RecallError> {
        let user_id = episode.user_id.as_str();
        let mut referenced = vec![
            candidate.subject_id.clone(),
            candidate.predicate_id.clone(),
            candidate.object_id.clone(),
        ];
        referenced.sort();
        referenced.dedup();
        let existing_ids = self.store.existing_entity_ids(user_id, &referenced).await?;
        if existing_ids.len() < referenced.len() {
            let missing: Vec<&String> = referenced
                .iter()
                .filter(|id| !existing_ids.contains(id))
                .collect();
            warn!(fact = %candidate.fact, ?missing, "dropping statement with unknown entities");
            return Ok(Outcome::Dropped);
        }

        let existing = self.similar_valid_statements(user_id, candidate).await?;
        let classifications = if existing.is_empty() {
            Vec::new()
        } else {
            self.classify(candidate, &existing).await?
        };

        if let Some((duplicate, _)) = existing
            .iter()
            .zip(&classifications)
            .find(|(_, c)| **c == Classification::Duplicate)
        {
            self.store
                .link_episode_to_statement(&episode.id, &duplicate.id)
                .await?;
            debug!(statement = %duplicate.id, episode = %episode.id, "merged duplicate statement");
            return Ok(Outcome::Merged);
        }

        let statement = Statement {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            subject_id: candidate.subject_id.clone(),
            predicate_id: candidate.predicate_id.clone(),
            object_id: candidate.object_id.clone(),
            fact: candidate.fact.clone(),
            fact_embedding: candidate.fact_embedding.clone(),
            created_at: Utc::now(),
            valid_at: candidate.valid_at,
            invalid_at: None,
            invalidated_by: None,
            attributes: candidate.attributes.clone(),
            aspect: candidate.aspect.clone(),
        };
        self.store.insert_statement(&statement).await?;
        self.store
            .link_episode_to_statement(&episode.id, &statement.id)
            .await?;

        let mut invalidated = 0;
        for (old, _) in existing
            .iter()
            .zip(&classifications)
            .filter(|(_, c)| **c == Classification::Contradiction)
        {
            if self
                .store
                .invalidate_statement(&old.id, statement.valid_at, &statement.id)
                .await?
            {
                info!(old = %old.id, new = %statement.id, "statement superseded");
                invalidated += 1;
            } else {
                debug!(old = %old.id, "statement already invalidated");
            }
        }
        Ok(Outcome::Created { invalidated })
    }

    /// Valid statements similar by embedding or sharing subject and predicate.
    async fn similar_valid_statements(
        &self,
        user_id: &str,
        candidate: &CandidateStatement,
    ) -> Result<Vec<Statement>, RecallError> {
        let filter = StatementFilter {
            window: TemporalWindow {
                reference_time: Utc::now().max(candidate.valid_at),
                start_time: None,
                include_invalidated: false,
            },
            ..StatementFilter::current(user_id)
        };

        let mut found: Vec<Statement> = self
            .store
            .search_statements_by_vector(
                &filter,
                &candidate.fact_embedding,
                self.config.similarity_threshold,
                self.config.max_candidates,
            )
            .await?
            .into_iter()
            .map(|(s, _)| s)
            .collect();
        for s in self
            .store
            .statements_with_subject_predicate(&filter, &candidate.subject_id, &candidate.predicate_id)
            .await?
        {
            if !found.iter().any(|f| f.id == s.id) {
                found.push(s);
            }
        }
        Ok(found)
    }

    /// Classify against `existing`; a classifier failure means "all independent".
    async fn classify(
        &self,
        candidate: &CandidateStatement,
        existing: &[Statement],
    ) -> Result<Vec<Classification>, RecallError> {
        let mut ids: Vec<String> = existing
            .iter()
            .flat_map(|s| s.entity_ids().map(str::to_string))
            .chain([
                candidate.subject_id.clone(),
                candidate.predicate_id.clone(),
                candidate.object_id.clone(),
            ])
            .collect();
        ids.sort();
        ids.dedup();
        let names: HashMap<String, String> = self
            .store
            .get_entities(&ids)
            .await?
            .into_iter()
            .map(|e| (e.id, e.name))
            .collect();
        let name = |id: &str| names.get(id).cloned().unwrap_or_else(|| id.to_string());

        let new_fact = ClassifierFact {
            fact: candidate.fact.clone(),
            subject: name(&candidate.subject_id),
            predicate: name(&candidate.predicate_id),
            object: name(&candidate.object_id),
        };
        let old_facts: Vec<ClassifierFact> = existing
            .iter()
            .map(|s| ClassifierFact {
                fact: s.fact.clone(),
                subject: name(&s.subject_id),
                predicate: name(&s.predicate_id),
                object: name(&s.object_id),
            })
            .collect();

        match self.classifier.classify(&new_fact, &old_facts).await {
            Ok(result) if result.len() == existing.len() => Ok(result),
            Ok(result) => {
                warn!(
                    expected = existing.len(),
                    got = result.len(),
                    "classifier returned wrong number of labels, treating all as independent"
                );
                Ok(vec![Classification::Independent; existing.len()])
            }
            Err(e) => {
                warn!(error = %e, "classifier failed, treating all as independent");
                Ok(vec![Classification::Independent; existing.len()])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tracing_test::traced_test;

    use super::*;
    use crate::store::test_support::{at, entity, episode, filter_at, statement};

    /// Answers by looking up the new fact text.
    struct FixedClassifier {
        answers: HashMap<String, Classification>,
        fail: bool,
    }

    #[async_trait]
    impl StatementClassifier for FixedClassifier {
        async fn classify(
            &self,
            candidate: &ClassifierFact,
            existing: &[ClassifierFact],
        ) -> Result<Vec<Classification>, RecallError> {
            if self.fail {
                return Err(RecallError::provider("classifier down"));
            }
            let answer = self
                .answers
                .get(&candidate.fact)
                .copied()
                .unwrap_or(Classification::Independent);
            Ok(vec![answer; existing.len()])
        }
    }

    async fn seeded() -> GraphStore {
        let store = GraphStore::open_in_memory().await.unwrap();
        for e in [
            entity("alice", "Alice", Some("person"), vec![1.0, 0.0]),
            entity("works_at", "works_at", None, vec![0.0, 1.0]),
            entity("acme", "Acme", Some("organization"), vec![1.0, 1.0]),
            entity("initech", "Initech", Some("organization"), vec![1.0, -1.0]),
        ] {
            store.insert_entity(&e).await.unwrap();
        }
        store
            .insert_statement(&statement(
                "s_acme",
                ("alice", "works_at", "acme"),
                "Alice works at Acme",
                vec![1.0, 0.0],
                2,
            ))
            .await
            .unwrap();
        store
    }

    fn candidate(object: &str, fact: &str, emb: Vec<f32>, day: u32) -> CandidateStatement {
        CandidateStatement {
            subject_id: "alice".into(),
            predicate_id: "works_at".into(),
            object_id: object.into(),
            fact: fact.into(),
            fact_embedding: emb,
            valid_at: at(day),
            attributes: BTreeMap::new(),
            aspect: None,
        }
    }

    fn resolver(store: &GraphStore, answers: &[(&str, Classification)], fail: bool) -> StatementResolver {
        StatementResolver::new(
            store.clone(),
            Arc::new(FixedClassifier {
                answers: answers.iter().map(|(f, c)| (f.to_string(), *c)).collect(),
                fail,
            }),
            ResolutionConfig::default(),
        )
    }

    #[tokio::test]
    async fn contradiction_invalidates_old_statement() {
        let store = seeded().await;
        let resolver = resolver(
            &store,
            &[("Alice joined Initech", Classification::Contradiction)],
            false,
        );
        let report = resolver
            .ingest(
                &episode("ep2", "I joined Initech", None, vec![1.0, 0.0]),
                vec![candidate("initech", "Alice joined Initech", vec![0.0, 1.0], 6)],
            )
            .await
            .unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.invalidated, 1);

        let old = store.get_statement("s_acme").await.unwrap().unwrap();
        assert_eq!(old.invalid_at, Some(at(6)));
        let new_id = old.invalidated_by.clone().unwrap();
        let new = store.get_statement(&new_id).await.unwrap().unwrap();
        assert_eq!(new.fact, "Alice joined Initech");
        assert!(!old.is_valid_at(at(10)));
        assert!(old.is_valid_at(at(4)));
    }

    #[tokio::test]
    async fn duplicate_links_episode_instead_of_creating() {
        let store = seeded().await;
        let resolver = resolver(
            &store,
            &[("Alice is employed by Acme", Classification::Duplicate)],
            false,
        );
        let report = resolver
            .ingest(
                &episode("ep3", "Still at Acme", None, vec![1.0, 0.0]),
                vec![candidate("acme", "Alice is employed by Acme", vec![1.0, 0.05], 7)],
            )
            .await
            .unwrap();
        assert_eq!(report, IngestReport { merged: 1, ..IngestReport::default() });
        let links = store
            .episodes_for_statements(&["s_acme".to_string()])
            .await
            .unwrap();
        assert_eq!(links["s_acme"], vec!["ep3".to_string()]);
    }

    #[traced_test]
    #[tokio::test]
    async fn unknown_entities_are_dropped_not_fatal() {
        let store = seeded().await;
        let resolver = resolver(&store, &[], false);
        let report = resolver
            .ingest(
                &episode("ep4", "x", None, vec![1.0, 0.0]),
                vec![
                    candidate("ghost", "Alice works at Ghost", vec![0.0, 1.0], 5),
                    candidate("initech", "Alice consults for Initech", vec![0.0, 1.0], 5),
                ],
            )
            .await
            .unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(report.created, 1);
        assert!(logs_contain("dropping statement with unknown entities"));
    }

    #[tokio::test]
    async fn classifier_failure_keeps_everything_valid() {
        let store = seeded().await;
        let resolver = resolver(&store, &[], true);
        let report = resolver
            .ingest(
                &episode("ep5", "x", None, vec![1.0, 0.0]),
                vec![candidate("initech", "Alice joined Initech", vec![1.0, 0.0], 6)],
            )
            .await
            .unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.invalidated, 0);
        let visible = store
            .statements_with_subject_predicate(&filter_at(10), "alice", "works_at")
            .await
            .unwrap();
        assert_eq!(visible.len(), 2);
    }
}
