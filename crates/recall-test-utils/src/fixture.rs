// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory graph builder whose embeddings come from a [`MockEmbedder`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};

use recall_core::RecallError;
use recall_memory::{
    CandidateStatement, CompactedSession, Entity, Episode, EpisodeType, GraphStore, Statement,
};

use crate::mock_embedder::MockEmbedder;

/// Noon UTC on the given day of March 2026.
pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, d, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// A fresh in-memory graph for one user.
pub struct GraphFixture {
    pub store: GraphStore,
    pub embedder: Arc<MockEmbedder>,
    user_id: String,
    next_statement: AtomicUsize,
}

impl GraphFixture {
    pub async fn new(embedder: MockEmbedder) -> Result<Self, RecallError> {
        Ok(Self {
            store: GraphStore::open_in_memory().await?,
            embedder: Arc::new(embedder),
            user_id: "user-1".to_string(),
            next_statement: AtomicUsize::new(1),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Id of the entity named `name`, creating it on first use.
    pub async fn entity(&self, name: &str, entity_type: Option<&str>) -> Result<String, RecallError> {
        let id = format!("ent-{}", name.to_lowercase().replace(' ', "-"));
        if self.store.get_entity(&id).await?.is_none() {
            self.store
                .insert_entity(&Entity {
                    id: id.clone(),
                    user_id: self.user_id.clone(),
                    name: name.to_string(),
                    entity_type: entity_type.map(str::to_string),
                    attributes: BTreeMap::new(),
                    name_embedding: self.embedder.vector(name),
                    created_at: day(1),
                })
                .await?;
        }
        Ok(id)
    }

    /// An episode value (not stored).
    pub fn episode_value(
        &self,
        id: &str,
        content: &str,
        session_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Episode {
        Episode {
            id: id.to_string(),
            user_id: self.user_id.clone(),
            content: content.to_string(),
            original_content: content.to_string(),
            content_embedding: self.embedder.vector(content),
            source: "fixture".to_string(),
            session_id: session_id.map(str::to_string),
            chunk_index: None,
            total_chunks: None,
            episode_type: EpisodeType::Conversation,
            valid_at: at,
            created_at: at,
            label_ids: Vec::new(),
            recall_count: 0,
        }
    }

    /// Store an episode.
    pub async fn episode(
        &self,
        id: &str,
        content: &str,
        session_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Episode, RecallError> {
        let episode = self.episode_value(id, content, session_id, at);
        self.store.insert_episode(&episode).await?;
        Ok(episode)
    }

    /// Store a statement (creating its entities) attested by `episode_id`.
    pub async fn statement(
        &self,
        episode_id: &str,
        (subject, predicate, object): (&str, &str, &str),
        fact: &str,
        valid_at: DateTime<Utc>,
    ) -> Result<String, RecallError> {
        let candidate = self
            .candidate((subject, predicate, object), fact, valid_at)
            .await?;
        let id = format!(
            "stmt-{}",
            self.next_statement.fetch_add(1, Ordering::SeqCst)
        );
        self.store
            .insert_statement(&Statement {
                id: id.clone(),
                user_id: self.user_id.clone(),
                subject_id: candidate.subject_id,
                predicate_id: candidate.predicate_id,
                object_id: candidate.object_id,
                fact: candidate.fact,
                fact_embedding: candidate.fact_embedding,
                created_at: valid_at,
                valid_at,
                invalid_at: None,
                invalidated_by: None,
                attributes: BTreeMap::new(),
                aspect: None,
            })
            .await?;
        self.store.link_episode_to_statement(episode_id, &id).await?;
        Ok(id)
    }

    /// A candidate for statement resolution; its entities are created.
    pub async fn candidate(
        &self,
        (subject, predicate, object): (&str, &str, &str),
        fact: &str,
        valid_at: DateTime<Utc>,
    ) -> Result<CandidateStatement, RecallError> {
        Ok(CandidateStatement {
            subject_id: self.entity(subject, Some("person")).await?,
            predicate_id: self.entity(predicate, Some("predicate")).await?,
            object_id: self.entity(object, None).await?,
            fact: fact.to_string(),
            fact_embedding: self.embedder.vector(fact),
            valid_at,
            attributes: BTreeMap::new(),
            aspect: None,
        })
    }

    /// Cache a summary for `session_id`.
    pub async fn compact(&self, session_id: &str, summary: &str) -> Result<(), RecallError> {
        self.store
            .upsert_compact(&CompactedSession {
                id: format!("compact-{session_id}"),
                user_id: self.user_id.clone(),
                session_id: session_id.to_string(),
                summary: summary.to_string(),
                start_time: day(1),
            })
            .await
    }
}
