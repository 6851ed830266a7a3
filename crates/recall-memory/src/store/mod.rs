// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed temporal knowledge graph.
//!
//! One `tokio_rusqlite::Connection` serializes every read and write through a
//! single background thread. Embeddings live beside their rows as `f32` BLOBs;
//! vector search is an exact cosine scan over the user-scoped rows of a
//! namespace. Statement fact text is mirrored into an FTS5 table for BM25.

mod compacts;
mod entities;
mod episodes;
mod statements;

use std::collections::BTreeMap;

use recall_core::RecallError;
use rusqlite::types::Value;
use tokio_rusqlite::Connection;

use crate::types::{
    Entity, Episode, EpisodeType, Statement, blob_to_vec, format_timestamp, parse_timestamp,
};
use crate::validity::TemporalWindow;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Convert a tokio-rusqlite error into RecallError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> RecallError {
    RecallError::Storage {
        source: Box::new(e),
    }
}

/// Embedding namespaces that support nearest-neighbour search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorNamespace {
    EntityName,
    StatementFact,
    EpisodeContent,
}

impl VectorNamespace {
    fn table_and_column(&self) -> (&'static str, &'static str) {
        match self {
            VectorNamespace::EntityName => ("entities", "name_embedding"),
            VectorNamespace::StatementFact => ("statements", "fact_embedding"),
            VectorNamespace::EpisodeContent => ("episodes", "content_embedding"),
        }
    }
}

/// A nearest-neighbour query against one namespace.
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub namespace: VectorNamespace,
    pub user_id: String,
    pub embedding: Vec<f32>,
    pub threshold: f64,
    pub limit: usize,
    pub exclude_ids: Vec<String>,
}

/// Which statements a read may see: owner, temporal window and type filters.
#[derive(Debug, Clone)]
pub struct StatementFilter {
    pub user_id: String,
    pub window: TemporalWindow,
    /// Subject or object entity type must be one of these (empty = any).
    pub entity_types: Vec<String>,
    /// Predicate entity name must be one of these (empty = any).
    pub predicate_names: Vec<String>,
}

impl StatementFilter {
    /// Filter for "currently valid statements of this user".
    pub fn current(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            window: TemporalWindow::now(),
            entity_types: Vec::new(),
            predicate_names: Vec::new(),
        }
    }

    /// Render the filter as a SQL predicate over the statement alias `s`.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let reference = format_timestamp(self.window.reference_time);
        let mut clause = String::from("s.user_id = ? AND s.valid_at <= ?");
        let mut values = vec![
            Value::Text(self.user_id.clone()),
            Value::Text(reference.clone()),
        ];

        if !self.window.include_invalidated {
            clause.push_str(" AND (s.invalid_at IS NULL OR s.invalid_at > ?)");
            values.push(Value::Text(reference));
        }
        if let Some(start) = self.window.start_time {
            clause.push_str(" AND s.valid_at >= ?");
            values.push(Value::Text(format_timestamp(start)));
        }
        if !self.entity_types.is_empty() {
            clause.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM entities te WHERE te.id IN (s.subject_id, s.object_id) AND te.entity_type IN ({}))",
                placeholders(self.entity_types.len())
            ));
            values.extend(self.entity_types.iter().cloned().map(Value::Text));
        }
        if !self.predicate_names.is_empty() {
            clause.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM entities pe WHERE pe.id = s.predicate_id AND pe.name IN ({}))",
                placeholders(self.predicate_names.len())
            ));
            values.extend(self.predicate_names.iter().cloned().map(Value::Text));
        }
        (clause, values)
    }
}

/// `?, ?, ?` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub(crate) fn text_values(ids: &[String]) -> impl Iterator<Item = Value> + '_ {
    ids.iter().cloned().map(Value::Text)
}

/// Persistent graph store.
#[derive(Clone)]
pub struct GraphStore {
    conn: Connection,
}

impl GraphStore {
    /// Wraps an existing connection and applies pending migrations.
    pub async fn new(conn: Connection) -> Result<Self, RecallError> {
        conn.call(|conn| -> Result<(), RecallError> {
            embedded::migrations::runner()
                .run(conn)
                .map_err(|e| RecallError::Storage {
                    source: Box::new(e),
                })?;
            Ok(())
        })
        .await
        .map_err(|e| match e {
            tokio_rusqlite::Error::Error(inner) => inner,
            other => RecallError::Storage {
                source: Box::new(other),
            },
        })?;
        Ok(Self { conn })
    }

    /// Opens (or creates) the database file at `path`.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, RecallError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| RecallError::Storage {
                    source: Box::new(e),
                })?;
            }
        }
        let conn = Connection::open(path)
            .await
            .map_err(|e| RecallError::Storage {
                source: Box::new(e),
            })?;
        if wal_mode {
            conn.call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
            })
            .await
            .map_err(map_tr_err)?;
        }
        Self::new(conn).await
    }

    /// Fresh private in-memory database.
    pub async fn open_in_memory() -> Result<Self, RecallError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| RecallError::Storage {
                source: Box::new(e),
            })?;
        Self::new(conn).await
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Exact cosine nearest-neighbour search over one namespace.
    ///
    /// Returns `(id, similarity)` pairs at or above the threshold, best first.
    pub async fn vector_search(
        &self,
        query: VectorQuery,
    ) -> Result<Vec<(String, f64)>, RecallError> {
        let (table, column) = query.namespace.table_and_column();
        let sql = format!("SELECT id, {column} FROM {table} WHERE user_id = ?1");
        let user_id = query.user_id.clone();

        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(String, Vec<f32>)>, rusqlite::Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params![user_id], |row| {
                        let id: String = row.get(0)?;
                        let blob: Vec<u8> = row.get(1)?;
                        Ok((id, blob_to_vec(&blob)))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)?;

        let mut scored: Vec<(String, f64)> = rows
            .into_iter()
            .filter(|(id, _)| !query.exclude_ids.contains(id))
            .map(|(id, emb)| {
                let score = crate::types::cosine_similarity(&query.embedding, &emb);
                (id, score)
            })
            .filter(|(_, score)| *score >= query.threshold)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(query.limit);
        Ok(scored)
    }
}

pub(crate) const STATEMENT_COLUMNS: &str = "s.id, s.user_id, s.subject_id, s.predicate_id, s.object_id, s.fact, s.fact_embedding, s.created_at, s.valid_at, s.invalid_at, s.invalidated_by, s.attributes, s.aspect";

pub(crate) const EPISODE_COLUMNS: &str = "id, user_id, content, original_content, content_embedding, source, session_id, chunk_index, total_chunks, episode_type, valid_at, created_at, label_ids, recall_count";

pub(crate) const ENTITY_COLUMNS: &str =
    "id, user_id, name, entity_type, attributes, name_embedding, created_at";

fn parse_attributes(raw: &str) -> BTreeMap<String, String> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub(crate) fn row_to_statement(row: &rusqlite::Row<'_>) -> Result<Statement, rusqlite::Error> {
    let blob: Vec<u8> = row.get(6)?;
    let created_at: String = row.get(7)?;
    let valid_at: String = row.get(8)?;
    let invalid_at: Option<String> = row.get(9)?;
    let attributes: String = row.get(11)?;
    Ok(Statement {
        id: row.get(0)?,
        user_id: row.get(1)?,
        subject_id: row.get(2)?,
        predicate_id: row.get(3)?,
        object_id: row.get(4)?,
        fact: row.get(5)?,
        fact_embedding: blob_to_vec(&blob),
        created_at: parse_timestamp(&created_at),
        valid_at: parse_timestamp(&valid_at),
        invalid_at: invalid_at.as_deref().map(parse_timestamp),
        invalidated_by: row.get(10)?,
        attributes: parse_attributes(&attributes),
        aspect: row.get(12)?,
    })
}

pub(crate) fn row_to_episode(row: &rusqlite::Row<'_>) -> Result<Episode, rusqlite::Error> {
    let blob: Vec<u8> = row.get(4)?;
    let episode_type: String = row.get(9)?;
    let valid_at: String = row.get(10)?;
    let created_at: String = row.get(11)?;
    let label_ids: String = row.get(12)?;
    let chunk_index: Option<i64> = row.get(7)?;
    let total_chunks: Option<i64> = row.get(8)?;
    let recall_count: i64 = row.get(13)?;
    Ok(Episode {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        original_content: row.get(3)?,
        content_embedding: blob_to_vec(&blob),
        source: row.get(5)?,
        session_id: row.get(6)?,
        chunk_index: chunk_index.and_then(|v| u32::try_from(v).ok()),
        total_chunks: total_chunks.and_then(|v| u32::try_from(v).ok()),
        episode_type: EpisodeType::from_str_value(&episode_type),
        valid_at: parse_timestamp(&valid_at),
        created_at: parse_timestamp(&created_at),
        label_ids: serde_json::from_str(&label_ids).unwrap_or_default(),
        recall_count: u64::try_from(recall_count).unwrap_or(0),
    })
}

pub(crate) fn row_to_entity(row: &rusqlite::Row<'_>) -> Result<Entity, rusqlite::Error> {
    let attributes: String = row.get(4)?;
    let blob: Vec<u8> = row.get(5)?;
    let created_at: String = row.get(6)?;
    Ok(Entity {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        entity_type: row.get(3)?,
        attributes: parse_attributes(&attributes),
        name_embedding: blob_to_vec(&blob),
        created_at: parse_timestamp(&created_at),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    pub fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, 12, 0, 0).unwrap()
    }

    pub fn entity(id: &str, name: &str, entity_type: Option<&str>, emb: Vec<f32>) -> Entity {
        Entity {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: name.to_string(),
            entity_type: entity_type.map(str::to_string),
            attributes: BTreeMap::new(),
            name_embedding: emb,
            created_at: at(1),
        }
    }

    pub fn statement(
        id: &str,
        (s, p, o): (&str, &str, &str),
        fact: &str,
        emb: Vec<f32>,
        valid_day: u32,
    ) -> Statement {
        Statement {
            id: id.to_string(),
            user_id: "u1".to_string(),
            subject_id: s.to_string(),
            predicate_id: p.to_string(),
            object_id: o.to_string(),
            fact: fact.to_string(),
            fact_embedding: emb,
            created_at: at(valid_day),
            valid_at: at(valid_day),
            invalid_at: None,
            invalidated_by: None,
            attributes: BTreeMap::new(),
            aspect: None,
        }
    }

    pub fn episode(id: &str, content: &str, session: Option<&str>, emb: Vec<f32>) -> Episode {
        Episode {
            id: id.to_string(),
            user_id: "u1".to_string(),
            content: content.to_string(),
            original_content: content.to_string(),
            content_embedding: emb,
            source: "test".to_string(),
            session_id: session.map(str::to_string),
            chunk_index: None,
            total_chunks: None,
            episode_type: EpisodeType::Conversation,
            valid_at: at(1),
            created_at: at(1),
            label_ids: Vec::new(),
            recall_count: 0,
        }
    }

    pub fn filter_at(day: u32) -> StatementFilter {
        StatementFilter {
            user_id: "u1".to_string(),
            window: TemporalWindow::resolve(Some(at(day)), None, None, false),
            entity_types: Vec::new(),
            predicate_names: Vec::new(),
        }
    }
}
