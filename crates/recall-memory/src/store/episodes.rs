// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;

use rusqlite::OptionalExtension;
use rusqlite::types::Value;

use recall_core::RecallError;

use super::{EPISODE_COLUMNS, GraphStore, map_tr_err, placeholders, row_to_episode, text_values};
use crate::types::{Episode, format_timestamp, vec_to_blob};

impl GraphStore {
    /// Insert an episode node.
    pub async fn insert_episode(&self, episode: &Episode) -> Result<(), RecallError> {
        let e = episode.clone();
        let label_ids = serde_json::to_string(&e.label_ids)
            .map_err(|err| RecallError::Internal(err.to_string()))?;

        self.conn()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO episodes (id, user_id, content, original_content, content_embedding, source, \
                     session_id, chunk_index, total_chunks, episode_type, valid_at, created_at, label_ids, recall_count) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    rusqlite::params![
                        e.id,
                        e.user_id,
                        e.content,
                        e.original_content,
                        vec_to_blob(&e.content_embedding),
                        e.source,
                        e.session_id,
                        e.chunk_index,
                        e.total_chunks,
                        e.episode_type.as_str(),
                        format_timestamp(e.valid_at),
                        format_timestamp(e.created_at),
                        label_ids,
                        i64::try_from(e.recall_count).unwrap_or(i64::MAX),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Get an episode by ID.
    pub async fn get_episode(&self, id: &str) -> Result<Option<Episode>, RecallError> {
        let id = id.to_string();
        self.conn()
            .call(move |conn| -> Result<Option<Episode>, rusqlite::Error> {
                let sql = format!("SELECT {EPISODE_COLUMNS} FROM episodes WHERE id = ?1");
                conn.query_row(&sql, rusqlite::params![id], row_to_episode)
                    .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Batch lookup of a user's episodes; missing ids are skipped.
    pub async fn get_episodes(
        &self,
        user_id: &str,
        ids: &[String],
    ) -> Result<Vec<Episode>, RecallError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes WHERE user_id = ? AND id IN ({})",
            placeholders(ids.len())
        );
        let params: Vec<Value> = std::iter::once(Value::Text(user_id.to_string()))
            .chain(text_values(ids))
            .collect();
        self.conn()
            .call(move |conn| -> Result<Vec<Episode>, rusqlite::Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params), row_to_episode)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Provenance lookup: statement id -> ids of the episodes attesting it.
    pub async fn episodes_for_statements(
        &self,
        statement_ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>, RecallError> {
        if statement_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT statement_id, episode_id FROM provenance WHERE statement_id IN ({}) \
             ORDER BY statement_id, episode_id",
            placeholders(statement_ids.len())
        );
        let params: Vec<Value> = text_values(statement_ids).collect();
        let pairs = self
            .conn()
            .call(move |conn| -> Result<Vec<(String, String)>, rusqlite::Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params), |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)?;

        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (statement_id, episode_id) in pairs {
            map.entry(statement_id).or_default().push(episode_id);
        }
        Ok(map)
    }

    /// Number of statements linked to each episode (all statements, any validity).
    pub async fn statement_counts(
        &self,
        episode_ids: &[String],
    ) -> Result<HashMap<String, usize>, RecallError> {
        if episode_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT episode_id, COUNT(*) FROM provenance WHERE episode_id IN ({}) GROUP BY episode_id",
            placeholders(episode_ids.len())
        );
        let params: Vec<Value> = text_values(episode_ids).collect();
        self.conn()
            .call(move |conn| -> Result<HashMap<String, usize>, rusqlite::Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params), |row| {
                        let id: String = row.get(0)?;
                        let count: i64 = row.get(1)?;
                        Ok((id, usize::try_from(count).unwrap_or(0)))
                    })?
                    .collect::<Result<HashMap<_, _>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Record that `episode_id` attests `statement_id`. Idempotent.
    pub async fn link_episode_to_statement(
        &self,
        episode_id: &str,
        statement_id: &str,
    ) -> Result<(), RecallError> {
        let episode_id = episode_id.to_string();
        let statement_id = statement_id.to_string();
        self.conn()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO provenance (episode_id, statement_id) VALUES (?1, ?2)",
                    rusqlite::params![episode_id, statement_id],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Bump `recall_count` on each listed episode.
    pub async fn increment_recall_count(&self, episode_ids: &[String]) -> Result<(), RecallError> {
        if episode_ids.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "UPDATE episodes SET recall_count = recall_count + 1 WHERE id IN ({})",
            placeholders(episode_ids.len())
        );
        let params: Vec<Value> = text_values(episode_ids).collect();
        self.conn()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(&sql, rusqlite::params_from_iter(params))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn insert_and_batch_get_episodes() {
        let store = GraphStore::open_in_memory().await.unwrap();
        let mut ep = episode("ep1", "We talked about tea", Some("sess"), vec![0.1, 0.2]);
        ep.label_ids = vec!["work".into()];
        ep.chunk_index = Some(2);
        store.insert_episode(&ep).await.unwrap();
        store
            .insert_episode(&episode("ep2", "Another", None, vec![0.3, 0.4]))
            .await
            .unwrap();

        let got = store.get_episode("ep1").await.unwrap().unwrap();
        assert_eq!(got.session_id.as_deref(), Some("sess"));
        assert_eq!(got.label_ids, vec!["work".to_string()]);
        assert_eq!(got.chunk_index, Some(2));
        assert_eq!(got.content_embedding, vec![0.1, 0.2]);

        let batch = store
            .get_episodes("u1", &["ep1".into(), "ep2".into(), "nope".into()])
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert!(store
            .get_episodes("u2", &["ep1".into()])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn provenance_links_are_idempotent() {
        let store = GraphStore::open_in_memory().await.unwrap();
        store.link_episode_to_statement("ep1", "s1").await.unwrap();
        store.link_episode_to_statement("ep1", "s1").await.unwrap();
        store.link_episode_to_statement("ep2", "s1").await.unwrap();
        store.link_episode_to_statement("ep2", "s2").await.unwrap();

        let map = store
            .episodes_for_statements(&["s1".into(), "s2".into()])
            .await
            .unwrap();
        assert_eq!(map["s1"], vec!["ep1".to_string(), "ep2".to_string()]);
        assert_eq!(map["s2"], vec!["ep2".to_string()]);

        let counts = store
            .statement_counts(&["ep1".into(), "ep2".into()])
            .await
            .unwrap();
        assert_eq!(counts["ep1"], 1);
        assert_eq!(counts["ep2"], 2);
    }

    #[tokio::test]
    async fn recall_count_increments() {
        let store = GraphStore::open_in_memory().await.unwrap();
        store
            .insert_episode(&episode("ep1", "x", None, vec![1.0]))
            .await
            .unwrap();
        store
            .increment_recall_count(&["ep1".into()])
            .await
            .unwrap();
        store
            .increment_recall_count(&["ep1".into()])
            .await
            .unwrap();
        let got = store.get_episode("ep1").await.unwrap().unwrap();
        assert_eq!(got.recall_count, 2);
    }
}
