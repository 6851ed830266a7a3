// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use rusqlite::OptionalExtension;

use recall_core::RecallError;

use super::{ENTITY_COLUMNS, GraphStore, map_tr_err, placeholders, row_to_entity, text_values};
use crate::types::{Entity, format_timestamp, vec_to_blob};

impl GraphStore {
    /// Insert an entity node.
    pub async fn insert_entity(&self, entity: &Entity) -> Result<(), RecallError> {
        let id = entity.id.clone();
        let user_id = entity.user_id.clone();
        let name = entity.name.clone();
        let entity_type = entity.entity_type.clone();
        let attributes = serde_json::to_string(&entity.attributes)
            .map_err(|e| RecallError::Internal(e.to_string()))?;
        let blob = vec_to_blob(&entity.name_embedding);
        let created_at = format_timestamp(entity.created_at);

        self.conn()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO entities (id, user_id, name, entity_type, attributes, name_embedding, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![id, user_id, name, entity_type, attributes, blob, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Get an entity by ID.
    pub async fn get_entity(&self, id: &str) -> Result<Option<Entity>, RecallError> {
        let id = id.to_string();
        self.conn()
            .call(move |conn| -> Result<Option<Entity>, rusqlite::Error> {
                let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?1");
                conn.query_row(&sql, rusqlite::params![id], row_to_entity)
                    .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Batch lookup; missing ids are skipped.
    pub async fn get_entities(&self, ids: &[String]) -> Result<Vec<Entity>, RecallError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.conn()
            .call(move |conn| -> Result<Vec<Entity>, rusqlite::Error> {
                let sql = format!(
                    "SELECT {ENTITY_COLUMNS} FROM entities WHERE id IN ({})",
                    placeholders(ids.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(text_values(&ids)), row_to_entity)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Which of `ids` exist for this user.
    pub async fn existing_entity_ids(
        &self,
        user_id: &str,
        ids: &[String],
    ) -> Result<Vec<String>, RecallError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let user_id = user_id.to_string();
        let ids = ids.to_vec();
        self.conn()
            .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
                let sql = format!(
                    "SELECT id FROM entities WHERE user_id = ? AND id IN ({})",
                    placeholders(ids.len())
                );
                let params = std::iter::once(rusqlite::types::Value::Text(user_id))
                    .chain(text_values(&ids));
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params), |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Delete entities no statement references any more. Returns the number removed.
    pub async fn delete_orphan_entities(&self, user_id: &str) -> Result<usize, RecallError> {
        let user_id = user_id.to_string();
        self.conn()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "DELETE FROM entities WHERE user_id = ?1 AND NOT EXISTS ( \
                        SELECT 1 FROM statements s \
                        WHERE s.subject_id = entities.id \
                           OR s.predicate_id = entities.id \
                           OR s.object_id = entities.id)",
                    rusqlite::params![user_id],
                )
            })
            .await
            .map_err(map_tr_err)
    }
}
