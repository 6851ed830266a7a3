// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use rusqlite::types::Value;

use recall_core::RecallError;

use super::{
    GraphStore, STATEMENT_COLUMNS, StatementFilter, map_tr_err, placeholders, row_to_statement,
    text_values,
};
use crate::types::{Statement, cosine_similarity, format_timestamp, vec_to_blob};

/// Turn free text into an FTS5 MATCH expression: each word quoted, OR-joined.
///
/// Returns `None` when the text has no searchable words.
pub fn fts_match_expression(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 1)
        .map(|w| format!("\"{}\"", w.to_lowercase()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

impl GraphStore {
    /// Insert a statement node. The FTS index is maintained by triggers.
    pub async fn insert_statement(&self, statement: &Statement) -> Result<(), RecallError> {
        let s = statement.clone();
        let attributes = serde_json::to_string(&s.attributes)
            .map_err(|e| RecallError::Internal(e.to_string()))?;

        self.conn()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO statements (id, user_id, subject_id, predicate_id, object_id, fact, fact_embedding, \
                     created_at, valid_at, invalid_at, invalidated_by, attributes, aspect) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                    rusqlite::params![
                        s.id,
                        s.user_id,
                        s.subject_id,
                        s.predicate_id,
                        s.object_id,
                        s.fact,
                        vec_to_blob(&s.fact_embedding),
                        format_timestamp(s.created_at),
                        format_timestamp(s.valid_at),
                        s.invalid_at.map(format_timestamp),
                        s.invalidated_by,
                        attributes,
                        s.aspect,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Get a statement by ID regardless of validity.
    pub async fn get_statement(&self, id: &str) -> Result<Option<Statement>, RecallError> {
        let id = id.to_string();
        self.conn()
            .call(move |conn| -> Result<Option<Statement>, rusqlite::Error> {
                let sql = format!("SELECT {STATEMENT_COLUMNS} FROM statements s WHERE s.id = ?1");
                conn.query_row(&sql, rusqlite::params![id], row_to_statement)
                    .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Batch lookup of statements visible under `filter`.
    pub async fn get_statements(
        &self,
        filter: &StatementFilter,
        ids: &[String],
    ) -> Result<Vec<Statement>, RecallError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let (clause, mut values) = filter.to_sql();
        let sql = format!(
            "SELECT {STATEMENT_COLUMNS} FROM statements s WHERE {clause} AND s.id IN ({})",
            placeholders(ids.len())
        );
        values.extend(text_values(ids));
        self.query_statements(sql, values).await
    }

    /// Statements touching any of `entity_ids` as subject, predicate or object.
    ///
    /// Statements listed in `exclude_ids` are skipped.
    pub async fn statements_adjacent_to(
        &self,
        filter: &StatementFilter,
        entity_ids: &[String],
        exclude_ids: &[String],
    ) -> Result<Vec<Statement>, RecallError> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (clause, mut values) = filter.to_sql();
        let marks = placeholders(entity_ids.len());
        let mut sql = format!(
            "SELECT {STATEMENT_COLUMNS} FROM statements s WHERE {clause} \
             AND (s.subject_id IN ({marks}) OR s.predicate_id IN ({marks}) OR s.object_id IN ({marks}))"
        );
        for _ in 0..3 {
            values.extend(text_values(entity_ids));
        }
        if !exclude_ids.is_empty() {
            sql.push_str(&format!(
                " AND s.id NOT IN ({})",
                placeholders(exclude_ids.len())
            ));
            values.extend(text_values(exclude_ids));
        }
        self.query_statements(sql, values).await
    }

    /// Currently visible statements with this exact subject and predicate.
    pub async fn statements_with_subject_predicate(
        &self,
        filter: &StatementFilter,
        subject_id: &str,
        predicate_id: &str,
    ) -> Result<Vec<Statement>, RecallError> {
        let (clause, mut values) = filter.to_sql();
        let sql = format!(
            "SELECT {STATEMENT_COLUMNS} FROM statements s WHERE {clause} \
             AND s.subject_id = ? AND s.predicate_id = ?"
        );
        values.push(Value::Text(subject_id.to_string()));
        values.push(Value::Text(predicate_id.to_string()));
        self.query_statements(sql, values).await
    }

    /// BM25 full-text search over statement facts.
    ///
    /// Returns `(statement, score)` with the score made positive (higher is
    /// better), best first.
    pub async fn search_statements_fts(
        &self,
        filter: &StatementFilter,
        text: &str,
        limit: usize,
    ) -> Result<Vec<(Statement, f64)>, RecallError> {
        let Some(expr) = fts_match_expression(text) else {
            return Ok(Vec::new());
        };
        let (clause, mut values) = filter.to_sql();
        let sql = format!(
            "SELECT {STATEMENT_COLUMNS}, bm25(statements_fts) AS score \
             FROM statements_fts JOIN statements s ON s.rowid = statements_fts.rowid \
             WHERE statements_fts MATCH ? AND {clause} \
             ORDER BY score LIMIT ?"
        );
        let mut params = vec![Value::Text(expr)];
        params.append(&mut values);
        params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

        self.conn()
            .call(move |conn| -> Result<Vec<(Statement, f64)>, rusqlite::Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(params), |row| {
                        let statement = row_to_statement(row)?;
                        let score: f64 = row.get(13)?;
                        Ok((statement, -score))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Cosine scan over the fact embeddings of statements visible under `filter`.
    pub async fn search_statements_by_vector(
        &self,
        filter: &StatementFilter,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<(Statement, f64)>, RecallError> {
        let (clause, values) = filter.to_sql();
        let sql = format!("SELECT {STATEMENT_COLUMNS} FROM statements s WHERE {clause}");
        let statements = self.query_statements(sql, values).await?;

        let mut scored: Vec<(Statement, f64)> = statements
            .into_iter()
            .map(|s| {
                let score = cosine_similarity(embedding, &s.fact_embedding);
                (s, score)
            })
            .filter(|(_, score)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Close a statement's validity window.
    ///
    /// Compare-and-set on `invalid_at IS NULL`: returns `false` when the
    /// statement was already invalidated (or does not exist), leaving the
    /// first invalidation in place.
    pub async fn invalidate_statement(
        &self,
        id: &str,
        invalid_at: DateTime<Utc>,
        invalidated_by: &str,
    ) -> Result<bool, RecallError> {
        let id = id.to_string();
        let invalid_at = format_timestamp(invalid_at);
        let invalidated_by = invalidated_by.to_string();
        let changed = self
            .conn()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "UPDATE statements SET invalid_at = ?1, invalidated_by = ?2 \
                     WHERE id = ?3 AND invalid_at IS NULL",
                    rusqlite::params![invalid_at, invalidated_by, id],
                )
            })
            .await
            .map_err(map_tr_err)?;
        if changed > 0 {
            metrics::counter!("recall_statements_invalidated_total").increment(1);
        }
        Ok(changed > 0)
    }

    async fn query_statements(
        &self,
        sql: String,
        values: Vec<Value>,
    ) -> Result<Vec<Statement>, RecallError> {
        self.conn()
            .call(move |conn| -> Result<Vec<Statement>, rusqlite::Error> {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(values), row_to_statement)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)
    }
}
