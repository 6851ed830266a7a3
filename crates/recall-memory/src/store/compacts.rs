// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use rusqlite::OptionalExtension;

use recall_core::RecallError;

use super::{GraphStore, map_tr_err};
use crate::types::{CompactedSession, format_timestamp, parse_timestamp};

impl GraphStore {
    /// Store (or replace) the summary of a session.
    pub async fn upsert_compact(&self, compact: &CompactedSession) -> Result<(), RecallError> {
        let c = compact.clone();
        self.conn()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO compacted_sessions (id, user_id, session_id, summary, start_time) \
                     VALUES (?1, ?2, ?3, ?4, ?5) \
                     ON CONFLICT(user_id, session_id) DO UPDATE SET \
                        summary = excluded.summary, start_time = excluded.start_time",
                    rusqlite::params![
                        c.id,
                        c.user_id,
                        c.session_id,
                        c.summary,
                        format_timestamp(c.start_time)
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Cached summary of a session, if one has been computed.
    pub async fn get_compact_by_session_id(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<CompactedSession>, RecallError> {
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        self.conn()
            .call(move |conn| -> Result<Option<CompactedSession>, rusqlite::Error> {
                conn.query_row(
                    "SELECT id, user_id, session_id, summary, start_time FROM compacted_sessions \
                     WHERE user_id = ?1 AND session_id = ?2",
                    rusqlite::params![user_id, session_id],
                    |row| {
                        let start_time: String = row.get(4)?;
                        Ok(CompactedSession {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            session_id: row.get(2)?,
                            summary: row.get(3)?,
                            start_time: parse_timestamp(&start_time),
                        })
                    },
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }
}
