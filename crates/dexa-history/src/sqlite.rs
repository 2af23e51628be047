use chrono::{DateTime, Utc};
use dexa_models::history::{HistoryEntry, HISTORY_TABLE_DDL};
use dexa_models::message::Role;
use rusqlite::Connection;

use crate::error::HistoryError;

/// SQLite-backed chat log.
///
/// Rows are append-only per session; `trim` enforces the retention cap by
/// deleting the oldest rows.
pub struct SqliteHistory {
    conn: Connection,
}

impl SqliteHistory {
    /// Open (or create) the history database. Creates the schema and enables WAL.
    pub fn open(path: &str) -> Result<Self, HistoryError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(HISTORY_TABLE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(HISTORY_TABLE_DDL)?;
        Ok(Self { conn })
    }

    /// The newest `limit` entries of a session, oldest first.
    pub fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT session_id, role, content, created_at FROM chat_history \
             WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;

        let mut rows = stmt
            .query_map(rusqlite::params![session_id, limit as i64], |row| {
                let role: String = row.get(1)?;
                let role = Role::parse(&role).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        format!("unknown role: {role}").into(),
                    )
                })?;
                let created_at: DateTime<Utc> = row.get(3)?;
                Ok(HistoryEntry {
                    session_id: row.get(0)?,
                    role,
                    content: row.get(2)?,
                    created_at,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.reverse();
        Ok(rows)
    }

    /// Append entries within a single transaction.
    pub fn append_batch(&mut self, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO chat_history (session_id, role, content, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for entry in entries {
                stmt.execute(rusqlite::params![
                    entry.session_id,
                    entry.role.as_str(),
                    entry.content,
                    entry.created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Keep only the newest `keep` entries of a session. Returns the number of rows deleted.
    pub fn trim(&self, session_id: &str, keep: usize) -> Result<usize, HistoryError> {
        let deleted = self.conn.execute(
            "DELETE FROM chat_history WHERE session_id = ?1 AND id NOT IN \
             (SELECT id FROM chat_history WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2)",
            rusqlite::params![session_id, keep as i64],
        )?;
        Ok(deleted)
    }

    /// Count the entries stored for a session.
    pub fn count(&self, session_id: &str) -> Result<usize, HistoryError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chat_history WHERE session_id = ?1",
            rusqlite::params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
