use super::{BotStore, TimeoutLogRow};
use crate::{error::BotResult, types::UserId};
use chrono::NaiveDateTime;
use rusqlite::params;

fn timeout_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimeoutLogRow> {
    Ok(TimeoutLogRow {
        id: row.get(0)?,
        moderator_id: row.get::<_, i64>(1)? as u64,
        user_id: row.get::<_, i64>(2)? as u64,
        duration_secs: row.get::<_, i64>(3)? as u64,
        created_at: row.get(4)?,
    })
}

impl BotStore {
    // ── Timeout audit log ──────────────────────────────────────────

    pub fn add_timeout_log(
        &self,
        moderator_id: UserId,
        user_id: UserId,
        duration_secs: u64,
        now: NaiveDateTime,
    ) -> BotResult<i64> {
        self.conn.execute(
            "INSERT INTO timeout_log (moderator_id, user_id, duration_secs, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![moderator_id as i64, user_id as i64, duration_secs as i64, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Timeouts applied to `user_id`, newest first.
    pub fn timeout_logs_for(&self, user_id: UserId, limit: usize) -> BotResult<Vec<TimeoutLogRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, moderator_id, user_id, duration_secs, created_at
             FROM timeout_log WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id as i64, limit as i64], timeout_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn timeout_count_for(&self, user_id: UserId) -> BotResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM timeout_log WHERE user_id = ?1",
            params![user_id as i64],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
