use rusqlite::params;

use super::*;

/// Key under which the sync watermark is stored.
const CURSOR_KEY: &str = "latest_synced_ts";

impl PulseDb {
    // =========================================================================
    // Sync cursor
    // =========================================================================

    /// The persisted sync watermark (seconds since epoch), if any.
    ///
    /// An unparsable stored value is treated as absent; the next pass then
    /// falls back to start-of-day and rewrites it.
    pub fn sync_cursor(&self) -> Result<Option<f64>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM sync_state WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![CURSOR_KEY], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(row) => {
                let raw = row?;
                match raw.parse::<f64>() {
                    Ok(ts) => Ok(Some(ts)),
                    Err(_) => {
                        log::warn!("Ignoring unparsable sync cursor value: {raw}");
                        Ok(None)
                    }
                }
            }
            None => Ok(None),
        }
    }

    /// Advance the sync watermark. Monotonic: a value at or below the stored
    /// one is a no-op. Returns whether the cursor moved.
    pub fn advance_sync_cursor(&self, ts: f64) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "INSERT INTO sync_state (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value
             WHERE CAST(excluded.value AS REAL) > CAST(sync_state.value AS REAL)",
            params![CURSOR_KEY, format!("{ts:.6}")],
        )?;
        Ok(changed > 0)
    }
}
