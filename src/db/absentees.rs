use chrono::NaiveDate;
use rusqlite::params;

use super::*;

impl PulseDb {
    // =========================================================================
    // Absentees
    // =========================================================================

    /// Replace the absentee set for a date wholesale.
    ///
    /// Delete-then-insert inside one transaction: the set is re-derived from
    /// scratch each sync pass, and readers never observe the gap between the
    /// delete and the inserts.
    pub fn replace_absentees(
        &self,
        date: NaiveDate,
        entries: &[AbsenteeEntry],
    ) -> Result<(), DbError> {
        let date_str = date.to_string();
        self.with_transaction(|db| {
            db.conn_ref()
                .execute("DELETE FROM absentees WHERE date = ?1", params![date_str])?;
            let mut stmt = db.conn_ref().prepare(
                "INSERT OR IGNORE INTO absentees (date, user_id, username)
                 VALUES (?1, ?2, ?3)",
            )?;
            for entry in entries {
                stmt.execute(params![date_str, entry.user_id, entry.username])?;
            }
            Ok(())
        })
    }

    /// Absentees recorded for a date, ordered by display name.
    pub fn absentees_on(&self, date: NaiveDate) -> Result<Vec<DbAbsentee>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, user_id, username FROM absentees
             WHERE date = ?1 ORDER BY username, user_id",
        )?;
        let rows = stmt.query_map(params![date.to_string()], |row| {
            Ok(DbAbsentee {
                date: row.get(0)?,
                user_id: row.get(1)?,
                username: row.get(2)?,
            })
        })?;
        let mut absentees = Vec::new();
        for row in rows {
            absentees.push(row?);
        }
        Ok(absentees)
    }
}
