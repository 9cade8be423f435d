use std::collections::HashSet;

use chrono::NaiveDate;
use rusqlite::params;

use super::*;

impl PulseDb {
    // =========================================================================
    // Check-ins
    // =========================================================================

    /// Upsert a check-in, keyed on `(user_id, date)`.
    ///
    /// Last-write-wins by message timestamp: an existing row is only
    /// overwritten when the incoming `ts` is at least as recent, so the
    /// stored row always reflects the latest message of the day no matter
    /// what order the sync pass processes pages in.
    pub fn upsert_checkin(&self, checkin: &DbCheckIn) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO checkins (user_id, username, ts, date, content, quality, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user_id, date) DO UPDATE SET
                username = excluded.username,
                ts = excluded.ts,
                content = excluded.content,
                quality = excluded.quality
             WHERE excluded.ts >= checkins.ts",
            params![
                checkin.user_id,
                checkin.username,
                checkin.ts,
                checkin.date,
                checkin.content,
                checkin.quality,
                checkin.created_at,
            ],
        )?;
        Ok(())
    }

    /// All check-ins recorded for a date, oldest first.
    pub fn checkins_on(&self, date: NaiveDate) -> Result<Vec<DbCheckIn>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, username, ts, date, content, quality, created_at
             FROM checkins WHERE date = ?1 ORDER BY ts",
        )?;
        let rows = stmt.query_map(params![date.to_string()], Self::map_checkin_row)?;
        let mut checkins = Vec::new();
        for row in rows {
            checkins.push(row?);
        }
        Ok(checkins)
    }

    /// A single user's check-in for a date, if one was recorded.
    pub fn checkin_for(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DbCheckIn>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, username, ts, date, content, quality, created_at
             FROM checkins WHERE user_id = ?1 AND date = ?2",
        )?;
        let mut rows = stmt.query_map(params![user_id, date.to_string()], Self::map_checkin_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// The set of user ids with a check-in on a date. Read back by the sync
    /// engine when deriving absentees, so presence recorded by earlier
    /// passes still counts.
    pub fn checkin_user_ids_on(&self, date: NaiveDate) -> Result<HashSet<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM checkins WHERE date = ?1")?;
        let rows = stmt.query_map(params![date.to_string()], |row| row.get::<_, String>(0))?;
        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    fn map_checkin_row(row: &rusqlite::Row) -> rusqlite::Result<DbCheckIn> {
        Ok(DbCheckIn {
            user_id: row.get(0)?,
            username: row.get(1)?,
            ts: row.get(2)?,
            date: row.get(3)?,
            content: row.get(4)?,
            quality: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

#[cfg(test)]
pub(crate) fn checkin_record(user_id: &str, date: NaiveDate, ts: f64, content: &str) -> DbCheckIn {
    DbCheckIn {
        user_id: user_id.to_string(),
        username: user_id.to_lowercase(),
        ts,
        date: date.to_string(),
        content: content.to_string(),
        quality: "bad".to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).expect("valid date")
    }

    #[test]
    fn test_upsert_and_fetch_checkin() {
        let db = test_db();
        db.upsert_checkin(&checkin_record("U1", day(), 1_717_400_000.1, "done"))
            .expect("upsert");

        let found = db.checkin_for("U1", day()).expect("query");
        assert!(found.is_some());
        assert_eq!(found.expect("row").content, "done");

        let missing = db.checkin_for("U1", day().succ_opt().expect("next day"));
        assert!(missing.expect("query").is_none());
    }

    #[test]
    fn test_one_checkin_per_user_per_day() {
        let db = test_db();
        db.upsert_checkin(&checkin_record("U1", day(), 1_717_400_000.0, "first"))
            .expect("upsert");
        db.upsert_checkin(&checkin_record("U1", day(), 1_717_400_100.0, "second"))
            .expect("upsert");

        let checkins = db.checkins_on(day()).expect("query");
        assert_eq!(checkins.len(), 1);
        assert_eq!(checkins[0].content, "second");
        assert_eq!(checkins[0].ts, 1_717_400_100.0);
    }

    #[test]
    fn test_last_write_wins_by_timestamp_not_order() {
        let db = test_db();
        // Later message arrives first (Slack pages newest-first)
        db.upsert_checkin(&checkin_record("U1", day(), 1_717_400_100.0, "later"))
            .expect("upsert");
        db.upsert_checkin(&checkin_record("U1", day(), 1_717_400_000.0, "earlier"))
            .expect("upsert");

        let row = db.checkin_for("U1", day()).expect("query").expect("row");
        assert_eq!(row.content, "later", "older message must not overwrite");
    }

    #[test]
    fn test_checkins_ordered_by_ts() {
        let db = test_db();
        db.upsert_checkin(&checkin_record("U2", day(), 1_717_400_200.0, "b"))
            .expect("upsert");
        db.upsert_checkin(&checkin_record("U1", day(), 1_717_400_100.0, "a"))
            .expect("upsert");

        let checkins = db.checkins_on(day()).expect("query");
        assert_eq!(checkins.len(), 2);
        assert_eq!(checkins[0].user_id, "U1");
        assert_eq!(checkins[1].user_id, "U2");
    }

    #[test]
    fn test_checkin_user_ids_on_date() {
        let db = test_db();
        db.upsert_checkin(&checkin_record("U1", day(), 1_717_400_000.0, "x"))
            .expect("upsert");
        db.upsert_checkin(&checkin_record("U2", day(), 1_717_400_001.0, "y"))
            .expect("upsert");
        let other = day().succ_opt().expect("next day");
        db.upsert_checkin(&checkin_record("U3", other, 1_717_500_000.0, "z"))
            .expect("upsert");

        let ids = db.checkin_user_ids_on(day()).expect("query");
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("U1") && ids.contains("U2"));
    }
}
