use chrono::Utc;
use rusqlite::params;

use super::*;

impl PulseDb {
    // =========================================================================
    // Users (roster)
    // =========================================================================

    /// Insert or update a roster user. Upserted whenever seen in a roster
    /// fetch; rows are never deleted.
    pub fn upsert_user(&self, user: &DbUser) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO users (id, username, real_name, email, title, tz, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                real_name = excluded.real_name,
                email = COALESCE(excluded.email, users.email),
                title = COALESCE(excluded.title, users.title),
                tz = COALESCE(excluded.tz, users.tz),
                updated_at = excluded.updated_at",
            params![
                user.id,
                user.username,
                user.real_name,
                user.email,
                user.title,
                user.tz,
                user.updated_at,
            ],
        )?;
        Ok(())
    }

    /// All known users, ordered by display name.
    pub fn all_users(&self) -> Result<Vec<DbUser>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username, real_name, email, title, tz, updated_at
             FROM users ORDER BY real_name, id",
        )?;
        let rows = stmt.query_map([], Self::map_user_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    fn map_user_row(row: &rusqlite::Row) -> rusqlite::Result<DbUser> {
        Ok(DbUser {
            id: row.get(0)?,
            username: row.get(1)?,
            real_name: row.get(2)?,
            email: row.get(3)?,
            title: row.get(4)?,
            tz: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

/// Build a `DbUser` stamped with the current time.
pub fn user_record(
    id: &str,
    username: &str,
    real_name: &str,
    email: Option<String>,
    title: Option<String>,
    tz: Option<String>,
) -> DbUser {
    DbUser {
        id: id.to_string(),
        username: username.to_string(),
        real_name: real_name.to_string(),
        email,
        title,
        tz,
        updated_at: Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_upsert_and_list_users() {
        let db = test_db();

        let user = user_record("U1", "ana", "Ana Alves", None, None, None);
        db.upsert_user(&user).expect("upsert");

        let users = db.all_users().expect("list");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "U1");
        assert_eq!(users[0].real_name, "Ana Alves");
    }

    #[test]
    fn test_upsert_updates_existing() {
        let db = test_db();

        db.upsert_user(&user_record("U1", "ana", "Ana", None, None, None))
            .expect("first upsert");
        db.upsert_user(&user_record(
            "U1",
            "ana.alves",
            "Ana Alves",
            Some("ana@corp.test".to_string()),
            None,
            None,
        ))
        .expect("second upsert");

        let users = db.all_users().expect("list");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "ana.alves");
        assert_eq!(users[0].email.as_deref(), Some("ana@corp.test"));
    }

    #[test]
    fn test_upsert_keeps_fields_absent_from_update() {
        let db = test_db();

        db.upsert_user(&user_record(
            "U1",
            "ana",
            "Ana",
            Some("ana@corp.test".to_string()),
            Some("Engineer".to_string()),
            None,
        ))
        .expect("first upsert");
        // A later roster fetch without profile detail must not erase it
        db.upsert_user(&user_record("U1", "ana", "Ana", None, None, None))
            .expect("second upsert");

        let users = db.all_users().expect("list");
        assert_eq!(users[0].email.as_deref(), Some("ana@corp.test"));
        assert_eq!(users[0].title.as_deref(), Some("Engineer"));
    }

    #[test]
    fn test_users_ordered_by_display_name() {
        let db = test_db();
        db.upsert_user(&user_record("U2", "zed", "Zed Zane", None, None, None))
            .expect("upsert");
        db.upsert_user(&user_record("U1", "ana", "Ana Alves", None, None, None))
            .expect("upsert");

        let users = db.all_users().expect("list");
        assert_eq!(users[0].id, "U1");
        assert_eq!(users[1].id, "U2");
    }
}
