//! SQLite-backed record store for users, check-ins, absentees, and sync state.
//!
//! The database lives at `~/.slack-pulse/pulse.db` by default. The sync
//! engine owns writes; query paths open the same file read-only, which WAL
//! mode serves concurrently without blocking the writer. Every multi-row
//! mutation (absentee replacement) runs inside a transaction so readers
//! never observe a half-written set.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

pub mod types;
pub use types::*;

pub mod absentees;
pub mod checkins;
pub mod summaries;
pub mod sync_state;
pub mod users;

pub struct PulseDb {
    conn: Connection,
}

impl PulseDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at the default path and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        Self::open_at(Self::default_path()?)
    }

    /// Open a database at an explicit path, creating parent directories and
    /// applying the schema. The sync engine and tests use this directly.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL lets query paths read while a sync pass writes
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::apply_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Open the database read-only. Used by the query facade for safe
    /// concurrent reads while the sync engine owns writes.
    pub fn open_readonly_at(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.slack-pulse/pulse.db`.
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".slack-pulse").join("pulse.db"))
    }

    /// Apply the schema. Idempotent, safe to run on every open.
    fn apply_schema(conn: &Connection) -> Result<(), DbError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                real_name TEXT NOT NULL,
                email TEXT,
                title TEXT,
                tz TEXT,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS checkins (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                ts REAL NOT NULL,
                date TEXT NOT NULL,
                content TEXT NOT NULL,
                quality TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(user_id, date)
            );
            CREATE TABLE IF NOT EXISTS absentees (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                UNIQUE(user_id, date)
            );
            CREATE TABLE IF NOT EXISTS sync_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================

#[cfg(test)]
pub mod test_utils {
    use super::PulseDb;
    use std::path::PathBuf;

    /// Create a temporary database for testing.
    ///
    /// The `TempDir` is leaked so the file persists for the duration of the
    /// test; the OS cleans up the temp directory afterwards.
    pub fn test_db() -> PulseDb {
        let (db, _path) = test_db_with_path();
        db
    }

    /// Like `test_db`, but also returns the file path for tests that need a
    /// second (read-only) handle on the same database.
    pub fn test_db_with_path() -> (PulseDb, PathBuf) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        let db = PulseDb::open_at(path.clone()).expect("Failed to open test database");
        (db, path)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_open_creates_tables() {
        let db = test_db();
        for table in ["users", "checkins", "absentees", "sync_state"] {
            let count: i64 = db
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })
                .unwrap_or_else(|_| panic!("{table} table should exist"));
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn test_idempotent_schema_application() {
        // Opening the same DB twice should not error (IF NOT EXISTS)
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("idempotent.db");

        let _db1 = PulseDb::open_at(path.clone()).expect("first open");
        let _db2 = PulseDb::open_at(path).expect("second open should not fail");
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|db| {
            db.conn_ref().execute(
                "INSERT INTO sync_state (key, value) VALUES ('k', 'v')",
                [],
            )?;
            Err(DbError::HomeDirNotFound)
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM sync_state", [], |row| row.get(0))
            .expect("query");
        assert_eq!(count, 0, "rolled-back insert should not persist");
    }
}
