//! Read-only query facade over the record store.
//!
//! Stateless: every call opens the database file read-only, which WAL mode
//! serves concurrently with an in-flight sync pass. Store mutations are
//! transactional, so readers here never observe a half-replaced absentee
//! set; at worst they see a day's check-ins before that day's absentees
//! are recomputed.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::db::{
    DailySummary, DbAbsentee, DbCheckIn, DbError, MonthlySummary, PulseDb, UserWeeklySummary,
};

#[derive(Debug, Clone)]
pub struct PulseService {
    db_path: PathBuf,
}

impl PulseService {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path }
    }

    fn db(&self) -> Result<PulseDb, DbError> {
        PulseDb::open_readonly_at(&self.db_path)
    }

    /// All check-ins recorded for a date, oldest first.
    pub fn daily_checkins(&self, date: NaiveDate) -> Result<Vec<DbCheckIn>, DbError> {
        self.db()?.checkins_on(date)
    }

    /// Absentees recorded for a date, ordered by display name.
    pub fn absentees(&self, date: NaiveDate) -> Result<Vec<DbAbsentee>, DbError> {
        self.db()?.absentees_on(date)
    }

    /// A single user's check-in for a date. `None` is the "no check-in
    /// recorded" outcome, distinct from failure.
    pub fn user_checkin(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DbCheckIn>, DbError> {
        self.db()?.checkin_for(user_id, date)
    }

    pub fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary, DbError> {
        self.db()?.daily_summary(date)
    }

    pub fn weekly_summary(&self, date: NaiveDate) -> Result<Vec<UserWeeklySummary>, DbError> {
        self.db()?.weekly_summary(date)
    }

    pub fn monthly_summary(&self, date: NaiveDate) -> Result<MonthlySummary, DbError> {
        self.db()?.monthly_summary(date)
    }
}
