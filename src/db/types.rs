//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),
}

/// A row from the `users` table. The roster universe for absentee
/// derivation; rows are upserted on every roster fetch and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUser {
    pub id: String,
    pub username: String,
    pub real_name: String,
    pub email: Option<String>,
    pub title: Option<String>,
    pub tz: Option<String>,
    pub updated_at: String,
}

/// A row from the `checkins` table. Unique on `(user_id, date)`; `date` is
/// the UTC calendar date derived from `ts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbCheckIn {
    pub user_id: String,
    /// Display-name snapshot taken at submission time.
    pub username: String,
    /// Message timestamp, seconds since epoch (Slack float precision).
    pub ts: f64,
    pub date: String,
    pub content: String,
    pub quality: String,
    pub created_at: String,
}

/// A row from the `absentees` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAbsentee {
    pub date: String,
    pub user_id: String,
    pub username: String,
}

/// Input to `replace_absentees`.
#[derive(Debug, Clone)]
pub struct AbsenteeEntry {
    pub user_id: String,
    pub username: String,
}

/// Aggregate over one calendar date.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: String,
    pub total_checkins: i64,
    pub good_checkins: i64,
    pub good_percent: f64,
}

/// Per-user aggregate over the trailing 7-day window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWeeklySummary {
    pub user_id: String,
    pub name: String,
    pub checkins: i64,
    pub good_checkins: i64,
    pub good_percent: f64,
}

/// One day of the monthly trend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTrend {
    pub date: String,
    pub total: i64,
    pub good_checkins: i64,
}

/// Aggregate over the trailing 30-day window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub start: String,
    pub end: String,
    pub total_checkins: i64,
    pub good_checkins: i64,
    pub avg_good_percent: f64,
    pub trend: Vec<DayTrend>,
}
