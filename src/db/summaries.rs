//! Aggregation queries over persisted check-ins.
//!
//! Windows are trailing ranges ending at the query date, inclusive: 7 days
//! for the weekly rollup, 30 days for the monthly rollup. Computed per
//! request from stored rows, never cached.

use chrono::{Duration, NaiveDate};
use rusqlite::params;

use super::*;

/// Percentage of good check-ins, rounded to 2 decimals. Zero total yields
/// 0.0, never a division error.
fn good_percent(good: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = good as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

impl PulseDb {
    /// Totals for a single date.
    pub fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary, DbError> {
        let (total, good): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN quality = 'good' THEN 1 ELSE 0 END), 0)
             FROM checkins WHERE date = ?1",
            params![date.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(DailySummary {
            date: date.to_string(),
            total_checkins: total,
            good_checkins: good,
            good_percent: good_percent(good, total),
        })
    }

    /// Per-user totals over the trailing 7-day window ending at `date`.
    ///
    /// Every roster user appears, including those with zero check-ins, so
    /// the report reads as an attendance sheet. Ordered by display name.
    pub fn weekly_summary(&self, date: NaiveDate) -> Result<Vec<UserWeeklySummary>, DbError> {
        let start = date - Duration::days(6);
        let mut stmt = self.conn.prepare(
            "SELECT u.id, u.real_name,
                    COUNT(c.user_id),
                    COALESCE(SUM(CASE WHEN c.quality = 'good' THEN 1 ELSE 0 END), 0)
             FROM users u
             LEFT JOIN checkins c
               ON u.id = c.user_id
              AND c.date BETWEEN ?1 AND ?2
             GROUP BY u.id, u.real_name
             ORDER BY u.real_name, u.id",
        )?;
        let rows = stmt.query_map(params![start.to_string(), date.to_string()], |row| {
            let total: i64 = row.get(2)?;
            let good: i64 = row.get(3)?;
            Ok(UserWeeklySummary {
                user_id: row.get(0)?,
                name: row.get(1)?,
                checkins: total,
                good_checkins: good,
                good_percent: good_percent(good, total),
            })
        })?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }

    /// Day-by-day trend over the trailing 30-day window ending at `date`,
    /// plus overall totals. Days without check-ins are omitted from the
    /// trend but still covered by the window.
    pub fn monthly_summary(&self, date: NaiveDate) -> Result<MonthlySummary, DbError> {
        let start = date - Duration::days(29);
        let mut stmt = self.conn.prepare(
            "SELECT date,
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN quality = 'good' THEN 1 ELSE 0 END), 0)
             FROM checkins
             WHERE date BETWEEN ?1 AND ?2
             GROUP BY date
             ORDER BY date",
        )?;
        let rows = stmt.query_map(params![start.to_string(), date.to_string()], |row| {
            Ok(DayTrend {
                date: row.get(0)?,
                total: row.get(1)?,
                good_checkins: row.get(2)?,
            })
        })?;

        let mut trend = Vec::new();
        let mut total_checkins = 0;
        let mut good_checkins = 0;
        for row in rows {
            let day = row?;
            total_checkins += day.total;
            good_checkins += day.good_checkins;
            trend.push(day);
        }

        Ok(MonthlySummary {
            start: start.to_string(),
            end: date.to_string(),
            total_checkins,
            good_checkins,
            avg_good_percent: good_percent(good_checkins, total_checkins),
            trend,
        })
    }
}
