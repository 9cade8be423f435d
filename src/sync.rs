//! Incremental synchronization engine.
//!
//! One pass covers exactly one UTC calendar date: fetch the roster, fetch
//! the message window, classify and upsert check-ins, recompute the date's
//! absentee set, then advance the sync cursor. Passes are stateless; all
//! carried state is re-read from the store, so a crashed pass is simply
//! retried by the next scheduled tick.
//!
//! A single engine instance is constructed at startup and shared by the
//! scheduler and the manual refresh endpoint. The pass gate serializes
//! passes; a refresh arriving mid-pass blocks until the running pass
//! finishes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tokio::sync::Mutex;

use crate::db::users::user_record;
use crate::db::{AbsenteeEntry, DbCheckIn, PulseDb};
use crate::error::PulseError;
use crate::quality;
use crate::roster::load_roster_csv;
use crate::slack::ChatSource;

/// Slack's built-in system bot account; never part of the roster.
const SYSTEM_BOT_ID: &str = "USLACKBOT";

/// Epoch seconds at 00:00:00 UTC on `day`.
pub(crate) fn day_start_ts(day: NaiveDate) -> f64 {
    day.and_time(NaiveTime::MIN).and_utc().timestamp() as f64
}

/// UTC calendar date of an epoch-seconds timestamp. `None` for values
/// outside the representable range.
pub(crate) fn utc_date_of(ts: f64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis((ts * 1000.0).round() as i64)
        .map(|dt| dt.date_naive())
}

fn now_epoch() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Chat platform handle: the source plus the channel it reads.
pub struct ChatHandle {
    pub chat: Arc<dyn ChatSource>,
    pub channel_id: String,
}

/// Knobs that shape a pass without being part of the chat handle.
#[derive(Debug, Default)]
pub struct SyncOptions {
    /// Optional CSV roster file merged before the platform roster.
    pub roster_path: Option<PathBuf>,
    /// Fixed fetch-window bounds for debugging / backfill runs.
    pub oldest_ts_override: Option<f64>,
    pub latest_ts_override: Option<f64>,
}

/// What one pass did. Mostly feeds logs and tests.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub date: NaiveDate,
    /// False when sync is disabled (no credentials) and the pass no-opped.
    pub synced: bool,
    pub messages_seen: usize,
    pub checkins_recorded: usize,
    pub absentees: usize,
}

impl PassOutcome {
    fn skipped(date: NaiveDate) -> Self {
        Self {
            date,
            synced: false,
            messages_seen: 0,
            checkins_recorded: 0,
            absentees: 0,
        }
    }
}

pub struct SyncEngine {
    db_path: PathBuf,
    source: Option<ChatHandle>,
    opts: SyncOptions,
    /// At most one pass in flight; replaces module-level globals with
    /// explicit state on the long-lived engine instance.
    pass_gate: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        db_path: PathBuf,
        source: Option<(Arc<dyn ChatSource>, String)>,
        opts: SyncOptions,
    ) -> Self {
        Self {
            db_path,
            source: source.map(|(chat, channel_id)| ChatHandle { chat, channel_id }),
            opts,
            pass_gate: Mutex::new(()),
        }
    }

    /// Whether this engine can reach the chat platform at all.
    pub fn is_enabled(&self) -> bool {
        self.source.is_some()
    }

    /// Run one pass per day, today backwards. Each pass is independent and
    /// individually idempotent; the first failure aborts the remainder and
    /// is retried wholesale on the next tick.
    pub async fn sync_recent(&self, days: u32) -> Result<Vec<PassOutcome>, PulseError> {
        let today = Utc::now().date_naive();
        let mut outcomes = Vec::new();
        for offset in 0..days.max(1) {
            let day = today - Duration::days(i64::from(offset));
            outcomes.push(self.sync_day(day).await?);
        }
        Ok(outcomes)
    }

    /// Run one full pass for `day`. Serialized by the pass gate.
    pub async fn sync_day(&self, day: NaiveDate) -> Result<PassOutcome, PulseError> {
        let _pass = self.pass_gate.lock().await;

        let Some(handle) = &self.source else {
            log::debug!("Slack credentials missing; skipping sync for {day}");
            return Ok(PassOutcome::skipped(day));
        };

        // Nothing is persisted until the full roster is in hand; a partial
        // roster would make the absentee set wrong.
        let members = handle.chat.list_roster_members().await?;

        let db = PulseDb::open_at(self.db_path.clone())?;

        // CSV seed first; the platform roster wins for overlapping ids.
        let mut roster: HashMap<String, String> = HashMap::new();
        if let Some(path) = &self.opts.roster_path {
            if path.exists() {
                match load_roster_csv(path) {
                    Ok(seed) => {
                        for user in seed {
                            roster.insert(user.id.clone(), user.real_name.clone());
                            db.upsert_user(&user)?;
                        }
                    }
                    Err(e) => log::warn!("Roster file {} skipped: {e}", path.display()),
                }
            }
        }
        for member in &members {
            if member.is_bot || member.is_deleted || member.id == SYSTEM_BOT_ID {
                continue;
            }
            db.upsert_user(&user_record(
                &member.id,
                &member.username,
                &member.real_name,
                member.email.clone(),
                member.title.clone(),
                member.tz.clone(),
            ))?;
            roster.insert(member.id.clone(), member.real_name.clone());
        }

        // The cursor is only trusted as a lower bound when it falls inside
        // the target day; otherwise the window is the day's own bounds. A
        // fetch failure aborts without advancing the cursor, so the next
        // pass retries the same window.
        let day_start = day_start_ts(day);
        let day_end = day_start_ts(day + Duration::days(1));
        let latest = self
            .opts
            .latest_ts_override
            .unwrap_or_else(now_epoch)
            .min(day_end);
        let oldest = match self.opts.oldest_ts_override {
            Some(ts) => ts,
            None => db
                .sync_cursor()?
                .filter(|c| *c >= day_start && *c < latest)
                .unwrap_or(day_start),
        };

        let messages = handle
            .chat
            .fetch_messages(&handle.channel_id, oldest, latest)
            .await?;

        let mut recorded = 0usize;
        for msg in &messages {
            let Some(display) = roster.get(&msg.author_id) else {
                continue;
            };
            if utc_date_of(msg.ts) != Some(day) {
                continue;
            }
            let text = msg.text.trim();
            if text.is_empty() {
                continue;
            }
            let result = quality::assess(text);
            db.upsert_checkin(&DbCheckIn {
                user_id: msg.author_id.clone(),
                username: display.clone(),
                ts: msg.ts,
                date: day.to_string(),
                content: text.to_string(),
                quality: result.label.as_str().to_string(),
                created_at: Utc::now().to_rfc3339(),
            })?;
            recorded += 1;
        }

        // Presence is read back from the store, not the in-memory batch,
        // so check-ins recorded by earlier passes still count.
        let present = db.checkin_user_ids_on(day)?;
        let mut absent: Vec<AbsenteeEntry> = roster
            .iter()
            .filter(|(id, _)| !present.contains(*id))
            .map(|(id, name)| AbsenteeEntry {
                user_id: id.clone(),
                username: name.clone(),
            })
            .collect();
        absent.sort_by(|a, b| a.username.cmp(&b.username).then(a.user_id.cmp(&b.user_id)));
        db.replace_absentees(day, &absent)?;

        // A cursor persistence failure is logged only; the check-in and
        // absentee writes above are idempotent and the next pass recomputes
        // them anyway.
        if let Err(e) = db.advance_sync_cursor(latest) {
            log::warn!("Failed to persist sync cursor: {e}");
        }

        log::info!(
            "Sync pass for {day}: {} messages, {recorded} check-ins, {} absentees",
            messages.len(),
            absent.len()
        );

        Ok(PassOutcome {
            date: day,
            synced: true,
            messages_seen: messages.len(),
            checkins_recorded: recorded,
            absentees: absent.len(),
        })
    }
}
