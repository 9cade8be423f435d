//! Runtime configuration loaded from environment variables.
//!
//! Missing Slack credentials are not fatal: the service starts with sync
//! disabled and every pass becomes a logged no-op, so query endpoints keep
//! serving the last synced data. Everything else that fails to parse is a
//! startup configuration error.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::PulseDb;
use crate::error::PulseError;

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_ROSTER_PATH: &str = "team_roster.csv";

/// Slack credentials; absent as a pair when either variable is unset.
#[derive(Debug, Clone)]
pub struct SlackSettings {
    pub bot_token: String,
    pub channel_id: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// `None` disables sync entirely.
    pub slack: Option<SlackSettings>,
    /// Shared secret for the HTTP API; `None` rejects all protected routes.
    pub api_key: Option<String>,
    pub database_path: PathBuf,
    pub roster_path: PathBuf,
    pub sync_interval: Duration,
    /// Optional fixed fetch-window bounds (debugging / backfill runs).
    pub oldest_ts_override: Option<f64>,
    pub latest_ts_override: Option<f64>,
    pub bind_addr: SocketAddr,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, PulseError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through a lookup closure. Lets tests exercise parsing
    /// without mutating the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self, PulseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let slack = match (get("SLACK_BOT_TOKEN"), get("CHANNEL_ID")) {
            (Some(bot_token), Some(channel_id))
                if !bot_token.is_empty() && !channel_id.is_empty() =>
            {
                Some(SlackSettings {
                    bot_token,
                    channel_id,
                })
            }
            _ => None,
        };

        let database_path = match get("DATABASE_PATH") {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => PulseDb::default_path()?,
        };

        let roster_path = PathBuf::from(
            get("TEAM_ROSTER_PATH").unwrap_or_else(|| DEFAULT_ROSTER_PATH.to_string()),
        );

        let sync_interval_secs = match get("SYNC_INTERVAL_SECONDS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                PulseError::Config(format!("Invalid SYNC_INTERVAL_SECONDS: {raw}"))
            })?,
            None => DEFAULT_SYNC_INTERVAL_SECS,
        };

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| PulseError::Config(format!("Invalid BIND_ADDR: {bind_raw}")))?;

        Ok(Settings {
            slack,
            api_key: get("API_KEY").filter(|k| !k.is_empty()),
            database_path,
            roster_path,
            sync_interval: Duration::from_secs(sync_interval_secs),
            oldest_ts_override: parse_ts_override(&get, "SLACK_OLDEST_TS")?,
            latest_ts_override: parse_ts_override(&get, "SLACK_LATEST_TS")?,
            bind_addr,
        })
    }
}

fn parse_ts_override<F>(get: &F, key: &str) -> Result<Option<f64>, PulseError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) if !raw.is_empty() => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| PulseError::Config(format!("Invalid {key}: {raw}"))),
        _ => Ok(None),
    }
}
