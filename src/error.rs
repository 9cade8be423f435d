//! Error taxonomy for sync passes and service startup.
//!
//! Errors are classified by transience: a transient error aborts the
//! current sync pass without touching the cursor and is retried on the
//! next scheduled tick; everything else needs operator attention.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PulseError {
    #[error("Database: {0}")]
    Db(#[from] crate::db::DbError),

    #[error("Slack: {0}")]
    Slack(#[from] crate::slack::SlackApiError),

    #[error("Roster import: {0}")]
    Roster(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PulseError {
    /// True for failures the next scheduled sync tick may clear on its own
    /// (network, rate limits, malformed pages). Cursor state is never
    /// advanced past one of these.
    pub fn is_transient(&self) -> bool {
        matches!(self, PulseError::Slack(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::SlackApiError;

    #[test]
    fn test_slack_errors_are_transient() {
        let err = PulseError::Slack(SlackApiError::Api {
            method: "conversations.history".to_string(),
            error: "ratelimited".to_string(),
        });
        assert!(err.is_transient());
    }

    #[test]
    fn test_config_errors_are_not_transient() {
        let err = PulseError::Config("CHANNEL_ID must be set".to_string());
        assert!(!err.is_transient());
    }
}
