//! Slack Web API client.
//!
//! Thin typed wrapper over the two endpoints the sync engine needs:
//! `users.list` (roster) and `conversations.history` (message window).
//! Both are cursor-paginated and fully drained before returning, so a
//! mid-pagination failure surfaces as an error with nothing consumed.
//! Transient HTTP failures (429, 5xx, timeouts) are retried a bounded
//! number of times with exponential backoff, honoring `Retry-After`.

pub mod history;
pub mod users;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Per-request timeout owned by the client; a stalled fetch fails the sync
/// pass, which is retried on the next scheduled tick.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Page size for both paginated endpoints.
const PAGE_LIMIT: &str = "200";

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SlackApiError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    /// Slack returned `ok: false` with an error token.
    #[error("Slack API error for {method}: {error}")]
    Api { method: String, error: String },

    /// Non-success HTTP status after retries were exhausted.
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    /// `has_more` was set but no continuation cursor was supplied.
    #[error("Malformed pagination from {method}: missing continuation cursor")]
    MalformedPagination { method: String },
}

// ============================================================================
// Chat source contract
// ============================================================================

/// A member of the channel's roster, as reported by the chat platform.
/// Bot/deleted flags are carried through; the sync engine does the
/// filtering so the roster policy lives in one place.
#[derive(Debug, Clone)]
pub struct RosterMember {
    pub id: String,
    pub username: String,
    pub real_name: String,
    pub email: Option<String>,
    pub title: Option<String>,
    pub tz: Option<String>,
    pub is_bot: bool,
    pub is_deleted: bool,
}

/// A human-authored message from the channel history.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub author_id: String,
    pub text: String,
    /// Seconds since epoch, Slack float precision.
    pub ts: f64,
}

/// What the sync engine needs from the chat platform. `SlackClient` is the
/// production implementation; tests substitute an in-memory fake.
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// All roster members, pagination fully drained.
    async fn list_roster_members(&self) -> Result<Vec<RosterMember>, SlackApiError>;

    /// All messages in `[oldest_ts, latest_ts]` (inclusive), pagination
    /// fully drained, system events filtered out.
    async fn fetch_messages(
        &self,
        channel: &str,
        oldest_ts: f64,
        latest_ts: f64,
    ) -> Result<Vec<ChannelMessage>, SlackApiError>;
}

// ============================================================================
// Retry policy
// ============================================================================

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

fn status_is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_delay(
    attempt: u32,
    policy: &RetryPolicy,
    retry_after: Option<&reqwest::header::HeaderValue>,
) -> Duration {
    if let Some(secs) = retry_after
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
    {
        return Duration::from_secs(secs.min(30));
    }
    let exponent = 2u64.saturating_pow(attempt.saturating_sub(1));
    let backoff = policy
        .initial_backoff_ms
        .saturating_mul(exponent)
        .min(policy.max_backoff_ms);
    Duration::from_millis(backoff)
}

async fn send_with_retry(
    request: reqwest::RequestBuilder,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, SlackApiError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_err: Option<SlackApiError> = None;

    for attempt in 1..=attempts {
        let Some(cloned) = request.try_clone() else {
            return request.send().await.map_err(SlackApiError::Http);
        };

        match cloned.send().await {
            Ok(response) => {
                let status = response.status();
                if status_is_retryable(status) && attempt < attempts {
                    let delay = retry_delay(
                        attempt,
                        policy,
                        response.headers().get(reqwest::header::RETRY_AFTER),
                    );
                    log::warn!(
                        "slack_api retry {attempt}/{attempts} after status {status} (sleep {delay:?})"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                if (err.is_timeout() || err.is_connect()) && attempt < attempts {
                    let delay = retry_delay(attempt, policy, None);
                    log::warn!(
                        "slack_api retry {attempt}/{attempts} after transport error: {err} (sleep {delay:?})"
                    );
                    tokio::time::sleep(delay).await;
                    last_err = Some(SlackApiError::Http(err));
                    continue;
                }
                return Err(SlackApiError::Http(err));
            }
        }
    }

    Err(last_err.unwrap_or(SlackApiError::Status {
        status: 0,
        message: "request exhausted retries".to_string(),
    }))
}

// ============================================================================
// Client
// ============================================================================

/// Shared shape of Slack's `response_metadata` pagination envelope.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Extract the continuation cursor for the next page.
///
/// Slack signals "no more pages" either with `has_more: false` or with an
/// empty cursor string; `has_more: true` without a cursor is a malformed
/// response and is treated as a transient fetch failure.
pub(crate) fn next_cursor(
    method: &str,
    has_more: bool,
    metadata: Option<&ResponseMetadata>,
) -> Result<Option<String>, SlackApiError> {
    if !has_more {
        return Ok(None);
    }
    match metadata
        .and_then(|m| m.next_cursor.as_deref())
        .filter(|c| !c.is_empty())
    {
        Some(cursor) => Ok(Some(cursor.to_string())),
        None => Err(SlackApiError::MalformedPagination {
            method: method.to_string(),
        }),
    }
}

pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    retry: RetryPolicy,
}

impl SlackClient {
    pub fn new(token: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {e}");
                reqwest::Client::new()
            });
        Self {
            http,
            token: token.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// GET a Web API method and return the response body after status checks.
    pub(crate) async fn api_get(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<String, SlackApiError> {
        let request = self
            .http
            .get(format!("{SLACK_API_BASE}/{method}"))
            .bearer_auth(&self.token)
            .query(params);

        let resp = send_with_retry(request, &self.retry).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SlackApiError::Status {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl ChatSource for SlackClient {
    async fn list_roster_members(&self) -> Result<Vec<RosterMember>, SlackApiError> {
        self.list_members_paged().await
    }

    async fn fetch_messages(
        &self,
        channel: &str,
        oldest_ts: f64,
        latest_ts: f64,
    ) -> Result<Vec<ChannelMessage>, SlackApiError> {
        self.fetch_history_paged(channel, oldest_ts, latest_ts).await
    }
}
