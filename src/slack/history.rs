//! Slack `conversations.history`: windowed message fetching.

use serde::Deserialize;

use super::{
    next_cursor, ChannelMessage, ResponseMetadata, SlackApiError, SlackClient, PAGE_LIMIT,
};

// ============================================================================
// API response types (deserialized from Slack JSON)
// ============================================================================

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<MessageRaw>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct MessageRaw {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Keep only plain human messages: `type == "message"`, no subtype
/// (subtypes are joins, topic changes, bot events), a real author, and a
/// parsable timestamp.
fn normalize_message(raw: MessageRaw) -> Option<ChannelMessage> {
    if raw.kind.as_deref() != Some("message") || raw.subtype.is_some() {
        return None;
    }
    let author_id = raw.user.filter(|u| !u.is_empty())?;
    let ts = raw.ts.as_deref()?.parse::<f64>().ok()?;
    Some(ChannelMessage {
        author_id,
        text: raw.text.unwrap_or_default(),
        ts,
    })
}

// ============================================================================
// History API
// ============================================================================

impl SlackClient {
    /// Fetch all messages in `[oldest_ts, latest_ts]`, draining cursor
    /// pagination. Nothing is returned if any page fails, so the caller can
    /// safely retry the whole window.
    pub(super) async fn fetch_history_paged(
        &self,
        channel: &str,
        oldest_ts: f64,
        latest_ts: f64,
    ) -> Result<Vec<ChannelMessage>, SlackApiError> {
        const METHOD: &str = "conversations.history";

        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("channel", channel.to_string()),
                ("oldest", format!("{oldest_ts:.6}")),
                ("latest", format!("{latest_ts:.6}")),
                ("limit", PAGE_LIMIT.to_string()),
                ("inclusive", "1".to_string()),
            ];
            if let Some(ref c) = cursor {
                params.push(("cursor", c.clone()));
            }

            let body = self.api_get(METHOD, &params).await?;
            let page: HistoryResponse =
                serde_json::from_str(&body).map_err(|e| SlackApiError::Api {
                    method: METHOD.to_string(),
                    error: format!("unexpected response shape: {e}"),
                })?;
            if !page.ok {
                return Err(SlackApiError::Api {
                    method: METHOD.to_string(),
                    error: page.error.unwrap_or_else(|| "unknown_error".to_string()),
                });
            }

            messages.extend(page.messages.into_iter().filter_map(normalize_message));

            cursor = next_cursor(METHOD, page.has_more, page.response_metadata.as_ref())?;
            if cursor.is_none() {
                break;
            }
        }

        Ok(messages)
    }
}
