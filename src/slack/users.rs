//! Slack `users.list`: roster fetching.

use serde::Deserialize;

use super::{next_cursor, ResponseMetadata, RosterMember, SlackApiError, SlackClient, PAGE_LIMIT};

// ============================================================================
// API response types (deserialized from Slack JSON)
// ============================================================================

#[derive(Debug, Deserialize)]
struct UsersListResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    members: Vec<SlackMemberRaw>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct SlackMemberRaw {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    tz: Option<String>,
    #[serde(default)]
    profile: Option<MemberProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct MemberProfile {
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

fn normalize_member(raw: SlackMemberRaw) -> RosterMember {
    let profile = raw.profile.unwrap_or_default();
    let username = raw.name.clone().unwrap_or_else(|| raw.id.clone());
    let real_name = profile
        .real_name
        .or(raw.real_name)
        .or(raw.name)
        .unwrap_or_else(|| raw.id.clone());
    RosterMember {
        id: raw.id,
        username,
        real_name,
        email: profile.email,
        title: profile.title,
        tz: raw.tz,
        is_bot: raw.is_bot,
        is_deleted: raw.deleted,
    }
}

// ============================================================================
// Roster API
// ============================================================================

impl SlackClient {
    /// Fetch the full member list, draining cursor pagination.
    pub(super) async fn list_members_paged(&self) -> Result<Vec<RosterMember>, SlackApiError> {
        const METHOD: &str = "users.list";

        let mut members = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![("limit", PAGE_LIMIT.to_string())];
            if let Some(ref c) = cursor {
                params.push(("cursor", c.clone()));
            }

            let body = self.api_get(METHOD, &params).await?;
            let page: UsersListResponse =
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

            members.extend(page.members.into_iter().map(normalize_member));

            // users.list has no has_more flag; an empty cursor means done
            let more = page
                .response_metadata
                .as_ref()
                .and_then(|m| m.next_cursor.as_deref())
                .is_some_and(|c| !c.is_empty());
            cursor = next_cursor(METHOD, more, page.response_metadata.as_ref())?;
            if cursor.is_none() {
                break;
            }
        }

        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_list_deserialization() {
        let json = r#"{
            "ok": true,
            "members": [
                {
                    "id": "U100",
                    "name": "ana",
                    "deleted": false,
                    "is_bot": false,
                    "tz": "Europe/Lisbon",
                    "profile": {
                        "real_name": "Ana Alves",
                        "email": "ana@corp.test",
                        "title": "Engineer"
                    }
                },
                {
                    "id": "B200",
                    "name": "reminder-bot",
                    "is_bot": true
                }
            ],
            "response_metadata": {"next_cursor": ""}
        }"#;

        let resp: UsersListResponse = serde_json::from_str(json).expect("parse");
        assert!(resp.ok);
        assert_eq!(resp.members.len(), 2);
        assert!(resp.members[1].is_bot);
    }

    #[test]
    fn test_normalize_member_prefers_profile_real_name() {
        let raw: SlackMemberRaw = serde_json::from_str(
            r#"{"id":"U1","name":"ana","real_name":"top-level",
                "profile":{"real_name":"Ana Alves","email":"ana@corp.test"}}"#,
        )
        .expect("parse");
        let member = normalize_member(raw);
        assert_eq!(member.real_name, "Ana Alves");
        assert_eq!(member.username, "ana");
        assert_eq!(member.email.as_deref(), Some("ana@corp.test"));
    }

    #[test]
    fn test_normalize_member_falls_back_to_id() {
        let raw: SlackMemberRaw = serde_json::from_str(r#"{"id":"U9"}"#).expect("parse");
        let member = normalize_member(raw);
        assert_eq!(member.username, "U9");
        assert_eq!(member.real_name, "U9");
        assert!(!member.is_bot);
        assert!(!member.is_deleted);
    }

    #[test]
    fn test_error_envelope_deserialization() {
        let resp: UsersListResponse =
            serde_json::from_str(r#"{"ok": false, "error": "invalid_auth"}"#).expect("parse");
        assert!(!resp.ok);
        assert_eq!(resp.error.as_deref(), Some("invalid_auth"));
        assert!(resp.members.is_empty());
    }
}
