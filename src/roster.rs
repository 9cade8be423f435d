//! Optional CSV roster import.
//!
//! Lets a team seed or extend the roster with people who rarely post, so
//! they still show up as absentees. The file is merged into the `users`
//! table at the start of every sync pass, before the Slack roster fetch;
//! Slack data then wins for overlapping ids.
//!
//! Expected header: `user_id,username,real_name,email,title`. Only
//! `user_id` is required; rows without one are skipped.

use std::path::Path;

use serde::Deserialize;

use crate::db::users::user_record;
use crate::db::DbUser;

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Parse a roster CSV into user records. The caller decides whether a
/// missing file matters; parse errors surface as `csv::Error`.
pub fn load_roster_csv(path: &Path) -> Result<Vec<DbUser>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut users = Vec::new();
    for row in reader.deserialize::<RosterRow>() {
        let row = row?;
        let user_id = row.user_id.trim();
        if user_id.is_empty() {
            continue;
        }
        let username = row
            .username
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(user_id);
        let real_name = row
            .real_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(user_id);
        users.push(user_record(
            user_id,
            username,
            real_name,
            row.email.filter(|s| !s.is_empty()),
            row.title.filter(|s| !s.is_empty()),
            None,
        ));
    }
    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    #[test]
    fn test_load_full_roster() {
        let file = write_csv(
            "user_id,username,real_name,email,title\n\
             U1,ana,Ana Alves,ana@corp.test,Engineer\n\
             U2,bo,Bo Berg,,\n",
        );
        let users = load_roster_csv(file.path()).expect("parse");
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "U1");
        assert_eq!(users[0].real_name, "Ana Alves");
        assert_eq!(users[0].email.as_deref(), Some("ana@corp.test"));
        assert!(users[1].email.is_none());
    }

    #[test]
    fn test_rows_without_user_id_are_skipped() {
        let file = write_csv(
            "user_id,username,real_name,email,title\n\
             ,ghost,Ghost,,\n\
             U1,ana,Ana,,\n",
        );
        let users = load_roster_csv(file.path()).expect("parse");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "U1");
    }

    #[test]
    fn test_missing_names_fall_back_to_user_id() {
        let file = write_csv("user_id,username,real_name,email,title\nU1,,,,\n");
        let users = load_roster_csv(file.path()).expect("parse");
        assert_eq!(users[0].username, "U1");
        assert_eq!(users[0].real_name, "U1");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = load_roster_csv(Path::new("/nonexistent/team_roster.csv"));
        assert!(result.is_err());
    }
}
