use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::db::enums::Role;

/// A single entry in a record's comment log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub date: DateTime<Utc>,
    pub user: String,
    pub comment: String,
}

// Naive layouts found in hand-edited rows, read as UTC.
const LEGACY_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn loose_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            let raw = raw.trim();
            DateTime::parse_from_rfc3339(raw)
                .map(|date| date.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    LEGACY_DATE_FORMATS
                        .iter()
                        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn loose_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

impl Comment {
    /// Reads one stored log entry, tolerating the shapes older writers left
    /// behind. An unreadable date becomes the Unix epoch.
    fn from_stored(value: &Value) -> Option<Self> {
        if let Ok(comment) = serde_json::from_value::<Comment>(value.clone()) {
            return Some(comment);
        }

        match value {
            Value::Object(fields) => {
                let user = loose_text(fields.get("user"));
                let comment = loose_text(fields.get("comment"));
                if user.is_empty() && comment.is_empty() {
                    return None;
                }
                let date = fields.get("date").and_then(loose_date);
                if date.is_none() {
                    warn!(user = %user, "Comment entry has an unreadable date.");
                }
                Some(Comment {
                    date: date.unwrap_or_default(),
                    user,
                    comment,
                })
            }
            Value::String(text) if !text.trim().is_empty() => Some(Comment {
                date: DateTime::<Utc>::default(),
                user: String::new(),
                comment: text.clone(),
            }),
            _ => None,
        }
    }
}

/// Ordered, append-only comment history of a tracking record.
///
/// Persisted as a JSON array in the `comments` column. Older rows were written
/// as a JSON-encoded string holding that array, or as free-form entries, so
/// reading never fails: entries are recovered where possible and dropped with
/// a warning otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentLog(Vec<Comment>);

impl CommentLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Comment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn latest(&self) -> Option<&Comment> {
        self.0.last()
    }

    pub fn push(&mut self, comment: Comment) {
        self.0.push(comment);
    }

    /// Returns a copy of this log with `comment` appended at the end.
    pub fn appended(&self, comment: Comment) -> Self {
        let mut next = self.clone();
        next.push(comment);
        next
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::new(),
            Value::String(raw) if raw.trim().is_empty() => Self::new(),
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(parsed @ (Value::Array(_) | Value::Object(_))) => Self::from_json(&parsed),
                _ => Self(Comment::from_stored(value).into_iter().collect()),
            },
            Value::Array(entries) => {
                let comments: Vec<Comment> = entries.iter().filter_map(Comment::from_stored).collect();
                if comments.len() < entries.len() {
                    warn!(
                        dropped = entries.len() - comments.len(),
                        "Dropped unreadable comment log entries."
                    );
                }
                Self(comments)
            }
            Value::Object(_) => Self(Comment::from_stored(value).into_iter().collect()),
            other => {
                warn!(value = %other, "Comment log is not a list, ignoring it.");
                Self::new()
            }
        }
    }
}

impl From<Vec<Comment>> for CommentLog {
    fn from(entries: Vec<Comment>) -> Self {
        Self(entries)
    }
}

/// A Daily Status Report as seen by the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub tracking_number: String,
    pub last_updated_at: DateTime<Utc>,
    pub last_updated_by: String,
    pub created_by: String,
    pub organization: String,
    pub comments: CommentLog,
}

/// Fields for a record that does not exist yet; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub tracking_number: String,
    pub organization: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub comments: CommentLog,
}

/// A partial update. `None` leaves a field untouched; the audit fields are
/// always written.
#[derive(Debug, Clone)]
pub struct RecordPatch {
    pub tracking_number: Option<String>,
    pub organization: Option<String>,
    pub comments: Option<CommentLog>,
    pub last_updated_at: DateTime<Utc>,
    pub last_updated_by: String,
}

impl RecordPatch {
    pub fn touch(last_updated_at: DateTime<Utc>, last_updated_by: impl Into<String>) -> Self {
        Self {
            tracking_number: None,
            organization: None,
            comments: None,
            last_updated_at,
            last_updated_by: last_updated_by.into(),
        }
    }
}

/// The authenticated caller. Created at login and passed down explicitly to
/// every operation that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub role: Role,
    pub organization: String,
}

/// A stored login account.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: i64,
    pub user_id: String,
    pub password_hash: String,
    pub role: Role,
    pub organization: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn identity(&self) -> UserIdentity {
        UserIdentity {
            user_id: self.user_id.clone(),
            role: self.role,
            organization: self.organization.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUserAccount {
    pub user_id: String,
    pub password_hash: String,
    pub role: Role,
    pub organization: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub last_updated_at: DateTime<Utc>,
    pub last_updated_by: String,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn comment(minute: u32, user: &str, text: &str) -> Comment {
        Comment {
            date: Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap(),
            user: user.to_string(),
            comment: text.to_string(),
        }
    }

    #[test]
    fn test_comment_log_json_preserves_order() {
        let log = CommentLog::from(vec![
            comment(0, "u1", "picked up"),
            comment(5, "u2", "in transit"),
            comment(9, "u1", "delivered"),
        ]);

        let value = log.to_json().unwrap();
        assert!(value.is_array());
        let restored = CommentLog::from_json(&value);

        assert_eq!(restored.len(), 3);
        assert_eq!(restored, log);
        assert_eq!(restored.latest().unwrap().comment, "delivered");
    }

    #[test]
    fn test_comment_log_reads_string_encoded_array() {
        let raw = r#"[{"date":"2024-05-01T14:30:00+05:30","user":"u1","comment":"hello"}]"#;
        let log = CommentLog::from_json(&Value::String(raw.to_string()));

        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].date, Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        assert_eq!(log.entries()[0].user, "u1");
    }

    #[test]
    fn test_comment_log_empty_shapes() {
        assert!(CommentLog::from_json(&Value::Null).is_empty());
        assert!(CommentLog::from_json(&Value::String(String::new())).is_empty());
        assert!(CommentLog::from_json(&serde_json::json!([])).is_empty());
        assert!(CommentLog::from_json(&serde_json::json!({"not": "a list"})).is_empty());
        assert!(CommentLog::from_json(&serde_json::json!(42)).is_empty());
    }

    #[test]
    fn test_comment_log_recovers_malformed_entries() {
        let log = CommentLog::from_json(&serde_json::json!([
            {"date": "not a date", "user": "u1", "comment": "hi"},
            {"date": "2024-05-01 09:05:00", "user": "u2", "comment": "naive"},
            {"date": 1714554000000i64, "user": "u3", "comment": 7},
            {"date": "2024-05-01T09:09:00Z", "user": "u4"},
            "free text",
            {"unrelated": true},
        ]));

        let entries = log.entries();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].date, DateTime::<Utc>::default());
        assert_eq!(entries[0].comment, "hi");
        assert_eq!(entries[1].date, Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 0).unwrap());
        assert_eq!(entries[2].date, Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        assert_eq!(entries[2].comment, "7");
        assert_eq!(entries[3].comment, "");
        assert_eq!(entries[4].comment, "free text");
    }

    #[test]
    fn test_comment_log_reads_plain_text_column() {
        let log = CommentLog::from_json(&Value::String("left at gate".to_string()));
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].comment, "left at gate");
        assert_eq!(log.entries()[0].user, "");
    }

    #[test]
    fn test_appended_leaves_original_untouched() {
        let log = CommentLog::from(vec![comment(0, "u1", "first")]);
        let next = log.appended(comment(1, "u2", "second"));

        assert_eq!(log.len(), 1);
        assert_eq!(next.len(), 2);
        assert_eq!(next.entries()[0], log.entries()[0]);
        assert_eq!(next.latest().unwrap().user, "u2");
    }
}
