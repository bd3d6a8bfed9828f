//! Session and history records as they are persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::InteractionEvent;

/// Owner recorded for requests that carry no identity.
pub const ANONYMOUS_USER: &str = "anon";

/// A conversation thread, optionally linked to a client and an attendance.
///
/// `session_id`, `client_id` and `attendance_id` are fixed at creation;
/// only `last_updated_at` moves afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub owning_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        session_id: impl Into<String>,
        owning_user_id: impl Into<String>,
        client_id: Option<String>,
        attendance_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            owning_user_id: owning_user_id.into(),
            client_id,
            attendance_id,
            created_at: now,
            last_updated_at: now,
        }
    }
}

/// The full event log of one session, stored as a single record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub session_id: String,
    pub owning_user_id: String,
    pub history: Vec<InteractionEvent>,
}

impl HistoryRecord {
    pub fn new(session_id: impl Into<String>, owning_user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            owning_user_id: owning_user_id.into(),
            history: Vec::new(),
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owning_user_id == user_id
    }

    /// The last reply in the log, if any.
    pub fn last_response(&self) -> Option<&InteractionEvent> {
        self.history.iter().rev().find(|e| e.is_bot_response())
    }
}

/// A client row as seen through the record-store collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: String,
    pub owner_user_id: String,
    pub name: String,
}

/// An attendance (case) row as seen through the record-store collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub attendance_id: String,
    pub client_id: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::PipelineRole;

    #[test]
    fn new_session_timestamps_match() {
        let session = Session::new("session_1", "u1", Some("client_abc".into()), None);
        assert_eq!(session.created_at, session.last_updated_at);
        assert_eq!(session.client_id.as_deref(), Some("client_abc"));
    }

    #[test]
    fn last_response_skips_trailing_user_message() {
        let mut record = HistoryRecord::new("s", ANONYMOUS_USER);
        record
            .history
            .push(InteractionEvent::user_message(PipelineRole::Supervisor, "q"));
        record
            .history
            .push(InteractionEvent::bot_response(PipelineRole::Supervisor, "a"));
        record
            .history
            .push(InteractionEvent::user_message(PipelineRole::Supervisor, "q2"));
        assert_eq!(record.last_response().map(|e| e.content()), Some("a"));
        assert!(record.is_owned_by("anon"));
    }
}
