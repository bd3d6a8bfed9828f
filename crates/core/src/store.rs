//! Persistence traits: what the pipeline needs from the record store.
//!
//! Three narrow views over one relational store:
//! - [`SessionStore`]: the `sessions` record
//! - [`HistoryStore`]: the `session_history` record (full-replace writes)
//! - [`RecordDirectory`]: read-only lookups of clients and attendances,
//!   which are owned by the external CRUD collaborator
//!
//! Implementations: SQLite and in-memory (see `jurisflow-store`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::session::{AttendanceRecord, ClientRecord, HistoryRecord, Session};

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a session. Returns `false` without touching anything if a
    /// session with that id already exists; links are never rewritten.
    async fn create_session(&self, session: &Session) -> Result<bool, StoreError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    /// Move `last_updated_at`. Returns `false` when no such session exists.
    async fn touch_session(&self, session_id: &str, at: DateTime<Utc>)
    -> Result<bool, StoreError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the history record for a session.
    ///
    /// Backends that store serialized events must treat unparseable content
    /// as an empty history (and log it), never as an error.
    async fn load_history(&self, session_id: &str) -> Result<Option<HistoryRecord>, StoreError>;

    /// Create or fully replace the history record for `record.session_id`.
    async fn save_history(&self, record: &HistoryRecord) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RecordDirectory: Send + Sync {
    async fn find_client(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError>;

    async fn find_attendance(
        &self,
        attendance_id: &str,
    ) -> Result<Option<AttendanceRecord>, StoreError>;
}
