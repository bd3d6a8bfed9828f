//! In-memory store, for tests and throwaway sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jurisflow_core::error::StoreError;
use jurisflow_core::session::{AttendanceRecord, ClientRecord, HistoryRecord, Session};
use jurisflow_core::store::{HistoryStore, RecordDirectory, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, Session>,
    histories: HashMap<String, HistoryRecord>,
    clients: HashMap<String, ClientRecord>,
    attendances: HashMap<String, AttendanceRecord>,
}

/// Keeps every record in process memory. Nothing survives a restart.
///
/// Clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a client row.
    pub async fn upsert_client(&self, client: ClientRecord) {
        self.tables
            .write()
            .await
            .clients
            .insert(client.client_id.clone(), client);
    }

    /// Insert or replace an attendance row.
    pub async fn upsert_attendance(&self, attendance: AttendanceRecord) {
        self.tables
            .write()
            .await
            .attendances
            .insert(attendance.attendance_id.clone(), attendance);
    }

    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create_session(&self, session: &Session) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&session.session_id) {
            return Ok(false);
        }
        tables
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(true)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.tables.read().await.sessions.get(session_id).cloned())
    }

    async fn touch_session(
        &self,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(session_id) {
            Some(session) => {
                session.last_updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn load_history(&self, session_id: &str) -> Result<Option<HistoryRecord>, StoreError> {
        Ok(self.tables.read().await.histories.get(session_id).cloned())
    }

    async fn save_history(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .histories
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl RecordDirectory for InMemoryStore {
    async fn find_client(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError> {
        Ok(self.tables.read().await.clients.get(client_id).cloned())
    }

    async fn find_attendance(
        &self,
        attendance_id: &str,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .attendances
            .get(attendance_id)
            .cloned())
    }
}
