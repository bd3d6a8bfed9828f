//! Shared test doubles for pipeline tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jurisflow_core::error::{ProviderError, StoreError};
use jurisflow_core::model::{Generation, ModelClient};
use jurisflow_core::session::{AttendanceRecord, ClientRecord, Session};
use jurisflow_core::store::SessionStore;
use jurisflow_store::InMemoryStore;
use std::sync::Mutex;

/// One scripted model outcome.
#[derive(Debug, Clone)]
pub enum Scripted {
    Text(String),
    NoContent,
    Fail(ProviderError),
}

impl Scripted {
    pub fn text(text: &str) -> Self {
        Scripted::Text(text.to_string())
    }
}

/// A recorded call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    #[allow(dead_code)]
    pub system_prompt: String,
    pub user_message: String,
}

/// A model client that replays scripted outcomes in order.
///
/// Panics if called more often than it was scripted for.
pub struct ScriptedClient {
    script: Mutex<Vec<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedClient {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call succeeds with the next text.
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Scripted::text(t)).collect())
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<Generation, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            user_message: user_message.to_string(),
        });

        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            panic!("ScriptedClient: no more responses (call #{})", calls.len());
        }
        match script.remove(0) {
            Scripted::Text(text) => Ok(Generation::text(text)),
            Scripted::NoContent => Ok(Generation::no_content("scripted empty choice list")),
            Scripted::Fail(e) => Err(e),
        }
    }
}

/// A session store whose every operation fails.
pub struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn create_session(&self, _session: &Session) -> Result<bool, StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }

    async fn get_session(&self, _session_id: &str) -> Result<Option<Session>, StoreError> {
        Err(StoreError::QueryFailed("disk full".into()))
    }

    async fn touch_session(
        &self,
        _session_id: &str,
        _at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Storage("disk full".into()))
    }
}

/// An in-memory store with client `client_abc` (owned by `u1`) and its
/// attendance `att_1`.
pub async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store
        .upsert_client(ClientRecord {
            client_id: "client_abc".into(),
            owner_user_id: "u1".into(),
            name: "Maria".into(),
        })
        .await;
    store
        .upsert_attendance(AttendanceRecord {
            attendance_id: "att_1".into(),
            client_id: "client_abc".into(),
            title: "Acidente de trabalho".into(),
        })
        .await;
    store
}
