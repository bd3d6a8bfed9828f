//! Conversation history service.
//!
//! Storage only knows how to replace a whole record. This layer turns that
//! into an append: read the record, add the new events after the old ones,
//! write it all back. Appends to the same session inside one process are
//! serialized, so neither of two concurrent appends is lost. Writers in other
//! processes still race on the final write.

use jurisflow_core::error::{Error, Result};
use jurisflow_core::event::InteractionEvent;
use jurisflow_core::session::HistoryRecord;
use jurisflow_core::store::HistoryStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

/// One async mutex per session id, created on demand.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `session_id`.
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Entries nobody holds or waits on are dropped here.
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of sessions with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only view over a [`HistoryStore`].
pub struct ConversationHistory {
    store: Arc<dyn HistoryStore>,
    locks: SessionLocks,
}

impl ConversationHistory {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            store,
            locks: SessionLocks::new(),
        }
    }

    /// The stored record, if any.
    pub async fn record(&self, session_id: &str) -> Result<Option<HistoryRecord>> {
        Ok(self.store.load_history(session_id).await?)
    }

    /// All events of a session, oldest first. Empty when nothing is stored.
    pub async fn read(&self, session_id: &str) -> Result<Vec<InteractionEvent>> {
        Ok(self
            .record(session_id)
            .await?
            .map(|r| r.history)
            .unwrap_or_default())
    }

    /// Like [`read`](Self::read), but empty unless `user_id` owns the record.
    ///
    /// A session that does not exist and one that belongs to someone else
    /// look the same to the caller.
    pub async fn read_owned(&self, session_id: &str, user_id: &str) -> Result<Vec<InteractionEvent>> {
        Ok(self
            .owned_record(session_id, user_id)
            .await?
            .map(|r| r.history)
            .unwrap_or_default())
    }

    /// The stored record, unless it belongs to someone other than `user_id`.
    pub async fn owned_record(&self, session_id: &str, user_id: &str) -> Result<Option<HistoryRecord>> {
        match self.record(session_id).await? {
            Some(record) if record.is_owned_by(user_id) => Ok(Some(record)),
            Some(_) => {
                debug!(session_id, "History requested by non-owner");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Append `events` after the stored ones and write the full record back.
    ///
    /// A new record is owned by `owner_user_id`. An existing record keeps its
    /// owner, and any other caller gets [`Error::SessionNotFound`].
    /// Returns the history length after the write.
    pub async fn append(
        &self,
        session_id: &str,
        owner_user_id: &str,
        events: Vec<InteractionEvent>,
    ) -> Result<usize> {
        if session_id.trim().is_empty() {
            return Err(Error::Validation("session_id must not be empty".into()));
        }

        let _guard = self.locks.lock(session_id).await;

        let mut record = match self.store.load_history(session_id).await? {
            Some(record) if !record.is_owned_by(owner_user_id) => {
                warn!(session_id, "Append refused: history belongs to another user");
                return Err(Error::SessionNotFound(session_id.to_string()));
            }
            Some(record) => record,
            None => HistoryRecord::new(session_id, owner_user_id),
        };

        let added = events.len();
        record.history.extend(events);
        self.store.save_history(&record).await?;

        debug!(session_id, added, total = record.history.len(), "History appended");
        Ok(record.history.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jurisflow_core::role::PipelineRole;
    use jurisflow_store::InMemoryStore;

    fn pair(role: PipelineRole, n: usize) -> Vec<InteractionEvent> {
        vec![
            InteractionEvent::user_message(role, format!("pergunta {n}")),
            InteractionEvent::bot_response(role, format!("resposta {n}")),
        ]
    }

    fn service() -> (ConversationHistory, InMemoryStore) {
        let store = InMemoryStore::new();
        (ConversationHistory::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn read_missing_is_empty() {
        let (history, _) = service();
        assert!(history.read("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_creates_then_extends() {
        let (history, store) = service();
        assert_eq!(
            history.append("s", "u1", pair(PipelineRole::Redator, 1)).await.unwrap(),
            2
        );
        assert_eq!(
            history.append("s", "u1", pair(PipelineRole::Medico, 2)).await.unwrap(),
            4
        );

        let events = history.read("s").await.unwrap();
        let contents: Vec<&str> = events.iter().map(|e| e.content()).collect();
        assert_eq!(
            contents,
            vec!["pergunta 1", "resposta 1", "pergunta 2", "resposta 2"]
        );
        let stored = store.load_history("s").await.unwrap().unwrap();
        assert_eq!(stored.owning_user_id, "u1");
    }

    #[tokio::test]
    async fn reads_are_prefixes_of_later_reads() {
        let (history, _) = service();
        let mut previous = Vec::new();
        for n in 0..4 {
            history
                .append("s", "u1", pair(PipelineRole::Supervisor, n))
                .await
                .unwrap();
            let current = history.read("s").await.unwrap();
            assert!(current.len() > previous.len());
            assert_eq!(&current[..previous.len()], &previous[..]);
            previous = current;
        }
    }

    #[tokio::test]
    async fn other_users_cannot_append_or_read() {
        let (history, _) = service();
        history
            .append("s", "u1", pair(PipelineRole::Redator, 1))
            .await
            .unwrap();

        let err = history
            .append("s", "u2", pair(PipelineRole::Redator, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));

        assert!(history.read_owned("s", "u2").await.unwrap().is_empty());
        assert_eq!(history.read_owned("s", "u1").await.unwrap().len(), 2);
        assert_eq!(history.read("s").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_session_id_is_rejected() {
        let (history, _) = service();
        let err = history.append("  ", "u1", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_keep_every_event() {
        let (history, _) = service();
        let history = Arc::new(history);

        let mut handles = Vec::new();
        for n in 0..16 {
            let history = history.clone();
            handles.push(tokio::spawn(async move {
                history
                    .append("shared", "u1", pair(PipelineRole::Medico, n))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(history.read("shared").await.unwrap().len(), 32);
    }

    #[tokio::test]
    async fn idle_lock_entries_are_pruned() {
        let locks = SessionLocks::new();
        {
            let _a = locks.lock("a").await;
            let _b = locks.lock("b").await;
            assert_eq!(locks.len(), 2);
        }
        let _c = locks.lock("c").await;
        assert_eq!(locks.len(), 1);
    }
}
