//! Session lifecycle: new vs. continuing, id minting, client linking.
//!
//! A request without a session id starts a new session. Its client and
//! attendance references are validated up front, before any model call, and
//! the `sessions` record is written only once the first call has succeeded.
//! A request with a session id continues it: the id is trusted as given and
//! no record has to exist for it.

use chrono::Utc;
use jurisflow_core::error::{Error, Result};
use jurisflow_core::identity::{Identity, effective_user_id, is_anonymous};
use jurisflow_core::session::Session;
use jurisflow_core::store::{RecordDirectory, SessionStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The outcome of resolving a request's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    pub is_new: bool,
    pub effective_user_id: String,
    /// Validated client link, only ever set for new sessions.
    pub client_id: Option<String>,
    /// Validated attendance link, only ever set alongside `client_id`.
    pub attendance_id: Option<String>,
}

/// A fresh, collision-resistant session id: `session_<unix millis>_<random>`.
pub fn mint_session_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", Utc::now().timestamp_millis(), &random[..12])
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Decides new vs. continuing and owns the `sessions` record.
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    directory: Arc<dyn RecordDirectory>,
}

impl SessionManager {
    pub fn new(sessions: Arc<dyn SessionStore>, directory: Arc<dyn RecordDirectory>) -> Self {
        Self {
            sessions,
            directory,
        }
    }

    /// Resolve the session for a request.
    ///
    /// For new sessions this validates `client_id` (it must exist and, for
    /// an authenticated caller, be theirs) and `attendance_id` (it must
    /// belong to that client). Nothing is written.
    pub async fn resolve(
        &self,
        session_id: Option<&str>,
        identity: Option<&Identity>,
        client_id: Option<&str>,
        attendance_id: Option<&str>,
    ) -> Result<SessionContext> {
        let effective_user_id = effective_user_id(identity);

        if let Some(existing) = non_blank(session_id) {
            if client_id.is_some() || attendance_id.is_some() {
                debug!(session_id = existing, "Ignoring client/attendance on a continuing session");
            }
            return Ok(SessionContext {
                session_id: existing.to_string(),
                is_new: false,
                effective_user_id,
                client_id: None,
                attendance_id: None,
            });
        }

        let client_id = non_blank(client_id);
        let attendance_id = non_blank(attendance_id);

        if attendance_id.is_some() && client_id.is_none() {
            return Err(Error::Validation(
                "attendance_id requires a client_id".into(),
            ));
        }

        if let Some(client_id) = client_id {
            self.validate_client(client_id, &effective_user_id).await?;
            if let Some(attendance_id) = attendance_id {
                self.validate_attendance(attendance_id, client_id).await?;
            }
        }

        let session_id = mint_session_id();
        debug!(session_id = %session_id, user = %effective_user_id, "Minted new session id");

        Ok(SessionContext {
            session_id,
            is_new: true,
            effective_user_id,
            client_id: client_id.map(str::to_string),
            attendance_id: attendance_id.map(str::to_string),
        })
    }

    async fn validate_client(&self, client_id: &str, user_id: &str) -> Result<()> {
        let client = self.directory.find_client(client_id).await?;
        match client {
            Some(c) if is_anonymous(user_id) || c.owner_user_id == user_id => Ok(()),
            Some(_) => {
                warn!(client_id, user = user_id, "Client belongs to another user");
                Err(Error::ClientNotFound(client_id.to_string()))
            }
            None => Err(Error::ClientNotFound(client_id.to_string())),
        }
    }

    async fn validate_attendance(&self, attendance_id: &str, client_id: &str) -> Result<()> {
        match self.directory.find_attendance(attendance_id).await? {
            Some(a) if a.client_id == client_id => Ok(()),
            _ => Err(Error::AttendanceNotFound(attendance_id.to_string())),
        }
    }

    /// Write the `sessions` record after the first successful model call.
    ///
    /// Only new sessions with a client link get a record. Returns whether a
    /// record was written. A storage failure here means the session could
    /// not be established.
    pub async fn establish(&self, context: &SessionContext) -> Result<bool> {
        if !context.is_new || context.client_id.is_none() {
            return Ok(false);
        }

        let session = Session::new(
            context.session_id.clone(),
            context.effective_user_id.clone(),
            context.client_id.clone(),
            context.attendance_id.clone(),
        );

        let created = self
            .sessions
            .create_session(&session)
            .await
            .map_err(|e| Error::SessionEstablishment(format!("{}: {e}", context.session_id)))?;

        if created {
            info!(
                session_id = %context.session_id,
                client_id = ?context.client_id,
                attendance_id = ?context.attendance_id,
                "Session created"
            );
        }
        Ok(created)
    }

    /// Best-effort bump of `last_updated_at`. Failures are logged only.
    pub async fn touch(&self, session_id: &str) {
        match self.sessions.touch_session(session_id, Utc::now()).await {
            Ok(true) => debug!(session_id, "Session timestamp updated"),
            Ok(false) => {}
            Err(e) => warn!(session_id, error = %e, "Failed to update session timestamp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingSessionStore, seeded_store};
    use jurisflow_core::session::ClientRecord;
    use jurisflow_store::InMemoryStore;

    fn manager(store: &InMemoryStore) -> SessionManager {
        SessionManager::new(Arc::new(store.clone()), Arc::new(store.clone()))
    }

    fn user(id: &str) -> Identity {
        Identity::new(id, id, "advogado")
    }

    #[test]
    fn minted_ids_are_unique_and_prefixed() {
        let a = mint_session_id();
        let b = mint_session_id();
        assert!(a.starts_with("session_"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn continuing_session_passes_through() {
        let store = seeded_store().await;
        let ctx = manager(&store)
            .resolve(Some("session_xyz"), None, Some("client_abc"), None)
            .await
            .unwrap();
        assert_eq!(ctx.session_id, "session_xyz");
        assert!(!ctx.is_new);
        assert_eq!(ctx.effective_user_id, "anon");
        assert!(ctx.client_id.is_none());
    }

    #[tokio::test]
    async fn blank_session_id_starts_new_session() {
        let store = seeded_store().await;
        let ctx = manager(&store)
            .resolve(Some("  "), Some(&user("u1")), None, None)
            .await
            .unwrap();
        assert!(ctx.is_new);
        assert_eq!(ctx.effective_user_id, "u1");
    }

    #[tokio::test]
    async fn owner_can_link_client_and_attendance() {
        let store = seeded_store().await;
        let ctx = manager(&store)
            .resolve(None, Some(&user("u1")), Some("client_abc"), Some("att_1"))
            .await
            .unwrap();
        assert!(ctx.is_new);
        assert_eq!(ctx.client_id.as_deref(), Some("client_abc"));
        assert_eq!(ctx.attendance_id.as_deref(), Some("att_1"));
    }

    #[tokio::test]
    async fn other_users_client_is_not_found() {
        let store = seeded_store().await;
        let err = manager(&store)
            .resolve(None, Some(&user("u2")), Some("client_abc"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ClientNotFound(_)));
    }

    #[tokio::test]
    async fn anonymous_only_checks_existence() {
        let store = seeded_store().await;
        let mgr = manager(&store);
        assert!(mgr.resolve(None, None, Some("client_abc"), None).await.is_ok());
        assert!(matches!(
            mgr.resolve(None, None, Some("ghost"), None).await.unwrap_err(),
            Error::ClientNotFound(_)
        ));
    }

    #[tokio::test]
    async fn attendance_must_belong_to_client() {
        let store = seeded_store().await;
        store
            .upsert_client(ClientRecord {
                client_id: "client_def".into(),
                owner_user_id: "u1".into(),
                name: "João".into(),
            })
            .await;
        let mgr = manager(&store);

        let err = mgr
            .resolve(None, Some(&user("u1")), Some("client_def"), Some("att_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AttendanceNotFound(_)));

        let err = mgr
            .resolve(None, Some(&user("u1")), None, Some("att_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn establish_writes_only_linked_new_sessions() {
        let store = seeded_store().await;
        let mgr = manager(&store);

        let unlinked = mgr.resolve(None, None, None, None).await.unwrap();
        assert!(!mgr.establish(&unlinked).await.unwrap());

        let linked = mgr
            .resolve(None, Some(&user("u1")), Some("client_abc"), None)
            .await
            .unwrap();
        assert!(mgr.establish(&linked).await.unwrap());
        assert_eq!(store.session_count().await, 1);

        let stored = store.get_session(&linked.session_id).await.unwrap().unwrap();
        assert_eq!(stored.owning_user_id, "u1");
        assert_eq!(stored.client_id.as_deref(), Some("client_abc"));
    }

    #[tokio::test]
    async fn establish_failure_is_session_establishment() {
        let store = seeded_store().await;
        let mgr = SessionManager::new(Arc::new(FailingSessionStore), Arc::new(store.clone()));
        let ctx = mgr
            .resolve(None, Some(&user("u1")), Some("client_abc"), None)
            .await
            .unwrap();
        assert!(matches!(
            mgr.establish(&ctx).await.unwrap_err(),
            Error::SessionEstablishment(_)
        ));
    }

    #[tokio::test]
    async fn touch_failure_is_swallowed() {
        let store = seeded_store().await;
        let mgr = SessionManager::new(Arc::new(FailingSessionStore), Arc::new(store));
        mgr.touch("session_xyz").await;
    }
}
