//! SQLite store.
//!
//! One database file, four tables:
//! - `sessions`: one row per conversation thread
//! - `session_history`: the event log of a session as a JSON array, replaced
//!   wholesale on every write
//! - `clients` / `attendances`: the case records the pipeline validates
//!   against. Their CRUD belongs to another service; this store only reads
//!   them (plus `upsert_*` for seeding).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jurisflow_core::error::StoreError;
use jurisflow_core::event::InteractionEvent;
use jurisflow_core::session::{AttendanceRecord, ClientRecord, HistoryRecord, Session};
use jurisflow_core::store::{HistoryStore, RecordDirectory, SessionStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// A SQLite-backed store for sessions, histories and case records.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// `"sqlite::memory:"` gives an ephemeral database, which is what the
    /// tests use. It is served from a single connection so every query sees
    /// the same data.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id      TEXT PRIMARY KEY,
                owning_user_id  TEXT NOT NULL,
                client_id       TEXT,
                attendance_id   TEXT,
                created_at      TEXT NOT NULL,
                last_updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_history (
                session_id     TEXT PRIMARY KEY,
                owning_user_id TEXT NOT NULL,
                history        TEXT NOT NULL DEFAULT '[]',
                updated_at     TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("session_history table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clients (
                client_id     TEXT PRIMARY KEY,
                owner_user_id TEXT NOT NULL,
                name          TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("clients table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attendances (
                attendance_id TEXT PRIMARY KEY,
                client_id     TEXT NOT NULL,
                title         TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("attendances table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owning_user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("owner index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Insert or replace a client row.
    pub async fn upsert_client(&self, client: &ClientRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO clients (client_id, owner_user_id, name)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(client_id) DO UPDATE SET
                owner_user_id = excluded.owner_user_id,
                name = excluded.name
            "#,
        )
        .bind(&client.client_id)
        .bind(&client.owner_user_id)
        .bind(&client.name)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("client upsert: {e}")))?;
        Ok(())
    }

    /// Insert or replace an attendance row.
    pub async fn upsert_attendance(&self, attendance: &AttendanceRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO attendances (attendance_id, client_id, title)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(attendance_id) DO UPDATE SET
                client_id = excluded.client_id,
                title = excluded.title
            "#,
        )
        .bind(&attendance.attendance_id)
        .bind(&attendance.client_id)
        .bind(&attendance.title)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("attendance upsert: {e}")))?;
        Ok(())
    }

    fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get(name)
            .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
    }

    fn parse_time(value: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::QueryFailed(format!("bad timestamp '{value}': {e}")))
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, StoreError> {
        let created_at: String = Self::column(row, "created_at")?;
        let last_updated_at: String = Self::column(row, "last_updated_at")?;
        Ok(Session {
            session_id: Self::column(row, "session_id")?,
            owning_user_id: Self::column(row, "owning_user_id")?,
            client_id: Self::column(row, "client_id")?,
            attendance_id: Self::column(row, "attendance_id")?,
            created_at: Self::parse_time(&created_at)?,
            last_updated_at: Self::parse_time(&last_updated_at)?,
        })
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create_session(&self, session: &Session) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (session_id, owning_user_id, client_id, attendance_id, created_at, last_updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(session_id) DO NOTHING
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.owning_user_id)
        .bind(&session.client_id)
        .bind(&session.attendance_id)
        .bind(session.created_at.to_rfc3339())
        .bind(session.last_updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("session insert: {e}")))?;

        let created = result.rows_affected() > 0;
        if created {
            debug!(session_id = %session.session_id, "Session created");
        }
        Ok(created)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("session lookup: {e}")))?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn touch_session(
        &self,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE sessions SET last_updated_at = ?1 WHERE session_id = ?2")
            .bind(at.to_rfc3339())
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("session touch: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn load_history(&self, session_id: &str) -> Result<Option<HistoryRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT session_id, owning_user_id, history FROM session_history WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("history lookup: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = Self::column(&row, "history")?;
        let history: Vec<InteractionEvent> = match serde_json::from_str(&raw) {
            Ok(events) => events,
            Err(e) => {
                warn!(session_id, error = %e, "Stored history is not valid JSON, treating as empty");
                Vec::new()
            }
        };

        Ok(Some(HistoryRecord {
            session_id: Self::column(&row, "session_id")?,
            owning_user_id: Self::column(&row, "owning_user_id")?,
            history,
        }))
    }

    async fn save_history(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        let history_json = serde_json::to_string(&record.history)
            .map_err(|e| StoreError::Storage(format!("history serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO session_history (session_id, owning_user_id, history, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id) DO UPDATE SET
                history = excluded.history,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.session_id)
        .bind(&record.owning_user_id)
        .bind(&history_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("history upsert: {e}")))?;

        debug!(session_id = %record.session_id, events = record.history.len(), "History saved");
        Ok(())
    }
}

#[async_trait]
impl RecordDirectory for SqliteStore {
    async fn find_client(&self, client_id: &str) -> Result<Option<ClientRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM clients WHERE client_id = ?1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("client lookup: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(ClientRecord {
                client_id: Self::column(r, "client_id")?,
                owner_user_id: Self::column(r, "owner_user_id")?,
                name: Self::column(r, "name")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_attendance(
        &self,
        attendance_id: &str,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM attendances WHERE attendance_id = ?1")
            .bind(attendance_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("attendance lookup: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(AttendanceRecord {
                attendance_id: Self::column(r, "attendance_id")?,
                client_id: Self::column(r, "client_id")?,
                title: Self::column(r, "title")?,
            })),
            None => Ok(None),
        }
    }
}
