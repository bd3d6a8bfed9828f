//! Storage backends for JurisFlow sessions and conversation history.
//!
//! Both backends implement all three store traits from `jurisflow-core`,
//! so one value can be shared as `SessionStore`, `HistoryStore` and
//! `RecordDirectory`.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
