//! # JurisFlow Core
//!
//! Domain types, traits, and error definitions for the JurisFlow
//! case-analysis pipeline. This crate has **no framework dependencies**:
//! it defines the model every other crate implements against.
//!
//! Every external collaborator (model endpoint, record store) is a trait
//! here. Implementations live in their own crates, which keeps the
//! pipeline testable with scripted stand-ins.

pub mod error;
pub mod event;
pub mod identity;
pub mod model;
pub mod role;
pub mod session;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ErrorCategory, ProviderError, Result, StoreError};
pub use event::InteractionEvent;
pub use identity::{Identity, effective_user_id, is_anonymous};
pub use model::{Generation, ModelClient};
pub use role::{PipelineRole, UnknownRole};
pub use session::{ANONYMOUS_USER, AttendanceRecord, ClientRecord, HistoryRecord, Session};
pub use store::{HistoryStore, RecordDirectory, SessionStore};
