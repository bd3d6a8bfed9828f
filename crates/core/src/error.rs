//! Error types for the JurisFlow domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `Error` ties them together
//! and knows how to classify itself for the user-facing surface.

use thiserror::Error;

/// The top-level error type for all JurisFlow operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input validation ---
    #[error("Invalid request: {0}")]
    Validation(String),

    // --- Ownership / existence (deliberately vague) ---
    #[error("Client not found: {0}")]
    ClientNotFound(String),

    #[error("Attendance not found: {0}")]
    AttendanceNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    // --- Session lifecycle ---
    #[error("Could not establish session: {0}")]
    SessionEstablishment(String),

    // --- Upstream model ---
    #[error("Model error: {0}")]
    Provider(#[from] ProviderError),

    // --- Persistence ---
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of a failure, used to pick a status code and
/// tell the user whether to retry, fix their input, or call an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Fix your input.
    InvalidInput,
    /// Not found or not yours.
    NotFound,
    /// Timeout or network trouble; try again.
    Transient,
    /// The provider is throttling us; try again later.
    RateLimited,
    /// Missing or rejected credentials/config on the server side.
    Misconfigured,
    /// The provider answered with an error we cannot act on.
    Upstream,
    /// Everything else.
    Internal,
}

impl Error {
    /// Classify this error for the user-facing surface.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) => ErrorCategory::InvalidInput,
            Error::ClientNotFound(_) | Error::AttendanceNotFound(_) | Error::SessionNotFound(_) => {
                ErrorCategory::NotFound
            }
            Error::Provider(e) => e.category(),
            Error::SessionEstablishment(_)
            | Error::Store(_)
            | Error::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider(e) if e.is_retryable())
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Model call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Model endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Provider returned an error: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Only transport-level failures are worth retrying; a provider that
    /// answered with a status code will answer the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. } | ProviderError::Unreachable(_))
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ProviderError::Timeout { .. } | ProviderError::Unreachable(_) => {
                ErrorCategory::Transient
            }
            ProviderError::Api { status_code, .. } => match status_code {
                401 | 403 => ErrorCategory::Misconfigured,
                429 => ErrorCategory::RateLimited,
                400 => ErrorCategory::InvalidInput,
                _ => ErrorCategory::Upstream,
            },
            ProviderError::NotConfigured(_) => ErrorCategory::Misconfigured,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}
