//! Caller identity as asserted by the external credential service.
//!
//! The core never authenticates anyone; it trusts whatever identity the
//! gateway extracted from a verified bearer token and uses it only for
//! attribution and ownership checks.

use serde::{Deserialize, Serialize};

use crate::session::ANONYMOUS_USER;

/// The claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub role: String,
}

impl Identity {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            role: role.into(),
        }
    }
}

/// The user id recorded as owner: the caller's id, or the anonymous sentinel.
pub fn effective_user_id(identity: Option<&Identity>) -> String {
    identity
        .map(|i| i.user_id.trim())
        .filter(|id| !id.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_string()
}

/// Whether an effective user id is the anonymous sentinel.
pub fn is_anonymous(user_id: &str) -> bool {
    user_id == ANONYMOUS_USER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_when_no_identity() {
        assert_eq!(effective_user_id(None), "anon");
        assert!(is_anonymous(&effective_user_id(None)));
    }

    #[test]
    fn blank_user_id_counts_as_anonymous() {
        let id = Identity::new("  ", "ghost", "assistant");
        assert_eq!(effective_user_id(Some(&id)), "anon");
    }

    #[test]
    fn uses_token_user_id() {
        let id = Identity::new("u1", "ana", "lawyer");
        assert_eq!(effective_user_id(Some(&id)), "u1");
    }
}
