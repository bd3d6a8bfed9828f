//! Interaction events: the atomic entries of a session's history.
//!
//! A history is an ordered sequence of these, oldest first. Events are
//! values: once written they are never edited, only followed by more events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::role::PipelineRole;

/// One recorded step of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionEvent {
    /// A message sent to a pipeline role.
    UserMessageToBot {
        role_called: PipelineRole,
        content: String,
        timestamp: DateTime<Utc>,
    },
    /// A role's reply.
    BotResponse {
        role: PipelineRole,
        content: String,
        timestamp: DateTime<Utc>,
    },
}

impl InteractionEvent {
    /// Record a message sent to `role`.
    pub fn user_message(role: PipelineRole, content: impl Into<String>) -> Self {
        Self::UserMessageToBot {
            role_called: role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Record a reply produced by `role`.
    pub fn bot_response(role: PipelineRole, content: impl Into<String>) -> Self {
        Self::BotResponse {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// The role this event concerns, whichever direction it went.
    pub fn role(&self) -> PipelineRole {
        match self {
            Self::UserMessageToBot { role_called, .. } => *role_called,
            Self::BotResponse { role, .. } => *role,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::UserMessageToBot { content, .. } | Self::BotResponse { content, .. } => content,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::UserMessageToBot { timestamp, .. } | Self::BotResponse { timestamp, .. } => {
                *timestamp
            }
        }
    }

    pub fn is_bot_response(&self) -> bool {
        matches!(self, Self::BotResponse { .. })
    }
}
