//! The JurisFlow case-analysis pipeline.
//!
//! A case description goes through four model personas in sequence:
//!
//! 1. **redator** drafts a technical report
//! 2. **medico** reviews it medically
//! 3. **estrategista** sets the legal strategy
//! 4. **redator** consolidates everything into a final report
//! 5. **supervisor** reviews the whole conversation and answers the user,
//!    or asks for more information
//!
//! Every stage's input and output is appended to the session's history as
//! soon as the stage succeeds.

pub mod compose;
pub mod history;
pub mod pipeline;
pub mod prompts;
pub mod sentinel;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use history::{ConversationHistory, SessionLocks};
pub use pipeline::{
    Pipeline, PipelineFailure, PipelineState, RunOutcome, RunRequest, StageOutput, StageReply,
    StageRequest,
};
pub use prompts::{DEFAULT_PROMPT, PromptResolver};
pub use sentinel::{SENTINEL, needs_more_input};
pub use session::{SessionContext, SessionManager, mint_session_id};
