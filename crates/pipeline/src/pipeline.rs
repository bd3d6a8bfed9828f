//! The case-analysis pipeline.
//!
//! A full run walks five stages in a fixed order:
//!
//! ```text
//! Start ─▶ TechReport ─▶ Medical ─▶ Strategic ─▶ FinalReport ─▶ SupervisorResponse ─▶ Done
//!           (redator)    (medico)  (estrategista)  (redator)       (supervisor)
//!   │           │           │           │              │                 │
//!   └───────────┴───────────┴───────────┴──────────────┴─────────────────┴──▶ Failed
//! ```
//!
//! Each stage is one model call followed by one history append. A failed
//! stage stops the run; stages already completed stay persisted. Besides
//! the full run there are two one-step operations on an existing session:
//! invoking a single role against its history, and answering a supervisor
//! that asked for more information.

use jurisflow_core::error::{Error, Result};
use jurisflow_core::event::InteractionEvent;
use jurisflow_core::identity::{Identity, effective_user_id};
use jurisflow_core::model::{Generation, ModelClient};
use jurisflow_core::role::PipelineRole;
use jurisflow_core::store::{HistoryStore, RecordDirectory, SessionStore};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::compose;
use crate::history::ConversationHistory;
use crate::prompts::PromptResolver;
use crate::sentinel::needs_more_input;
use crate::session::SessionManager;

/// Where a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    TechReport,
    Medical,
    Strategic,
    FinalReport,
    SupervisorResponse,
    Done,
    Failed,
}

impl PipelineState {
    /// The five model-calling states, in run order.
    pub const STAGES: [PipelineState; 5] = [
        PipelineState::TechReport,
        PipelineState::Medical,
        PipelineState::Strategic,
        PipelineState::FinalReport,
        PipelineState::SupervisorResponse,
    ];

    /// The role called in this state, if it is a stage.
    pub fn role(self) -> Option<PipelineRole> {
        match self {
            PipelineState::TechReport | PipelineState::FinalReport => Some(PipelineRole::Redator),
            PipelineState::Medical => Some(PipelineRole::Medico),
            PipelineState::Strategic => Some(PipelineRole::Estrategista),
            PipelineState::SupervisorResponse => Some(PipelineRole::Supervisor),
            PipelineState::Start | PipelineState::Done | PipelineState::Failed => None,
        }
    }

    /// The state after this one succeeds. Terminal states have none.
    pub fn next(self) -> Option<PipelineState> {
        match self {
            PipelineState::Start => Some(PipelineState::TechReport),
            PipelineState::TechReport => Some(PipelineState::Medical),
            PipelineState::Medical => Some(PipelineState::Strategic),
            PipelineState::Strategic => Some(PipelineState::FinalReport),
            PipelineState::FinalReport => Some(PipelineState::SupervisorResponse),
            PipelineState::SupervisorResponse => Some(PipelineState::Done),
            PipelineState::Done | PipelineState::Failed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::TechReport => "tech_report",
            PipelineState::Medical => "medical",
            PipelineState::Strategic => "strategic",
            PipelineState::FinalReport => "final_report",
            PipelineState::SupervisorResponse => "supervisor_response",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-role invocation.
#[derive(Debug, Clone)]
pub struct StageRequest {
    pub role: PipelineRole,
    pub message: String,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
    pub attendance_id: Option<String>,
}

impl StageRequest {
    pub fn new(role: PipelineRole, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
            session_id: None,
            client_id: None,
            attendance_id: None,
        }
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn for_client(mut self, client_id: impl Into<String>, attendance_id: Option<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.attendance_id = attendance_id;
        self
    }
}

/// What one model call produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReply {
    pub role: PipelineRole,
    /// The generated text; empty when the model produced nothing.
    pub response: String,
    pub session_id: String,
    pub new_session: bool,
    /// Only ever true for supervisor replies.
    pub needs_more_input: bool,
    /// Set when the model produced no content. Nothing was recorded then.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl StageReply {
    pub fn has_content(&self) -> bool {
        self.warning.is_none()
    }
}

/// A full run's input.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub client_id: Option<String>,
    pub attendance_id: Option<String>,
}

/// The output of one completed stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutput {
    pub state: PipelineState,
    pub role: PipelineRole,
    pub response: String,
}

/// A run that did not fail.
///
/// `state` is `Done` when all five stages completed. When a stage produced
/// no content the run stops there: `state` names that stage, `warning`
/// says why, and `final_response` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub session_id: String,
    pub new_session: bool,
    pub state: PipelineState,
    pub final_response: Option<String>,
    pub needs_more_input: bool,
    pub stages: Vec<StageOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// A run that failed, with what was completed (and persisted) before it.
#[derive(Debug, thiserror::Error)]
#[error("pipeline failed at {failed_stage}: {error}")]
pub struct PipelineFailure {
    #[source]
    pub error: Error,
    pub failed_stage: PipelineState,
    /// The run's session id, once one was established.
    pub session_id: Option<String>,
    pub completed_stages: Vec<PipelineState>,
}

impl PipelineFailure {
    pub fn state(&self) -> PipelineState {
        PipelineState::Failed
    }
}

/// The request for one stage of a run. Only the first stage carries the
/// client and attendance links; later stages continue its session.
fn stage_request(
    state: PipelineState,
    role: PipelineRole,
    message: String,
    session_id: Option<&str>,
    run: &RunRequest,
) -> StageRequest {
    let first = state == PipelineState::TechReport;
    StageRequest {
        role,
        message,
        session_id: session_id.map(str::to_string),
        client_id: run.client_id.clone().filter(|_| first),
        attendance_id: run.attendance_id.clone().filter(|_| first),
    }
}

/// Drives model calls, session lifecycle and history for every operation.
pub struct Pipeline {
    client: Arc<dyn ModelClient>,
    prompts: PromptResolver,
    sessions: SessionManager,
    history: ConversationHistory,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn ModelClient>,
        prompts: PromptResolver,
        sessions: SessionManager,
        history: ConversationHistory,
    ) -> Self {
        Self {
            client,
            prompts,
            sessions,
            history,
        }
    }

    /// Build a pipeline over one store that serves sessions, history and
    /// record lookups.
    pub fn with_store<S>(client: Arc<dyn ModelClient>, prompts: PromptResolver, store: Arc<S>) -> Self
    where
        S: SessionStore + HistoryStore + RecordDirectory + 'static,
    {
        let sessions = SessionManager::new(store.clone(), store.clone());
        let history = ConversationHistory::new(store);
        Self::new(client, prompts, sessions, history)
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    /// Call the model as `role`, resolving its system prompt.
    async fn generate(&self, role: PipelineRole, message: &str) -> Result<Generation> {
        let system_prompt = self.prompts.resolve_role(role);
        debug!(role = %role, message_len = message.len(), "Invoking model");
        Ok(self.client.invoke(&system_prompt, message).await?)
    }

    /// Invoke one role with a message.
    ///
    /// Resolves (and for new sessions validates) the session, calls the
    /// model, then records the exchange: the session record for a new
    /// client-linked session, then the event pair, then a timestamp bump.
    /// A no-content reply records nothing and comes back with a warning.
    pub async fn invoke_stage(
        &self,
        request: StageRequest,
        identity: Option<&Identity>,
    ) -> Result<StageReply> {
        if request.message.trim().is_empty() {
            return Err(Error::Validation("message must not be empty".into()));
        }

        let context = self
            .sessions
            .resolve(
                request.session_id.as_deref(),
                identity,
                request.client_id.as_deref(),
                request.attendance_id.as_deref(),
            )
            .await?;

        let role = request.role;
        let text = match self.generate(role, &request.message).await? {
            Generation::Text { text } => text,
            Generation::NoContent { reason } => {
                warn!(session_id = %context.session_id, role = %role, reason = %reason, "Stage produced no content, nothing recorded");
                return Ok(StageReply {
                    role,
                    response: String::new(),
                    session_id: context.session_id,
                    new_session: context.is_new,
                    needs_more_input: false,
                    warning: Some(format!("model produced no content: {reason}")),
                });
            }
        };

        self.sessions.establish(&context).await?;

        self.history
            .append(
                &context.session_id,
                &context.effective_user_id,
                vec![
                    InteractionEvent::user_message(role, request.message),
                    InteractionEvent::bot_response(role, text.clone()),
                ],
            )
            .await?;

        self.sessions.touch(&context.session_id).await;

        info!(session_id = %context.session_id, role = %role, new_session = context.is_new, "Stage completed");

        Ok(StageReply {
            role,
            needs_more_input: role == PipelineRole::Supervisor && needs_more_input(&text),
            response: text,
            session_id: context.session_id,
            new_session: context.is_new,
            warning: None,
        })
    }

    /// Run all five stages for a case description.
    pub async fn run(
        &self,
        request: RunRequest,
        identity: Option<&Identity>,
    ) -> std::result::Result<RunOutcome, PipelineFailure> {
        let mut session_id = request.session_id.clone();
        let mut new_session = false;
        let mut stages: Vec<StageOutput> = Vec::with_capacity(PipelineState::STAGES.len());
        let mut state = PipelineState::Start;
        let user_id = effective_user_id(identity);

        info!(session_id = ?session_id, message_len = request.message.len(), "Pipeline run started");

        while let Some(next) = state.next() {
            let Some(role) = next.role() else {
                state = next;
                break;
            };

            let failure = |error: Error, session_id: &Option<String>, stages: &[StageOutput]| {
                warn!(stage = %next, session_id = ?session_id, error = %error, "Pipeline run failed");
                PipelineFailure {
                    error,
                    failed_stage: next,
                    session_id: session_id.clone(),
                    completed_stages: stages.iter().map(|s| s.state).collect(),
                }
            };

            let message = match self.stage_message(next, &request.message, &stages, session_id.as_deref(), &user_id).await {
                Ok(message) => message,
                Err(e) => return Err(failure(e, &session_id, &stages)),
            };

            let stage = stage_request(next, role, message, session_id.as_deref(), &request);

            let reply = match self.invoke_stage(stage, identity).await {
                Ok(reply) => reply,
                Err(e) => return Err(failure(e, &session_id, &stages)),
            };

            if next == PipelineState::TechReport {
                if reply.session_id.trim().is_empty() {
                    return Err(failure(
                        Error::SessionEstablishment("no session id after first stage".into()),
                        &session_id,
                        &stages,
                    ));
                }
                new_session = reply.new_session;
                session_id = Some(reply.session_id.clone());
            }

            if let Some(warning) = reply.warning {
                warn!(stage = %next, session_id = ?session_id, "Pipeline run halted without content");
                return Ok(RunOutcome {
                    session_id: reply.session_id,
                    new_session,
                    state: next,
                    final_response: None,
                    needs_more_input: false,
                    stages,
                    warning: Some(warning),
                });
            }

            stages.push(StageOutput {
                state: next,
                role,
                response: reply.response,
            });
            state = next;
        }

        let final_response = stages.last().map(|s| s.response.clone());
        let needs_more = final_response.as_deref().is_some_and(needs_more_input);
        let session_id = session_id.unwrap_or_default();

        info!(session_id = %session_id, needs_more_input = needs_more, "Pipeline run completed");

        Ok(RunOutcome {
            session_id,
            new_session,
            state,
            final_response,
            needs_more_input: needs_more,
            stages,
            warning: None,
        })
    }

    /// Compose the message for `state` from the run so far.
    async fn stage_message(
        &self,
        state: PipelineState,
        initial: &str,
        stages: &[StageOutput],
        session_id: Option<&str>,
        user_id: &str,
    ) -> Result<String> {
        let output = |s: PipelineState| {
            stages
                .iter()
                .find(|o| o.state == s)
                .map(|o| o.response.as_str())
                .unwrap_or_default()
        };

        Ok(match state {
            PipelineState::TechReport => initial.to_string(),
            PipelineState::Medical => compose::medical_prompt(output(PipelineState::TechReport)),
            PipelineState::Strategic => compose::strategic_prompt(
                output(PipelineState::TechReport),
                output(PipelineState::Medical),
            ),
            PipelineState::FinalReport => compose::final_report_prompt(
                output(PipelineState::TechReport),
                output(PipelineState::Medical),
                output(PipelineState::Strategic),
            ),
            PipelineState::SupervisorResponse => {
                let session_id = session_id.ok_or_else(|| {
                    Error::SessionEstablishment("no session id before supervisor stage".into())
                })?;
                compose::supervisor_prompt(&self.history.read_owned(session_id, user_id).await?)
            }
            PipelineState::Start | PipelineState::Done | PipelineState::Failed => {
                return Err(Error::Internal(format!("{state} is not a stage")));
            }
        })
    }

    /// Invoke one role against an existing session's history.
    ///
    /// The session must have history visible to the caller. Appends one
    /// event pair; the recorded message is the instruction (or the role's
    /// default instruction), not the rendered transcript.
    pub async fn invoke_role_on_history(
        &self,
        session_id: &str,
        role: PipelineRole,
        instruction: Option<&str>,
        identity: Option<&Identity>,
    ) -> Result<StageReply> {
        let user_id = effective_user_id(identity);
        let history = self.history.read_owned(session_id, &user_id).await?;
        if history.is_empty() {
            return Err(Error::SessionNotFound(session_id.to_string()));
        }

        let prompt = compose::manual_role_prompt(role, &history, instruction);
        let recorded = instruction
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("(invocação manual: {role})"));

        self.one_step(session_id, &user_id, role, &prompt, recorded).await
    }

    /// Answer a supervisor that asked for more information.
    ///
    /// Only allowed when the session's last reply is a supervisor reply
    /// flagged as needing input. Re-invokes the supervisor alone and
    /// appends the user's answer and the new reply.
    pub async fn follow_up(
        &self,
        session_id: &str,
        message: &str,
        identity: Option<&Identity>,
    ) -> Result<StageReply> {
        if message.trim().is_empty() {
            return Err(Error::Validation("message must not be empty".into()));
        }

        let user_id = effective_user_id(identity);
        let Some(record) = self
            .history
            .owned_record(session_id, &user_id)
            .await?
            .filter(|r| !r.history.is_empty())
        else {
            return Err(Error::SessionNotFound(session_id.to_string()));
        };

        let waiting = record
            .last_response()
            .is_some_and(|e| e.role() == PipelineRole::Supervisor && needs_more_input(e.content()));
        if !waiting {
            return Err(Error::Validation(
                "session is not waiting for more information from the user".into(),
            ));
        }

        let prompt = compose::follow_up_prompt(&record.history, message);
        self.one_step(
            session_id,
            &user_id,
            PipelineRole::Supervisor,
            &prompt,
            message.to_string(),
        )
        .await
    }

    /// Shared tail of the one-step operations: call, record, touch.
    async fn one_step(
        &self,
        session_id: &str,
        user_id: &str,
        role: PipelineRole,
        prompt: &str,
        recorded_message: String,
    ) -> Result<StageReply> {
        let text = match self.generate(role, prompt).await? {
            Generation::Text { text } => text,
            Generation::NoContent { reason } => {
                warn!(session_id, role = %role, reason = %reason, "No content, nothing recorded");
                return Ok(StageReply {
                    role,
                    response: String::new(),
                    session_id: session_id.to_string(),
                    new_session: false,
                    needs_more_input: false,
                    warning: Some(format!("model produced no content: {reason}")),
                });
            }
        };

        self.history
            .append(
                session_id,
                user_id,
                vec![
                    InteractionEvent::user_message(role, recorded_message),
                    InteractionEvent::bot_response(role, text.clone()),
                ],
            )
            .await?;
        self.sessions.touch(session_id).await;

        info!(session_id, role = %role, "Single-role invocation completed");

        Ok(StageReply {
            role,
            needs_more_input: role == PipelineRole::Supervisor && needs_more_input(&text),
            response: text,
            session_id: session_id.to_string(),
            new_session: false,
            warning: None,
        })
    }

    /// A session's history as the caller may see it: empty when the session
    /// does not exist or belongs to someone else.
    pub async fn history(
        &self,
        session_id: &str,
        identity: Option<&Identity>,
    ) -> Result<Vec<InteractionEvent>> {
        self.history
            .read_owned(session_id, &effective_user_id(identity))
            .await
    }
}
