//! HTTP API v1: pipeline and session endpoints.
//!
//! - `POST /v1/pipeline/invoke`  invoke one role
//! - `POST /v1/pipeline/run`  run all five stages
//! - `POST /v1/sessions/{id}/roles/{role}`  invoke a role on a session's history
//! - `POST /v1/sessions/{id}/follow-up`  answer the supervisor
//! - `GET  /v1/sessions/{id}/history`  fetch a session's history

use axum::{
    Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use jurisflow_core::error::{Error, ErrorCategory, ProviderError};
use jurisflow_core::event::InteractionEvent;
use jurisflow_core::identity::Identity;
use jurisflow_core::role::PipelineRole;
use jurisflow_pipeline::{
    Pipeline, PipelineFailure, PipelineState, RunOutcome, RunRequest, StageReply, StageRequest,
};

use crate::auth::TokenVerifier;

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the API.
pub struct ApiState {
    pub pipeline: Arc<Pipeline>,
    pub verifier: TokenVerifier,
}

pub type SharedApiState = Arc<ApiState>;

/// Build the v1 router. Nest this under "/v1".
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/pipeline/invoke", post(invoke_handler))
        .route("/pipeline/run", post(run_handler))
        .route("/sessions/{id}/roles/{role}", post(role_handler))
        .route("/sessions/{id}/follow-up", post(follow_up_handler))
        .route("/sessions/{id}/history", get(history_handler))
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ErrorDetail {
    category: ErrorCategory,
    message: String,
}

/// Which stages a failed run got through, reported alongside the error.
#[derive(Debug, Serialize)]
struct FailureDetail {
    failed_stage: PipelineState,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    completed_stages: Vec<PipelineState>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    #[serde(flatten)]
    failure: Option<FailureDetail>,
}

/// An error response: `{"error": {"category", "message"}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: ErrorDetail {
                    category,
                    message: message.into(),
                },
                failure: None,
            },
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCategory::InvalidInput, message)
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorCategory::InvalidInput, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_for(error: &Error) -> StatusCode {
    match error.category() {
        ErrorCategory::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Transient => match error {
            Error::Provider(ProviderError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Error::Provider(ProviderError::Unreachable(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        },
        ErrorCategory::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCategory::Misconfigured => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::Upstream => StatusCode::BAD_GATEWAY,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn user_message(error: &Error) -> String {
    match error.category() {
        // Not found and not yours look the same.
        ErrorCategory::NotFound => "not found".into(),
        ErrorCategory::Internal => "internal error".into(),
        ErrorCategory::Misconfigured => "model service is not configured correctly".into(),
        _ => error.to_string(),
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let status = status_for(&error);
        if status.is_server_error() {
            error!(error = %error, "Request failed");
        }
        Self::new(status, error.category(), user_message(&error))
    }
}

impl From<PipelineFailure> for ApiError {
    fn from(failure: PipelineFailure) -> Self {
        let PipelineFailure {
            error,
            failed_stage,
            session_id,
            completed_stages,
        } = failure;
        let mut api_error = ApiError::from(error);
        api_error.body.failure = Some(FailureDetail {
            failed_stage,
            session_id,
            completed_stages,
        });
        api_error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ── Identity extraction ───────────────────────────────────────────────────

/// The caller's identity; `None` for anonymous requests.
pub struct Caller(pub Option<Identity>);

impl FromRequestParts<SharedApiState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedApiState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .map(|v| v.to_str().map_err(|_| ApiError::unauthorized("malformed bearer token")))
            .transpose()?;

        state
            .verifier
            .verify_header(header)
            .map(Caller)
            .map_err(|e| ApiError::unauthorized(e.to_string()))
    }
}

fn parse_role(role: &str) -> Result<PipelineRole, ApiError> {
    role.parse::<PipelineRole>()
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

// ── Handlers ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InvokeBody {
    pub role: String,
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub attendance_id: Option<String>,
}

async fn invoke_handler(
    State(state): State<SharedApiState>,
    Caller(identity): Caller,
    Json(body): Json<InvokeBody>,
) -> Result<Json<StageReply>, ApiError> {
    let role = parse_role(&body.role)?;
    info!(role = %role, message_len = body.message.len(), "Invoke request");

    let request = StageRequest {
        role,
        message: body.message,
        session_id: body.session_id,
        client_id: body.client_id,
        attendance_id: body.attendance_id,
    };
    let reply = state.pipeline.invoke_stage(request, identity.as_ref()).await?;
    Ok(Json(reply))
}

#[derive(Debug, Deserialize)]
pub struct RunBody {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub attendance_id: Option<String>,
}

async fn run_handler(
    State(state): State<SharedApiState>,
    Caller(identity): Caller,
    Json(body): Json<RunBody>,
) -> Result<Json<RunOutcome>, ApiError> {
    if body.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let request = RunRequest {
        message: body.message,
        session_id: body.session_id,
        client_id: body.client_id,
        attendance_id: body.attendance_id,
    };
    let outcome = state.pipeline.run(request, identity.as_ref()).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleBody {
    #[serde(default)]
    pub instruction: Option<String>,
}

async fn role_handler(
    State(state): State<SharedApiState>,
    Path((session_id, role)): Path<(String, String)>,
    Caller(identity): Caller,
    body: Option<Json<RoleBody>>,
) -> Result<Json<StageReply>, ApiError> {
    let role = parse_role(&role)?;
    let instruction = body.and_then(|Json(b)| b.instruction);
    let reply = state
        .pipeline
        .invoke_role_on_history(&session_id, role, instruction.as_deref(), identity.as_ref())
        .await?;
    Ok(Json(reply))
}

#[derive(Debug, Deserialize)]
pub struct FollowUpBody {
    pub message: String,
}

async fn follow_up_handler(
    State(state): State<SharedApiState>,
    Path(session_id): Path<String>,
    Caller(identity): Caller,
    Json(body): Json<FollowUpBody>,
) -> Result<Json<StageReply>, ApiError> {
    let reply = state
        .pipeline
        .follow_up(&session_id, &body.message, identity.as_ref())
        .await?;
    Ok(Json(reply))
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub history: Vec<InteractionEvent>,
}

async fn history_handler(
    State(state): State<SharedApiState>,
    Path(session_id): Path<String>,
    Caller(identity): Caller,
) -> Result<Json<HistoryResponse>, ApiError> {
    let history = state.pipeline.history(&session_id, identity.as_ref()).await?;
    Ok(Json(HistoryResponse {
        session_id,
        history,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_to_statuses() {
        let cases = [
            (ProviderError::Timeout { timeout_secs: 90 }, StatusCode::GATEWAY_TIMEOUT),
            (ProviderError::Unreachable("refused".into()), StatusCode::BAD_GATEWAY),
            (
                ProviderError::Api { status_code: 401, message: "bad key".into() },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ProviderError::Api { status_code: 429, message: "slow down".into() },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ProviderError::Api { status_code: 400, message: "bad".into() },
                StatusCode::BAD_REQUEST,
            ),
            (
                ProviderError::Api { status_code: 500, message: "oops".into() },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(status_for(&Error::Provider(error)), status);
        }
    }

    #[test]
    fn not_found_messages_are_vague() {
        let error = ApiError::from(Error::ClientNotFound("client_secret_id".into()));
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.body.error.message, "not found");
    }

    #[test]
    fn failure_body_lists_completed_stages() {
        let failure = PipelineFailure {
            error: Error::Provider(ProviderError::Timeout { timeout_secs: 90 }),
            failed_stage: PipelineState::Medical,
            session_id: Some("session_1".into()),
            completed_stages: vec![PipelineState::TechReport],
        };
        let error = ApiError::from(failure);
        assert_eq!(error.status(), StatusCode::GATEWAY_TIMEOUT);

        let json = serde_json::to_value(&error.body).unwrap();
        assert_eq!(json["error"]["category"], "transient");
        assert_eq!(json["failed_stage"], "medical");
        assert_eq!(json["session_id"], "session_1");
        assert_eq!(json["completed_stages"][0], "tech_report");
    }

    #[test]
    fn unknown_role_is_bad_request() {
        let error = parse_role("advogado").unwrap_err();
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }
}
