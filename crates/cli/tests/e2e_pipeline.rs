//! End-to-end tests for the JurisFlow pipeline.
//!
//! These drive the full stack below the HTTP layer: prompt files on disk,
//! a scripted model behind the real retry wrapper, the pipeline, and the
//! SQLite store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use jurisflow_core::error::{Error, ProviderError};
use jurisflow_core::event::InteractionEvent;
use jurisflow_core::identity::Identity;
use jurisflow_core::model::{Generation, ModelClient};
use jurisflow_core::role::PipelineRole;
use jurisflow_core::session::{AttendanceRecord, ClientRecord, HistoryRecord};
use jurisflow_core::store::{HistoryStore, SessionStore};
use jurisflow_pipeline::{
    DEFAULT_PROMPT, Pipeline, PipelineState, PromptResolver, RunRequest, StageRequest,
};
use jurisflow_providers::{RetryPolicy, RetryingClient};
use jurisflow_store::{InMemoryStore, SqliteStore};

// ── Mock model ───────────────────────────────────────────────────────────

/// A model that replays scripted results in order and records every call.
struct ScriptedModel {
    script: Mutex<Vec<Result<Generation, ProviderError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    fn new(script: Vec<Result<Generation, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn texts(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok(Generation::text(*t))).collect())
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// The role each call was made as, read back from the system prompt.
    fn roles_called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(system, _)| system.trim_start_matches("ROLE:").to_string())
            .collect()
    }
}

#[async_trait::async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn invoke(&self, system_prompt: &str, user_message: &str) -> Result<Generation, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_message.to_string()));
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            panic!("ScriptedModel exhausted");
        }
        script.remove(0)
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

struct Harness {
    pipeline: Pipeline,
    store: Arc<SqliteStore>,
    _prompts: tempfile::TempDir,
}

/// Prompt files that name their role, so calls can be attributed.
fn prompt_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for role in PipelineRole::ALL {
        std::fs::write(dir.path().join(format!("{role}.md")), format!("ROLE:{role}")).unwrap();
    }
    dir
}

async fn harness(client: Arc<dyn ModelClient>) -> Harness {
    let store = Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap());
    store
        .upsert_client(&ClientRecord {
            client_id: "client_abc".into(),
            owner_user_id: "u1".into(),
            name: "Maria da Silva".into(),
        })
        .await
        .unwrap();
    store
        .upsert_attendance(&AttendanceRecord {
            attendance_id: "att_1".into(),
            client_id: "client_abc".into(),
            title: "Auxílio-doença".into(),
        })
        .await
        .unwrap();

    let prompts = prompt_dir();
    let pipeline = Pipeline::with_store(client, PromptResolver::new(prompts.path()), store.clone());
    Harness {
        pipeline,
        store,
        _prompts: prompts,
    }
}

fn user(id: &str) -> Identity {
    Identity::new(id, id, "advogado")
}

fn pair_roles(history: &[InteractionEvent]) -> Vec<PipelineRole> {
    history
        .chunks(2)
        .map(|pair| {
            assert!(!pair[0].is_bot_response(), "pair must start with the user message");
            assert!(pair[1].is_bot_response(), "pair must end with the reply");
            assert_eq!(pair[0].role(), pair[1].role());
            pair[1].role()
        })
        .collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_new_linked_session_runs_all_five_stages() {
    let model = ScriptedModel::texts(&[
        "Relatório técnico: acidente de trabalho em 2023.",
        "Parecer médico: CID S62 compatível com incapacidade.",
        "Estratégia: pedir auxílio-acidente.",
        "Relatório final consolidado.",
        "Resposta final: o caso é viável.",
    ]);
    let h = harness(model.clone()).await;

    let outcome = h
        .pipeline
        .run(
            RunRequest {
                message: "client has a workplace injury, filed CID report".into(),
                client_id: Some("client_abc".into()),
                attendance_id: Some("att_1".into()),
                ..Default::default()
            },
            Some(&user("u1")),
        )
        .await
        .unwrap();

    assert_eq!(outcome.state, PipelineState::Done);
    assert!(outcome.new_session);
    assert!(outcome.session_id.starts_with("session_"));
    assert!(!outcome.needs_more_input);
    assert_eq!(outcome.final_response.as_deref(), Some("Resposta final: o caso é viável."));
    assert!(!outcome.final_response.unwrap().contains("[PEDIDO_INFO]"));

    let session = h.store.get_session(&outcome.session_id).await.unwrap().unwrap();
    assert_eq!(session.owning_user_id, "u1");
    assert_eq!(session.client_id.as_deref(), Some("client_abc"));
    assert_eq!(session.attendance_id.as_deref(), Some("att_1"));

    let history = h.pipeline.history(&outcome.session_id, Some(&user("u1"))).await.unwrap();
    assert_eq!(
        pair_roles(&history),
        vec![
            PipelineRole::Redator,
            PipelineRole::Medico,
            PipelineRole::Estrategista,
            PipelineRole::Redator,
            PipelineRole::Supervisor,
        ]
    );
    assert_eq!(
        model.roles_called(),
        vec!["redator", "medico", "estrategista", "redator", "supervisor"]
    );
}

#[tokio::test]
async fn e2e_manual_medico_on_existing_session() {
    let model = ScriptedModel::texts(&["Parecer médico revisado."]);
    let h = harness(model.clone()).await;

    let mut record = HistoryRecord::new("session_xyz", "anon");
    for (role, reply) in [
        (PipelineRole::Redator, "relato"),
        (PipelineRole::Medico, "laudo"),
        (PipelineRole::Estrategista, "tese"),
    ] {
        record.history.push(InteractionEvent::user_message(role, "pedido"));
        record.history.push(InteractionEvent::bot_response(role, reply));
    }
    h.store.save_history(&record).await.unwrap();

    let reply = h
        .pipeline
        .invoke_role_on_history("session_xyz", PipelineRole::Medico, None, None)
        .await
        .unwrap();
    assert_eq!(reply.session_id, "session_xyz");
    assert!(!reply.new_session);

    let history = h.pipeline.history("session_xyz", None).await.unwrap();
    assert_eq!(history.len(), 8);
    assert_eq!(history[7].role(), PipelineRole::Medico);
    assert_eq!(history[7].content(), "Parecer médico revisado.");

    // The role saw the whole transcript.
    let calls = model.calls.lock().unwrap();
    assert!(calls[0].1.contains("laudo") && calls[0].1.contains("tese"));
}

#[tokio::test]
async fn e2e_supervisor_asks_for_information_then_follow_up() {
    let model = ScriptedModel::texts(&[
        "TECH",
        "MED",
        "STRAT",
        "FINAL",
        "Aguardo informação adicional sobre a data do acidente.",
        "Com a data informada, o pedido é tempestivo.",
    ]);
    let h = harness(model.clone()).await;

    let outcome = h
        .pipeline
        .run(
            RunRequest {
                message: "Caso de acidente".into(),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
    assert!(outcome.needs_more_input);
    assert_eq!(model.call_count(), 5);

    let before = h.pipeline.history(&outcome.session_id, None).await.unwrap();

    let reply = h
        .pipeline
        .follow_up(&outcome.session_id, "O acidente foi em 12/03/2024.", None)
        .await
        .unwrap();
    assert_eq!(reply.role, PipelineRole::Supervisor);
    assert!(!reply.needs_more_input);

    let after = h.pipeline.history(&outcome.session_id, None).await.unwrap();
    assert_eq!(after.len(), before.len() + 2);
    assert_eq!(&after[..before.len()], &before[..]);
    assert_eq!(after[before.len()].content(), "O acidente foi em 12/03/2024.");

    // Only the supervisor was called again.
    assert_eq!(model.call_count(), 6);
    assert_eq!(model.roles_called().last().map(String::as_str), Some("supervisor"));
}

#[tokio::test(start_paused = true)]
async fn e2e_stage_two_timeout_after_three_attempts() {
    let model = ScriptedModel::new(vec![
        Ok(Generation::text("Relatório técnico")),
        Err(ProviderError::Timeout { timeout_secs: 90 }),
        Err(ProviderError::Timeout { timeout_secs: 90 }),
        Err(ProviderError::Timeout { timeout_secs: 90 }),
    ]);
    let client = Arc::new(RetryingClient::new(
        model.clone(),
        RetryPolicy::new(3, Duration::from_secs(1)),
    ));
    // In-process store: nothing here may wait on another thread while the
    // clock is paused.
    let pipeline = Pipeline::with_store(client, PromptResolver::builtin(), Arc::new(InMemoryStore::new()));

    let started = tokio::time::Instant::now();
    let failure = pipeline
        .run(
            RunRequest {
                message: "Caso".into(),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();

    // 1s then 2s between the three attempts.
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(model.call_count(), 4);

    assert!(matches!(
        failure.error,
        Error::Provider(ProviderError::Timeout { .. })
    ));
    assert_eq!(failure.failed_stage, PipelineState::Medical);
    assert_eq!(failure.completed_stages, vec![PipelineState::TechReport]);

    let session_id = failure.session_id.unwrap();
    let history = pipeline.history(&session_id, None).await.unwrap();
    assert_eq!(pair_roles(&history), vec![PipelineRole::Redator]);
}

#[tokio::test]
async fn e2e_history_is_hidden_from_other_users() {
    let model = ScriptedModel::texts(&["Relato privado"]);
    let h = harness(model).await;

    let reply = h
        .pipeline
        .invoke_stage(
            StageRequest::new(PipelineRole::Redator, "Caso sigiloso"),
            Some(&user("u1")),
        )
        .await
        .unwrap();

    assert_eq!(h.pipeline.history(&reply.session_id, Some(&user("u1"))).await.unwrap().len(), 2);
    assert!(h.pipeline.history(&reply.session_id, Some(&user("u2"))).await.unwrap().is_empty());
    assert!(h.pipeline.history("session_nope", Some(&user("u2"))).await.unwrap().is_empty());
}

#[tokio::test]
async fn e2e_foreign_client_is_rejected_before_any_model_call() {
    let model = ScriptedModel::texts(&[]);
    let h = harness(model.clone()).await;

    let err = h
        .pipeline
        .invoke_stage(
            StageRequest::new(PipelineRole::Redator, "Caso").for_client("client_abc", None),
            Some(&user("u2")),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ClientNotFound(_)));
    assert_eq!(model.call_count(), 0);

    let failure = h
        .pipeline
        .run(
            RunRequest {
                message: "Caso".into(),
                client_id: Some("client_abc".into()),
                ..Default::default()
            },
            Some(&user("u2")),
        )
        .await
        .unwrap_err();
    assert!(matches!(failure.error, Error::ClientNotFound(_)));
    assert!(failure.session_id.is_none());
    assert!(failure.completed_stages.is_empty());
    assert_eq!(model.call_count(), 0);
}

// ── Properties ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_history_reads_only_grow_and_session_id_is_stable() {
    let model = ScriptedModel::texts(&["um", "dois", "três", "quatro"]);
    let h = harness(model).await;

    let first = h
        .pipeline
        .invoke_stage(StageRequest::new(PipelineRole::Redator, "Caso"), None)
        .await
        .unwrap();
    assert!(first.new_session);
    let session_id = first.session_id.clone();

    let mut previous = h.pipeline.history(&session_id, None).await.unwrap();
    for role in [PipelineRole::Medico, PipelineRole::Estrategista, PipelineRole::Supervisor] {
        let reply = h
            .pipeline
            .invoke_stage(StageRequest::new(role, "continue").in_session(&session_id), None)
            .await
            .unwrap();
        assert_eq!(reply.session_id, session_id);
        assert!(!reply.new_session);

        let current = h.pipeline.history(&session_id, None).await.unwrap();
        assert_eq!(current.len(), previous.len() + 2);
        assert_eq!(&current[..previous.len()], &previous[..]);
        previous = current;
    }

    let stored = h.store.load_history(&session_id).await.unwrap().unwrap();
    assert_eq!(stored.history, previous);
}

#[tokio::test]
async fn e2e_stage_three_failure_keeps_two_pairs() {
    let model = ScriptedModel::new(vec![
        Ok(Generation::text("TECH")),
        Ok(Generation::text("MED")),
        Err(ProviderError::Api {
            status_code: 500,
            message: "Internal error".into(),
        }),
    ]);
    let h = harness(model.clone()).await;

    let failure = h
        .pipeline
        .run(
            RunRequest {
                message: "Caso".into(),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(failure.failed_stage, PipelineState::Strategic);
    assert_eq!(failure.state(), PipelineState::Failed);
    assert_eq!(model.call_count(), 3);

    let history = h
        .pipeline
        .history(failure.session_id.as_deref().unwrap(), None)
        .await
        .unwrap();
    assert_eq!(pair_roles(&history), vec![PipelineRole::Redator, PipelineRole::Medico]);
}

#[tokio::test]
async fn e2e_unknown_prompt_falls_back_to_default() {
    let prompts = prompt_dir();
    let resolver = PromptResolver::new(prompts.path());
    assert_eq!(resolver.resolve("advogado"), DEFAULT_PROMPT);
    assert_eq!(resolver.resolve("advogado"), DEFAULT_PROMPT);
    assert_eq!(resolver.resolve_role(PipelineRole::Medico), "ROLE:medico");
}

#[tokio::test]
async fn e2e_no_content_reply_is_not_recorded() {
    let model = ScriptedModel::new(vec![Ok(Generation::no_content("empty choices"))]);
    let h = harness(model).await;

    let reply = h
        .pipeline
        .invoke_stage(
            StageRequest::new(PipelineRole::Redator, "Caso").for_client("client_abc", None),
            Some(&user("u1")),
        )
        .await
        .unwrap();

    assert!(!reply.has_content());
    assert!(reply.warning.is_some());
    assert!(h.store.load_history(&reply.session_id).await.unwrap().is_none());
    assert!(h.store.get_session(&reply.session_id).await.unwrap().is_none());
}
