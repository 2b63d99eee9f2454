use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_backend::{QueryError, ToolResponse};
use agent_backend_mock::{Recorder, ScriptedBackend, ScriptedTurn};
use hangout_agent::{ActionRegistry, PolicyGate, SessionController, TurnError};
use serde_json::json;
use tempfile::TempDir;

fn controller_over(
    backend: ScriptedBackend,
    dir: &TempDir,
    idle_deadline: Duration,
) -> (SessionController, Arc<Mutex<Recorder>>) {
    let recorder = backend.recorder();
    let store = session_store::SessionStore::new(dir.path().join("session_id"));
    let gate = PolicyGate::new(dir.path()).expect("gate");
    let controller = SessionController::new(
        Arc::new(backend),
        store,
        gate,
        ActionRegistry::new(),
        idle_deadline,
    )
    .expect("controller");
    (controller, recorder)
}

fn persisted_id(dir: &TempDir) -> String {
    std::fs::read_to_string(dir.path().join("session_id"))
        .expect("session file")
        .trim()
        .to_string()
}

#[tokio::test]
async fn successful_turn_persists_the_session_identity() {
    let dir = TempDir::new().expect("tempdir");
    let backend = ScriptedBackend::new(vec![ScriptedTurn::completed("sess-1")]);
    let (mut controller, _) = controller_over(backend, &dir, Duration::from_secs(30));

    controller.run_turn("hello").await.expect("turn");

    assert_eq!(controller.session_id(), Some("sess-1"));
    assert_eq!(persisted_id(&dir), "sess-1");
}

#[tokio::test]
async fn persisted_identity_is_offered_on_the_first_connect() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("session_id"), "sess-7\n").expect("seed");
    let backend = ScriptedBackend::new(vec![ScriptedTurn::completed("sess-7")]);
    let (mut controller, recorder) = controller_over(backend, &dir, Duration::from_secs(30));

    assert!(controller.has_session());
    controller.run_turn("hello again").await.expect("turn");

    let recorder = recorder.lock().expect("recorder");
    assert_eq!(recorder.connects, vec![Some("sess-7".to_string())]);
}

#[tokio::test]
async fn overflow_compacts_then_retries_the_prompt_once() {
    let dir = TempDir::new().expect("tempdir");
    let backend = ScriptedBackend::new(vec![
        ScriptedTurn::overflowing("sess-1"),
        ScriptedTurn::completed("sess-1"),
        ScriptedTurn::completed("sess-2"),
    ]);
    let (mut controller, recorder) = controller_over(backend, &dir, Duration::from_secs(30));

    controller.run_turn("summarize the notes").await.expect("turn");

    let recorder = recorder.lock().expect("recorder");
    assert_eq!(
        recorder.prompts,
        vec![
            "summarize the notes".to_string(),
            "/compact".to_string(),
            "summarize the notes".to_string(),
        ]
    );
    // Compaction reuses the live connection; no reconnect happened.
    assert_eq!(recorder.connects.len(), 1);
    assert_eq!(persisted_id(&dir), "sess-2");
}

#[tokio::test]
async fn failed_compaction_restarts_from_a_fresh_session() {
    let dir = TempDir::new().expect("tempdir");
    let backend = ScriptedBackend::new(vec![
        ScriptedTurn::overflowing("sess-1"),
        ScriptedTurn::new().failed_result("sess-1"),
        ScriptedTurn::completed("sess-9"),
    ]);
    let (mut controller, recorder) = controller_over(backend, &dir, Duration::from_secs(30));

    controller.run_turn("keep going").await.expect("turn");

    let recorder = recorder.lock().expect("recorder");
    assert_eq!(
        recorder.prompts,
        vec![
            "keep going".to_string(),
            "/compact".to_string(),
            "keep going".to_string(),
        ]
    );
    // The restart connects without a resume identifier.
    assert_eq!(recorder.connects, vec![None, None]);
    assert_eq!(persisted_id(&dir), "sess-9");
    assert_eq!(controller.session_id(), Some("sess-9"));
}

#[tokio::test]
async fn recovery_is_bounded_when_overflow_persists_after_compaction() {
    let dir = TempDir::new().expect("tempdir");
    let backend = ScriptedBackend::new(vec![
        ScriptedTurn::overflowing("sess-1"),
        ScriptedTurn::completed("sess-1"),
        ScriptedTurn::overflowing("sess-1"),
    ]);
    let (mut controller, recorder) = controller_over(backend, &dir, Duration::from_secs(30));

    // The post-compaction retry still overflows; the turn ends anyway.
    controller.run_turn("long prompt").await.expect("turn");

    let recorder = recorder.lock().expect("recorder");
    assert_eq!(recorder.prompts.len(), 3);
    assert_eq!(recorder.connects.len(), 1);
}

#[tokio::test]
async fn recovery_is_bounded_when_overflow_persists_after_restart() {
    let dir = TempDir::new().expect("tempdir");
    let backend = ScriptedBackend::new(vec![
        ScriptedTurn::overflowing("sess-1"),
        ScriptedTurn::new().failed_result("sess-1"),
        ScriptedTurn::overflowing("sess-2"),
    ]);
    let (mut controller, recorder) = controller_over(backend, &dir, Duration::from_secs(30));

    controller.run_turn("long prompt").await.expect("turn");

    let recorder = recorder.lock().expect("recorder");
    // One original attempt, one compaction, one post-restart attempt.
    assert_eq!(recorder.prompts.len(), 3);
    assert_eq!(recorder.connects, vec![None, None]);
}

#[tokio::test(start_paused = true)]
async fn stalled_stream_fails_the_turn_and_tears_down_the_connection() {
    let dir = TempDir::new().expect("tempdir");
    let backend = ScriptedBackend::new(vec![ScriptedTurn::new().text("working...").stall()]);
    let (mut controller, recorder) = controller_over(backend, &dir, Duration::from_secs(30));

    let error = controller.run_turn("hello").await.expect_err("stall");
    assert!(matches!(
        error,
        TurnError::Query(QueryError::StalledStream { .. })
    ));

    let recorder = recorder.lock().expect("recorder");
    assert_eq!(recorder.interrupts, 1);
    assert_eq!(recorder.closes, 1);
}

#[tokio::test]
async fn denied_tool_request_reaches_the_backend_with_a_reason() {
    let dir = TempDir::new().expect("tempdir");
    let backend = ScriptedBackend::new(vec![ScriptedTurn::new()
        .tool_use("call-1", "Read", json!({ "path": "../../etc/passwd" }))
        .result("sess-1")]);
    let (mut controller, recorder) = controller_over(backend, &dir, Duration::from_secs(30));

    controller.run_turn("read that file").await.expect("turn");

    let recorder = recorder.lock().expect("recorder");
    let (call_id, response) = &recorder.tool_responses[0];
    assert_eq!(call_id, "call-1");
    let ToolResponse::Denied { reason } = response else {
        panic!("expected a denial, got {response:?}");
    };
    assert!(reason.contains("sandbox"), "reason was {reason:?}");
}

#[tokio::test]
async fn turn_without_a_terminal_event_persists_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let backend = ScriptedBackend::new(vec![ScriptedTurn::new().text("and then silence")]);
    let (mut controller, _) = controller_over(backend, &dir, Duration::from_secs(30));

    controller.run_turn("hello").await.expect("turn");

    assert_eq!(controller.session_id(), None);
    assert!(!dir.path().join("session_id").exists());
}

#[tokio::test]
async fn allowed_tool_request_is_granted() {
    let dir = TempDir::new().expect("tempdir");
    let backend = ScriptedBackend::new(vec![ScriptedTurn::new()
        .tool_use("call-2", "Bash", json!({ "command": "sleep 2" }))
        .result("sess-1")]);
    let (mut controller, recorder) = controller_over(backend, &dir, Duration::from_secs(30));

    controller.run_turn("wait a bit").await.expect("turn");

    let recorder = recorder.lock().expect("recorder");
    assert_eq!(
        recorder.tool_responses,
        vec![("call-2".to_string(), ToolResponse::Granted)]
    );
}
