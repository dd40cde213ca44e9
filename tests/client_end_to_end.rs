mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use chat_client::{ClientConfig, HttpTransport, Role, SessionController, TurnOutcome};
use common::{service, spawn_app, ScriptedAgent};

fn controller(base: &str, stream: bool) -> SessionController {
    let config = ClientConfig {
        endpoint: Some(base.to_string()),
        pacing_delay: Duration::from_millis(1),
        stream,
    };
    SessionController::new(Arc::new(HttpTransport::new(config.endpoint.clone())), &config)
}

fn transcript(controller: &SessionController) -> Vec<(Role, String, bool)> {
    controller
        .transcript()
        .into_iter()
        .map(|t| (t.role, t.text, t.is_streaming))
        .collect()
}

#[tokio::test]
async fn streaming_and_buffered_sessions_end_with_the_same_transcript() {
    let agent = Arc::new(ScriptedAgent::answering(&["Hel", "lo ", "ther"], "Hello there!"));
    let base = spawn_app(service(Some(agent))).await;
    let cancel = CancellationToken::new();

    let streaming = controller(&base, true);
    let buffered = controller(&base, false);
    for text in ["hi", "and again"] {
        assert_eq!(
            streaming.submit(text, &cancel).await.unwrap(),
            TurnOutcome::Completed { text: "Hello there!".into() }
        );
        assert_eq!(
            buffered.submit(text, &cancel).await.unwrap(),
            TurnOutcome::Completed { text: "Hello there!".into() }
        );
    }

    assert_eq!(transcript(&streaming), transcript(&buffered));
    assert_eq!(transcript(&streaming).len(), 4);
}

#[tokio::test]
async fn session_stays_on_its_thread_across_turns() {
    let agent = Arc::new(ScriptedAgent::answering(&["ok"], "ok"));
    let base = spawn_app(service(Some(agent.clone()))).await;
    let cancel = CancellationToken::new();

    let session = controller(&base, true);
    session.submit("one", &cancel).await.unwrap();
    let thread_id = session.thread_id().unwrap();
    session.submit("two", &cancel).await.unwrap();

    let calls = agent.calls();
    assert_eq!(calls[1].thread_id, thread_id);
    assert_eq!(calls[1].history.len(), 2);
}

#[tokio::test]
async fn server_error_event_becomes_a_failed_turn() {
    let agent = Arc::new(ScriptedAgent::failing(&["par"], "model crashed"));
    let base = spawn_app(service(Some(agent))).await;

    let session = controller(&base, true);
    let outcome = session.submit("hi", &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Failed { message: "Inference error: model crashed".into() });
    assert_eq!(session.transcript()[1].role, Role::Assistant);
    assert_eq!(session.transcript()[1].text, "Inference error: model crashed");
}

#[tokio::test]
async fn validation_error_reaches_the_transcript() {
    let base = spawn_app(service(Some(Arc::new(ScriptedAgent::answering(&[], ""))))).await;

    let session = controller(&base, true);
    let outcome = session.submit("  ", &CancellationToken::new()).await.unwrap();
    assert_eq!(
        outcome,
        TurnOutcome::Failed { message: "Server error: 400: Field 'message' cannot be empty".into() }
    );
}
