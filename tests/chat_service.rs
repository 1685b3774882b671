//! Session workers: ordering, history, reset, cancellation and archiving.

mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use cinelog::chat::{
    Message, Planner, PlannerResponse, Role, ScriptedPlanner, TurnFailure, TurnState,
};
use cinelog::tools::ToolSchema;
use cinelog::CatalogError;
use pretty_assertions::assert_eq;

use common::TestHarness;

fn echo_planner() -> ScriptedPlanner {
    let echo = |history: &[Message]| {
        let last = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        PlannerResponse::FinalText(format!("echo: {}", last))
    };
    ScriptedPlanner::new()
        .then_with(echo)
        .then_with(echo)
        .then_with(echo)
}

/// Hangs on its first call until the turn is cancelled, answers afterwards.
struct StallingPlanner {
    started: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl Planner for StallingPlanner {
    async fn plan(
        &self,
        _history: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<PlannerResponse, CatalogError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.started.notify_one();
            std::future::pending::<()>().await;
        }
        Ok(PlannerResponse::FinalText("ready".into()))
    }
}

/// Verifies:
/// - Messages sent concurrently are processed one at a time, in order
/// - Each caller gets the reply to its own message
#[tokio::test]
async fn test_queued_messages_run_sequentially() {
    let harness = TestHarness::new().await;
    let service = harness.chat_service(Arc::new(echo_planner()));
    let handle = service.open_session(Some("system".into()));

    let texts = ["first", "second", "third"];
    let replies = futures::future::join_all(
        texts.iter().map(|t| handle.send_user_message(t.to_string())),
    )
    .await;

    for (text, reply) in texts.iter().zip(replies) {
        let reply = reply.expect("worker alive");
        assert_eq!(reply.state, TurnState::Done);
        assert_eq!(reply.text, format!("echo: {}", text));
    }

    let history = handle.get_history().await.unwrap();
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
        ]
    );
}

/// Verifies:
/// - reset clears the conversation but keeps the system prompt
#[tokio::test]
async fn test_reset_keeps_system_prompt() {
    let harness = TestHarness::new().await;
    let service = harness.chat_service(Arc::new(echo_planner()));
    let handle = service.open_session(Some("be brief".into()));

    handle.send_user_message("hi").await.unwrap();
    assert_eq!(handle.get_history().await.unwrap().len(), 3);

    handle.reset().await.unwrap();
    let history = handle.get_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::System);
    assert_eq!(history[0].content, "be brief");
}

/// Verifies:
/// - cancel() stops the running turn with Failed(Cancelled)
/// - A message queued behind it still runs normally
#[tokio::test]
async fn test_cancel_running_turn() {
    let harness = TestHarness::new().await;
    let planner = Arc::new(StallingPlanner {
        started: Notify::new(),
        calls: AtomicUsize::new(0),
    });
    let service = harness.chat_service(planner.clone());
    let handle = service.open_session(None);

    let stuck = tokio::spawn({
        let handle = handle.clone();
        async move { handle.send_user_message("slow question").await }
    });
    planner.started.notified().await;

    let queued = tokio::spawn({
        let handle = handle.clone();
        async move { handle.send_user_message("next question").await }
    });
    handle.cancel();

    let cancelled = tokio::time::timeout(Duration::from_secs(5), stuck)
        .await
        .expect("turn should stop promptly")
        .unwrap()
        .unwrap();
    assert_eq!(cancelled.state, TurnState::Failed);
    assert_eq!(cancelled.failure, Some(TurnFailure::Cancelled));

    let next = tokio::time::timeout(Duration::from_secs(5), queued)
        .await
        .expect("queued turn should run")
        .unwrap()
        .unwrap();
    assert_eq!(next.state, TurnState::Done);
    assert_eq!(next.text, "ready");
}

/// Verifies:
/// - cancel() reaches a message that is queued but not started yet
/// - The cancelled turn never consults the planner
/// - cancel() with nothing pending does not affect the next message
#[tokio::test]
async fn test_cancel_before_worker_starts_turn() {
    let harness = TestHarness::new().await;
    let planner = Arc::new(echo_planner());
    let service = harness.chat_service(planner.clone());
    let handle = service.open_session(None);

    let first = handle.send_user_message("first").await.unwrap();
    assert_eq!(first.state, TurnState::Done);

    // One poll queues the message; the worker has not run since.
    let mut second = Box::pin(handle.send_user_message("second"));
    assert!(futures::poll!(&mut second).is_pending());
    handle.cancel();

    let second = second.await.unwrap();
    assert_eq!(second.state, TurnState::Failed);
    assert_eq!(second.failure, Some(TurnFailure::Cancelled));
    assert_eq!(planner.calls(), 1);

    handle.cancel();
    let third = handle.send_user_message("third").await.unwrap();
    assert_eq!(third.state, TurnState::Done);
    assert_eq!(third.text, "echo: third");
}

/// Verifies:
/// - close() writes the transcript to sessions/{id}.json
/// - Other handles to the closed session get SessionClosed
#[tokio::test]
async fn test_close_archives_transcript() {
    let harness = TestHarness::new().await;
    let service = harness.chat_service(Arc::new(echo_planner()));
    let handle = service.open_session(Some("system".into()));
    let other = handle.clone();
    let id = handle.id();

    handle.send_user_message("remember this").await.unwrap();
    let path = handle.close().await.unwrap().expect("transcript written");

    assert_eq!(
        path,
        harness.temp_path().join("sessions").join(format!("{}.json", id))
    );
    let transcript: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(transcript["session_id"], id.to_string());
    assert_eq!(transcript["messages"].as_array().unwrap().len(), 3);
    assert_eq!(transcript["messages"][1]["content"], "remember this");

    let after = other.send_user_message("anyone there?").await;
    assert!(matches!(after, Err(CatalogError::SessionClosed(_))));
}

/// Verifies:
/// - A session with only a system prompt is not archived
/// - Dropping every handle archives a conversation without close()
#[tokio::test]
async fn test_archive_conditions() {
    let harness = TestHarness::new().await;
    let service = harness.chat_service(Arc::new(echo_planner()));

    let empty = service.open_session(Some("system".into()));
    assert_eq!(empty.close().await.unwrap(), None);

    let dropped = service.open_session(Some("system".into()));
    let id = dropped.id();
    dropped.send_user_message("bye").await.unwrap();
    drop(dropped);

    let path = harness.temp_path().join("sessions").join(format!("{}.json", id));
    let mut found = false;
    for _ in 0..50 {
        if path.exists() {
            found = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(found, "transcript should be archived after the last handle drops");
}
