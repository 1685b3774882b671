//! The per-turn state machine.
//!
//! ```text
//! AwaitingUser -> Planning -> (Done | ExecutingTools -> Planning ... | Failed)
//! ```
//!
//! A turn appends the user message, then alternates planner rounds and tool
//! batches until the planner answers in text. Tool failures are fed back to
//! the planner as results; only planner errors, cancellation and the
//! iteration guard end a turn in `Failed`.
//!
//! Cancellation is checked before each planner call and after each tool
//! call. A planner request in flight is also raced against the token and
//! dropped when the turn is cancelled; planning has no side effects, unlike
//! tool calls, which always run to completion once started.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::message::Message;
use super::planner::{Planner, PlannerResponse};
use super::session::ConversationSession;
use crate::tools::{ToolCall, ToolError, ToolRegistry, ToolResult};

pub const DEFAULT_MAX_ITERATIONS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    AwaitingUser,
    Planning,
    ExecutingTools,
    Done,
    Failed,
}

/// Why a turn ended in [`TurnState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum TurnFailure {
    #[error("planner unavailable: {0}")]
    PlannerUnavailable(String),

    #[error("no answer after {0} tool rounds")]
    IterationLimitExceeded(usize),

    #[error("cancelled by the user")]
    Cancelled,

    #[error("message rejected by the session: {0}")]
    InvalidHistory(String),
}

/// Progress notifications for interface indicators.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    StateChanged(TurnState),
    ToolStarted {
        call_id: String,
        name: String,
    },
    ToolFinished {
        call_id: String,
        name: String,
        success: bool,
        error_code: Option<String>,
    },
    Finished {
        state: TurnState,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub state: TurnState,
    /// Final assistant text, or a short explanation when the turn failed.
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<TurnFailure>,
    /// Planner rounds that requested tools.
    pub tool_rounds: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub max_iterations: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Current state plus the optional event channel.
struct Progress<'a> {
    state: TurnState,
    events: Option<&'a broadcast::Sender<TurnEvent>>,
}

impl Progress<'_> {
    fn emit(&self, event: TurnEvent) {
        if let Some(tx) = self.events {
            // No subscribers is fine.
            let _ = tx.send(event);
        }
    }

    fn enter(&mut self, state: TurnState) {
        self.state = state;
        self.emit(TurnEvent::StateChanged(state));
    }
}

fn record(session: &mut ConversationSession, message: Message) -> Result<(), TurnFailure> {
    session
        .append(message)
        .map_err(|e| TurnFailure::InvalidHistory(e.to_string()))
}

#[derive(Clone)]
pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    registry: ToolRegistry,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(planner: Arc<dyn Planner>, registry: ToolRegistry, config: OrchestratorConfig) -> Self {
        Self {
            planner,
            registry,
            config,
        }
    }

    /// Run one user turn to completion against `session`.
    ///
    /// Never returns an error: failures are reported in the outcome and the
    /// session stays valid for the next turn.
    #[instrument(name = "chat.turn", skip_all, fields(session = %session.id()))]
    pub async fn run_turn(
        &self,
        session: &mut ConversationSession,
        user_text: &str,
        cancel: &CancellationToken,
        events: Option<&broadcast::Sender<TurnEvent>>,
    ) -> TurnOutcome {
        let mut progress = Progress {
            state: TurnState::AwaitingUser,
            events,
        };
        let mut tool_rounds = 0;
        let result = self
            .drive(session, user_text, cancel, &mut progress, &mut tool_rounds)
            .await;

        let outcome = match result {
            Ok(text) => TurnOutcome {
                state: TurnState::Done,
                text,
                failure: None,
                tool_rounds,
            },
            Err(failure) => {
                tracing::warn!("turn failed in {:?}: {}", progress.state, failure);
                TurnOutcome {
                    state: TurnState::Failed,
                    text: failure.to_string(),
                    failure: Some(failure),
                    tool_rounds,
                }
            }
        };
        progress.enter(outcome.state);
        progress.emit(TurnEvent::Finished {
            state: outcome.state,
            text: outcome.text.clone(),
        });
        tracing::info!(
            state = ?outcome.state,
            tool_rounds = outcome.tool_rounds,
            "turn finished"
        );
        outcome
    }

    async fn drive(
        &self,
        session: &mut ConversationSession,
        user_text: &str,
        cancel: &CancellationToken,
        progress: &mut Progress<'_>,
        tool_rounds: &mut usize,
    ) -> Result<String, TurnFailure> {
        record(session, Message::user(user_text))?;
        let schemas = self.registry.list_schemas();

        loop {
            if cancel.is_cancelled() {
                return Err(TurnFailure::Cancelled);
            }
            progress.enter(TurnState::Planning);

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TurnFailure::Cancelled),
                response = self.planner.plan(session.history(), &schemas) => response,
            };
            let response = response.map_err(|e| TurnFailure::PlannerUnavailable(e.to_string()))?;

            let calls = match response {
                PlannerResponse::FinalText(text) => {
                    record(session, Message::assistant(text.clone()))?;
                    return Ok(text);
                }
                PlannerResponse::ToolCalls(calls) if calls.is_empty() => {
                    record(session, Message::assistant(""))?;
                    return Ok(String::new());
                }
                PlannerResponse::ToolCalls(calls) => calls,
            };

            *tool_rounds += 1;
            record(session, Message::assistant_tool_calls("", calls.clone()))?;
            progress.enter(TurnState::ExecutingTools);

            let cancelled = self.execute_batch(session, &calls, cancel, progress).await?;
            if cancelled {
                return Err(TurnFailure::Cancelled);
            }

            if *tool_rounds >= self.config.max_iterations {
                let failure = TurnFailure::IterationLimitExceeded(self.config.max_iterations);
                record(
                    session,
                    Message::assistant(format!(
                        "I stopped after {} rounds of tool calls without reaching an answer. \
                         Could you rephrase or narrow down the request?",
                        self.config.max_iterations
                    )),
                )?;
                return Err(failure);
            }
        }
    }

    /// Run calls in order, one tool message per call. Returns whether the
    /// batch was cut short by cancellation; skipped calls still get a result.
    async fn execute_batch(
        &self,
        session: &mut ConversationSession,
        calls: &[ToolCall],
        cancel: &CancellationToken,
        progress: &Progress<'_>,
    ) -> Result<bool, TurnFailure> {
        let mut cancelled = false;
        for call in calls {
            let result = if cancelled {
                ToolResult::failure(&call.id, ToolError::cancelled(&call.name))
            } else {
                progress.emit(TurnEvent::ToolStarted {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                });
                self.registry.invoke(call).await
            };

            progress.emit(TurnEvent::ToolFinished {
                call_id: call.id.clone(),
                name: call.name.clone(),
                success: result.success,
                error_code: result.error_code().map(str::to_string),
            });
            record(session, Message::tool(result))?;

            if cancel.is_cancelled() {
                cancelled = true;
            }
        }
        Ok(cancelled)
    }
}
