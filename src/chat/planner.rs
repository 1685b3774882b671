use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::message::Message;
use crate::tools::{ToolCall, ToolSchema};
use crate::CatalogError;

/// What the planner wants to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerResponse {
    FinalText(String),
    ToolCalls(Vec<ToolCall>),
}

/// The language-model side of a turn: given the history and the tool
/// schemas, answer or request tool calls.
///
/// Any error means the planner could not be used for this round and is
/// reported as [`CatalogError::PlannerUnavailable`].
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        history: &[Message],
        tools: &[ToolSchema],
    ) -> Result<PlannerResponse, CatalogError>;
}

type DynamicStep = Box<dyn Fn(&[Message]) -> PlannerResponse + Send + Sync>;

enum ScriptStep {
    Respond(PlannerResponse),
    Fail(String),
    Dynamic(DynamicStep),
}

/// Planner that replays a fixed script, one step per call.
///
/// Used to drive the orchestrator deterministically in tests and demos.
/// When the script runs out the fallback step repeats; without a fallback
/// further calls fail.
#[derive(Default)]
pub struct ScriptedPlanner {
    steps: Mutex<VecDeque<ScriptStep>>,
    fallback: Option<PlannerResponse>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, step: ScriptStep) -> Self {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
        self
    }

    pub fn then_reply(self, text: impl Into<String>) -> Self {
        self.push(ScriptStep::Respond(PlannerResponse::FinalText(text.into())))
    }

    pub fn then_call(self, name: &str, arguments: serde_json::Value) -> Self {
        self.then_calls(vec![ToolCall::new(name, arguments)])
    }

    pub fn then_calls(self, calls: Vec<ToolCall>) -> Self {
        self.push(ScriptStep::Respond(PlannerResponse::ToolCalls(calls)))
    }

    pub fn then_fail(self, reason: impl Into<String>) -> Self {
        self.push(ScriptStep::Fail(reason.into()))
    }

    /// Decide the step from the history the planner receives.
    pub fn then_with<F>(self, step: F) -> Self
    where
        F: Fn(&[Message]) -> PlannerResponse + Send + Sync + 'static,
    {
        self.push(ScriptStep::Dynamic(Box::new(step)))
    }

    /// Repeat this call forever once the script is exhausted.
    pub fn repeating_call(mut self, name: &str, arguments: serde_json::Value) -> Self {
        self.fallback = Some(PlannerResponse::ToolCalls(vec![ToolCall::new(
            name, arguments,
        )]));
        self
    }

    /// Number of `plan` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Histories received by each call, in order.
    pub fn seen_histories(&self) -> Vec<Vec<Message>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Fresh correlation ids per round so repeated fallback calls stay distinct.
fn refresh_ids(response: PlannerResponse) -> PlannerResponse {
    match response {
        PlannerResponse::ToolCalls(calls) => PlannerResponse::ToolCalls(
            calls
                .into_iter()
                .map(|c| ToolCall::new(c.name, c.arguments))
                .collect(),
        ),
        other => other,
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(
        &self,
        history: &[Message],
        _tools: &[ToolSchema],
    ) -> Result<PlannerResponse, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(history.to_vec());
        }

        let next = self
            .steps
            .lock()
            .map_err(|_| CatalogError::PlannerUnavailable("script lock poisoned".into()))?
            .pop_front();
        match next {
            Some(ScriptStep::Respond(response)) => Ok(response),
            Some(ScriptStep::Fail(reason)) => Err(CatalogError::PlannerUnavailable(reason)),
            Some(ScriptStep::Dynamic(step)) => Ok(step(history)),
            None => self
                .fallback
                .clone()
                .map(refresh_ids)
                .ok_or_else(|| CatalogError::PlannerUnavailable("script exhausted".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_script_order_and_exhaustion() {
        let planner = ScriptedPlanner::new()
            .then_call("list_watchlist", json!({}))
            .then_reply("done");

        assert!(matches!(
            planner.plan(&[], &[]).await.unwrap(),
            PlannerResponse::ToolCalls(_)
        ));
        assert_eq!(
            planner.plan(&[], &[]).await.unwrap(),
            PlannerResponse::FinalText("done".into())
        );
        assert!(planner.plan(&[], &[]).await.is_err());
        assert_eq!(planner.calls(), 3);
    }

    #[tokio::test]
    async fn test_fallback_gets_fresh_ids() {
        let planner = ScriptedPlanner::new().repeating_call("nope", json!({}));
        let first = planner.plan(&[], &[]).await.unwrap();
        let second = planner.plan(&[], &[]).await.unwrap();
        match (first, second) {
            (PlannerResponse::ToolCalls(a), PlannerResponse::ToolCalls(b)) => {
                assert_ne!(a[0].id, b[0].id)
            }
            other => panic!("unexpected responses: {:?}", other),
        }
    }
}
