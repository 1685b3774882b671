//! Conversational query orchestration over the catalog.
//!
//! - [`session`]: bounded, ordered history of one conversation
//! - [`planner`]: the model-facing trait plus a scripted implementation
//! - [`openai`]: OpenAI-compatible planner
//! - [`orchestrator`]: the per-turn state machine
//! - [`service`]: one worker task per session and the handle transports use

pub mod message;
pub mod openai;
pub mod orchestrator;
pub mod planner;
pub mod prompt;
pub mod service;
pub mod session;

pub use message::{DisplayMessage, Message, Role};
pub use openai::OpenAiPlanner;
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, TurnEvent, TurnFailure, TurnOutcome, TurnState,
    DEFAULT_MAX_ITERATIONS,
};
pub use planner::{Planner, PlannerResponse, ScriptedPlanner};
pub use prompt::build_system_prompt;
pub use service::{ChatService, SessionHandle, TurnReply};
pub use session::{ConversationSession, HistoryLimits};
