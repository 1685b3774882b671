//! Session workers and the handle transports talk to.
//!
//! Each session is owned by one tokio task that processes commands from an
//! mpsc channel strictly in order, so messages sent while a turn is running
//! queue behind it.
//!
//! Each message gets its cancellation token when it is sent, not when the
//! worker picks it up, so `cancel()` also reaches a turn that is queued but
//! not started yet.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::message::{DisplayMessage, Role};
use super::orchestrator::{Orchestrator, TurnEvent, TurnOutcome};
use super::session::{ConversationSession, HistoryLimits};
use crate::CatalogError;

/// Reply to one user message.
pub type TurnReply = TurnOutcome;

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

enum Command {
    Send {
        text: String,
        turn: u64,
        cancel: CancellationToken,
        reply: oneshot::Sender<TurnReply>,
    },
    History {
        reply: oneshot::Sender<Vec<DisplayMessage>>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    Close {
        reply: oneshot::Sender<Result<Option<PathBuf>, CatalogError>>,
    },
}

/// Turns sent to a worker and not finished yet.
#[derive(Default)]
struct TurnSlots {
    running: Option<(u64, CancellationToken)>,
    queued: VecDeque<(u64, CancellationToken)>,
}

impl TurnSlots {
    fn start(&mut self, turn: u64, token: CancellationToken) {
        self.queued.retain(|(id, _)| *id != turn);
        self.running = Some((turn, token));
    }

    fn finish(&mut self, turn: u64) {
        if matches!(self.running, Some((id, _)) if id == turn) {
            self.running = None;
        }
    }

    /// The running turn, else the oldest queued one.
    fn cancel_current(&self) {
        if let Some((_, token)) = self.running.as_ref().or_else(|| self.queued.front()) {
            token.cancel();
        }
    }
}

/// Opens chat sessions that share one orchestrator (and so one store and registry).
#[derive(Clone)]
pub struct ChatService {
    orchestrator: Orchestrator,
    limits: HistoryLimits,
    archive_dir: Option<PathBuf>,
}

impl ChatService {
    pub fn new(orchestrator: Orchestrator, limits: HistoryLimits) -> Self {
        Self {
            orchestrator,
            limits,
            archive_dir: None,
        }
    }

    /// Write transcripts of closed sessions into `dir`.
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    /// Start a session worker. Must be called inside a tokio runtime.
    pub fn open_session(&self, system_prompt: Option<String>) -> SessionHandle {
        let session = match system_prompt {
            Some(prompt) => ConversationSession::with_system(prompt, self.limits),
            None => ConversationSession::new(self.limits),
        };
        let id = session.id();
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let root = CancellationToken::new();
        let turns = Arc::new(Mutex::new(TurnSlots::default()));

        let worker = SessionWorker {
            session,
            orchestrator: self.orchestrator.clone(),
            archive_dir: self.archive_dir.clone(),
            events: events.clone(),
            turns: turns.clone(),
        };
        tokio::spawn(worker.run(rx));
        tracing::debug!("opened chat session {}", id);

        SessionHandle {
            id,
            tx,
            events,
            root,
            turns,
            next_turn: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Transport-facing handle to one session. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    tx: mpsc::Sender<Command>,
    events: broadcast::Sender<TurnEvent>,
    root: CancellationToken,
    turns: Arc<Mutex<TurnSlots>>,
    next_turn: Arc<AtomicU64>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CatalogError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| CatalogError::SessionClosed(self.id.to_string()))?;
        rx.await
            .map_err(|_| CatalogError::SessionClosed(self.id.to_string()))
    }

    /// Queue a user message and wait for its turn to finish.
    pub async fn send_user_message(&self, text: impl Into<String>) -> Result<TurnReply, CatalogError> {
        let text = text.into();
        let turn = self.next_turn.fetch_add(1, Ordering::SeqCst);
        let cancel = self.root.child_token();
        if let Ok(mut turns) = self.turns.lock() {
            turns.queued.push_back((turn, cancel.clone()));
        }
        self.request(|reply| Command::Send {
            text,
            turn,
            cancel,
            reply,
        })
        .await
    }

    pub async fn get_history(&self) -> Result<Vec<DisplayMessage>, CatalogError> {
        self.request(|reply| Command::History { reply }).await
    }

    /// Clear the conversation, keeping the system prompt.
    pub async fn reset(&self) -> Result<(), CatalogError> {
        self.request(|reply| Command::Reset { reply }).await
    }

    /// Cancel the running turn, or the next queued one when the worker has
    /// not started it yet. Later messages still run.
    pub fn cancel(&self) {
        if let Ok(turns) = self.turns.lock() {
            turns.cancel_current();
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.events.subscribe()
    }

    /// Stop the worker and archive the transcript.
    ///
    /// # Returns
    ///
    /// Path of the archived transcript, if one was written.
    pub async fn close(self) -> Result<Option<PathBuf>, CatalogError> {
        let result = self.request(|reply| Command::Close { reply }).await?;
        self.root.cancel();
        result
    }
}

struct SessionWorker {
    session: ConversationSession,
    orchestrator: Orchestrator,
    archive_dir: Option<PathBuf>,
    events: broadcast::Sender<TurnEvent>,
    turns: Arc<Mutex<TurnSlots>>,
}

impl SessionWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Send {
                    text,
                    turn,
                    cancel,
                    reply,
                } => {
                    if let Ok(mut turns) = self.turns.lock() {
                        turns.start(turn, cancel.clone());
                    }
                    let outcome = self
                        .orchestrator
                        .run_turn(&mut self.session, &text, &cancel, Some(&self.events))
                        .await;
                    if let Ok(mut turns) = self.turns.lock() {
                        turns.finish(turn);
                    }
                    let _ = reply.send(outcome);
                }
                Command::History { reply } => {
                    let history = self
                        .session
                        .history()
                        .iter()
                        .map(DisplayMessage::from)
                        .collect();
                    let _ = reply.send(history);
                }
                Command::Reset { reply } => {
                    self.session.reset();
                    let _ = reply.send(());
                }
                Command::Close { reply } => {
                    let _ = reply.send(self.archive());
                    return;
                }
            }
        }
        // Every handle dropped without close().
        if let Err(e) = self.archive() {
            tracing::warn!("failed to archive session {}: {}", self.session.id(), e);
        }
    }

    fn archive(&self) -> Result<Option<PathBuf>, CatalogError> {
        let Some(dir) = &self.archive_dir else {
            return Ok(None);
        };
        let has_conversation = self.session.history().iter().any(|m| m.role != Role::System);
        if !has_conversation {
            return Ok(None);
        }
        let path = self.session.archive(dir)?;
        tracing::info!("archived session {} to {}", self.session.id(), path.display());
        Ok(Some(path))
    }
}
