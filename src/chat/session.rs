//! Conversation history for one chat thread.
//!
//! Messages are append-only and keep their order. The history is bounded by
//! message count and estimated tokens; when a bound is exceeded the oldest
//! turn units are dropped as a whole, so an assistant tool-call message never
//! survives without its tool results (or the other way round).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::Range;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::message::{Message, Role};
use crate::CatalogError;

pub const DEFAULT_MAX_MESSAGES: usize = 40;
pub const DEFAULT_MAX_TOKENS: usize = 12_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    pub max_messages: usize,
    pub max_tokens: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    messages: Vec<Message>,
    limits: HistoryLimits,
}

/// On-disk transcript format.
#[derive(Serialize)]
struct Transcript<'a> {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    archived_at: DateTime<Utc>,
    messages: &'a [Message],
}

impl ConversationSession {
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            messages: Vec::new(),
            limits,
        }
    }

    /// Session whose first message is the given system prompt.
    pub fn with_system(prompt: impl Into<String>, limits: HistoryLimits) -> Self {
        let mut session = Self::new(limits);
        session.messages.push(Message::system(prompt));
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(Message::estimated_tokens).sum()
    }

    /// Append a message, then trim to the configured bounds.
    ///
    /// A system message is only accepted as the very first message.
    pub fn append(&mut self, message: Message) -> Result<(), CatalogError> {
        if message.role == Role::System && !self.messages.is_empty() {
            return Err(CatalogError::Validation(
                "a system message may only open the conversation".into(),
            ));
        }
        self.messages.push(message);
        self.trim();
        Ok(())
    }

    /// Drop everything except the system message.
    pub fn reset(&mut self) {
        self.messages.retain(|m| m.role == Role::System);
    }

    /// Turn units over the non-system part of the history: each unit is a
    /// non-tool message followed by the tool messages after it.
    fn units(&self) -> Vec<Range<usize>> {
        let start = usize::from(self.system_prompt().is_some());
        let mut units: Vec<Range<usize>> = Vec::new();
        for idx in start..self.messages.len() {
            match (self.messages[idx].role, units.last_mut()) {
                (Role::Tool, Some(last)) => last.end = idx + 1,
                _ => units.push(idx..idx + 1),
            }
        }
        units
    }

    fn over_limits(&self) -> bool {
        self.messages.len() > self.limits.max_messages
            || self.estimated_tokens() > self.limits.max_tokens
    }

    fn trim(&mut self) {
        if !self.over_limits() {
            return;
        }
        let units = self.units();
        let Some(first) = units.first().map(|u| u.start) else {
            return;
        };

        let mut count = self.messages.len();
        let mut tokens = self.estimated_tokens();
        let mut cut = first;
        // The most recent unit always stays.
        for unit in &units[..units.len() - 1] {
            if count <= self.limits.max_messages && tokens <= self.limits.max_tokens {
                break;
            }
            count -= unit.len();
            tokens -= self.messages[unit.clone()]
                .iter()
                .map(Message::estimated_tokens)
                .sum::<usize>();
            cut = unit.end;
        }

        if cut > first {
            tracing::debug!(
                "Trimmed {} messages from session {}",
                cut - first,
                self.id
            );
            self.messages.drain(first..cut);
        }
    }

    /// Write the transcript to `{dir}/{session_id}.json`.
    pub fn archive(&self, dir: &Path) -> Result<PathBuf, CatalogError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", self.id));
        let transcript = Transcript {
            session_id: self.id,
            started_at: self.started_at,
            archived_at: Utc::now(),
            messages: &self.messages,
        };
        let json = serde_json::to_string_pretty(&transcript)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolCall, ToolResult};
    use serde_json::json;

    fn limits(max_messages: usize) -> HistoryLimits {
        HistoryLimits {
            max_messages,
            max_tokens: usize::MAX,
        }
    }

    #[test]
    fn test_rejects_late_system_message() {
        let mut session = ConversationSession::with_system("persona", limits(10));
        assert!(session.append(Message::system("again")).is_err());
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_reset_keeps_system() {
        let mut session = ConversationSession::with_system("persona", limits(10));
        session.append(Message::user("hi")).unwrap();
        session.append(Message::assistant("hello")).unwrap();
        session.reset();
        assert_eq!(session.len(), 1);
        assert_eq!(session.system_prompt(), Some("persona"));
    }

    #[test]
    fn test_trim_drops_tool_unit_whole() {
        let mut session = ConversationSession::with_system("persona", limits(5));
        session.append(Message::user("list my watchlist")).unwrap();
        let call = ToolCall::with_id("c1", "list_watchlist", json!({}));
        session
            .append(Message::assistant_tool_calls("", vec![call]))
            .unwrap();
        session
            .append(Message::tool(ToolResult::ok("c1", json!({ "count": 0 }))))
            .unwrap();
        session.append(Message::assistant("It is empty.")).unwrap();
        assert_eq!(session.len(), 5);

        session.append(Message::user("thanks")).unwrap();
        // Only the oldest user message goes; the tool-call unit stays intact.
        let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::Assistant,
                Role::Tool,
                Role::Assistant,
                Role::User
            ]
        );
    }

    #[test]
    fn test_last_unit_survives_token_limit() {
        let mut session = ConversationSession::with_system(
            "p",
            HistoryLimits {
                max_messages: 100,
                max_tokens: 4,
            },
        );
        session.append(Message::user("a".repeat(100))).unwrap();
        assert_eq!(session.len(), 2);
        session.append(Message::user("b".repeat(100))).unwrap();
        assert_eq!(session.len(), 2);
        assert!(session.history()[1].content.starts_with('b'));
    }

    #[test]
    fn test_archive_writes_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ConversationSession::with_system("p", limits(10));
        session.append(Message::user("hello")).unwrap();
        let path = session.archive(dir.path()).unwrap();
        let raw = std::fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["messages"][1]["content"], "hello");
        assert_eq!(parsed["session_id"], session.id().to_string());
    }
}
