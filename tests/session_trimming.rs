//! History trimming never separates a tool call from its result.

use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;

use cinelog::chat::{ConversationSession, HistoryLimits, Message, Role};
use cinelog::tools::{ToolCall, ToolResult};

/// One conversational turn: tool rounds of the given batch sizes, then a reply.
#[derive(Debug, Clone)]
struct Turn {
    rounds: Vec<usize>,
    reply_len: usize,
}

fn turn_strategy() -> impl Strategy<Value = Turn> {
    (prop::collection::vec(1usize..4, 0..4), 0usize..200)
        .prop_map(|(rounds, reply_len)| Turn { rounds, reply_len })
}

fn messages_for(turn: &Turn, turn_idx: usize) -> Vec<Message> {
    let mut out = vec![Message::user(format!("question {}", turn_idx))];
    for (round, &size) in turn.rounds.iter().enumerate() {
        let calls: Vec<ToolCall> = (0..size)
            .map(|i| {
                ToolCall::with_id(
                    format!("call_{}_{}_{}", turn_idx, round, i),
                    "search_entries",
                    json!({ "filter": { "title": "x".repeat(i * 10) } }),
                )
            })
            .collect();
        let results: Vec<Message> = calls
            .iter()
            .map(|c| Message::tool(ToolResult::ok(&c.id, json!({ "count": 0, "entries": [] }))))
            .collect();
        out.push(Message::assistant_tool_calls("", calls));
        out.extend(results);
    }
    out.push(Message::assistant("a".repeat(turn.reply_len)));
    out
}

/// Results only answer calls still in history, and every call that is not
/// in the newest unit has its results.
fn check_pairing(history: &[Message]) -> Result<(), TestCaseError> {
    let mut open: HashSet<&str> = HashSet::new();
    let mut answered: HashSet<&str> = HashSet::new();
    for message in history {
        for call in &message.tool_calls {
            open.insert(call.id.as_str());
        }
        if let Some(id) = message.answers() {
            prop_assert!(open.contains(id), "orphaned result {}", id);
            answered.insert(id);
        }
    }

    let last_unit_start = history
        .iter()
        .rposition(|m| m.role != Role::Tool)
        .unwrap_or(0);
    for message in &history[..last_unit_start] {
        for call in &message.tool_calls {
            prop_assert!(
                answered.contains(call.id.as_str()),
                "call {} lost its result",
                call.id
            );
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn trimming_keeps_pairs_and_bounds(
        turns in prop::collection::vec(turn_strategy(), 1..8),
        max_messages in 2usize..12,
        max_tokens in 20usize..400,
    ) {
        let limits = HistoryLimits { max_messages, max_tokens };
        let mut session = ConversationSession::with_system("system prompt", limits);

        for (idx, turn) in turns.iter().enumerate() {
            for message in messages_for(turn, idx) {
                let expected = message.clone();
                session.append(message).expect("append");
                let history = session.history();

                prop_assert_eq!(history[0].role, Role::System);
                prop_assert_eq!(history.last(), Some(&expected));
                check_pairing(history)?;

                // Over the limits only when a single unit is left.
                let over = history.len() > max_messages
                    || session.estimated_tokens() > max_tokens;
                if over {
                    let rest = &history[1..];
                    prop_assert!(rest.iter().skip(1).all(|m| m.role == Role::Tool));
                }
            }
        }
    }

    #[test]
    fn reset_keeps_only_system(turns in prop::collection::vec(turn_strategy(), 0..4)) {
        let mut session = ConversationSession::with_system("system prompt", HistoryLimits::default());
        for (idx, turn) in turns.iter().enumerate() {
            for message in messages_for(turn, idx) {
                session.append(message).expect("append");
            }
        }
        session.reset();
        prop_assert_eq!(session.len(), 1);
        prop_assert_eq!(session.system_prompt(), Some("system prompt"));
    }
}

#[test]
fn test_second_system_message_rejected() {
    let mut session = ConversationSession::with_system("first", HistoryLimits::default());
    assert!(session.append(Message::system("second")).is_err());
    assert_eq!(session.len(), 1);
}
