//! Planner backed by an OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::instrument;

use super::message::{Message, Role};
use super::planner::{Planner, PlannerResponse};
use crate::config::PlannerConfig;
use crate::tools::{ToolCall, ToolSchema};
use crate::CatalogError;

#[derive(Debug)]
struct RequestError {
    message: String,
    retryable: bool,
}

impl RequestError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<RawToolCall>>,
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    id: String,
    function: RawFunction,
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    name: String,
    /// JSON text as produced by the model; not guaranteed to parse.
    arguments: String,
}

pub struct OpenAiPlanner {
    http: reqwest::Client,
    api_base: String,
    model: String,
    api_key: String,
    max_retries: usize,
}

impl OpenAiPlanner {
    pub fn new(config: &PlannerConfig) -> Result<Self, CatalogError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                CatalogError::Config(
                    "no planner API key: set CINELOG_OPENAI_API_KEY or [planner] api_key".into(),
                )
            })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::PlannerUnavailable(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
        })
    }

    fn retry_strategy(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(Duration::from_millis(500))
            .with_max_times(self.max_retries)
    }

    async fn send(&self, payload: &Value) -> Result<CompletionResponse, RequestError> {
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| RequestError {
                message: format!("request failed: {}", e),
                retryable: e.is_timeout() || e.is_connect(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RequestError {
                message: format!("status {}: {}", status, body),
                retryable: status.as_u16() == 429 || status.is_server_error(),
            });
        }
        resp.json().await.map_err(|e| RequestError {
            message: format!("unreadable response: {}", e),
            retryable: false,
        })
    }
}

/// Chat completions request body for a history and tool list.
pub fn build_payload(model: &str, history: &[Message], tools: &[ToolSchema]) -> Value {
    let messages: Vec<Value> = history.iter().map(message_to_json).collect();
    let mut payload = json!({ "model": model, "messages": messages });
    if !tools.is_empty() {
        let tools: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();
        payload["tools"] = Value::Array(tools);
        payload["tool_choice"] = json!("auto");
    }
    payload
}

fn message_to_json(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.answers().unwrap_or_default(),
            "content": msg.content,
        }),
        Role::Assistant if msg.has_tool_calls() => {
            let calls: Vec<Value> = msg
                .tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": { "name": c.name, "arguments": c.arguments.to_string() },
                    })
                })
                .collect();
            let content = if msg.content.is_empty() {
                Value::Null
            } else {
                Value::String(msg.content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        role => json!({ "role": role.as_str(), "content": msg.content }),
    }
}

fn parse_response(resp: CompletionResponse) -> Result<PlannerResponse, CatalogError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CatalogError::PlannerUnavailable("response had no choices".into()))?;

    let calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            // Unparseable arguments are passed on as a string; the registry
            // answers those with INVALID_ARGUMENTS.
            let arguments = serde_json::from_str(&tc.function.arguments)
                .unwrap_or(Value::String(tc.function.arguments));
            ToolCall::with_id(tc.id, tc.function.name, arguments)
        })
        .collect();

    if calls.is_empty() {
        Ok(PlannerResponse::FinalText(
            choice.message.content.unwrap_or_default(),
        ))
    } else {
        Ok(PlannerResponse::ToolCalls(calls))
    }
}

#[async_trait]
impl Planner for OpenAiPlanner {
    #[instrument(name = "planner.plan", skip_all, fields(model = %self.model, messages = history.len()))]
    async fn plan(
        &self,
        history: &[Message],
        tools: &[ToolSchema],
    ) -> Result<PlannerResponse, CatalogError> {
        let payload = build_payload(&self.model, history, tools);
        let resp = (|| self.send(&payload))
            .retry(self.retry_strategy())
            .when(|e| e.is_retryable())
            .notify(|e, after| tracing::warn!("planner request failed, retrying in {:?}: {}", after, e.message))
            .await
            .map_err(|e| CatalogError::PlannerUnavailable(e.message))?;
        parse_response(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolResult;

    #[test]
    fn test_payload_maps_tool_round_trip() {
        let call = ToolCall::with_id("call_1", "search_entries", json!({ "filter": {} }));
        let history = vec![
            Message::system("persona"),
            Message::user("what did I watch?"),
            Message::assistant_tool_calls("", vec![call]),
            Message::tool(ToolResult::ok("call_1", json!({ "count": 0 }))),
        ];
        let tools = vec![ToolSchema {
            name: "search_entries".into(),
            description: "search".into(),
            parameters: json!({ "type": "object" }),
        }];

        let payload = build_payload("test-model", &history, &tools);
        assert_eq!(payload["model"], "test-model");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][2]["content"], Value::Null);
        assert_eq!(
            payload["messages"][2]["tool_calls"][0]["function"]["arguments"],
            r#"{"filter":{}}"#
        );
        assert_eq!(payload["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(payload["tools"][0]["function"]["name"], "search_entries");
    }

    #[test]
    fn test_parse_final_text() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Hi"}}]}"#;
        let resp: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parse_response(resp).unwrap(),
            PlannerResponse::FinalText("Hi".into())
        );
    }

    #[test]
    fn test_parse_tool_calls_keeps_bad_arguments() {
        let raw = r#"{"choices":[{"message":{"content":null,"tool_calls":[
            {"id":"a","type":"function","function":{"name":"add_entry","arguments":"{\"title\":\"Dune\"}"}},
            {"id":"b","type":"function","function":{"name":"add_entry","arguments":"{oops"}}
        ]}}]}"#;
        let resp: CompletionResponse = serde_json::from_str(raw).unwrap();
        let PlannerResponse::ToolCalls(calls) = parse_response(resp).unwrap() else {
            panic!("expected tool calls");
        };
        assert_eq!(calls[0].arguments["title"], "Dune");
        assert_eq!(calls[1].arguments, Value::String("{oops".into()));
        assert_eq!(calls[1].id, "b");
    }

    #[test]
    fn test_requires_api_key() {
        let config = PlannerConfig::default();
        assert!(OpenAiPlanner::new(&config).is_err());
    }
}
