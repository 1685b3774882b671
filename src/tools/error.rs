use crate::CatalogError;
use serde::{Deserialize, Serialize};

/// Structured failure returned to the planner as a tool result.
/// Carries error_code + suggestion so the model can correct itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    pub error_code: String,
    pub message: String,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
}

pub const UNKNOWN_TOOL: &str = "UNKNOWN_TOOL";
pub const INVALID_ARGUMENTS: &str = "INVALID_ARGUMENTS";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const CONFLICT: &str = "CONFLICT";
pub const PARTIAL_FAILURE: &str = "PARTIAL_FAILURE";
pub const STORE_ERROR: &str = "STORE_ERROR";
pub const METADATA_UNAVAILABLE: &str = "METADATA_UNAVAILABLE";
pub const CANCELLED: &str = "CANCELLED";

impl ToolError {
    fn new(code: &str, message: String, suggestion: &str) -> Self {
        ToolError {
            error_code: code.into(),
            message,
            suggestion: suggestion.into(),
            field: None,
            example: None,
        }
    }

    pub fn unknown_tool(name: &str, available: &[&str]) -> Self {
        ToolError::new(
            UNKNOWN_TOOL,
            format!("Unknown tool '{}'", name),
            "Call one of the listed tools with its documented arguments.",
        )
        .with_example(serde_json::json!({ "available_tools": available }))
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        ToolError::new(
            INVALID_ARGUMENTS,
            message.into(),
            "Check the tool's argument schema: required fields, types and value ranges.",
        )
    }

    pub fn cancelled(name: &str) -> Self {
        ToolError::new(
            CANCELLED,
            format!("'{}' was not run because the user cancelled the request", name),
            "Do not retry; the user stopped this request.",
        )
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_example(mut self, example: serde_json::Value) -> Self {
        self.example = Some(example);
        self
    }

    /// Whether the same call could succeed later without changing its arguments.
    pub fn is_transient(&self) -> bool {
        matches!(self.error_code.as_str(), STORE_ERROR | METADATA_UNAVAILABLE)
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code, self.message)
    }
}

impl From<CatalogError> for ToolError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound { kind, id } => ToolError::new(
                NOT_FOUND,
                format!("{} '{}' not found", kind, id),
                "Use search_entries or list_watchlist to find the right id.",
            )
            .with_field("id"),
            CatalogError::Validation(msg) => ToolError::invalid_arguments(msg),
            CatalogError::Conflict(msg) => ToolError::new(
                CONFLICT,
                msg,
                "The record probably exists already. Update it instead, or ask the user whether a second copy is wanted.",
            ),
            CatalogError::PartialFailure(msg) => ToolError::new(
                PARTIAL_FAILURE,
                msg,
                "Tell the user exactly which step completed; do not retry automatically.",
            ),
            CatalogError::Metadata(msg) => ToolError::new(
                METADATA_UNAVAILABLE,
                msg,
                "Answer without external metadata or ask the user for the details.",
            ),
            other => ToolError::new(
                STORE_ERROR,
                other.to_string(),
                "This may be a temporary store issue. Retry once or tell the user.",
            ),
        }
    }
}
