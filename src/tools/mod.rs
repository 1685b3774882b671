//! Tool registry: the fixed set of catalog tools the planner may call.
//!
//! The registry validates raw planner arguments, dispatches to the
//! handlers in [`handlers`], and turns every outcome into a [`ToolResult`].
//! Nothing here is raised to the caller; failures are data the planner
//! reads on its next round.

pub mod args;
pub mod error;
mod handlers;

pub use error::ToolError;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

use crate::metadata::MetadataSource;
use crate::repository::CatalogStore;
use args::{
    AddEntryArgs, AddToWatchlistArgs, FetchMetadataArgs, ListWatchlistArgs,
    PromoteWatchlistItemArgs, RemoveEntryArgs, SearchEntriesArgs, ToolArgs, UpdateEntryArgs,
};

/// The tools exposed to the planner, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    SearchEntries,
    AddEntry,
    UpdateEntry,
    RemoveEntry,
    ListWatchlist,
    AddToWatchlist,
    PromoteWatchlistItem,
    FetchExternalMetadata,
}

impl ToolName {
    pub const ALL: [ToolName; 8] = [
        ToolName::SearchEntries,
        ToolName::AddEntry,
        ToolName::UpdateEntry,
        ToolName::RemoveEntry,
        ToolName::ListWatchlist,
        ToolName::AddToWatchlist,
        ToolName::PromoteWatchlistItem,
        ToolName::FetchExternalMetadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::SearchEntries => "search_entries",
            ToolName::AddEntry => "add_entry",
            ToolName::UpdateEntry => "update_entry",
            ToolName::RemoveEntry => "remove_entry",
            ToolName::ListWatchlist => "list_watchlist",
            ToolName::AddToWatchlist => "add_to_watchlist",
            ToolName::PromoteWatchlistItem => "promote_watchlist_item",
            ToolName::FetchExternalMetadata => "fetch_external_metadata",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            ToolName::SearchEntries => {
                "Search the user's catalog of watched movies and series. All filter fields are optional and combine with AND. Returns entries with their ids, most recently added first."
            }
            ToolName::AddEntry => {
                "Add a watched movie or series to the catalog. Fails with CONFLICT if a similar entry exists unless allow_duplicate is true."
            }
            ToolName::UpdateEntry => {
                "Change fields of an existing catalog entry by id (for example the rating). Only the given fields change."
            }
            ToolName::RemoveEntry => "Delete a catalog entry by id.",
            ToolName::ListWatchlist => {
                "List the user's watchlist (titles they want to watch), highest priority first."
            }
            ToolName::AddToWatchlist => {
                "Put a title on the watchlist. Omit priority to append at the end."
            }
            ToolName::PromoteWatchlistItem => {
                "Mark a watchlist item as watched: creates a catalog entry from it and removes it from the watchlist in one step."
            }
            ToolName::FetchExternalMetadata => {
                "Look up public information about a title (year, kind, genres, plot, public rating). Returns {\"found\": false} when nothing matches."
            }
        }
    }

    fn parameters(&self) -> Value {
        match self {
            ToolName::SearchEntries => schema_of::<SearchEntriesArgs>(),
            ToolName::AddEntry => schema_of::<AddEntryArgs>(),
            ToolName::UpdateEntry => schema_of::<UpdateEntryArgs>(),
            ToolName::RemoveEntry => schema_of::<RemoveEntryArgs>(),
            ToolName::ListWatchlist => schema_of::<ListWatchlistArgs>(),
            ToolName::AddToWatchlist => schema_of::<AddToWatchlistArgs>(),
            ToolName::PromoteWatchlistItem => schema_of::<PromoteWatchlistItemArgs>(),
            ToolName::FetchExternalMetadata => schema_of::<FetchMetadataArgs>(),
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = ToolName::ALL.iter().map(|t| t.as_str()).collect();
                ToolError::unknown_tool(s, &names)
            })
    }
}

/// Parameter schema for an argument struct, without the draft/title noise.
fn schema_of<T: ToolArgs>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null);
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
}

/// A tool as advertised to the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A single tool invocation requested by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id, echoed by the matching [`ToolResult`].
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("call_{}", &id[..8]),
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of one tool call. Exactly one of `payload`/`error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, payload: Value) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(call_id: impl Into<String>, error: ToolError) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            payload: None,
            error: Some(error),
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.error_code.as_str())
    }

    /// JSON text sent back to the planner as the tool message content.
    pub fn to_content(&self) -> String {
        let body = match (&self.payload, &self.error) {
            (Some(payload), _) => payload.clone(),
            (None, Some(error)) => serde_json::json!({ "error": error }),
            (None, None) => Value::Null,
        };
        body.to_string()
    }
}

/// Maps tool names to handlers over the catalog store and metadata source.
///
/// Holds only shared handles, so clones are cheap and calls may run
/// concurrently.
#[derive(Clone)]
pub struct ToolRegistry {
    store: Arc<dyn CatalogStore>,
    metadata: Arc<dyn MetadataSource>,
}

impl ToolRegistry {
    pub fn new(store: Arc<dyn CatalogStore>, metadata: Arc<dyn MetadataSource>) -> Self {
        Self { store, metadata }
    }

    /// Tool schemas in the fixed presentation order.
    pub fn list_schemas(&self) -> Vec<ToolSchema> {
        ToolName::ALL
            .iter()
            .map(|tool| ToolSchema {
                name: tool.as_str().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// Run one call. Always returns a result correlated to `call.id`.
    #[instrument(name = "tool.invoke", skip(self, call), fields(tool = %call.name, call_id = %call.id))]
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let outcome = match call.name.parse::<ToolName>() {
            Ok(tool) => self.dispatch(tool, &call.arguments).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(payload) => {
                tracing::debug!("tool succeeded");
                ToolResult::ok(&call.id, payload)
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::warn!("tool failed: {}", err);
                } else {
                    tracing::debug!("tool rejected call: {}", err);
                }
                ToolResult::failure(&call.id, err)
            }
        }
    }

    async fn dispatch(&self, tool: ToolName, raw: &Value) -> Result<Value, ToolError> {
        use args::parse_args;
        let store = self.store.as_ref();
        match tool {
            ToolName::SearchEntries => handlers::search_entries(store, parse_args(raw)?).await,
            ToolName::AddEntry => handlers::add_entry(store, parse_args(raw)?).await,
            ToolName::UpdateEntry => handlers::update_entry(store, parse_args(raw)?).await,
            ToolName::RemoveEntry => handlers::remove_entry(store, parse_args(raw)?).await,
            ToolName::ListWatchlist => {
                let _: ListWatchlistArgs = parse_args(raw)?;
                handlers::list_watchlist(store).await
            }
            ToolName::AddToWatchlist => handlers::add_to_watchlist(store, parse_args(raw)?).await,
            ToolName::PromoteWatchlistItem => {
                handlers::promote_watchlist_item(store, parse_args(raw)?).await
            }
            ToolName::FetchExternalMetadata => {
                handlers::fetch_external_metadata(self.metadata.as_ref(), parse_args(raw)?).await
            }
        }
    }
}
