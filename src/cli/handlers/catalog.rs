//! Catalog, watchlist and metadata handlers for CLI.
//!
//! Watchlist mutations go through the tool registry so the CLI and the chat
//! assistant share the same conflict and priority rules.

use anyhow::Result;
use serde_json::{json, Value};

use crate::cli::output::{
    output_json, print_error, print_header, print_hint, print_kv, print_success,
    print_table, print_tool_error, spinner, truncate, OutputMode,
};
use crate::init::AppContext;
use crate::models::MediaKind;
use crate::repository::EntryFilter;
use crate::tools::{ToolCall, ToolResult};

fn join(set: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    set.into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Invoke a tool and print its failure, if any.
async fn invoke(ctx: &AppContext, name: &str, arguments: Value, mode: OutputMode) -> Option<Value> {
    let result: ToolResult = ctx.registry.invoke(&ToolCall::new(name, arguments)).await;
    if mode == OutputMode::Json {
        output_json(&result);
    }
    match (result.payload, result.error) {
        (Some(payload), _) => Some(payload),
        (None, Some(err)) => {
            if mode != OutputMode::Json {
                print_tool_error(&err);
            }
            None
        }
        (None, None) => None,
    }
}

pub async fn list_entries(ctx: &AppContext, filter: &EntryFilter, mode: OutputMode) -> Result<()> {
    let entries = ctx.store.find_entries(filter).await?;

    if mode == OutputMode::Json {
        output_json(&entries);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.key(),
                truncate(&e.title, 40),
                e.kind.to_string(),
                e.year.map(|y| y.to_string()).unwrap_or_default(),
                e.rating.map(|r| format!("{:.1}", r)).unwrap_or_default(),
                join(&e.genres),
                e.watched_on.map(|d| d.to_string()).unwrap_or_default(),
            ]
        })
        .collect();

    print_table(
        &["ID", "Title", "Kind", "Year", "Rating", "Genres", "Watched"],
        rows,
    );
    Ok(())
}

pub async fn list_watchlist(ctx: &AppContext, mode: OutputMode) -> Result<()> {
    let items = ctx.store.list_watchlist().await?;

    if mode == OutputMode::Json {
        output_json(&items);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|i| {
            vec![
                i.priority.to_string(),
                i.key(),
                i.title.clone(),
                i.kind.to_string(),
            ]
        })
        .collect();
    print_table(&["#", "ID", "Title", "Kind"], rows);
    Ok(())
}

pub async fn add_to_watchlist(
    ctx: &AppContext,
    title: &str,
    kind: MediaKind,
    priority: Option<i64>,
    mode: OutputMode,
) -> Result<()> {
    let mut args = json!({ "title": title, "kind": kind });
    if let Some(priority) = priority {
        args["priority"] = json!(priority);
    }
    if let Some(payload) = invoke(ctx, "add_to_watchlist", args, mode).await {
        if mode == OutputMode::Human {
            print_success(&format!(
                "Added '{}' to the watchlist ({})",
                payload["item"]["title"].as_str().unwrap_or(title),
                payload["item"]["id"].as_str().unwrap_or_default()
            ));
        }
    }
    Ok(())
}

pub async fn remove_from_watchlist(ctx: &AppContext, id: &str, mode: OutputMode) -> Result<()> {
    let key = crate::utils::sanitize::record_key(crate::models::watchlist::WATCHLIST_TABLE, id)?;
    let removed = ctx.store.delete_watchlist_item(key).await?;
    if mode == OutputMode::Json {
        output_json(&removed);
    } else {
        print_success(&format!("Removed '{}' from the watchlist", removed.title));
    }
    Ok(())
}

pub async fn promote(
    ctx: &AppContext,
    id: &str,
    rating: Option<f64>,
    watched_on: Option<&str>,
    mode: OutputMode,
) -> Result<()> {
    let mut fields = json!({});
    if let Some(rating) = rating {
        fields["rating"] = json!(rating);
    }
    if let Some(date) = watched_on {
        fields["watched_on"] = json!(date);
    }
    let args = json!({ "id": id, "entry_fields": fields });
    if let Some(payload) = invoke(ctx, "promote_watchlist_item", args, mode).await {
        if mode == OutputMode::Human {
            print_success(&format!(
                "'{}' moved into the catalog as {}",
                payload["entry"]["title"].as_str().unwrap_or_default(),
                payload["entry"]["id"].as_str().unwrap_or_default()
            ));
        }
    }
    Ok(())
}

pub async fn lookup(
    ctx: &AppContext,
    title: &str,
    year: Option<i32>,
    imdb_id: Option<&str>,
    mode: OutputMode,
) -> Result<()> {
    if !ctx.metadata.is_available() {
        print_error("Metadata lookups are disabled");
        print_hint("Set CINELOG_OMDB_API_KEY or [metadata] omdb_api_key in config.toml.");
        return Ok(());
    }

    let progress = spinner(mode, "looking up...");
    let found = match imdb_id {
        Some(id) => ctx.metadata.lookup_by_id(id).await,
        None => ctx.metadata.lookup(title, year).await,
    };
    progress.finish_and_clear();
    let found = found?;

    if mode == OutputMode::Json {
        output_json(&found);
        return Ok(());
    }

    let Some(meta) = found else {
        print_hint(&format!("Nothing found for '{}'", title));
        return Ok(());
    };

    print_header(&meta.title);
    print_kv("Kind", meta.kind.as_str());
    if let Some(year) = meta.year {
        print_kv("Year", &year.to_string());
    }
    if let Some(director) = &meta.director {
        print_kv("Director", director);
    }
    if let Some(runtime) = &meta.runtime {
        print_kv("Runtime", runtime);
    }
    if !meta.genres.is_empty() {
        print_kv("Genres", &join(&meta.genres));
    }
    if let Some(rating) = meta.rating {
        print_kv("Rating", &format!("{:.1}", rating));
    }
    if let Some(id) = &meta.imdb_id {
        print_kv("IMDb", id);
    }
    if let Some(plot) = &meta.plot {
        println!("\n{}", plot);
    }
    Ok(())
}
