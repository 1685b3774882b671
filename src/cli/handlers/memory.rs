//! Remembered user facts.

use anyhow::Result;

use crate::cli::output::{
    output_json, print_hint, print_success, print_table, OutputMode,
};
use crate::init::AppContext;
use crate::models::memory;

pub async fn list(ctx: &AppContext, mode: OutputMode) -> Result<()> {
    let notes = memory::list_memories(&ctx.db).await?;

    if mode == OutputMode::Json {
        output_json(&notes);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = notes
        .iter()
        .map(|n| vec![n.key(), n.text.clone()])
        .collect();
    print_table(&["ID", "Fact"], rows);
    Ok(())
}

pub async fn add(ctx: &AppContext, text: &str, mode: OutputMode) -> Result<()> {
    let note = memory::add_memory(&ctx.db, text).await?;
    if mode == OutputMode::Json {
        output_json(&note);
    } else {
        print_success(&format!("Remembered ({})", note.key()));
    }
    Ok(())
}

pub async fn forget(ctx: &AppContext, id: &str, mode: OutputMode) -> Result<()> {
    let forgotten = memory::forget_memory(&ctx.db, id).await?;
    if mode == OutputMode::Json {
        output_json(&forgotten);
        return Ok(());
    }
    match forgotten {
        Some(note) => print_success(&format!("Forgot '{}'", note.text)),
        None => print_hint(&format!("No memory with id starting '{}'", id)),
    }
    Ok(())
}
