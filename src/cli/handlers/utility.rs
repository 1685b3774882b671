//! Tool listing and shell completions.

use clap::CommandFactory;
use colored::Colorize;

use crate::cli::output::{output_json, OutputMode};
use crate::cli::Cli;
use crate::init::AppContext;

pub fn handle_tools(ctx: &AppContext, mode: OutputMode) {
    let schemas = ctx.registry.list_schemas();
    if mode == OutputMode::Json {
        output_json(&schemas);
        return;
    }
    for schema in schemas {
        println!("{}", schema.name.bold());
        println!("  {}", schema.description);
        let params = schema.parameters["properties"]
            .as_object()
            .map(|props| props.keys().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        if !params.is_empty() {
            println!("  {} {}", "args:".dimmed(), params);
        }
        println!();
    }
}

pub fn handle_completions(shell: clap_complete::Shell) {
    clap_complete::generate(shell, &mut Cli::command(), "cinelog", &mut std::io::stdout());
}
