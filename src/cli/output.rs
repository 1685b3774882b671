//! Terminal rendering for CLI commands: tables, status lines, spinners and JSON.
//!
//! Everything human-facing goes through here so `--json` can switch the
//! whole CLI to machine-readable output on stdout.

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

use crate::tools::ToolError;

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

/// Pretty-printed JSON on stdout. Works for single records and slices alike.
pub fn output_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => print_error(&format!("cannot render JSON: {e}")),
    }
}

/// Catalog-style table. An empty row set prints a short notice instead.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        println!("{}", "(nothing to show)".dimmed());
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers);
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Errors go to stderr.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// A failed tool call, shown the way the assistant sees it: code, message, hint.
pub fn print_tool_error(err: &ToolError) {
    print_error(&format!("[{}] {}", err.error_code, err.message));
    print_hint(&format!("  {}", err.suggestion));
}

pub fn print_header(title: &str) {
    println!("\n{}", title.bold().underline());
}

pub fn print_kv(key: &str, value: &str) {
    println!("  {:<10} {}", format!("{key}:").dimmed(), value);
}

pub fn print_hint(msg: &str) {
    println!("{}", msg.dimmed());
}

/// Spinner on stderr; hidden in JSON mode so stdout stays parseable.
pub fn spinner(mode: OutputMode, msg: &str) -> ProgressBar {
    if mode == OutputMode::Json {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(SPINNER_FRAMES)
            .template("{spinner:.magenta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Shorten `text` to at most `max` characters, adding an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("Amélie", 10), "Amélie");
        assert_eq!(truncate("Amélie Poulain", 8), "Améli...");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }

    #[test]
    fn test_json_flag() {
        assert_eq!(OutputMode::from_json_flag(true), OutputMode::Json);
        assert_eq!(OutputMode::from_json_flag(false), OutputMode::Human);
    }
}
