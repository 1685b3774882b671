//! CLI interface for cinelog.

pub mod handlers;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::init::AppContext;
use crate::models::MediaKind;
use output::OutputMode;

/// cinelog - personal movie and series catalog with a conversational assistant
#[derive(Parser)]
#[command(name = "cinelog", version, about, long_about = None)]
pub struct Cli {
    /// Override data directory (default: ~/.cinelog)
    #[arg(long, env = "CINELOG_DATA_PATH", global = true)]
    pub data_path: Option<PathBuf>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat about your catalog (/reset, /history, /quit)
    Chat,

    /// Ask a single question and print the answer
    Ask {
        /// The question or instruction
        text: String,
    },

    /// List catalog entries
    List {
        /// Title substring (case-insensitive)
        #[arg(long)]
        title: Option<String>,
        /// movie or series
        #[arg(long)]
        kind: Option<MediaKind>,
        /// Earliest release year
        #[arg(long)]
        year_from: Option<i32>,
        /// Latest release year
        #[arg(long)]
        year_to: Option<i32>,
        #[arg(long)]
        genre: Option<String>,
        /// Minimum personal rating
        #[arg(long)]
        min_rating: Option<f64>,
        /// Only entries not yet marked watched
        #[arg(long)]
        unwatched: bool,
        /// Maximum results
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show or change the watchlist (default: list)
    Watchlist {
        #[command(subcommand)]
        command: Option<WatchlistCommands>,
    },

    /// Look up public metadata for a title
    Lookup {
        /// Title to look up
        title: String,
        /// Release year, narrows the match
        #[arg(long)]
        year: Option<i32>,
        /// IMDb id instead of a title search
        #[arg(long)]
        imdb_id: Option<String>,
    },

    /// Facts the assistant remembers about you
    #[command(subcommand)]
    Memory(MemoryCommands),

    /// Print the tool schemas offered to the planner
    Tools,

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, elvish, powershell)
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum WatchlistCommands {
    /// List the watchlist in priority order
    List,
    /// Add a title
    Add {
        title: String,
        #[arg(long, default_value = "movie")]
        kind: MediaKind,
        /// Lower comes first (default: end of list)
        #[arg(long)]
        priority: Option<i64>,
    },
    /// Remove an item without watching it
    Remove {
        /// Watchlist item id
        id: String,
    },
    /// Mark an item as watched, moving it into the catalog
    Promote {
        /// Watchlist item id
        id: String,
        /// Personal rating (0 < r <= 10)
        #[arg(long)]
        rating: Option<f64>,
        /// Date watched (YYYY-MM-DD, default today)
        #[arg(long)]
        watched_on: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// List remembered facts
    List,
    /// Remember a fact
    Add { text: String },
    /// Forget a fact by id prefix
    Forget { id: String },
}

/// Execute a CLI command against an initialized context.
pub async fn execute(cmd: &Commands, ctx: &AppContext, mode: OutputMode) -> anyhow::Result<()> {
    match cmd {
        Commands::Chat => handlers::chat::handle_chat(ctx, mode).await?,
        Commands::Ask { text } => handlers::chat::handle_ask(ctx, text, mode).await?,
        Commands::List {
            title,
            kind,
            year_from,
            year_to,
            genre,
            min_rating,
            unwatched,
            limit,
        } => {
            let filter = crate::repository::EntryFilter {
                title: title.clone(),
                kind: *kind,
                year_from: *year_from,
                year_to: *year_to,
                watched: unwatched.then_some(false),
                genre: genre.clone(),
                min_rating: *min_rating,
                limit: Some(*limit),
            };
            handlers::catalog::list_entries(ctx, &filter, mode).await?
        }
        Commands::Watchlist { command } => match command {
            None | Some(WatchlistCommands::List) => {
                handlers::catalog::list_watchlist(ctx, mode).await?
            }
            Some(WatchlistCommands::Add {
                title,
                kind,
                priority,
            }) => handlers::catalog::add_to_watchlist(ctx, title, *kind, *priority, mode).await?,
            Some(WatchlistCommands::Remove { id }) => {
                handlers::catalog::remove_from_watchlist(ctx, id, mode).await?
            }
            Some(WatchlistCommands::Promote {
                id,
                rating,
                watched_on,
            }) => {
                handlers::catalog::promote(ctx, id, *rating, watched_on.as_deref(), mode).await?
            }
        },
        Commands::Lookup {
            title,
            year,
            imdb_id,
        } => handlers::catalog::lookup(ctx, title, *year, imdb_id.as_deref(), mode).await?,
        Commands::Memory(cmd) => match cmd {
            MemoryCommands::List => handlers::memory::list(ctx, mode).await?,
            MemoryCommands::Add { text } => handlers::memory::add(ctx, text, mode).await?,
            MemoryCommands::Forget { id } => handlers::memory::forget(ctx, id, mode).await?,
        },
        Commands::Tools => handlers::utility::handle_tools(ctx, mode),
        Commands::Completions { shell } => handlers::utility::handle_completions(*shell),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_watchlist_defaults_to_list() {
        let cli = Cli::try_parse_from(["cinelog", "watchlist"]).unwrap();
        assert!(matches!(cli.command, Commands::Watchlist { command: None }));
    }

    #[test]
    fn test_kind_flag_parses() {
        let cli = Cli::try_parse_from(["cinelog", "list", "--kind", "tv", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::List { kind, .. } => assert_eq!(kind, Some(MediaKind::Series)),
            _ => panic!("expected list"),
        }
    }
}
