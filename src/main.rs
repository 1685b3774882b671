//! cinelog - personal movie and series catalog with a conversational assistant
//!
//! Usage:
//!   cinelog chat                     Interactive chat about your catalog
//!   cinelog ask "what did I rate Dune?"
//!   cinelog list --kind series       List catalog entries
//!   cinelog watchlist add "Heat"     Put a title on the watchlist
//!   cinelog --help                   Show all commands

use anyhow::Result;
use clap::Parser;

use cinelog::cli::handlers::utility::handle_completions;
use cinelog::cli::output::OutputMode;
use cinelog::cli::{Cli, Commands};
use cinelog::init::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tracing to stderr so stdout stays clean for --json
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cinelog=info".parse()?),
        )
        .init();

    let mode = OutputMode::from_json_flag(cli.json);

    match &cli.command {
        Commands::Completions { shell } => handle_completions(*shell),
        cmd => {
            let ctx = AppContext::new(cli.data_path.clone()).await?;
            cinelog::cli::execute(cmd, &ctx, mode).await?;
        }
    }

    Ok(())
}
