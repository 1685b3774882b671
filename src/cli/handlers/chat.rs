//! Chat REPL and one-shot questions.

use anyhow::Result;
use colored::Colorize;
use indicatif::ProgressBar;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::chat::{SessionHandle, TurnEvent, TurnReply, TurnState};
use crate::cli::output::{
    output_json, print_error, print_header, print_hint, print_success, spinner, truncate,
    OutputMode,
};
use crate::init::AppContext;

/// Show tool activity on the spinner until the turn finishes.
async fn follow_events(handle: SessionHandle, progress: ProgressBar) {
    let mut events = handle.subscribe();
    loop {
        match events.recv().await {
            Ok(TurnEvent::StateChanged(TurnState::Planning)) => {
                progress.set_message("thinking...");
            }
            Ok(TurnEvent::ToolStarted { name, .. }) => {
                progress.set_message(format!("running {}...", name));
            }
            Ok(TurnEvent::ToolFinished {
                name,
                success,
                error_code,
                ..
            }) => {
                let line = if success {
                    format!("  {} {}", "✓".green(), name.dimmed())
                } else {
                    format!(
                        "  {} {} {}",
                        "✗".red(),
                        name.dimmed(),
                        error_code.unwrap_or_default().red()
                    )
                };
                progress.println(line);
            }
            Ok(TurnEvent::Finished { .. }) | Err(RecvError::Closed) => break,
            Ok(_) | Err(RecvError::Lagged(_)) => {}
        }
    }
}

/// Send one message, showing progress. Ctrl-C cancels the running turn.
async fn run_turn(handle: &SessionHandle, text: &str, mode: OutputMode) -> Result<TurnReply> {
    let progress = spinner(mode, "thinking...");
    let indicator = tokio::spawn(follow_events(handle.clone(), progress.clone()));

    let mut turn = tokio::spawn({
        let handle = handle.clone();
        let text = text.to_string();
        async move { handle.send_user_message(text).await }
    });

    let reply = loop {
        tokio::select! {
            joined = &mut turn => break joined??,
            _ = tokio::signal::ctrl_c() => {
                progress.set_message("cancelling...");
                handle.cancel();
            }
        }
    };

    indicator.abort();
    progress.finish_and_clear();
    Ok(reply)
}

fn print_reply(reply: &TurnReply, mode: OutputMode) {
    if mode == OutputMode::Json {
        output_json(reply);
        return;
    }
    match reply.state {
        TurnState::Failed => print_error(&reply.text),
        _ => println!("\n{}\n", reply.text),
    }
}

pub async fn handle_ask(ctx: &AppContext, text: &str, mode: OutputMode) -> Result<()> {
    let service = ctx.chat_service()?;
    let handle = service.open_session(Some(ctx.system_prompt().await?));
    let reply = run_turn(&handle, text, mode).await?;
    print_reply(&reply, mode);
    handle.close().await?;
    Ok(())
}

pub async fn handle_chat(ctx: &AppContext, mode: OutputMode) -> Result<()> {
    let service = ctx.chat_service()?;
    let handle = service.open_session(Some(ctx.system_prompt().await?));

    if mode == OutputMode::Human {
        print_header("cinelog chat");
        print_hint("Ask about your catalog. /history shows the conversation, /reset starts over, /quit leaves.");
        if !ctx.metadata.is_available() {
            print_hint("No OMDb API key configured: the assistant cannot look up public metadata.");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if mode == OutputMode::Human {
            print!("{} ", ">".cyan().bold());
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                handle.reset().await?;
                print_success("Conversation cleared");
            }
            "/history" => {
                let history = handle.get_history().await?;
                if mode == OutputMode::Json {
                    output_json(&history);
                    continue;
                }
                for msg in history {
                    let content = if msg.tools.is_empty() {
                        truncate(&msg.content, 200)
                    } else {
                        format!("[calls {}]", msg.tools.join(", "))
                    };
                    println!("{} {}", format!("{:>9}", msg.role.as_str()).dimmed(), content);
                }
            }
            text => {
                let reply = run_turn(&handle, text, mode).await?;
                print_reply(&reply, mode);
            }
        }
    }

    if let Some(path) = handle.close().await? {
        print_hint(&format!("Transcript saved to {}", path.display()));
    }
    Ok(())
}
