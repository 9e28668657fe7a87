//! Interactive coaching loop on stdin.
//!
//! Each line is one turn. Lines starting with `/` are local commands and
//! never reach the model.

use std::io::Write as _;

use anyhow::Result;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use coach_core::service::TurnOutcome;

use crate::state::AppState;

/// Local commands available in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    Help,
    Exit,
    /// Show where the session stands.
    Status,
    /// Re-read prompt templates from disk.
    Reload,
    Unknown(String),
}

/// Parse user input as a slash command. `None` for ordinary messages.
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let cmd = trimmed
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    match cmd.as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        "/status" | "/state" => Some(ChatCommand::Status),
        "/reload" => Some(ChatCommand::Reload),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

fn print_help() {
    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    println!("  {}    Show this help message", style("/help").cyan());
    println!("  {}  Show state, identities and action items", style("/status").cyan());
    println!("  {}  Reload prompt templates", style("/reload").cyan());
    println!("  {}    End the conversation", style("/exit").cyan());
    println!();
    println!("  {}", style("Ctrl+D to exit").dim());
    println!();
}

fn print_banner(user: &str, session: &str, model: &str) {
    println!();
    println!(
        "  {} Identity coach for {}",
        style("◆").cyan().bold(),
        style(user).cyan().bold()
    );
    println!();
    println!("  {} {}", style("Model:").bold(), style(model).dim());
    println!("  {} {}", style("Session:").bold(), style(session).dim());
    println!();
    println!("  {}", style("Type /help for commands, Ctrl+D to exit").dim());
    println!("  {}", style("---").dim());
    println!();
}

fn print_outcome(outcome: &TurnOutcome, verbose: bool) {
    println!();
    println!("{} {}", style("Coach:").magenta().bold(), outcome.message);

    if verbose {
        for result in &outcome.action_results {
            let mark = if result.success {
                style("✓").green()
            } else {
                style("✗").red()
            };
            println!(
                "  {mark} {} {}",
                style(&result.action).dim(),
                style(&result.message).dim()
            );
        }
    }
    if outcome.state_changed() {
        println!(
            "  {} {} → {}",
            style("state").dim(),
            style(outcome.previous_state).dim(),
            style(outcome.state).yellow()
        );
    }
    println!();
}

/// Run the loop until `/exit` or end of input.
pub async fn run_chat(state: &AppState, user: &str, session: &str, verbose: bool) -> Result<()> {
    let service = &state.service;
    let current = service.session(user, session).await?;

    print_banner(user, session, &state.config.model);
    if !current.conversation_history.is_empty() {
        println!(
            "  {} Resuming at {} ({} messages)",
            style("i").blue().bold(),
            style(current.current_state).yellow(),
            current.conversation_history.len()
        );
        println!();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style("You:").green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        match parse_command(text) {
            Some(ChatCommand::Exit) => break,
            Some(ChatCommand::Help) => print_help(),
            Some(ChatCommand::Status) => {
                let ctx = service.session(user, session).await?;
                super::session::print_session(&ctx);
            }
            Some(ChatCommand::Reload) => match service.reload_prompts() {
                Ok(()) => println!("  {} Prompts reloaded\n", style("✓").green()),
                Err(e) => println!("  {} {e}\n", style("✗").red()),
            },
            Some(ChatCommand::Unknown(cmd)) => {
                println!(
                    "  {} Unknown command '{cmd}'. Type /help for commands.\n",
                    style("?").yellow()
                );
            }
            None => match service.process_message(user, session, text).await {
                Ok(outcome) => print_outcome(&outcome, verbose),
                Err(e) => {
                    tracing::error!(error = %e, "turn failed");
                    println!();
                    println!("{} {}", style("Coach:").magenta().bold(), style(e.user_message()).red());
                    println!();
                }
            },
        }
    }

    println!("  {}", style("Goodbye!").dim());
    Ok(())
}
