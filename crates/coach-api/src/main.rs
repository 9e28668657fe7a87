//! Identity coach CLI entry point.
//!
//! Binary name: `coach`
//!
//! Parses CLI arguments, sets up tracing, wires the engine, then dispatches
//! to the command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands, PromptsCommand, SessionCommand};
use coach_infra::config::{load_config, resolve_data_dir, resolve_prompts_dir};
use coach_observe::{LogFormat, init_tracing, shutdown_tracing};
use state::{AppState, LlmAccess};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    if let Err(e) = init_tracing(cli.log_directive(), format, cli.otel) {
        eprintln!("Warning: tracing setup failed: {e}");
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Chat { user, session } => {
            let state = AppState::init(LlmAccess::Required).await?;
            cli::chat::run_chat(&state, &user, &session, cli.verbose > 0).await?;
        }

        Commands::Prompts { action } => match action {
            PromptsCommand::Check { dir } => {
                let dir = match dir {
                    Some(dir) => dir,
                    None => {
                        let data_dir = resolve_data_dir();
                        let config = load_config(&data_dir).await;
                        resolve_prompts_dir(&config, &data_dir)
                    }
                };
                cli::prompts::check_prompts(&dir, cli.json)?;
            }
        },

        Commands::Session { action } => {
            let state = AppState::init(LlmAccess::NotNeeded).await?;
            match action {
                SessionCommand::Show { user, session } => {
                    cli::session::show_session(&state, &user, &session, cli.json).await?;
                }
                SessionCommand::List { user } => {
                    cli::session::list_sessions(&state, &user, cli.json).await?;
                }
                SessionCommand::Reset { user, session } => {
                    cli::session::reset_session(&state, &user, &session, cli.json).await?;
                }
            }
        }
    }

    Ok(())
}
