//! CLI command definitions for the `coach` binary.
//!
//! Uses clap derive macros for argument parsing. The CLI follows a noun-verb
//! pattern (e.g., `coach session show`, `coach prompts check`).

pub mod chat;
pub mod prompts;
pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Guide a user through the identity coaching workflow.
#[derive(Parser)]
#[command(name = "coach", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v shows state changes and actions, -vv traces).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "COACH_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter for the verbosity flags; `RUST_LOG` overrides it.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,coach_core=debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive coaching conversation.
    Chat {
        /// User identifier.
        #[arg(long)]
        user: String,

        /// Session identifier. Reusing one resumes the conversation.
        #[arg(long)]
        session: String,
    },

    /// Inspect prompt templates.
    Prompts {
        #[command(subcommand)]
        action: PromptsCommand,
    },

    /// Inspect or reset sessions.
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },
}

#[derive(Subcommand)]
pub enum PromptsCommand {
    /// Load every state template and summarize it.
    Check {
        /// Template directory (defaults to `prompts_dir` from config).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Show a session's state, summary and identities.
    Show {
        #[arg(long)]
        user: String,
        #[arg(long)]
        session: String,
    },

    /// List a user's sessions.
    #[command(alias = "ls")]
    List {
        #[arg(long)]
        user: String,
    },

    /// Delete a session's state and conversation.
    Reset {
        #[arg(long)]
        user: String,
        #[arg(long)]
        session: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat() {
        let cli = Cli::try_parse_from(["coach", "chat", "--user", "u1", "--session", "s1"]).unwrap();
        match cli.command {
            Commands::Chat { user, session } => {
                assert_eq!(user, "u1");
                assert_eq!(session, "s1");
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_parse_session_show_json() {
        let cli = Cli::try_parse_from([
            "coach", "session", "show", "--user", "u1", "--session", "s1", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Session {
                action: SessionCommand::Show { .. }
            }
        ));
    }

    #[test]
    fn test_chat_requires_session() {
        assert!(Cli::try_parse_from(["coach", "chat", "--user", "u1"]).is_err());
    }

    #[test]
    fn test_log_directive() {
        let cli = Cli::try_parse_from(["coach", "-vv", "prompts", "check"]).unwrap();
        assert_eq!(cli.log_directive(), "trace");
        let cli = Cli::try_parse_from(["coach", "--quiet", "prompts", "check"]).unwrap();
        assert_eq!(cli.log_directive(), "error");
    }
}
