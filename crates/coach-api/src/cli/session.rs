//! Session inspection commands: show, list, reset.

use anyhow::Result;
use console::style;

use coach_types::config::StorageBackend;
use coach_types::context::CoachContext;

use crate::state::AppState;

/// Print where a session stands in the workflow.
pub async fn show_session(state: &AppState, user: &str, session: &str, json: bool) -> Result<()> {
    let ctx = state.service.session(user, session).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
        return Ok(());
    }

    warn_if_ephemeral(state);
    print_session(&ctx);
    Ok(())
}

pub async fn list_sessions(state: &AppState, user: &str, json: bool) -> Result<()> {
    let sessions = state.service.sessions_for_user(user).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    warn_if_ephemeral(state);
    println!();
    if sessions.is_empty() {
        println!(
            "  {} No sessions for '{}'. Start one with: {}",
            style("i").blue().bold(),
            style(user).cyan(),
            style(format!("coach chat --user {user} --session <id>")).yellow()
        );
    } else {
        println!("  Sessions for '{}'", style(user).cyan().bold());
        println!();
        for id in &sessions {
            println!("  - {id}");
        }
    }
    println!();
    Ok(())
}

/// Delete a session's state and conversation. Identities and user facts stay.
pub async fn reset_session(state: &AppState, user: &str, session: &str, json: bool) -> Result<()> {
    let existed = state.service.reset_session(user, session).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "user": user, "session": session, "deleted": existed })
        );
        return Ok(());
    }

    println!();
    if existed {
        println!(
            "  {} Session '{}' reset",
            style("✓").green().bold(),
            style(session).cyan()
        );
    } else {
        println!(
            "  {} Session '{}' does not exist",
            style("i").blue().bold(),
            style(session).cyan()
        );
    }
    println!();
    Ok(())
}

fn warn_if_ephemeral(state: &AppState) {
    if state.config.storage.backend == StorageBackend::InMemory {
        println!(
            "  {}",
            style("Storage backend is in_memory; sessions do not outlive a process.").dim()
        );
    }
}

pub(crate) fn print_session(ctx: &CoachContext) {
    println!();
    println!(
        "  {} {}  {} {}",
        style("Session:").bold(),
        style(&ctx.session_id).cyan(),
        style("State:").bold(),
        style(ctx.current_state).yellow()
    );
    println!(
        "  {} {}",
        style("Messages:").bold(),
        ctx.conversation_history.len()
    );
    if let Some(summary) = &ctx.consolidated_summary {
        println!();
        println!("  {}", style("Summary").bold());
        for line in summary.lines() {
            println!("    {}", style(line).dim());
        }
    }

    let meta = &ctx.metadata;
    if !meta.draft_identities.is_empty() {
        println!();
        println!("  {}", style("Draft identities").bold());
        for identity in &meta.draft_identities {
            println!(
                "    - {} ({}, {})",
                style(&identity.name).cyan(),
                identity.category.label(),
                style(identity.state).dim()
            );
        }
    }

    let refined = ctx.refined_identities();
    if !refined.is_empty() {
        println!();
        println!("  {}", style("Refined identities").bold());
        for identity in refined {
            let marker = if meta.focus_identity.as_deref() == Some(identity.name.as_str()) {
                style("*").yellow().to_string()
            } else {
                " ".to_string()
            };
            println!(
                "  {marker} {}: {}",
                style(&identity.name).cyan(),
                identity.affirmation
            );
        }
    }

    if !meta.action_items.is_empty() {
        println!();
        println!("  {}", style("Action items").bold());
        for item in &meta.action_items {
            println!("    - {item}");
        }
    }
    println!();
}
