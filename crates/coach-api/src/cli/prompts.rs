//! `coach prompts check`: validate the template directory.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use coach_core::prompt::PromptManager;
use coach_types::state::CoachingState;

/// Load every state template from `dir` and print a summary table.
///
/// Fails (non-zero exit) if any template is missing or malformed.
pub fn check_prompts(dir: &Path, json: bool) -> Result<()> {
    let manager = PromptManager::load(dir)
        .with_context(|| format!("prompt templates in {} are invalid", dir.display()))?;

    let rows: Vec<_> = CoachingState::ALL
        .into_iter()
        .filter_map(|state| manager.template(state))
        .collect();

    if json {
        let summary: Vec<_> = rows
            .iter()
            .map(|t| {
                serde_json::json!({
                    "state": t.state,
                    "required_context_keys": t.required_context_keys,
                    "allowed_actions": t.allowed_actions,
                    "examples": t.examples.len(),
                    "counter_examples": t.counter_examples.len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("State").fg(Color::White),
        Cell::new("Required keys").fg(Color::White),
        Cell::new("Allowed actions").fg(Color::White),
        Cell::new("Examples").fg(Color::White),
    ]);

    for t in &rows {
        let actions = t
            .allowed_actions
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            Cell::new(t.state.to_string()).fg(Color::Cyan),
            Cell::new(t.required_context_keys.join("\n")).fg(Color::White),
            Cell::new(actions).fg(Color::Yellow),
            Cell::new(format!("{} / {}", t.examples.len(), t.counter_examples.len()))
                .fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!(
        "  {} Templates in {}",
        style("✓").green().bold(),
        style(dir.display()).cyan()
    );
    println!();
    println!("{table}");
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_prompts(&dir.path().join("nope"), true).unwrap_err();
        assert!(err.to_string().contains("invalid"));
    }

    #[test]
    fn test_shipped_prompts_are_valid() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../prompts");
        check_prompts(&dir, true).unwrap();
    }
}
