//! Template file parsing.
//!
//! Layout under the prompts directory:
//!
//! ```text
//! states/<state>.md              optional YAML frontmatter + handlebars body
//! examples/<state>_examples.md   "# Examples" / "# Counter-Examples" sections
//! ```
//!
//! Each example entry is a `## <description>` heading followed by a
//! `User:` block and a `Coach:` block; both may span several lines.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use coach_types::action::KNOWN_ACTIONS;
use coach_types::error::PromptError;
use coach_types::state::CoachingState;

/// Frontmatter keys recognised in a state template.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateMetadata {
    #[serde(default)]
    required_context_keys: Vec<String>,
    #[serde(default)]
    allowed_actions: Vec<String>,
}

/// One in-context demonstration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub description: String,
    pub user: String,
    pub coach: String,
}

/// A fully parsed state template.
#[derive(Debug, Clone)]
pub struct StateTemplate {
    pub state: CoachingState,
    /// Handlebars source, syntax-checked at parse time.
    pub body: String,
    pub required_context_keys: Vec<String>,
    pub allowed_actions: BTreeSet<String>,
    pub examples: Vec<Example>,
    pub counter_examples: Vec<Example>,
}

/// Split optional `---` frontmatter from the body.
///
/// Content without a leading `---` has no frontmatter. An opening delimiter
/// without a closing one is an error.
pub fn extract_frontmatter(content: &str) -> Result<(Option<&str>, &str), String> {
    if !content.starts_with("---") {
        return Ok((None, content));
    }

    let after_open = &content[3..];
    let after_open = after_open.strip_prefix('\n').unwrap_or(after_open);

    let closing_pos = after_open
        .find("\n---")
        .ok_or_else(|| "missing closing frontmatter delimiter '---'".to_string())?;

    let yaml_str = &after_open[..closing_pos];
    let remainder = &after_open[closing_pos + 4..];
    let body_str = remainder
        .strip_prefix('\n')
        .unwrap_or(remainder)
        .trim_start_matches('\n');

    Ok((Some(yaml_str), body_str))
}

/// Parse a state template and its optional examples file.
pub fn parse_state_template(
    state: CoachingState,
    content: &str,
    examples: Option<&str>,
) -> Result<StateTemplate, PromptError> {
    let invalid_metadata = |reason: String| PromptError::InvalidMetadata { state, reason };

    let (yaml, body) = extract_frontmatter(content).map_err(invalid_metadata)?;
    let metadata: TemplateMetadata = match yaml {
        Some(yaml) if !yaml.trim().is_empty() => {
            serde_yaml_ng::from_str(yaml).map_err(|e| invalid_metadata(e.to_string()))?
        }
        _ => TemplateMetadata::default(),
    };

    for action in &metadata.allowed_actions {
        if !KNOWN_ACTIONS.contains(&action.as_str()) {
            tracing::warn!(state = %state, action = %action, "template allows an action with no handler");
        }
    }

    let body = body.trim_end();
    handlebars::Template::compile(body).map_err(|e| PromptError::InvalidTemplate {
        state,
        reason: e.to_string(),
    })?;

    let (examples, counter_examples) = match examples {
        Some(text) => parse_examples(text)
            .map_err(|reason| PromptError::InvalidTemplate { state, reason })?,
        None => (Vec::new(), Vec::new()),
    };

    Ok(StateTemplate {
        state,
        body: body.to_string(),
        required_context_keys: metadata.required_context_keys,
        allowed_actions: metadata.allowed_actions.into_iter().collect(),
        examples,
        counter_examples,
    })
}

/// Load the template for one state from disk.
pub fn load_state_template(dir: &Path, state: CoachingState) -> Result<StateTemplate, PromptError> {
    let template_path = dir.join("states").join(format!("{state}.md"));
    if !template_path.exists() {
        return Err(PromptError::TemplateNotFound {
            state,
            path: template_path.display().to_string(),
        });
    }
    let content = read(&template_path)?;

    let examples_path = dir
        .join("examples")
        .join(format!("{state}_examples.md"));
    let examples = if examples_path.exists() {
        Some(read(&examples_path)?)
    } else {
        None
    };

    parse_state_template(state, &content, examples.as_deref())
}

fn read(path: &Path) -> Result<String, PromptError> {
    std::fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Examples,
    CounterExamples,
}

/// Parse an examples file into `(examples, counter_examples)`.
pub fn parse_examples(text: &str) -> Result<(Vec<Example>, Vec<Example>), String> {
    let mut examples = Vec::new();
    let mut counter_examples = Vec::new();
    let mut section = Section::None;
    let mut entry: Option<(String, Vec<&str>)> = None;

    let mut flush = |section: Section,
                     entry: Option<(String, Vec<&str>)>|
     -> Result<(), String> {
        let Some((description, lines)) = entry else {
            return Ok(());
        };
        let example = parse_entry(&description, &lines)?;
        match section {
            Section::Examples => examples.push(example),
            Section::CounterExamples => counter_examples.push(example),
            Section::None => {}
        }
        Ok(())
    };

    for line in text.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            flush(section, entry.take())?;
            if section == Section::None {
                return Err(format!(
                    "example '{}' appears before any '# Examples' or '# Counter-Examples' heading",
                    heading.trim()
                ));
            }
            entry = Some((heading.trim().to_string(), Vec::new()));
        } else if let Some(heading) = line.strip_prefix("# ") {
            flush(section, entry.take())?;
            section = if heading.trim().to_lowercase().starts_with("counter") {
                Section::CounterExamples
            } else if heading.trim().eq_ignore_ascii_case("examples") {
                Section::Examples
            } else {
                return Err(format!("unknown examples section '{}'", heading.trim()));
            };
        } else if let Some((_, lines)) = entry.as_mut() {
            lines.push(line);
        }
    }
    flush(section, entry.take())?;

    Ok((examples, counter_examples))
}

fn parse_entry(description: &str, lines: &[&str]) -> Result<Example, String> {
    let mut user: Option<Vec<&str>> = None;
    let mut coach: Option<Vec<&str>> = None;

    for line in lines {
        if let Some(rest) = line.strip_prefix("User:") {
            user = Some(vec![rest.trim_start()]);
        } else if let Some(rest) = line.strip_prefix("Coach:") {
            coach = Some(vec![rest.trim_start()]);
        } else if let Some(block) = coach.as_mut() {
            block.push(line);
        } else if let Some(block) = user.as_mut() {
            block.push(line);
        }
    }

    match (user, coach) {
        (Some(user), Some(coach)) => Ok(Example {
            description: description.to_string(),
            user: user.join("\n").trim().to_string(),
            coach: coach.join("\n").trim().to_string(),
        }),
        _ => Err(format!(
            "example '{description}' needs both a 'User:' and a 'Coach:' line"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "---\nrequired_context_keys:\n  - user_summary\nallowed_actions:\n  - SAVE_USER_INFO\n  - MARK_INTRODUCTION_COMPLETE\n---\n\nYou are a coach.\n\nSummary: {{user_summary}}\n";

    const EXAMPLES: &str = "# Examples\n\n## Warm welcome\nUser: Hi there\nCoach: Welcome! What should I call you?\n\n## Multi-line\nUser: I have\ntwo lines\nCoach: Thanks\nfor sharing\n\n# Counter-Examples\n\n## Too pushy\nUser: Hi\nCoach: Tell me your goals now.\n";

    #[test]
    fn test_extract_frontmatter() {
        let (yaml, body) = extract_frontmatter("---\na: 1\n---\nbody").unwrap();
        assert_eq!(yaml, Some("a: 1"));
        assert_eq!(body, "body");

        let (yaml, body) = extract_frontmatter("just body").unwrap();
        assert!(yaml.is_none());
        assert_eq!(body, "just body");

        assert!(extract_frontmatter("---\na: 1\nno close").is_err());
    }

    #[test]
    fn test_parse_state_template_with_examples() {
        let t = parse_state_template(CoachingState::Introduction, TEMPLATE, Some(EXAMPLES)).unwrap();
        assert_eq!(t.required_context_keys, vec!["user_summary"]);
        assert!(t.allowed_actions.contains("SAVE_USER_INFO"));
        assert_eq!(t.examples.len(), 2);
        assert_eq!(t.counter_examples.len(), 1);
        assert_eq!(t.examples[1].user, "I have\ntwo lines");
        assert_eq!(t.examples[1].coach, "Thanks\nfor sharing");
        assert_eq!(t.counter_examples[0].description, "Too pushy");
    }

    #[test]
    fn test_template_without_frontmatter_allows_nothing() {
        let t = parse_state_template(CoachingState::Accountability, "Check in.", None).unwrap();
        assert!(t.allowed_actions.is_empty());
        assert!(t.required_context_keys.is_empty());
    }

    #[test]
    fn test_malformed_frontmatter_is_error() {
        let err = parse_state_template(
            CoachingState::Introduction,
            "---\nrequired_context_keys: [unclosed\n---\nbody",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PromptError::InvalidMetadata { .. }));

        let err = parse_state_template(
            CoachingState::Introduction,
            "---\nallowed_action: []\n---\nbody",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PromptError::InvalidMetadata { .. }));
    }

    #[test]
    fn test_unknown_action_names_are_kept() {
        let t = parse_state_template(
            CoachingState::Introduction,
            "---\nallowed_actions: [FUTURE_ACTION]\n---\nbody",
            None,
        )
        .unwrap();
        assert!(t.allowed_actions.contains("FUTURE_ACTION"));
    }

    #[test]
    fn test_malformed_body_is_invalid_template() {
        let err = parse_state_template(CoachingState::Introduction, "Hi {{name", None).unwrap_err();
        assert!(matches!(err, PromptError::InvalidTemplate { .. }));

        // Single braces are plain text.
        let t = parse_state_template(CoachingState::Introduction, r#"Emit {"key": 1}"#, None).unwrap();
        assert_eq!(t.body, r#"Emit {"key": 1}"#);
    }

    #[test]
    fn test_example_without_coach_is_error() {
        assert!(parse_examples("# Examples\n## Broken\nUser: hi\n").is_err());
        assert!(parse_examples("## Orphan\nUser: a\nCoach: b\n").is_err());
    }

    #[test]
    fn test_load_missing_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_state_template(dir.path(), CoachingState::ActionPlanning).unwrap_err();
        assert!(matches!(err, PromptError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("states")).unwrap();
        std::fs::create_dir_all(dir.path().join("examples")).unwrap();
        std::fs::write(dir.path().join("states/introduction.md"), TEMPLATE).unwrap();
        std::fs::write(
            dir.path().join("examples/introduction_examples.md"),
            EXAMPLES,
        )
        .unwrap();

        let t = load_state_template(dir.path(), CoachingState::Introduction).unwrap();
        assert_eq!(t.examples.len(), 2);
    }
}
