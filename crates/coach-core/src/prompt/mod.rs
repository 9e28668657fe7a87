//! Per-state prompt assembly.
//!
//! `PromptManager` owns the parsed templates for every coaching state and
//! renders them against a session's prompt view. It holds no per-session
//! data. `reload()` swaps the whole template set at once.

pub mod loader;
pub mod view;

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use handlebars::{Handlebars, RenderErrorReason};

use coach_types::context::CoachContext;
use coach_types::error::PromptError;
use coach_types::state::CoachingState;

use loader::{Example, StateTemplate};

/// Parsed templates plus the registry they are compiled into.
#[derive(Debug)]
struct TemplateSet {
    templates: HashMap<CoachingState, StateTemplate>,
    registry: Handlebars<'static>,
}

impl TemplateSet {
    fn build(templates: impl IntoIterator<Item = StateTemplate>) -> Result<Self, PromptError> {
        let mut registry = Handlebars::new();
        // A placeholder with no value in the view is an error, never "".
        registry.set_strict_mode(true);
        // Prompts are plain text.
        registry.register_escape_fn(handlebars::no_escape);

        let mut by_state = HashMap::new();
        for template in templates {
            let state = template.state;
            registry
                .register_template_string(state.as_str(), &template.body)
                .map_err(|e| PromptError::InvalidTemplate {
                    state,
                    reason: e.to_string(),
                })?;
            by_state.insert(state, template);
        }
        Ok(Self {
            templates: by_state,
            registry,
        })
    }
}

pub struct PromptManager {
    dir: Option<PathBuf>,
    templates: RwLock<Arc<TemplateSet>>,
}

impl PromptManager {
    /// Load templates for every state from `dir`. Any missing or malformed
    /// template fails the whole load.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, PromptError> {
        let dir = dir.into();
        let templates = load_all(&dir)?;
        Ok(Self {
            dir: Some(dir),
            templates: RwLock::new(Arc::new(templates)),
        })
    }

    /// Build from already-parsed templates. `reload()` is a no-op.
    pub fn from_templates(
        templates: impl IntoIterator<Item = StateTemplate>,
    ) -> Result<Self, PromptError> {
        Ok(Self {
            dir: None,
            templates: RwLock::new(Arc::new(TemplateSet::build(templates)?)),
        })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Re-read every template. On failure the current set stays active.
    pub fn reload(&self) -> Result<(), PromptError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let fresh = Arc::new(load_all(dir)?);
        let mut guard = self.templates.write().unwrap_or_else(|e| e.into_inner());
        *guard = fresh;
        tracing::info!(dir = %dir.display(), "prompt templates reloaded");
        Ok(())
    }

    fn snapshot(&self) -> Arc<TemplateSet> {
        Arc::clone(&self.templates.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Parsed template for a state, if loaded.
    pub fn template(&self, state: CoachingState) -> Option<StateTemplate> {
        self.snapshot().templates.get(&state).cloned()
    }

    /// Actions the LLM may perform while `state` is active.
    pub fn get_allowed_actions(&self, state: CoachingState) -> BTreeSet<String> {
        self.snapshot()
            .templates
            .get(&state)
            .map(|t| t.allowed_actions.clone())
            .unwrap_or_default()
    }

    /// Render the system prompt for the session's current position.
    pub fn get_prompt(
        &self,
        state: CoachingState,
        ctx: &CoachContext,
    ) -> Result<String, PromptError> {
        let set = self.snapshot();
        let template = set
            .templates
            .get(&state)
            .ok_or_else(|| PromptError::TemplateNotFound {
                state,
                path: self
                    .dir
                    .as_ref()
                    .map(|d| d.join("states").join(format!("{state}.md")).display().to_string())
                    .unwrap_or_else(|| "<in-memory>".to_string()),
            })?;

        let view = view::prompt_view(ctx);

        let missing: Vec<String> = template
            .required_context_keys
            .iter()
            .filter(|k| !view.contains_key(k.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PromptError::MissingContextKeys {
                state,
                keys: missing,
            });
        }

        let mut prompt = set
            .registry
            .render(state.as_str(), &view)
            .map_err(|e| match e.reason() {
                RenderErrorReason::MissingVariable(Some(key)) => PromptError::MissingContextKeys {
                    state,
                    keys: vec![key.clone()],
                },
                _ => PromptError::InvalidTemplate {
                    state,
                    reason: e.to_string(),
                },
            })?;

        if !template.examples.is_empty() {
            prompt.push_str("\n\n# Examples\n\n");
            push_examples(&mut prompt, &template.examples);
        }
        if !template.counter_examples.is_empty() {
            prompt.push_str("\n\n# Counter-Examples (Do Not Respond Like This)\n\n");
            push_examples(&mut prompt, &template.counter_examples);
        }
        Ok(prompt)
    }
}

fn load_all(dir: &Path) -> Result<TemplateSet, PromptError> {
    let templates = CoachingState::ALL
        .into_iter()
        .map(|state| loader::load_state_template(dir, state))
        .collect::<Result<Vec<_>, _>>()?;
    TemplateSet::build(templates)
}

fn push_examples(out: &mut String, examples: &[Example]) {
    for example in examples {
        let _ = write!(
            out,
            "## {}\n\nUser: {}\n\nCoach: {}\n\n",
            example.description, example.user, example.coach
        );
    }
}

impl std::fmt::Debug for PromptManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptManager")
            .field("dir", &self.dir)
            .field("states", &self.snapshot().templates.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loader::parse_state_template;

    fn write_prompts(dir: &Path, intro_body: &str) {
        std::fs::create_dir_all(dir.join("states")).unwrap();
        std::fs::create_dir_all(dir.join("examples")).unwrap();
        for state in CoachingState::ALL {
            let body = if state == CoachingState::Introduction {
                intro_body.to_string()
            } else {
                "---\nallowed_actions: [ADD_ACTION_ITEM]\n---\nState {{state}}".to_string()
            };
            std::fs::write(dir.join("states").join(format!("{state}.md")), body).unwrap();
        }
        std::fs::write(
            dir.join("examples/introduction_examples.md"),
            "# Examples\n## Greeting\nUser: Hi\nCoach: Hello!\n\n# Counter-Examples\n## Cold\nUser: Hi\nCoach: State your goal.\n",
        )
        .unwrap();
    }

    const INTRO: &str = "---\nrequired_context_keys: [user_summary, recent_messages]\nallowed_actions: [SAVE_USER_INFO, MARK_INTRODUCTION_COMPLETE]\n---\nSummary: {{user_summary}}\nConversation:\n{{recent_messages}}";

    #[test]
    fn test_get_prompt_renders_template_and_examples() {
        let dir = tempfile::tempdir().unwrap();
        write_prompts(dir.path(), INTRO);
        let manager = PromptManager::load(dir.path()).unwrap();

        let mut ctx = CoachContext::new("u1", "s1");
        ctx.consolidated_summary = Some("Name is Ada".to_string());
        let prompt = manager
            .get_prompt(CoachingState::Introduction, &ctx)
            .unwrap();

        assert!(prompt.starts_with("Summary: Name is Ada\nConversation:\n"));
        assert!(prompt.contains("\n\n# Examples\n\n## Greeting\n\nUser: Hi\n\nCoach: Hello!\n\n"));
        assert!(prompt.contains(
            "\n\n# Counter-Examples (Do Not Respond Like This)\n\n## Cold\n\nUser: Hi\n\nCoach: State your goal.\n\n"
        ));
    }

    #[test]
    fn test_missing_required_key_fails_fast() {
        let manager = PromptManager::from_templates([parse_state_template(
            CoachingState::Introduction,
            "---\nrequired_context_keys: [name]\n---\nHi {{name}}",
            None,
        )
        .unwrap()])
        .unwrap();

        let err = manager
            .get_prompt(CoachingState::Introduction, &CoachContext::new("u1", "s1"))
            .unwrap_err();
        match err {
            PromptError::MissingContextKeys { keys, .. } => assert_eq!(keys, vec!["name"]),
            other => panic!("unexpected error: {other:?}"),
        }

        let mut ctx = CoachContext::new("u1", "s1");
        ctx.metadata
            .extra
            .insert("name".to_string(), serde_json::json!("Ada"));
        assert_eq!(
            manager
                .get_prompt(CoachingState::Introduction, &ctx)
                .unwrap(),
            "Hi Ada"
        );
    }

    #[test]
    fn test_unsatisfied_placeholder_fails() {
        let manager = PromptManager::from_templates([parse_state_template(
            CoachingState::Introduction,
            "Hi {{nickname}}",
            None,
        )
        .unwrap()])
        .unwrap();
        let err = manager
            .get_prompt(CoachingState::Introduction, &CoachContext::new("u1", "s1"))
            .unwrap_err();
        assert!(matches!(err, PromptError::MissingContextKeys { .. }));
    }

    #[test]
    fn test_values_are_not_html_escaped() {
        let manager = PromptManager::from_templates([parse_state_template(
            CoachingState::Introduction,
            "Summary: {{user_summary}}",
            None,
        )
        .unwrap()])
        .unwrap();
        let mut ctx = CoachContext::new("u1", "s1");
        ctx.consolidated_summary = Some("Ada's goal: <ship> & rest".to_string());
        assert_eq!(
            manager
                .get_prompt(CoachingState::Introduction, &ctx)
                .unwrap(),
            "Summary: Ada's goal: <ship> & rest"
        );
    }

    #[test]
    fn test_allowed_actions_per_state() {
        let dir = tempfile::tempdir().unwrap();
        write_prompts(dir.path(), INTRO);
        let manager = PromptManager::load(dir.path()).unwrap();

        let intro = manager.get_allowed_actions(CoachingState::Introduction);
        assert!(intro.contains("MARK_INTRODUCTION_COMPLETE"));
        assert!(!intro.contains("ADD_ACTION_ITEM"));
        assert!(
            manager
                .get_allowed_actions(CoachingState::ActionPlanning)
                .contains("ADD_ACTION_ITEM")
        );
    }

    #[test]
    fn test_load_fails_when_a_state_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        write_prompts(dir.path(), INTRO);
        std::fs::remove_file(dir.path().join("states/accountability.md")).unwrap();
        let err = PromptManager::load(dir.path()).unwrap_err();
        assert!(matches!(err, PromptError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_reload_swaps_templates_and_keeps_old_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        write_prompts(dir.path(), INTRO);
        let manager = PromptManager::load(dir.path()).unwrap();

        std::fs::write(
            dir.path().join("states/introduction.md"),
            "---\nallowed_actions: [TRANSITION_STATE]\n---\nNew intro",
        )
        .unwrap();
        manager.reload().unwrap();
        assert!(
            manager
                .get_allowed_actions(CoachingState::Introduction)
                .contains("TRANSITION_STATE")
        );

        std::fs::write(dir.path().join("states/introduction.md"), "broken {{").unwrap();
        assert!(manager.reload().is_err());
        assert!(
            manager
                .get_allowed_actions(CoachingState::Introduction)
                .contains("TRANSITION_STATE")
        );
    }
}
