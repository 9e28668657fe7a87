//! Flattened, string-valued view of a session for template interpolation.

use std::collections::BTreeMap;

use coach_types::context::CoachContext;
use coach_types::identity::{Identity, IdentityState};

const NONE: &str = "None";

/// Core keys always present in a prompt view.
pub const CORE_KEYS: [&str; 9] = [
    "user_summary",
    "recent_messages",
    "identities",
    "draft_identities",
    "current_focus",
    "focus_identity",
    "action_items",
    "introduction_completed",
    "state",
];

/// Build the prompt view for a context.
///
/// Extra metadata entries are added last and never replace a core key.
pub fn prompt_view(ctx: &CoachContext) -> BTreeMap<String, String> {
    let mut view = BTreeMap::new();

    view.insert(
        "user_summary".to_string(),
        ctx.consolidated_summary
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| NONE.to_string()),
    );
    view.insert(
        "recent_messages".to_string(),
        ctx.conversation_history
            .iter()
            .map(|m| format!("{}: {}", m.role.label(), m.content))
            .collect::<Vec<_>>()
            .join("\n\n"),
    );
    view.insert(
        "identities".to_string(),
        format_identities(ctx.refined_identities()),
    );
    view.insert(
        "draft_identities".to_string(),
        format_identities(&ctx.metadata.draft_identities),
    );
    view.insert(
        "current_focus".to_string(),
        ctx.user_profile
            .as_ref()
            .and_then(|p| p.current_focus)
            .map(|c| c.label().to_string())
            .unwrap_or_else(|| NONE.to_string()),
    );
    view.insert(
        "focus_identity".to_string(),
        ctx.metadata
            .focus_identity
            .clone()
            .unwrap_or_else(|| NONE.to_string()),
    );
    view.insert(
        "action_items".to_string(),
        if ctx.metadata.action_items.is_empty() {
            NONE.to_string()
        } else {
            ctx.metadata
                .action_items
                .iter()
                .map(|item| format!("- {item}"))
                .collect::<Vec<_>>()
                .join("\n")
        },
    );
    view.insert(
        "introduction_completed".to_string(),
        ctx.metadata.introduction_completed.to_string(),
    );
    view.insert("state".to_string(), ctx.current_state.to_string());

    for (key, value) in &ctx.metadata.extra {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        view.entry(key.clone()).or_insert(rendered);
    }

    view
}

// Which list an identity sits in already tells proposed from refined apart;
// only acceptance needs a marker.
fn format_identities(identities: &[Identity]) -> String {
    if identities.is_empty() {
        return NONE.to_string();
    }
    identities
        .iter()
        .map(|i| {
            let mut line = format!("- {}: {}", i.category.label(), i.name);
            if i.state == IdentityState::Accepted {
                line.push_str(" (accepted)");
            }
            for note in &i.notes {
                line.push_str("\n  note: ");
                line.push_str(note);
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_types::chat::ChatMessage;
    use coach_types::identity::IdentityCategory;
    use serde_json::json;

    #[test]
    fn test_fresh_context_has_all_core_keys() {
        let view = prompt_view(&CoachContext::new("u1", "s1"));
        for key in CORE_KEYS {
            assert!(view.contains_key(key), "missing {key}");
        }
        assert_eq!(view["state"], "introduction");
        assert_eq!(view["current_focus"], "None");
        assert_eq!(view["introduction_completed"], "false");
    }

    #[test]
    fn test_messages_and_identities_are_formatted() {
        let mut ctx = CoachContext::new("u1", "s1");
        ctx.conversation_history.push(ChatMessage::user("Hi"));
        ctx.conversation_history
            .push(ChatMessage::assistant("Welcome"));
        ctx.profile_mut().identities.push(Identity::new(
            IdentityCategory::MakerOfMoney,
            "Abundant Creator",
            "I am an abundant creator",
        ));
        ctx.profile_mut().current_focus = Some(IdentityCategory::MakerOfMoney);

        let view = prompt_view(&ctx);
        assert_eq!(view["recent_messages"], "User: Hi\n\nAssistant: Welcome");
        assert_eq!(view["identities"], "- Maker of Money: Abundant Creator");
        assert_eq!(view["current_focus"], "Maker of Money");
    }

    #[test]
    fn test_drafts_show_acceptance_and_notes() {
        let mut ctx = CoachContext::new("u1", "s1");
        let mut accepted = Identity::new(IdentityCategory::DoerOfThings, "Finisher", "I finish");
        accepted.state = IdentityState::Accepted;
        accepted.notes.push("Ran a marathon in May".to_string());
        ctx.metadata.draft_identities.push(accepted);
        ctx.metadata.draft_identities.push(Identity::new(
            IdentityCategory::Spiritual,
            "Seeker",
            "I seek",
        ));

        let view = prompt_view(&ctx);
        assert_eq!(
            view["draft_identities"],
            "- Doer of Things: Finisher (accepted)\n  note: Ran a marathon in May\n- Spiritual: Seeker"
        );
    }

    #[test]
    fn test_extra_metadata_never_overrides_core_keys() {
        let mut ctx = CoachContext::new("u1", "s1");
        ctx.metadata
            .extra
            .insert("state".to_string(), json!("accountability"));
        ctx.metadata
            .extra
            .insert("name".to_string(), json!("Ada"));
        ctx.metadata
            .extra
            .insert("age".to_string(), json!(41));

        let view = prompt_view(&ctx);
        assert_eq!(view["state"], "introduction");
        assert_eq!(view["name"], "Ada");
        assert_eq!(view["age"], "41");
    }
}
