//! The per-session coaching aggregate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::identity::{Identity, UserProfile};
use crate::state::CoachingState;

/// Session-scoped facts the workflow reads and actions write.
///
/// Known fields are typed. `extra` carries user facts saved through
/// `SAVE_USER_INFO` and any keys written by newer clients.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default)]
    pub introduction_completed: bool,
    #[serde(default)]
    pub draft_identities: Vec<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_identity: Option<String>,
    #[serde(default)]
    pub current_identity_visualized: bool,
    #[serde(default)]
    pub action_items: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SessionMetadata {
    /// Typed field names; `extra` must not shadow them.
    pub const RESERVED_KEYS: [&'static str; 5] = [
        "introduction_completed",
        "draft_identities",
        "focus_identity",
        "current_identity_visualized",
        "action_items",
    ];

    pub fn find_draft(&self, name: &str) -> Option<&Identity> {
        self.draft_identities.iter().find(|i| i.has_name(name))
    }

    /// Clear the progress flags of one pass through the workflow.
    ///
    /// `introduction_completed` and `extra` survive; everything a later
    /// state's entry condition reads is reset.
    pub fn reset_cycle(&mut self) {
        self.draft_identities.clear();
        self.focus_identity = None;
        self.current_identity_visualized = false;
        self.action_items.clear();
    }
}

/// Everything the engine knows about one (user, session) conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachContext {
    pub user_id: String,
    pub session_id: String,
    pub current_state: CoachingState,
    /// Recent messages only; older ones are folded into the summary.
    pub conversation_history: Vec<ChatMessage>,
    /// Append-only digest of facts extracted from folded messages.
    pub consolidated_summary: Option<String>,
    pub user_profile: Option<UserProfile>,
    pub metadata: SessionMetadata,
}

impl CoachContext {
    /// A fresh session at the start of the workflow.
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            current_state: CoachingState::Introduction,
            conversation_history: Vec::new(),
            consolidated_summary: None,
            user_profile: None,
            metadata: SessionMetadata::default(),
        }
    }

    /// Refined identities on the profile, empty when there is no profile yet.
    pub fn refined_identities(&self) -> &[Identity] {
        self.user_profile
            .as_ref()
            .map(|p| p.identities.as_slice())
            .unwrap_or(&[])
    }

    /// The profile, created empty on first access.
    pub fn profile_mut(&mut self) -> &mut UserProfile {
        let user_id = self.user_id.clone();
        self.user_profile
            .get_or_insert_with(|| UserProfile::new(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityCategory;

    #[test]
    fn test_new_context_starts_at_introduction() {
        let ctx = CoachContext::new("u1", "s1");
        assert_eq!(ctx.current_state, CoachingState::Introduction);
        assert!(ctx.conversation_history.is_empty());
        assert!(ctx.consolidated_summary.is_none());
        assert!(ctx.refined_identities().is_empty());
    }

    #[test]
    fn test_metadata_extra_is_flattened() {
        let mut meta = SessionMetadata::default();
        meta.extra
            .insert("name".to_string(), serde_json::json!("Ada"));
        meta.introduction_completed = true;

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["introduction_completed"], true);

        let back: SessionMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_metadata_tolerates_missing_fields() {
        let meta: SessionMetadata = serde_json::from_str("{}").unwrap();
        assert!(!meta.introduction_completed);
        assert!(meta.draft_identities.is_empty());
        assert!(meta.extra.is_empty());
    }

    #[test]
    fn test_reset_cycle_keeps_introduction_and_facts() {
        let mut meta = SessionMetadata {
            introduction_completed: true,
            focus_identity: Some("Builder".to_string()),
            current_identity_visualized: true,
            action_items: vec!["Ship it".to_string()],
            ..SessionMetadata::default()
        };
        meta.extra
            .insert("name".to_string(), serde_json::json!("Ada"));

        meta.reset_cycle();

        assert!(meta.introduction_completed);
        assert!(meta.focus_identity.is_none());
        assert!(!meta.current_identity_visualized);
        assert!(meta.action_items.is_empty());
        assert_eq!(meta.extra["name"], "Ada");
    }

    #[test]
    fn test_profile_mut_creates_profile_once() {
        let mut ctx = CoachContext::new("u1", "s1");
        ctx.profile_mut().identities.push(Identity::new(
            IdentityCategory::Spiritual,
            "Seeker",
            "I am a seeker",
        ));
        ctx.profile_mut();
        assert_eq!(ctx.refined_identities().len(), 1);
        assert_eq!(ctx.user_profile.as_ref().unwrap().user_id, "u1");
    }
}
