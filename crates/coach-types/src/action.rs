//! Action protocol types.
//!
//! The LLM declares actions as a name plus an open JSON parameter object.
//! `ActionKind` is the closed, typed view the executor matches on; names
//! this build does not know decode to `ActionKind::Unrecognized`.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::IdentityCategory;
use crate::state::CoachingState;

pub const MARK_INTRODUCTION_COMPLETE: &str = "MARK_INTRODUCTION_COMPLETE";
pub const SAVE_USER_INFO: &str = "SAVE_USER_INFO";
pub const ADD_DRAFT_IDENTITY: &str = "ADD_DRAFT_IDENTITY";
pub const UPDATE_IDENTITY: &str = "UPDATE_IDENTITY";
pub const ACCEPT_IDENTITY: &str = "ACCEPT_IDENTITY";
pub const ADD_IDENTITY_NOTE: &str = "ADD_IDENTITY_NOTE";
pub const REFINE_IDENTITY: &str = "REFINE_IDENTITY";
pub const SELECT_IDENTITY_FOCUS: &str = "SELECT_IDENTITY_FOCUS";
pub const VISUALIZE_IDENTITY: &str = "VISUALIZE_IDENTITY";
pub const ADD_ACTION_ITEM: &str = "ADD_ACTION_ITEM";
pub const TRANSITION_STATE: &str = "TRANSITION_STATE";

/// Every action name with a handler.
pub const KNOWN_ACTIONS: [&str; 11] = [
    MARK_INTRODUCTION_COMPLETE,
    SAVE_USER_INFO,
    ADD_DRAFT_IDENTITY,
    UPDATE_IDENTITY,
    ACCEPT_IDENTITY,
    ADD_IDENTITY_NOTE,
    REFINE_IDENTITY,
    SELECT_IDENTITY_FOCUS,
    VISUALIZE_IDENTITY,
    ADD_ACTION_ITEM,
    TRANSITION_STATE,
];

/// An action as declared by the LLM, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Action {
    /// Upper snake case action name, e.g. `ADD_DRAFT_IDENTITY`.
    pub name: String,
    /// Action parameters.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl Action {
    pub fn new(name: impl Into<String>, params: serde_json::Value) -> Self {
        let params = match params {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Self {
            name: name.into(),
            params,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Outcome of executing one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: String,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ActionResult {
    pub fn ok(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn rejected(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Structured coach reply: the user-facing message plus declared actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoachReply {
    /// Message shown to the user.
    pub message: String,
    /// Actions to apply to the session.
    #[serde(default)]
    pub actions: Vec<Action>,
}

// ---------------------------------------------------------------------------
// Typed payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaveUserInfo {
    pub key: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddDraftIdentity {
    pub name: String,
    pub category: IdentityCategory,
    pub affirmation: String,
}

/// Revise the affirmation of a draft or refined identity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateIdentity {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AcceptIdentity {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddIdentityNote {
    pub name: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefineIdentity {
    pub name: String,
    #[serde(default)]
    pub affirmation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectIdentityFocus {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VisualizeIdentity {
    #[serde(default)]
    pub name: Option<String>,
    pub setting: String,
    pub appearance: String,
    pub energy: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddActionItem {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransitionState {
    pub target_state: CoachingState,
}

/// Validated action with typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    MarkIntroductionComplete,
    SaveUserInfo(SaveUserInfo),
    AddDraftIdentity(AddDraftIdentity),
    UpdateIdentity(UpdateIdentity),
    AcceptIdentity(AcceptIdentity),
    AddIdentityNote(AddIdentityNote),
    RefineIdentity(RefineIdentity),
    SelectIdentityFocus(SelectIdentityFocus),
    VisualizeIdentity(VisualizeIdentity),
    AddActionItem(AddActionItem),
    TransitionState(TransitionState),
    /// A well-formed action whose name has no handler.
    Unrecognized(String),
}

impl ActionKind {
    /// Decode an untrusted action into its typed form.
    ///
    /// Returns `Err` with a human-readable reason when a known action is
    /// missing parameters or carries values of the wrong shape.
    pub fn decode(action: &Action) -> Result<Self, String> {
        let kind = match action.name.as_str() {
            MARK_INTRODUCTION_COMPLETE => ActionKind::MarkIntroductionComplete,
            SAVE_USER_INFO => ActionKind::SaveUserInfo(params(action)?),
            ADD_DRAFT_IDENTITY => ActionKind::AddDraftIdentity(params(action)?),
            UPDATE_IDENTITY => ActionKind::UpdateIdentity(params(action)?),
            ACCEPT_IDENTITY => ActionKind::AcceptIdentity(params(action)?),
            ADD_IDENTITY_NOTE => ActionKind::AddIdentityNote(params(action)?),
            REFINE_IDENTITY => ActionKind::RefineIdentity(params(action)?),
            SELECT_IDENTITY_FOCUS => ActionKind::SelectIdentityFocus(params(action)?),
            VISUALIZE_IDENTITY => ActionKind::VisualizeIdentity(params(action)?),
            ADD_ACTION_ITEM => ActionKind::AddActionItem(params(action)?),
            TRANSITION_STATE => ActionKind::TransitionState(params(action)?),
            other => ActionKind::Unrecognized(other.to_string()),
        };
        Ok(kind)
    }
}

fn params<T: DeserializeOwned>(action: &Action) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::Object(action.params.clone()))
        .map_err(|e| format!("Missing or invalid parameters for {}: {e}", action.name))
}
