//! Identity and user profile types.
//!
//! An identity is an "I am..." statement anchored in one of nine life
//! categories. Drafts live in session metadata; refined identities live on
//! the `UserProfile`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Life area an identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityCategory {
    PassionsAndTalents,
    MakerOfMoney,
    KeeperOfMoney,
    Spiritual,
    PersonalAppearance,
    PhysicalExpression,
    FamilialRelations,
    RomanticRelation,
    DoerOfThings,
}

impl IdentityCategory {
    pub const ALL: [IdentityCategory; 9] = [
        IdentityCategory::PassionsAndTalents,
        IdentityCategory::MakerOfMoney,
        IdentityCategory::KeeperOfMoney,
        IdentityCategory::Spiritual,
        IdentityCategory::PersonalAppearance,
        IdentityCategory::PhysicalExpression,
        IdentityCategory::FamilialRelations,
        IdentityCategory::RomanticRelation,
        IdentityCategory::DoerOfThings,
    ];

    /// Wire value (snake_case).
    pub fn as_str(self) -> &'static str {
        match self {
            IdentityCategory::PassionsAndTalents => "passions_and_talents",
            IdentityCategory::MakerOfMoney => "maker_of_money",
            IdentityCategory::KeeperOfMoney => "keeper_of_money",
            IdentityCategory::Spiritual => "spiritual",
            IdentityCategory::PersonalAppearance => "personal_appearance",
            IdentityCategory::PhysicalExpression => "physical_expression",
            IdentityCategory::FamilialRelations => "familial_relations",
            IdentityCategory::RomanticRelation => "romantic_relation",
            IdentityCategory::DoerOfThings => "doer_of_things",
        }
    }

    /// Human-readable label used when rendering prompts.
    pub fn label(self) -> &'static str {
        match self {
            IdentityCategory::PassionsAndTalents => "Passions & Talents",
            IdentityCategory::MakerOfMoney => "Maker of Money",
            IdentityCategory::KeeperOfMoney => "Keeper of Money",
            IdentityCategory::Spiritual => "Spiritual",
            IdentityCategory::PersonalAppearance => "Personal Appearance",
            IdentityCategory::PhysicalExpression => "Physical Expression",
            IdentityCategory::FamilialRelations => "Familial Relations",
            IdentityCategory::RomanticRelation => "Romantic Relation",
            IdentityCategory::DoerOfThings => "Doer of Things",
        }
    }
}

impl fmt::Display for IdentityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        IdentityCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("invalid identity category: '{s}'"))
    }
}

/// Sensory anchors for imagining an identity already lived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visualization {
    pub setting: String,
    pub appearance: String,
    pub energy: String,
}

/// Where an identity is in its lifecycle.
///
/// Drafts start `Proposed`, may be `Accepted` by the client during
/// brainstorming, and become `RefinementComplete` once promoted onto the
/// profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityState {
    #[default]
    Proposed,
    Accepted,
    RefinementComplete,
}

impl IdentityState {
    pub fn as_str(self) -> &'static str {
        match self {
            IdentityState::Proposed => "proposed",
            IdentityState::Accepted => "accepted",
            IdentityState::RefinementComplete => "refinement_complete",
        }
    }
}

impl fmt::Display for IdentityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An "I am..." identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub category: IdentityCategory,
    pub name: String,
    pub affirmation: String,
    #[serde(default)]
    pub state: IdentityState,
    /// Free-form coaching notes, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Visualization>,
}

impl Identity {
    /// A freshly proposed identity with no notes or visualization.
    pub fn new(
        category: IdentityCategory,
        name: impl Into<String>,
        affirmation: impl Into<String>,
    ) -> Self {
        Self {
            category,
            name: name.into(),
            affirmation: affirmation.into(),
            state: IdentityState::Proposed,
            notes: Vec::new(),
            visualization: None,
        }
    }

    /// Case-insensitive name comparison used for de-duplication.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(name.trim())
    }
}

/// Durable profile of refined identities for a user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    /// Refined identities, unique by name.
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_focus: Option<IdentityCategory>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            identities: Vec::new(),
            current_focus: None,
        }
    }

    pub fn find_identity(&self, name: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.has_name(name))
    }

    pub fn find_identity_mut(&mut self, name: &str) -> Option<&mut Identity> {
        self.identities.iter_mut().find(|i| i.has_name(name))
    }
}
