//! Coaching workflow states and the transition vocabulary.
//!
//! The set of states is closed. Progression between them is table-driven
//! (see `coach_core::state_machine`); this module only names the pieces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A phase of the coaching dialogue.
///
/// Declaration order is the workflow order and defines what counts as a
/// "forward" move for manual transitions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CoachingState {
    #[default]
    Introduction,
    IdentityBrainstorming,
    IdentityRefinement,
    IdentityVisualization,
    ActionPlanning,
    Accountability,
}

impl CoachingState {
    /// All states in workflow order.
    pub const ALL: [CoachingState; 6] = [
        CoachingState::Introduction,
        CoachingState::IdentityBrainstorming,
        CoachingState::IdentityRefinement,
        CoachingState::IdentityVisualization,
        CoachingState::ActionPlanning,
        CoachingState::Accountability,
    ];

    /// Position in the workflow, starting at zero.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// The snake_case wire value, also used as the template file stem.
    pub fn as_str(self) -> &'static str {
        match self {
            CoachingState::Introduction => "introduction",
            CoachingState::IdentityBrainstorming => "identity_brainstorming",
            CoachingState::IdentityRefinement => "identity_refinement",
            CoachingState::IdentityVisualization => "identity_visualization",
            CoachingState::ActionPlanning => "action_planning",
            CoachingState::Accountability => "accountability",
        }
    }
}

impl fmt::Display for CoachingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoachingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        CoachingState::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| format!("invalid coaching state: '{s}'"))
    }
}

/// Named precondition a transition is guarded by.
///
/// Each variant must have a predicate registered on the state machine
/// before any transition may reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCondition {
    IntroductionCompleted,
    HasMinimumIdentities,
    HasRefinedIdentity,
    HasVisualization,
    HasActionPlan,
    Always,
}

impl TransitionCondition {
    pub const ALL: [TransitionCondition; 6] = [
        TransitionCondition::IntroductionCompleted,
        TransitionCondition::HasMinimumIdentities,
        TransitionCondition::HasRefinedIdentity,
        TransitionCondition::HasVisualization,
        TransitionCondition::HasActionPlan,
        TransitionCondition::Always,
    ];
}

impl fmt::Display for TransitionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransitionCondition::IntroductionCompleted => "introduction_completed",
            TransitionCondition::HasMinimumIdentities => "has_minimum_identities",
            TransitionCondition::HasRefinedIdentity => "has_refined_identity",
            TransitionCondition::HasVisualization => "has_visualization",
            TransitionCondition::HasActionPlan => "has_action_plan",
            TransitionCondition::Always => "always",
        };
        f.write_str(s)
    }
}

/// A guarded edge in the workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: CoachingState,
    pub to_state: CoachingState,
    pub condition: TransitionCondition,
    pub priority: i32,
}
