//! Standard transition predicates.

use coach_types::context::CoachContext;
use coach_types::state::TransitionCondition;

use super::StateMachine;

/// Drafts needed before brainstorming can end.
pub const MIN_DRAFT_IDENTITIES: usize = 5;

/// Refined identities a user works with at once.
pub const MAX_REFINED_IDENTITIES: usize = 3;

pub fn introduction_completed(ctx: &CoachContext) -> bool {
    ctx.metadata.introduction_completed
}

pub fn has_minimum_identities(ctx: &CoachContext) -> bool {
    ctx.metadata.draft_identities.len() >= MIN_DRAFT_IDENTITIES
}

pub fn has_refined_identity(ctx: &CoachContext) -> bool {
    ctx.refined_identities().len() >= MAX_REFINED_IDENTITIES
}

pub fn has_visualization(ctx: &CoachContext) -> bool {
    ctx.metadata.current_identity_visualized
        || ctx
            .refined_identities()
            .iter()
            .any(|i| i.visualization.is_some())
}

pub fn has_action_plan(ctx: &CoachContext) -> bool {
    !ctx.metadata.action_items.is_empty()
}

/// Register a predicate for every `TransitionCondition`.
pub fn register_standard(machine: &mut StateMachine) {
    for condition in TransitionCondition::ALL {
        match condition {
            TransitionCondition::IntroductionCompleted => {
                machine.register_condition(condition, introduction_completed)
            }
            TransitionCondition::HasMinimumIdentities => {
                machine.register_condition(condition, has_minimum_identities)
            }
            TransitionCondition::HasRefinedIdentity => {
                machine.register_condition(condition, has_refined_identity)
            }
            TransitionCondition::HasVisualization => {
                machine.register_condition(condition, has_visualization)
            }
            TransitionCondition::HasActionPlan => {
                machine.register_condition(condition, has_action_plan)
            }
            TransitionCondition::Always => machine.register_condition(condition, |_| true),
        }
    }
}
