//! Table-driven coaching workflow.
//!
//! `StateMachine` holds a registry of condition predicates and a list of
//! guarded transitions. It never stores per-session data, so a single
//! instance is shared by every session.

pub mod conditions;

use std::collections::HashMap;

use coach_types::context::CoachContext;
use coach_types::error::StateMachineError;
use coach_types::state::{CoachingState, StateTransition, TransitionCondition};

/// A pure predicate over the session context.
pub type Predicate = Box<dyn Fn(&CoachContext) -> bool + Send + Sync>;

#[derive(Default)]
pub struct StateMachine {
    conditions: HashMap<TransitionCondition, Predicate>,
    transitions: Vec<StateTransition>,
}

impl StateMachine {
    /// Empty machine with no conditions and no transitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Machine with the standard predicates and workflow table.
    pub fn standard() -> Result<Self, StateMachineError> {
        let mut machine = Self::new();
        conditions::register_standard(&mut machine);

        use CoachingState::*;
        use TransitionCondition::*;
        machine.add_transition(Introduction, IdentityBrainstorming, IntroductionCompleted, 1)?;
        machine.add_transition(IdentityBrainstorming, IdentityRefinement, HasMinimumIdentities, 1)?;
        machine.add_transition(IdentityRefinement, IdentityVisualization, HasRefinedIdentity, 1)?;
        machine.add_transition(IdentityVisualization, ActionPlanning, HasVisualization, 1)?;
        machine.add_transition(ActionPlanning, Accountability, HasActionPlan, 1)?;
        machine.add_transition(Accountability, IdentityBrainstorming, Always, 0)?;

        machine.validate()?;
        Ok(machine)
    }

    /// Register (or replace) the predicate for a condition.
    pub fn register_condition<F>(&mut self, condition: TransitionCondition, predicate: F)
    where
        F: Fn(&CoachContext) -> bool + Send + Sync + 'static,
    {
        self.conditions.insert(condition, Box::new(predicate));
    }

    /// Add a guarded transition. The condition must already be registered.
    pub fn add_transition(
        &mut self,
        from_state: CoachingState,
        to_state: CoachingState,
        condition: TransitionCondition,
        priority: i32,
    ) -> Result<(), StateMachineError> {
        if !self.conditions.contains_key(&condition) {
            return Err(StateMachineError::UnknownCondition {
                from: from_state,
                to: to_state,
                condition,
            });
        }
        self.transitions.push(StateTransition {
            from_state,
            to_state,
            condition,
            priority,
        });
        Ok(())
    }

    /// Re-check the whole table against the condition registry.
    pub fn validate(&self) -> Result<(), StateMachineError> {
        match self
            .transitions
            .iter()
            .find(|t| !self.conditions.contains_key(&t.condition))
        {
            Some(t) => Err(StateMachineError::UnknownCondition {
                from: t.from_state,
                to: t.to_state,
                condition: t.condition,
            }),
            None => Ok(()),
        }
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Transitions leaving the context's current state, in registration order.
    pub fn get_available_transitions(&self, ctx: &CoachContext) -> Vec<StateTransition> {
        self.transitions
            .iter()
            .filter(|t| t.from_state == ctx.current_state)
            .copied()
            .collect()
    }

    /// Target of the highest-priority satisfied transition, if any.
    ///
    /// Equal priorities resolve to the earliest registered transition.
    pub fn evaluate_transitions(&self, ctx: &CoachContext) -> Option<CoachingState> {
        let mut best: Option<&StateTransition> = None;
        for t in self
            .transitions
            .iter()
            .filter(|t| t.from_state == ctx.current_state)
        {
            if !self.check(t.condition, ctx) {
                continue;
            }
            if best.is_none_or(|b| t.priority > b.priority) {
                best = Some(t);
            }
        }
        best.map(|t| t.to_state)
    }

    /// Apply the selected transition, if any. Returns whether the state changed.
    ///
    /// A move to an earlier state starts a new cycle and clears the
    /// per-cycle metadata, so the next cycle has to earn each gate again.
    pub fn transition(&self, ctx: &mut CoachContext) -> bool {
        match self.evaluate_transitions(ctx) {
            Some(next) if next != ctx.current_state => {
                let new_cycle = next.ordinal() < ctx.current_state.ordinal();
                tracing::info!(
                    user_id = %ctx.user_id,
                    session_id = %ctx.session_id,
                    from = %ctx.current_state,
                    to = %next,
                    new_cycle,
                    "state transition"
                );
                if new_cycle {
                    ctx.metadata.reset_cycle();
                }
                ctx.current_state = next;
                true
            }
            _ => false,
        }
    }

    /// Manual override. Forward moves are applied without checking the
    /// target's precondition; backward and same-state moves are rejected.
    pub fn force_transition(
        &self,
        ctx: &mut CoachContext,
        target: CoachingState,
    ) -> Result<(), StateMachineError> {
        let from = ctx.current_state;
        if target.ordinal() <= from.ordinal() {
            let reason = if target == from {
                "already in that state"
            } else {
                "manual transitions may only move forward"
            };
            return Err(StateMachineError::InvalidManualTransition {
                from,
                to: target,
                reason: reason.to_string(),
            });
        }
        tracing::info!(
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            from = %from,
            to = %target,
            "manual state transition"
        );
        ctx.current_state = target;
        Ok(())
    }

    // Absent predicates cannot occur once `add_transition` has accepted the edge.
    fn check(&self, condition: TransitionCondition, ctx: &CoachContext) -> bool {
        self.conditions
            .get(&condition)
            .is_some_and(|predicate| predicate(ctx))
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .field("transitions", &self.transitions)
            .finish()
    }
}
