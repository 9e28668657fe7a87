//! Authorization and dispatch of LLM-declared actions.

use std::sync::Arc;

use coach_types::action::{Action, ActionKind, ActionResult};
use coach_types::context::CoachContext;
use coach_types::error::RepositoryError;

use crate::prompt::PromptManager;
use crate::repository::Repository;
use crate::state_machine::StateMachine;

use super::handlers;

pub struct ActionExecutor<R: Repository> {
    repo: Arc<R>,
    prompts: Arc<PromptManager>,
    machine: Arc<StateMachine>,
}

impl<R: Repository> ActionExecutor<R> {
    pub fn new(repo: Arc<R>, prompts: Arc<PromptManager>, machine: Arc<StateMachine>) -> Self {
        Self {
            repo,
            prompts,
            machine,
        }
    }

    /// Execute one action against the context's current state.
    ///
    /// Returns `Ok` with `success = false` for anything the policy refuses:
    /// an action the state does not allow, a name with no handler, or
    /// missing parameters. `Err` means storage failed.
    pub async fn execute(
        &self,
        action: &Action,
        ctx: &mut CoachContext,
    ) -> Result<ActionResult, RepositoryError> {
        let state = ctx.current_state;
        let result = if !self
            .prompts
            .get_allowed_actions(state)
            .contains(&action.name)
        {
            ActionResult::rejected(
                &action.name,
                format!("Action {} not allowed in state {state}", action.name),
            )
        } else {
            match ActionKind::decode(action) {
                Err(reason) => ActionResult::rejected(&action.name, reason),
                Ok(kind) => self.dispatch(kind, ctx).await?,
            }
        };

        tracing::debug!(
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            state = %state,
            action = %action.name,
            success = result.success,
            message = %result.message,
            "action executed"
        );
        Ok(result)
    }

    /// Execute actions in order, stopping only on a storage error.
    pub async fn execute_all(
        &self,
        actions: &[Action],
        ctx: &mut CoachContext,
    ) -> Result<Vec<ActionResult>, RepositoryError> {
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            results.push(self.execute(action, ctx).await?);
        }
        Ok(results)
    }

    async fn dispatch(
        &self,
        kind: ActionKind,
        ctx: &mut CoachContext,
    ) -> Result<ActionResult, RepositoryError> {
        let repo = self.repo.as_ref();
        let result = match kind {
            ActionKind::MarkIntroductionComplete => {
                handlers::mark_introduction_complete(repo, ctx).await?
            }
            ActionKind::SaveUserInfo(p) => handlers::save_user_info(repo, ctx, p).await?,
            ActionKind::AddDraftIdentity(p) => handlers::add_draft_identity(repo, ctx, p).await?,
            ActionKind::UpdateIdentity(p) => handlers::update_identity(repo, ctx, p).await?,
            ActionKind::AcceptIdentity(p) => handlers::accept_identity(ctx, p),
            ActionKind::AddIdentityNote(p) => handlers::add_identity_note(ctx, p),
            ActionKind::RefineIdentity(p) => handlers::refine_identity(repo, ctx, p).await?,
            ActionKind::SelectIdentityFocus(p) => handlers::select_identity_focus(ctx, p),
            ActionKind::VisualizeIdentity(p) => handlers::visualize_identity(ctx, p),
            ActionKind::AddActionItem(p) => handlers::add_action_item(ctx, p),
            ActionKind::TransitionState(p) => handlers::transition_state(&self.machine, ctx, p),
            ActionKind::Unrecognized(name) => {
                ActionResult::rejected(&name, format!("Unknown action: {name}"))
            }
        };
        Ok(result)
    }
}
