//! Action handlers.
//!
//! Each handler applies one validated action to the in-memory context.
//! Policy failures (duplicates, caps, unknown targets) come back as
//! `ActionResult { success: false }`; only persistence errors are `Err`.
//!
//! Identity and user records are written straight through to the
//! repository, so a turn that later fails may still have recorded them.

use serde_json::json;

use coach_types::action::{
    ACCEPT_IDENTITY, ADD_ACTION_ITEM, ADD_DRAFT_IDENTITY, ADD_IDENTITY_NOTE, AcceptIdentity,
    ActionResult, AddActionItem, AddDraftIdentity, AddIdentityNote, MARK_INTRODUCTION_COMPLETE,
    REFINE_IDENTITY, RefineIdentity, SAVE_USER_INFO, SELECT_IDENTITY_FOCUS, SaveUserInfo,
    SelectIdentityFocus, TRANSITION_STATE, TransitionState, UPDATE_IDENTITY, UpdateIdentity,
    VISUALIZE_IDENTITY, VisualizeIdentity,
};
use coach_types::context::{CoachContext, SessionMetadata};
use coach_types::error::RepositoryError;
use coach_types::identity::{Identity, IdentityState, Visualization};
use coach_types::record::{IdentityRecord, RecordKey, UpdateValues};

use crate::repository::Repository;
use crate::state_machine::StateMachine;
use crate::state_machine::conditions::MAX_REFINED_IDENTITIES;

pub async fn mark_introduction_complete<R: Repository>(
    repo: &R,
    ctx: &mut CoachContext,
) -> Result<ActionResult, RepositoryError> {
    if ctx.metadata.introduction_completed {
        return Ok(ActionResult::ok(
            MARK_INTRODUCTION_COMPLETE,
            "Introduction already complete",
        ));
    }
    ctx.metadata.introduction_completed = true;
    repo.update_user_data(&ctx.user_id, "introduction_completed", json!(true))
        .await?;
    Ok(ActionResult::ok(
        MARK_INTRODUCTION_COMPLETE,
        "Introduction marked complete",
    ))
}

pub async fn save_user_info<R: Repository>(
    repo: &R,
    ctx: &mut CoachContext,
    params: SaveUserInfo,
) -> Result<ActionResult, RepositoryError> {
    let key = params.key.trim();
    if key.is_empty() {
        return Ok(ActionResult::rejected(SAVE_USER_INFO, "Key must not be empty"));
    }
    if SessionMetadata::RESERVED_KEYS.contains(&key) {
        return Ok(ActionResult::rejected(
            SAVE_USER_INFO,
            format!("Key '{key}' is reserved"),
        ));
    }

    ctx.metadata
        .extra
        .insert(key.to_string(), params.value.clone());
    repo.update_user_data(&ctx.user_id, key, params.value)
        .await?;
    Ok(ActionResult::ok(SAVE_USER_INFO, format!("Saved {key}")))
}

pub async fn add_draft_identity<R: Repository>(
    repo: &R,
    ctx: &mut CoachContext,
    params: AddDraftIdentity,
) -> Result<ActionResult, RepositoryError> {
    let name = params.name.trim();
    if name.is_empty() {
        return Ok(ActionResult::rejected(
            ADD_DRAFT_IDENTITY,
            "Identity name must not be empty",
        ));
    }
    if ctx.metadata.find_draft(name).is_some() {
        return Ok(ActionResult::rejected(
            ADD_DRAFT_IDENTITY,
            format!("Identity '{name}' already exists"),
        ));
    }

    ctx.metadata.draft_identities.push(Identity::new(
        params.category,
        name,
        params.affirmation.clone(),
    ));
    repo.save_identity(IdentityRecord::new(
        &ctx.user_id,
        name,
        params.category,
        params.affirmation,
    ))
    .await?;

    let count = ctx.metadata.draft_identities.len();
    Ok(
        ActionResult::ok(ADD_DRAFT_IDENTITY, format!("Added draft identity '{name}'"))
            .with_data(json!({ "draft_count": count })),
    )
}

pub async fn update_identity<R: Repository>(
    repo: &R,
    ctx: &mut CoachContext,
    params: UpdateIdentity,
) -> Result<ActionResult, RepositoryError> {
    let description = params.description.trim();
    if description.is_empty() {
        return Ok(ActionResult::rejected(
            UPDATE_IDENTITY,
            "Description must not be empty",
        ));
    }
    let Some(updated) = with_named_identities(ctx, &params.name, |identity| {
        identity.affirmation = description.to_string();
    }) else {
        return Ok(ActionResult::rejected(
            UPDATE_IDENTITY,
            format!("No identity named '{}'", params.name.trim()),
        ));
    };

    sync_stored_description(repo, &ctx.user_id, &updated).await?;
    Ok(ActionResult::ok(
        UPDATE_IDENTITY,
        format!("Updated identity '{}'", updated.name),
    ))
}

pub fn accept_identity(ctx: &mut CoachContext, params: AcceptIdentity) -> ActionResult {
    let Some(draft) = ctx
        .metadata
        .draft_identities
        .iter_mut()
        .find(|i| i.has_name(&params.name))
    else {
        return ActionResult::rejected(
            ACCEPT_IDENTITY,
            format!("No draft identity named '{}'", params.name.trim()),
        );
    };

    match draft.state {
        IdentityState::Proposed => {
            draft.state = IdentityState::Accepted;
            ActionResult::ok(ACCEPT_IDENTITY, format!("Accepted identity '{}'", draft.name))
        }
        state => ActionResult::ok(
            ACCEPT_IDENTITY,
            format!("Identity '{}' is already {state}", draft.name),
        ),
    }
}

pub fn add_identity_note(ctx: &mut CoachContext, params: AddIdentityNote) -> ActionResult {
    let note = params.note.trim();
    if note.is_empty() {
        return ActionResult::rejected(ADD_IDENTITY_NOTE, "Note must not be empty");
    }
    match with_named_identities(ctx, &params.name, |identity| {
        identity.notes.push(note.to_string());
    }) {
        Some(identity) => ActionResult::ok(
            ADD_IDENTITY_NOTE,
            format!("Added note to '{}'", identity.name),
        )
        .with_data(json!({ "note_count": identity.notes.len() })),
        None => ActionResult::rejected(
            ADD_IDENTITY_NOTE,
            format!("No identity named '{}'", params.name.trim()),
        ),
    }
}

pub async fn refine_identity<R: Repository>(
    repo: &R,
    ctx: &mut CoachContext,
    params: RefineIdentity,
) -> Result<ActionResult, RepositoryError> {
    let name = params.name.trim();
    if ctx
        .user_profile
        .as_ref()
        .is_some_and(|p| p.find_identity(name).is_some())
    {
        return Ok(ActionResult::rejected(
            REFINE_IDENTITY,
            format!("Identity '{name}' is already refined"),
        ));
    }
    if ctx.refined_identities().len() >= MAX_REFINED_IDENTITIES {
        return Ok(ActionResult::rejected(
            REFINE_IDENTITY,
            format!("Already have {MAX_REFINED_IDENTITIES} refined identities"),
        ));
    }
    let Some(draft) = ctx.metadata.find_draft(name).cloned() else {
        return Ok(ActionResult::rejected(
            REFINE_IDENTITY,
            format!("No draft identity named '{name}'"),
        ));
    };

    let mut refined = draft;
    if let Some(affirmation) = params
        .affirmation
        .filter(|a| !a.trim().is_empty())
    {
        refined.affirmation = affirmation;
    }
    refined.state = IdentityState::RefinementComplete;

    sync_stored_description(repo, &ctx.user_id, &refined).await?;

    if let Some(draft) = ctx
        .metadata
        .draft_identities
        .iter_mut()
        .find(|i| i.has_name(name))
    {
        draft.state = IdentityState::RefinementComplete;
    }
    let refined_name = refined.name.clone();
    ctx.profile_mut().identities.push(refined);
    let count = ctx.refined_identities().len();
    Ok(
        ActionResult::ok(REFINE_IDENTITY, format!("Refined identity '{refined_name}'"))
            .with_data(json!({ "refined_count": count })),
    )
}

pub fn select_identity_focus(
    ctx: &mut CoachContext,
    params: SelectIdentityFocus,
) -> ActionResult {
    let Some(identity) = ctx
        .user_profile
        .as_ref()
        .and_then(|p| p.find_identity(&params.name))
        .cloned()
    else {
        return ActionResult::rejected(
            SELECT_IDENTITY_FOCUS,
            format!("No refined identity named '{}'", params.name.trim()),
        );
    };

    ctx.metadata.focus_identity = Some(identity.name.clone());
    ctx.profile_mut().current_focus = Some(identity.category);
    ActionResult::ok(
        SELECT_IDENTITY_FOCUS,
        format!("Focusing on '{}'", identity.name),
    )
}

pub fn visualize_identity(ctx: &mut CoachContext, params: VisualizeIdentity) -> ActionResult {
    let Some(target) = params
        .name
        .clone()
        .or_else(|| ctx.metadata.focus_identity.clone())
    else {
        return ActionResult::rejected(VISUALIZE_IDENTITY, "No identity selected to visualize");
    };

    let Some(identity) = ctx
        .user_profile
        .as_mut()
        .and_then(|p| p.find_identity_mut(&target))
    else {
        return ActionResult::rejected(
            VISUALIZE_IDENTITY,
            format!("No refined identity named '{}'", target.trim()),
        );
    };

    identity.visualization = Some(Visualization {
        setting: params.setting,
        appearance: params.appearance,
        energy: params.energy,
    });
    let name = identity.name.clone();
    ctx.metadata.current_identity_visualized = true;
    ActionResult::ok(VISUALIZE_IDENTITY, format!("Visualized '{name}'"))
}

pub fn add_action_item(ctx: &mut CoachContext, params: AddActionItem) -> ActionResult {
    let description = params.description.trim();
    if description.is_empty() {
        return ActionResult::rejected(ADD_ACTION_ITEM, "Action item must not be empty");
    }
    if ctx
        .metadata
        .action_items
        .iter()
        .any(|item| item.eq_ignore_ascii_case(description))
    {
        return ActionResult::rejected(
            ADD_ACTION_ITEM,
            format!("Action item '{description}' already exists"),
        );
    }
    ctx.metadata
        .action_items
        .push(description.to_string());
    ActionResult::ok(ADD_ACTION_ITEM, format!("Added action item '{description}'"))
}

pub fn transition_state(
    machine: &StateMachine,
    ctx: &mut CoachContext,
    params: TransitionState,
) -> ActionResult {
    let from = ctx.current_state;
    match machine.force_transition(ctx, params.target_state) {
        Ok(()) => ActionResult::ok(
            TRANSITION_STATE,
            format!("Moved from {from} to {}", params.target_state),
        )
        .with_data(json!({ "from": from, "to": params.target_state })),
        Err(e) => ActionResult::rejected(TRANSITION_STATE, e.to_string()),
    }
}

/// Apply `f` to every draft and refined identity carrying `name`.
///
/// A refined identity keeps its draft in session metadata, so both copies
/// are edited together. Returns the last edited copy.
fn with_named_identities(
    ctx: &mut CoachContext,
    name: &str,
    mut f: impl FnMut(&mut Identity),
) -> Option<Identity> {
    let drafts = ctx.metadata.draft_identities.iter_mut();
    let refined = ctx
        .user_profile
        .iter_mut()
        .flat_map(|p| p.identities.iter_mut());

    let mut last = None;
    for identity in drafts.chain(refined).filter(|i| i.has_name(name)) {
        f(identity);
        last = Some(identity.clone());
    }
    last
}

/// Make the stored identity record carry this identity's affirmation,
/// creating the record when none exists under that name.
async fn sync_stored_description<R: Repository>(
    repo: &R,
    user_id: &str,
    identity: &Identity,
) -> Result<(), RepositoryError> {
    let stored = repo
        .list_identities(user_id)
        .await?
        .into_iter()
        .find(|r| r.name.eq_ignore_ascii_case(&identity.name));
    match stored {
        Some(record) if record.description != identity.affirmation => {
            let mut values = UpdateValues::new();
            values.insert("description".to_string(), json!(identity.affirmation));
            repo.update(&RecordKey::identity(user_id, record.id), &values)
                .await?;
        }
        Some(_) => {}
        None => {
            repo.save_identity(IdentityRecord::new(
                user_id,
                &identity.name,
                identity.category,
                &identity.affirmation,
            ))
            .await?;
        }
    }
    Ok(())
}
