//! Session context lifecycle: load, append, consolidate, persist.
//!
//! `ContextManager` is the only component that mutates a `CoachContext`
//! outside of action handlers. It reads from the repository on every load;
//! there is no in-process cache.

pub mod consolidation;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use coach_types::chat::{ChatMessage, MessageRole};
use coach_types::config::MIN_MAX_MESSAGES;
use coach_types::context::{CoachContext, SessionMetadata};
use coach_types::error::RepositoryError;
use coach_types::identity::UserProfile;
use coach_types::llm::LlmError;
use coach_types::record::{ContextRecord, RecordKey, StateRecord};

use crate::llm::client::LlmClient;
use crate::repository::Repository;

/// Shape of `ContextRecord::user_data`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionData {
    #[serde(default)]
    consolidated_summary: Option<String>,
    #[serde(default)]
    user_profile: Option<UserProfile>,
    #[serde(default)]
    metadata: SessionMetadata,
}

pub struct ContextManager<R: Repository> {
    repo: Arc<R>,
    llm: Arc<LlmClient>,
    max_messages: usize,
}

impl<R: Repository> ContextManager<R> {
    pub fn new(repo: Arc<R>, llm: Arc<LlmClient>, max_messages: usize) -> Self {
        Self {
            repo,
            llm,
            max_messages: max_messages.max(MIN_MAX_MESSAGES),
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Load a session, or start a fresh one at `Introduction`.
    pub async fn load(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<CoachContext, RepositoryError> {
        let state = self.repo.get_state(user_id, session_id).await?;
        let record = self.repo.get_context(user_id, session_id).await?;

        let mut ctx = CoachContext::new(user_id, session_id);
        if state.is_none() && record.is_none() {
            tracing::info!(user_id, session_id, "starting new coaching session");
            return Ok(ctx);
        }

        if let Some(state) = state {
            ctx.current_state = state.state;
        }
        if let Some(record) = record {
            let data: SessionData = serde_json::from_value(record.user_data)
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
            ctx.conversation_history = record.messages;
            ctx.consolidated_summary = data.consolidated_summary;
            ctx.user_profile = data.user_profile;
            ctx.metadata = data.metadata;
        }
        Ok(ctx)
    }

    /// Append a message in memory and fold history if it is over the bound.
    ///
    /// A failed fold leaves the history over-length; it is retried on the
    /// next append. Nothing is persisted here.
    pub async fn push_message(&self, ctx: &mut CoachContext, role: MessageRole, content: &str) {
        ctx.conversation_history
            .push(ChatMessage::new(role, content));

        if ctx.conversation_history.len() > self.max_messages {
            if let Err(e) = self.consolidate(ctx).await {
                tracing::warn!(
                    user_id = %ctx.user_id,
                    session_id = %ctx.session_id,
                    history_len = ctx.conversation_history.len(),
                    error = %e,
                    "consolidation failed, keeping history unfolded"
                );
            }
        }
    }

    /// Append, consolidate if needed, then persist.
    pub async fn add_message(
        &self,
        ctx: &mut CoachContext,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RepositoryError> {
        self.push_message(ctx, role, content).await;
        self.save(ctx).await
    }

    /// Fold everything but the newest `max_messages / 2` messages into the
    /// summary. Returns `false` when there was nothing to fold.
    ///
    /// On error the context is left untouched.
    #[tracing::instrument(
        name = "consolidate_context",
        skip(self, ctx),
        fields(
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            history_len = ctx.conversation_history.len(),
        )
    )]
    pub async fn consolidate(&self, ctx: &mut CoachContext) -> Result<bool, LlmError> {
        let keep = consolidation::keep_count(self.max_messages);
        let (to_fold, _) =
            consolidation::select_messages_to_fold(&ctx.conversation_history, keep);
        if to_fold.is_empty() {
            return Ok(false);
        }
        let fold_len = to_fold.len();

        let prompt = consolidation::build_extraction_prompt(
            ctx.consolidated_summary.as_deref(),
            to_fold,
        );
        let extract = self.llm.get_completion(&prompt).await?;

        ctx.consolidated_summary = Some(consolidation::merge_summary(
            ctx.consolidated_summary.as_deref(),
            &extract,
        ));
        ctx.conversation_history.drain(..fold_len);
        tracing::debug!(folded = fold_len, kept = keep, "history consolidated");
        Ok(true)
    }

    /// Apply a metadata change and persist.
    pub async fn update_metadata<F>(
        &self,
        ctx: &mut CoachContext,
        update: F,
    ) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut SessionMetadata),
    {
        update(&mut ctx.metadata);
        self.save(ctx).await
    }

    /// Replace the user profile and persist.
    pub async fn update_user_profile(
        &self,
        ctx: &mut CoachContext,
        profile: UserProfile,
    ) -> Result<(), RepositoryError> {
        ctx.user_profile = Some(profile);
        self.save(ctx).await
    }

    /// Write the state record and the context record.
    pub async fn save(&self, ctx: &CoachContext) -> Result<(), RepositoryError> {
        self.repo
            .save_state(StateRecord::new(
                &ctx.user_id,
                &ctx.session_id,
                ctx.current_state,
            ))
            .await?;

        let data = SessionData {
            consolidated_summary: ctx.consolidated_summary.clone(),
            user_profile: ctx.user_profile.clone(),
            metadata: ctx.metadata.clone(),
        };
        let user_data = serde_json::to_value(&data)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let now = chrono::Utc::now();
        self.repo
            .save_context(ContextRecord {
                user_id: ctx.user_id.clone(),
                session_id: ctx.session_id.clone(),
                messages: ctx.conversation_history.clone(),
                user_data,
                created_at: now,
                updated_at: now,
            })
            .await
    }

    /// Remove both records of a session. Returns whether anything existed.
    pub async fn delete(&self, user_id: &str, session_id: &str) -> Result<bool, RepositoryError> {
        let state = self
            .repo
            .delete(&RecordKey::state(user_id, session_id))
            .await?;
        let context = self
            .repo
            .delete(&RecordKey::context(user_id, session_id))
            .await?;
        Ok(state || context)
    }
}
