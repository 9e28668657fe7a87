//! Turn orchestration.
//!
//! `CoachService` is the composition root for one engine instance. A turn
//! runs entirely against an in-memory copy of the session and is persisted
//! once at the end; on error nothing new is saved for the session.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use coach_types::action::{ActionResult, CoachReply};
use coach_types::chat::{ChatMessage, MessageRole};
use coach_types::config::CoachConfig;
use coach_types::context::CoachContext;
use coach_types::error::{PromptError, RepositoryError, StateMachineError};
use coach_types::llm::LlmError;
use coach_types::state::CoachingState;

use crate::action::parser::merge_actions;
use crate::action::{ActionExecutor, ActionParser};
use crate::context::ContextManager;
use crate::llm::client::LlmClient;
use crate::prompt::PromptManager;
use crate::repository::Repository;
use crate::state_machine::StateMachine;

/// Errors that abort a turn.
#[derive(Debug, Error)]
pub enum CoachError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CoachError {
    /// Text safe to show the end user. Never exposes internals.
    pub fn user_message(&self) -> &'static str {
        "Sorry, something went wrong on my side. Let's try that again."
    }
}

/// Result of one processed user message.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// Coach reply with inline action markers removed.
    pub message: String,
    pub previous_state: CoachingState,
    pub state: CoachingState,
    pub action_results: Vec<ActionResult>,
    /// System prompt sent to the LLM for this turn.
    pub final_prompt: String,
}

impl TurnOutcome {
    pub fn state_changed(&self) -> bool {
        self.previous_state != self.state
    }
}

type SessionKey = (String, String);

pub struct CoachService<R: Repository> {
    repo: Arc<R>,
    context: ContextManager<R>,
    prompts: Arc<PromptManager>,
    machine: Arc<StateMachine>,
    executor: ActionExecutor<R>,
    parser: ActionParser,
    llm: Arc<LlmClient>,
    session_locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

impl<R: Repository> CoachService<R> {
    pub fn new(
        repo: Arc<R>,
        llm: LlmClient,
        prompts: PromptManager,
        config: &CoachConfig,
    ) -> Result<Self, CoachError> {
        let machine = Arc::new(StateMachine::standard()?);
        let prompts = Arc::new(prompts);
        let llm = Arc::new(llm);
        let parser = ActionParser::new().map_err(|e| CoachError::Configuration(e.to_string()))?;

        Ok(Self {
            context: ContextManager::new(
                Arc::clone(&repo),
                Arc::clone(&llm),
                config.effective_max_messages(),
            ),
            executor: ActionExecutor::new(
                Arc::clone(&repo),
                Arc::clone(&prompts),
                Arc::clone(&machine),
            ),
            repo,
            prompts,
            machine,
            parser,
            llm,
            session_locks: DashMap::new(),
        })
    }

    pub fn prompts(&self) -> &PromptManager {
        &self.prompts
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Run one coaching turn.
    ///
    /// At most one turn per (user, session) runs at a time; concurrent calls
    /// for the same session queue behind each other.
    #[tracing::instrument(name = "coach_turn", skip(self, text))]
    pub async fn process_message(
        &self,
        user_id: &str,
        session_id: &str,
        text: &str,
    ) -> Result<TurnOutcome, CoachError> {
        let key = (user_id.to_string(), session_id.to_string());
        let lock = Arc::clone(
            self.session_locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );

        let outcome = {
            let _guard = lock.lock().await;
            self.run_turn(user_id, session_id, text).await
        };

        drop(lock);
        self.session_locks
            .remove_if(&key, |_, l| Arc::strong_count(l) == 1);

        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "turn aborted");
        }
        outcome
    }

    async fn run_turn(
        &self,
        user_id: &str,
        session_id: &str,
        text: &str,
    ) -> Result<TurnOutcome, CoachError> {
        let mut ctx = self.context.load(user_id, session_id).await?;
        let previous_state = ctx.current_state;

        // Rendered from prior history; the new text travels as the user turn.
        let prompt = self.prompts.get_prompt(ctx.current_state, &ctx)?;
        self.context
            .push_message(&mut ctx, MessageRole::User, text)
            .await;

        let reply: CoachReply = self
            .llm
            .get_structured_completion(&prompt, &[ChatMessage::user(text)])
            .await?;

        let inline = self.parser.parse_inline(&reply.message);
        let actions = merge_actions(reply.actions, inline);
        let message = self.parser.strip_actions(&reply.message);

        let action_results = self.executor.execute_all(&actions, &mut ctx).await?;

        self.context
            .push_message(&mut ctx, MessageRole::Assistant, &message)
            .await;
        self.machine.transition(&mut ctx);
        self.context.save(&ctx).await?;

        Ok(TurnOutcome {
            message,
            previous_state,
            state: ctx.current_state,
            action_results,
            final_prompt: prompt,
        })
    }

    /// Current persisted view of a session (fresh if it does not exist).
    pub async fn session(&self, user_id: &str, session_id: &str) -> Result<CoachContext, CoachError> {
        Ok(self.context.load(user_id, session_id).await?)
    }

    /// Delete a session's state and context. Identities and user data stay.
    pub async fn reset_session(&self, user_id: &str, session_id: &str) -> Result<bool, CoachError> {
        Ok(self.context.delete(user_id, session_id).await?)
    }

    pub async fn sessions_for_user(&self, user_id: &str) -> Result<Vec<String>, CoachError> {
        Ok(self.repo.sessions_for_user(user_id).await?)
    }

    pub fn reload_prompts(&self) -> Result<(), CoachError> {
        Ok(self.prompts.reload()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::prompt::loader::parse_state_template;
    use crate::repository::in_memory::InMemoryRepository;
    use crate::testing::{FailingProvider, RecordingProvider};

    fn prompts() -> PromptManager {
        let allowed = |state: CoachingState| match state {
            CoachingState::Introduction => "[SAVE_USER_INFO, MARK_INTRODUCTION_COMPLETE]",
            CoachingState::IdentityBrainstorming => "[ADD_DRAFT_IDENTITY, SAVE_USER_INFO]",
            CoachingState::IdentityRefinement => "[REFINE_IDENTITY]",
            CoachingState::IdentityVisualization => "[SELECT_IDENTITY_FOCUS, VISUALIZE_IDENTITY]",
            CoachingState::ActionPlanning => "[ADD_ACTION_ITEM]",
            CoachingState::Accountability => "[ADD_ACTION_ITEM]",
        };
        PromptManager::from_templates(CoachingState::ALL.map(|state| {
            let source = format!(
                "---\nrequired_context_keys: [user_summary, state]\nallowed_actions: {}\n---\nState: {{{{state}}}}\nSummary: {{{{user_summary}}}}",
                allowed(state)
            );
            parse_state_template(state, &source, None).unwrap()
        }))
        .unwrap()
    }

    fn service(provider: BoxLlmProvider) -> CoachService<InMemoryRepository> {
        service_with(provider, prompts())
    }

    fn service_with(
        provider: BoxLlmProvider,
        prompts: PromptManager,
    ) -> CoachService<InMemoryRepository> {
        let config = CoachConfig::default();
        CoachService::new(
            Arc::new(InMemoryRepository::new()),
            LlmClient::new(provider, &config),
            prompts,
            &config,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_scenario_a_introduction_holds_until_flag() {
        let svc = service(BoxLlmProvider::new(RecordingProvider::new(vec![
            r#"{"message": "Tell me more about yourself.", "actions": []}"#,
            r#"{"message": "Tell me more about yourself.", "actions": []}"#,
            r#"{"message": "Tell me more about yourself.", "actions": []}"#,
            r#"{"message": "Great, let's begin!", "actions": [{"name": "MARK_INTRODUCTION_COMPLETE", "params": {}}]}"#,
        ])));

        for text in ["Hi", "I'm Ada", "I paint"] {
            let outcome = svc.process_message("u1", "s1", text).await.unwrap();
            assert_eq!(outcome.state, CoachingState::Introduction);
            assert!(!outcome.state_changed());
        }
        let ctx = svc.session("u1", "s1").await.unwrap();
        assert_eq!(ctx.conversation_history.len(), 6);
        assert_eq!(ctx.current_state, CoachingState::Introduction);

        let outcome = svc.process_message("u1", "s1", "Ready").await.unwrap();
        assert_eq!(outcome.previous_state, CoachingState::Introduction);
        assert_eq!(outcome.state, CoachingState::IdentityBrainstorming);
        assert!(outcome.action_results[0].success);

        let ctx = svc.session("u1", "s1").await.unwrap();
        assert_eq!(ctx.current_state, CoachingState::IdentityBrainstorming);
        assert!(ctx.metadata.introduction_completed);
    }

    #[tokio::test]
    async fn test_inline_markers_are_executed_and_stripped() {
        let svc = service(BoxLlmProvider::new(RecordingProvider::new(vec![
            r#"{"message": "Nice to meet you, Ada! [ACTION:SAVE_USER_INFO]{'key': 'name', 'value': 'Ada'}[/ACTION]", "actions": []}"#,
        ])));

        let outcome = svc.process_message("u1", "s1", "I'm Ada").await.unwrap();
        assert_eq!(outcome.message, "Nice to meet you, Ada!");
        assert_eq!(outcome.action_results.len(), 1);
        assert!(outcome.action_results[0].success);

        let ctx = svc.session("u1", "s1").await.unwrap();
        assert_eq!(ctx.metadata.extra["name"], "Ada");
        assert_eq!(
            ctx.conversation_history.last().unwrap().content,
            "Nice to meet you, Ada!"
        );
    }

    #[tokio::test]
    async fn test_disallowed_action_does_not_abort_turn() {
        let svc = service(BoxLlmProvider::new(RecordingProvider::new(vec![
            r#"{"message": "Let's plan.", "actions": [{"name": "ADD_ACTION_ITEM", "params": {"description": "Run"}}]}"#,
        ])));
        let outcome = svc.process_message("u1", "s1", "Hi").await.unwrap();
        assert!(!outcome.action_results[0].success);
        assert_eq!(outcome.message, "Let's plan.");
        let ctx = svc.session("u1", "s1").await.unwrap();
        assert!(ctx.metadata.action_items.is_empty());
    }

    #[tokio::test]
    async fn test_failed_turn_persists_nothing() {
        let svc = service(BoxLlmProvider::new(FailingProvider));
        let err = svc.process_message("u1", "s1", "Hi").await.unwrap_err();
        assert!(matches!(err, CoachError::Llm(_)));
        assert!(!err.user_message().contains("connection refused"));
        assert!(svc.repository().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_carries_state_and_summary() {
        let provider = RecordingProvider::new(vec![r#"{"message": "ok"}"#]);
        let requests = provider.requests();
        let svc = service(BoxLlmProvider::new(provider));

        let outcome = svc.process_message("u1", "s1", "Hi").await.unwrap();
        assert_eq!(outcome.final_prompt, "State: introduction\nSummary: None");
        let sent = requests.lock().unwrap();
        assert_eq!(sent[0].system.as_deref(), Some(outcome.final_prompt.as_str()));
        assert_eq!(sent[0].messages[0].content, "Hi");
    }

    #[tokio::test]
    async fn test_user_text_is_sent_once_per_turn() {
        let provider = RecordingProvider::new(vec![r#"{"message": "Welcome"}"#]);
        let requests = provider.requests();
        let prompts = PromptManager::from_templates(CoachingState::ALL.map(|state| {
            parse_state_template(
                state,
                "---\nrequired_context_keys: [recent_messages]\n---\nSo far:\n{{recent_messages}}",
                None,
            )
            .unwrap()
        }))
        .unwrap();
        let svc = service_with(BoxLlmProvider::new(provider), prompts);

        svc.process_message("u1", "s1", "Hi").await.unwrap();
        svc.process_message("u1", "s1", "I'm Ada").await.unwrap();

        let sent = requests.lock().unwrap();
        let second = &sent[1];
        let system = second.system.as_deref().unwrap();
        assert!(system.contains("User: Hi"));
        assert!(system.contains("Assistant: Welcome"));
        assert!(!system.contains("I'm Ada"));
        assert_eq!(second.messages.len(), 1);
        assert_eq!(second.messages[0].content, "I'm Ada");

        let ctx = svc.session("u1", "s1").await.unwrap();
        assert_eq!(ctx.conversation_history.len(), 4);
        assert_eq!(ctx.conversation_history[2].content, "I'm Ada");
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_session_are_serialized() {
        let svc = Arc::new(service(BoxLlmProvider::new(RecordingProvider::new(vec![
            r#"{"message": "ok"}"#,
        ]))));

        let a = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.process_message("u1", "s1", "one").await })
        };
        let b = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.process_message("u1", "s1", "two").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let ctx = svc.session("u1", "s1").await.unwrap();
        assert_eq!(ctx.conversation_history.len(), 4);
        assert!(svc.session_locks.is_empty());
    }

    #[tokio::test]
    async fn test_sessions_for_user_and_reset() {
        let svc = service(BoxLlmProvider::new(RecordingProvider::new(vec![
            r#"{"message": "ok"}"#,
        ])));
        svc.process_message("u1", "s1", "Hi").await.unwrap();
        svc.process_message("u1", "s2", "Hi").await.unwrap();
        assert_eq!(svc.sessions_for_user("u1").await.unwrap(), vec!["s1", "s2"]);

        assert!(svc.reset_session("u1", "s1").await.unwrap());
        assert_eq!(svc.sessions_for_user("u1").await.unwrap(), vec!["s2"]);
    }
}
