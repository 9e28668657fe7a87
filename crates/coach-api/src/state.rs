//! Application state wiring the engine together.
//!
//! `CoachService` is generic over the repository; the CLI pins it to the
//! backend selected in `config.toml`.

use std::sync::Arc;

use anyhow::Context;

use coach_core::llm::box_provider::BoxLlmProvider;
use coach_core::llm::client::LlmClient;
use coach_core::prompt::PromptManager;
use coach_core::service::CoachService;
use coach_infra::config::{load_config, resolve_data_dir, resolve_prompts_dir};
use coach_infra::factory::{AnyRepository, build_repository};
use coach_infra::llm::{API_KEY_ENV, UnavailableProvider, api_key_from_env, create_provider};
use coach_types::config::CoachConfig;

pub type ConcreteCoachService = CoachService<AnyRepository>;

/// Whether the command talks to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmAccess {
    Required,
    NotNeeded,
}

pub struct AppState {
    pub service: Arc<ConcreteCoachService>,
    pub config: CoachConfig,
}

impl AppState {
    /// Load config, open storage, load prompts, and build the service.
    pub async fn init(access: LlmAccess) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let config = load_config(&data_dir).await;
        let prompts_dir = resolve_prompts_dir(&config, &data_dir);

        let provider = match (access, api_key_from_env()) {
            (_, Some(key)) => create_provider(Some(key), &config.model)?,
            (LlmAccess::NotNeeded, None) => BoxLlmProvider::new(UnavailableProvider),
            (LlmAccess::Required, None) => {
                anyhow::bail!("{API_KEY_ENV} is not set; export it to chat with the coach")
            }
        };

        let repo = build_repository(&config, &data_dir)
            .await
            .context("failed to open storage")?;
        let prompts = PromptManager::load(&prompts_dir)
            .with_context(|| format!("failed to load prompts from {}", prompts_dir.display()))?;

        let llm = LlmClient::new(provider, &config);
        let service = CoachService::new(Arc::new(repo), llm, prompts, &config)?;

        Ok(Self {
            service: Arc::new(service),
            config,
        })
    }
}
