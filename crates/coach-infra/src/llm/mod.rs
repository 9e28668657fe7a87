//! Completion provider implementations.
//!
//! Only OpenAI-compatible endpoints are supported. The base URL can point the
//! same provider at any server that speaks the chat completions protocol.

pub mod openai_compat;

use secrecy::SecretString;

use coach_core::llm::box_provider::BoxLlmProvider;
use coach_core::llm::provider::CompletionProvider;
use coach_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use self::openai_compat::{OpenAiCompatConfig, OpenAiCompatibleProvider};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// The API key from the environment, if set and non-empty.
pub fn api_key_from_env() -> Option<SecretString> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .map(SecretString::from)
}

/// Build the completion provider for `model`.
///
/// Fails with `AuthenticationFailed` when no API key is available.
pub fn create_provider(
    api_key: Option<SecretString>,
    model: &str,
) -> Result<BoxLlmProvider, LlmError> {
    let api_key = api_key.ok_or(LlmError::AuthenticationFailed)?;
    let mut config = OpenAiCompatConfig::openai(api_key, model);
    if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
        tracing::debug!(%base_url, "using custom completion endpoint");
        config.base_url = base_url;
        config.provider_name = "openai_compatible".to_string();
    }
    Ok(BoxLlmProvider::new(OpenAiCompatibleProvider::new(config)))
}

/// Stand-in for commands that never call the model (session inspection,
/// prompt checks). Every completion fails with `AuthenticationFailed`.
pub struct UnavailableProvider;

impl CompletionProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_provider_requires_key() {
        let err = create_provider(None, "gpt-4o").unwrap_err();
        assert!(matches!(err, LlmError::AuthenticationFailed));
    }

    #[test]
    fn create_provider_with_key() {
        let provider = create_provider(Some(SecretString::from("sk-test")), "gpt-4o").unwrap();
        assert!(provider.name().starts_with("openai"));
    }

    #[tokio::test]
    async fn unavailable_provider_always_fails() {
        let provider = BoxLlmProvider::new(UnavailableProvider);
        let request = CompletionRequest {
            model: "gpt-4o".to_string(),
            messages: Vec::new(),
            system: None,
            max_tokens: 10,
            temperature: None,
            output_config: None,
        };
        assert!(matches!(
            provider.complete(&request).await,
            Err(LlmError::AuthenticationFailed)
        ));
    }
}
