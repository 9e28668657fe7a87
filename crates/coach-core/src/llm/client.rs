//! High-level completion calls used by the engine.
//!
//! `LlmClient` pins model settings once and exposes the two call shapes the
//! engine needs: free-text completion (fact extraction) and
//! schema-constrained completion (coach replies).

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use coach_types::chat::ChatMessage;
use coach_types::config::CoachConfig;
use coach_types::llm::{CompletionRequest, LlmError, OutputConfig};

use super::box_provider::BoxLlmProvider;

pub struct LlmClient {
    provider: BoxLlmProvider,
    model: String,
    consolidation_model: String,
    temperature: f64,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(provider: BoxLlmProvider, config: &CoachConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            consolidation_model: config.consolidation_model().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Single-prompt, free-text completion.
    pub async fn get_completion(&self, prompt: &str) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: self.consolidation_model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            system: None,
            max_tokens: self.max_tokens,
            temperature: Some(0.0),
            output_config: None,
        };
        let response = self.provider.complete(&request).await?;
        Ok(response.content.trim().to_string())
    }

    /// Completion constrained to the JSON schema of `T`, parsed into `T`.
    pub async fn get_structured_completion<T>(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<T, LlmError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            system: Some(system.to_string()),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            output_config: Some(output_config_for::<T>()?),
        };

        let response = self.provider.complete(&request).await?;
        serde_json::from_str::<T>(&response.content).map_err(|e| {
            LlmError::Deserialization(format!(
                "failed to parse {}: {e}\nraw content: {}",
                T::schema_name(),
                response.content
            ))
        })
    }
}

/// Build an `OutputConfig` carrying the JSON schema of `T`.
pub fn output_config_for<T: JsonSchema>() -> Result<OutputConfig, LlmError> {
    let schema = schemars::schema_for!(T);
    let schema = serde_json::to_value(schema)
        .map_err(|e| LlmError::InvalidRequest(format!("schema serialization failed: {e}")))?;
    Ok(OutputConfig::json_schema(T::schema_name(), schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingProvider, RecordingProvider};
    use coach_types::action::CoachReply;

    fn client(provider: BoxLlmProvider) -> LlmClient {
        LlmClient::new(provider, &CoachConfig::default())
    }

    #[tokio::test]
    async fn test_structured_completion_parses_reply() {
        let provider = RecordingProvider::new(vec![
            r#"{"message": "Welcome!", "actions": [{"name": "MARK_INTRODUCTION_COMPLETE", "params": {}}]}"#,
        ]);
        let requests = provider.requests();
        let client = client(BoxLlmProvider::new(provider));

        let reply: CoachReply = client
            .get_structured_completion("system", &[ChatMessage::user("hi")])
            .await
            .unwrap();

        assert_eq!(reply.message, "Welcome!");
        assert_eq!(reply.actions.len(), 1);

        let sent = requests.lock().unwrap();
        let config = sent[0].output_config.as_ref().unwrap();
        assert_eq!(config.format.json_schema.name, "CoachReply");
        assert_eq!(sent[0].system.as_deref(), Some("system"));
    }

    #[tokio::test]
    async fn test_structured_completion_reports_bad_json() {
        let client = client(BoxLlmProvider::new(RecordingProvider::new(vec!["not json"])));
        let err = client
            .get_structured_completion::<CoachReply>("system", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Deserialization(_)));
    }

    #[tokio::test]
    async fn test_get_completion_trims_and_uses_consolidation_model() {
        let provider = RecordingProvider::new(vec!["  facts  \n"]);
        let requests = provider.requests();
        let config = CoachConfig {
            consolidation_model: Some("small".to_string()),
            ..CoachConfig::default()
        };
        let client = LlmClient::new(BoxLlmProvider::new(provider), &config);

        assert_eq!(client.get_completion("extract").await.unwrap(), "facts");
        assert_eq!(requests.lock().unwrap()[0].model, "small");
    }

    #[tokio::test]
    async fn test_provider_errors_propagate() {
        let client = client(BoxLlmProvider::new(FailingProvider));
        assert!(client.get_completion("extract").await.is_err());
    }
}
