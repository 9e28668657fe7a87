//! CompletionProvider trait definition.
//!
//! This is the seam every LLM backend implements. Uses RPITIT for
//! `complete` (Rust 2024 edition, no async_trait macro).

use coach_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for completion backends (OpenAI-compatible endpoints, test doubles).
///
/// Implementations live in coach-infra (e.g., `OpenAiCompatibleProvider`).
/// The core never retries or times out a call; that is the provider's job.
pub trait CompletionProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    ///
    /// When `request.output_config` is set, the response content must be a
    /// JSON document matching that schema.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
