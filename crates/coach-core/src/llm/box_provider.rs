//! BoxLlmProvider: object-safe dynamic dispatch wrapper for CompletionProvider.
//!
//! 1. `CompletionProviderDyn` is an object-safe trait with boxed futures.
//! 2. It is blanket-implemented for every `T: CompletionProvider`.
//! 3. `BoxLlmProvider` wraps `Box<dyn CompletionProviderDyn>` and delegates.

use std::future::Future;
use std::pin::Pin;

use coach_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use super::provider::CompletionProvider;

/// Object-safe version of [`CompletionProvider`] with boxed futures.
pub trait CompletionProviderDyn: Send + Sync {
    fn name(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;
}

impl<T: CompletionProvider> CompletionProviderDyn for T {
    fn name(&self) -> &str {
        CompletionProvider::name(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }
}

/// Type-erased completion provider for runtime backend selection.
///
/// `CompletionProvider` uses RPITIT and so cannot be a trait object
/// directly; this wrapper exposes the same methods over `dyn`.
pub struct BoxLlmProvider {
    inner: Box<dyn CompletionProviderDyn + Send + Sync>,
}

impl BoxLlmProvider {
    pub fn new<T: CompletionProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.inner.complete_boxed(request).await
    }
}

impl std::fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxLlmProvider")
            .field("name", &self.name())
            .finish()
    }
}
