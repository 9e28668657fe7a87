//! Shared test doubles for the completion provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use coach_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use crate::llm::provider::CompletionProvider;

/// Replays scripted responses in order and records every request.
///
/// The last response repeats once the script runs out.
pub struct RecordingProvider {
    responses: Mutex<VecDeque<String>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl RecordingProvider {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl CompletionProvider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut responses = self.responses.lock().unwrap();
        let content = if responses.len() > 1 {
            responses.pop_front()
        } else {
            responses.front().cloned()
        };
        content
            .map(|content| CompletionResponse {
                content,
                model: request.model.clone(),
            })
            .ok_or_else(|| LlmError::Provider {
                message: "no scripted response".to_string(),
            })
    }
}

/// Always fails, as an unreachable endpoint would.
pub struct FailingProvider;

impl CompletionProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::Provider {
            message: "connection refused".to_string(),
        })
    }
}

/// Fails the first `failures` calls, then answers like `RecordingProvider`.
pub struct FlakyProvider {
    failures_left: AtomicUsize,
    inner: RecordingProvider,
}

impl FlakyProvider {
    pub fn new(failures: usize, responses: Vec<&str>) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            inner: RecordingProvider::new(responses),
        }
    }

    /// Requests that reached the inner provider.
    pub fn requests(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        self.inner.requests()
    }
}

impl CompletionProvider for FlakyProvider {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(LlmError::Provider {
                message: "temporarily unavailable".to_string(),
            });
        }
        self.inner.complete(request).await
    }
}
