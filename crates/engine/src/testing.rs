//! Scripted collaborators for tests.
//!
//! Kept in the library (not `#[cfg(test)]`) so integration tests and the
//! CLI's offline mode can build an engine with no live backend.

use async_trait::async_trait;
use confab_core::completion::{CompletionBackend, CompletionRequest, CompletionResponse};
use confab_core::error::CompletionError;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A completion backend that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue; the
/// last response repeats once the queue is exhausted.
pub struct ScriptedBackend {
    responses: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A backend that always answers with the same text.
    pub fn always(text: &str) -> Self {
        Self::new(vec![text])
    }

    /// How many completion calls were made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let responses = self.responses.lock().expect("scripted backend lock");
        let text = responses
            .get(n)
            .or_else(|| responses.last())
            .cloned()
            .unwrap_or_default();
        Ok(CompletionResponse {
            text,
            model: "scripted".into(),
            usage: None,
        })
    }
}

/// A completion backend that is always down.
pub struct UnavailableBackend;

#[async_trait]
impl CompletionBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        Err(CompletionError::Unavailable("connection refused".into()))
    }

    async fn health_check(&self) -> std::result::Result<bool, CompletionError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::classification::ModelProfile;

    fn request() -> CompletionRequest {
        CompletionRequest::new(ModelProfile::new("chat", "m", 0.7, 64), vec![])
    }

    #[tokio::test]
    async fn scripted_backend_sequences_and_counts() {
        let backend = ScriptedBackend::new(vec!["one", "two"]);
        assert_eq!(backend.complete(request()).await.unwrap().text, "one");
        assert_eq!(backend.complete(request()).await.unwrap().text, "two");
        // Exhausted: repeats the last.
        assert_eq!(backend.complete(request()).await.unwrap().text, "two");
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn unavailable_backend_errors() {
        let err = UnavailableBackend.complete(request()).await.unwrap_err();
        assert!(matches!(err, CompletionError::Unavailable(_)));
    }
}
