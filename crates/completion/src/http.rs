//! OpenAI-compatible completion backend.
//!
//! Works with any endpoint exposing `/v1/chat/completions`: hosted
//! providers, vLLM, llama.cpp, Ollama. Non-streaming only — the engine
//! consumes whole replies. The HTTP client carries a hard timeout;
//! callers may additionally race `complete()` against their own deadline
//! and drop the future to cancel.

use async_trait::async_trait;
use confab_core::completion::{
    CompletionBackend, CompletionRequest, CompletionResponse, PromptRole, Usage,
};
use confab_core::error::CompletionError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// A client for one OpenAI-compatible endpoint.
pub struct HttpBackend {
    base_url: String,
    api_key: String,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend client. `request_timeout` is the hard per-request
    /// bound enforced at the HTTP layer.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CompletionError::Unavailable(format!("client build failed: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            request_timeout,
            client,
        })
    }

    fn to_api_request(request: &CompletionRequest) -> ApiRequest {
        ApiRequest {
            model: request.profile.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: match m.role {
                        PromptRole::System => "system".into(),
                        PromptRole::User => "user".into(),
                        PromptRole::Assistant => "assistant".into(),
                    },
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.profile.temperature,
            max_tokens: request.profile.max_tokens,
        }
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::to_api_request(&request);
        debug!(model = %body.model, messages = body.messages.len(), "completion request");

        let mut http_request = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            http_request = http_request.bearer_auth(&self.api_key);
        }

        let response = http_request.send().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::Timeout {
                    timeout_ms: self.request_timeout.as_millis() as u64,
                }
            } else {
                warn!(error = %e, "completion backend unreachable");
                CompletionError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::Malformed("response has no choices".into()))?;

        Ok(CompletionResponse {
            text: choice.message.content,
            model: api_response.model,
            usage: api_response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, CompletionError> {
        let url = format!("{}/models", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
