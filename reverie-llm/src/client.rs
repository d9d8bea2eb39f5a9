//! LLM client: OpenAI-compatible and Ollama HTTP backends.
//!
//! The client makes exactly one request per [`complete`](TextGenerator::complete)
//! call. Retry, timeout and concurrency limits live in
//! [`GenerationGate`](crate::GenerationGate).

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::generator::TextGenerator;

/// Provider backend for text generation.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Any server speaking the OpenAI chat-completions protocol
    /// (LM Studio, llama.cpp server, vLLM, hosted APIs).
    OpenAiCompatible {
        /// Server root, without the `/v1` suffix.
        base_url: String,
        /// Bearer token, if the server wants one.
        api_key: Option<String>,
    },
    /// Ollama's native generate endpoint.
    Ollama {
        /// Server root.
        base_url: String,
    },
    /// No backend: every call fails with a configuration error.
    None,
}

impl LlmProvider {
    /// Build a provider from its configured name (`openai`, `ollama`, `none`).
    ///
    /// # Errors
    /// Returns [`LlmError::ConfigError`] for an unknown provider name.
    pub fn from_parts(
        kind: &str,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, LlmError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        match kind.to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" | "lmstudio" => {
                Ok(Self::OpenAiCompatible { base_url, api_key })
            }
            "ollama" => Ok(Self::Ollama { base_url }),
            "none" => Ok(Self::None),
            other => Err(LlmError::ConfigError(format!("unknown provider '{other}'"))),
        }
    }
}

/// HTTP text generator.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    system_prompt: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Create a client for `model` on `provider`.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            system_prompt: None,
            temperature: 0.7,
            max_tokens: 512,
        }
    }

    /// Create a client with no backend.
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, "")
    }

    /// Sampling temperature and completion length.
    #[must_use]
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// System message sent ahead of every prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    async fn complete_openai(
        &self,
        base_url: &str,
        api_key: Option<&str>,
        prompt: &str,
    ) -> Result<String, LlmError> {
        let url = format!("{base_url}/v1/chat/completions");
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = api_key {
            request = request.bearer_auth(key);
        }
        let json = send(request).await?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LlmError::ParseError("response has no choices[0].message.content".into())
            })
    }

    async fn complete_ollama(&self, base_url: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{base_url}/api/generate");
        let body = json!({
            "model": self.model,
            "system": self.system_prompt.as_deref().unwrap_or_default(),
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            }
        });

        let json = send(self.http.post(&url).json(&body)).await?;
        json["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::ParseError("response has no 'response' field".into()))
    }
}

/// Send `request` and decode a successful JSON body.
async fn send(request: reqwest::RequestBuilder) -> Result<Value, LlmError> {
    let resp = request.send().await?;
    let status = resp.status();
    if status.is_success() {
        return resp.json().await.map_err(|e| LlmError::ParseError(e.to_string()));
    }

    let detail = resp.text().await.unwrap_or_default();
    warn!(status = %status, "LLM server returned an error");
    Err(classify_status(status, &detail))
}

/// Client errors other than rate limiting mean the request itself is wrong.
fn classify_status(status: StatusCode, detail: &str) -> LlmError {
    let message = format!("HTTP {status}: {}", detail.chars().take(200).collect::<String>());
    if status.is_client_error()
        && status != StatusCode::TOO_MANY_REQUESTS
        && status != StatusCode::REQUEST_TIMEOUT
    {
        LlmError::ConfigError(message)
    } else {
        LlmError::RequestFailed(message)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let start = Instant::now();
        let result = match &self.provider {
            LlmProvider::None => Err(LlmError::ConfigError("no LLM provider configured".into())),
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                self.complete_openai(base_url, api_key.as_deref(), prompt).await
            }
            LlmProvider::Ollama { base_url } => self.complete_ollama(base_url, prompt).await,
        };
        debug!(
            model = %self.model,
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis(),
            "LLM completion"
        );
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_resolve() {
        let openai = LlmProvider::from_parts("OpenAI", "http://127.0.0.1:1234/", None);
        assert!(matches!(
            openai,
            Ok(LlmProvider::OpenAiCompatible { ref base_url, .. })
                if base_url == "http://127.0.0.1:1234"
        ));
        assert!(matches!(
            LlmProvider::from_parts("ollama", "http://x", None),
            Ok(LlmProvider::Ollama { .. })
        ));
        assert!(matches!(LlmProvider::from_parts("none", "", None), Ok(LlmProvider::None)));
        assert!(matches!(
            LlmProvider::from_parts("carrier-pigeon", "", None),
            Err(LlmError::ConfigError(_))
        ));
    }

    #[test]
    fn status_classification() {
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "").is_retryable());
        assert!(!classify_status(StatusCode::NOT_FOUND, "").is_retryable());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_retryable());
    }

    #[tokio::test]
    async fn no_provider_fails_with_config_error() {
        let client = LlmClient::none();
        assert!(!client.is_available());
        let err = client.complete("hello").await.expect_err("no backend");
        assert!(matches!(err, LlmError::ConfigError(_)));
    }
}
