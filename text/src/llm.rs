//! Text generation port.
//!
//! The summarizer and query expansion only ever talk to a [`Generator`],
//! which wraps any [`GenerationProvider`] with an optional deadline. The
//! OpenAI adapter speaks any OpenAI-compatible `/chat/completions` endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, TextError};

/// Port for anything that turns a prompt into text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Whether the provider can currently serve requests.
    fn is_available(&self) -> bool {
        true
    }
}

/// Cloneable handle every generation call goes through.
///
/// Provider errors propagate unchanged. There is no retry or backoff.
#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn GenerationProvider>,
    deadline: Option<Duration>,
}

impl Generator {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            provider,
            deadline: None,
        }
    }

    /// Fail calls that take longer than `deadline` with [`TextError::Timeout`].
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        debug!("Generating with {} ({} char prompt)", self.provider.name(), prompt.len());
        let call = self.provider.generate(prompt);
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .map_err(|_| TextError::Timeout {
                    timeout_ms: deadline.as_millis() as u64,
                })?,
            None => call.await,
        }
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("provider", &self.provider.name())
            .field("deadline", &self.deadline)
            .finish()
    }
}

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Generation provider for OpenAI-compatible chat completion endpoints.
pub struct OpenAIChatProvider {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
}

impl OpenAIChatProvider {
    /// Create a provider using `OPENAI_API_KEY` from the environment.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: OPENAI_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            model: OPENAI_DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: None,
            system_prompt: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Point the provider at another OpenAI-compatible server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = &self.system_prompt {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": prompt }));

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

impl Default for OpenAIChatProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationProvider for OpenAIChatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(TextError::ProviderNotConfigured)?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(TextError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TextError::ApiRequest(format!("{status}: {error_text}")));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TextError::InvalidResponse("no message content in response".to_string()))
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAIChatProvider {
        OpenAIChatProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_generate_parses_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [{ "role": "user", "content": "Say hi" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": "hi" } }]
            })))
            .mount(&server)
            .await;

        let text = provider_for(&server).generate("Say hi").await.unwrap();
        assert_eq!(text, "hi");
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server).generate("x").await.unwrap_err();
        assert!(matches!(err, TextError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_server_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = provider_for(&server).generate("x").await.unwrap_err();
        match err {
            TextError::ApiRequest(message) => assert!(message.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_request_body_includes_system_prompt() {
        let body = OpenAIChatProvider::new()
            .with_system_prompt("be brief")
            .with_max_tokens(64)
            .request_body("question");

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "question");
        assert_eq!(body["max_tokens"], 64);
    }

    struct SlowProvider;

    #[async_trait]
    impl GenerationProvider for SlowProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok("late".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_generator_deadline() {
        let generator =
            Generator::new(Arc::new(SlowProvider)).with_deadline(Duration::from_millis(250));
        let err = generator.generate("x").await.unwrap_err();
        assert!(matches!(err, TextError::Timeout { timeout_ms: 250 }));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let mut provider = OpenAIChatProvider::new();
        provider.api_key = None;
        assert!(!provider.is_available());
        let err = provider.generate("x").await.unwrap_err();
        assert!(matches!(err, TextError::ProviderNotConfigured));
    }
}
