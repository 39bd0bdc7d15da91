//! Embedding providers.
//!
//! [`EmbeddingProvider`] is the only way text becomes a vector in this
//! workspace. The OpenAI adapter speaks any OpenAI-compatible `/embeddings`
//! endpoint; in-process embedders (and test doubles) implement the trait
//! directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Request for a single embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,

    /// Model override (provider-specific). `None` uses the provider default.
    pub model: Option<String>,
}

impl EmbeddingRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A generated embedding and what produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embedding: Embedding,

    /// Model that produced the vector.
    pub model: String,

    /// Token usage, when the provider reports it.
    pub tokens_used: Option<u64>,
}

impl EmbeddingResponse {
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

/// Port for anything that turns text into a fixed-dimension vector.
///
/// Implementations must return vectors of [`default_dimension`] length; the
/// vector index rejects anything else.
///
/// [`default_dimension`]: EmbeddingProvider::default_dimension
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;

    /// Length of every vector this provider returns.
    fn default_dimension(&self) -> usize;

    /// Embed one text.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Embed several texts. The default issues one call per request, in order.
    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.embed(request).await?);
        }
        Ok(results)
    }

    /// Whether the provider can currently serve requests (API key set, etc.).
    fn is_available(&self) -> bool {
        true
    }
}

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Embedding provider for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAIProvider {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    model: String,
    /// Requested output dimension for models that support shortening.
    dimensions: Option<usize>,
}

impl OpenAIProvider {
    /// Create a provider using `OPENAI_API_KEY` from the environment.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: OPENAI_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            model: OPENAI_DEFAULT_MODEL.to_string(),
            dimensions: None,
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

    /// Ask the server for shortened vectors (text-embedding-3 models only).
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    async fn post(&self, input: serde_json::Value, model: &str) -> Result<OpenAIEmbeddingResponse> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        let mut body = serde_json::json!({
            "input": input,
            "model": model,
        });
        if let Some(dims) = self.dimensions {
            body["dimensions"] = serde_json::json!(dims);
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
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
            return Err(EmbeddingError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!("{status}: {error_text}")));
        }

        Ok(response.json().await?)
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn default_dimension(&self) -> usize {
        if let Some(dims) = self.dimensions {
            return dims;
        }
        match self.model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = request.model.unwrap_or_else(|| self.model.clone());
        debug!("Embedding {} chars with {model}", request.text.len());

        let result = self.post(serde_json::json!(request.text), &model).await?;
        let tokens_used = result.usage.map(|u| u.total_tokens);
        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".to_string()))?
            .embedding;

        Ok(EmbeddingResponse {
            embedding,
            model: result.model,
            tokens_used,
        })
    }

    async fn embed_batch(&self, requests: Vec<EmbeddingRequest>) -> Result<Vec<EmbeddingResponse>> {
        let Some(first) = requests.first() else {
            return Ok(Vec::new());
        };
        let model = first.model.clone().unwrap_or_else(|| self.model.clone());
        let texts: Vec<&str> = requests.iter().map(|r| r.text.as_str()).collect();
        debug!("Embedding batch of {} texts with {model}", texts.len());

        let result = self.post(serde_json::json!(texts), &model).await?;
        if result.data.len() != requests.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                requests.len(),
                result.data.len()
            )));
        }

        let mut data = result.data;
        data.sort_by_key(|item| item.index);
        Ok(data
            .into_iter()
            .map(|item| EmbeddingResponse {
                embedding: item.embedding,
                model: result.model.clone(),
                tokens_used: None,
            })
            .collect())
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
    model: String,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAIProvider {
        OpenAIProvider::new()
            .with_api_key("test-key")
            .with_base_url(server.uri())
    }

    #[test]
    fn test_default_dimensions() {
        let provider = OpenAIProvider::new().with_model("text-embedding-3-large");
        assert_eq!(provider.default_dimension(), 3072);

        let shortened = OpenAIProvider::new().with_dimensions(256);
        assert_eq!(shortened.default_dimension(), 256);
    }

    #[tokio::test]
    async fn test_embed_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "embedding": [0.1, 0.2, 0.3], "index": 0 }],
                "model": "text-embedding-3-small",
                "usage": { "prompt_tokens": 2, "total_tokens": 2 }
            })))
            .mount(&server)
            .await;

        let response = provider_for(&server)
            .embed(EmbeddingRequest::new("hi"))
            .await
            .unwrap();

        assert_eq!(response.embedding, vec![0.1, 0.2, 0.3]);
        assert_eq!(response.dimension(), 3);
        assert_eq!(response.tokens_used, Some(2));
    }

    #[tokio::test]
    async fn test_embed_batch_restores_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "embedding": [0.0, 1.0], "index": 1 },
                    { "embedding": [1.0, 0.0], "index": 0 }
                ],
                "model": "text-embedding-3-small"
            })))
            .mount(&server)
            .await;

        let responses = provider_for(&server)
            .embed_batch(vec![EmbeddingRequest::new("a"), EmbeddingRequest::new("b")])
            .await
            .unwrap();

        assert_eq!(responses[0].embedding, vec![1.0, 0.0]);
        assert_eq!(responses[1].embedding, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_rate_limit_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .embed(EmbeddingRequest::new("hi"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EmbeddingError::RateLimited {
                retry_after_secs: 7
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let mut provider = OpenAIProvider::new();
        provider.api_key = None;

        assert!(!provider.is_available());
        let err = provider
            .embed(EmbeddingRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::ProviderNotConfigured));
    }
}
