//! Deadline-aware handle around an [`EmbeddingProvider`].

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::Embedding;
use crate::cache::EmbeddingCache;
use crate::error::{EmbeddingError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingRequest};

/// The handle chunkers, indexes and retrievers hold instead of a raw
/// provider.
///
/// Every embedding call in the workspace goes through [`Embedder::embed`],
/// so a deadline or cache configured here applies everywhere. Provider
/// errors are returned unchanged; there is no retry.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Option<Arc<EmbeddingCache>>,
    deadline: Option<Duration>,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            cache: None,
            deadline: None,
        }
    }

    /// Serve repeated texts from `cache` instead of the provider.
    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fail calls that take longer than `deadline` with [`EmbeddingError::Timeout`].
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Dimension of the vectors this embedder produces.
    pub fn dimension(&self) -> usize {
        self.provider.default_dimension()
    }

    pub fn cache(&self) -> Option<&Arc<EmbeddingCache>> {
        self.cache.as_ref()
    }

    /// Embed one text.
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        let model = self.provider.default_model();
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(text, model).await {
                debug!("Embedding cache hit ({} chars)", text.len());
                return Ok(hit);
            }
        }

        let request = EmbeddingRequest::new(text);
        let call = self.provider.embed(request);
        let response = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .map_err(|_| EmbeddingError::Timeout {
                    timeout_ms: deadline.as_millis() as u64,
                })??,
            None => call.await?,
        };

        if let Some(cache) = &self.cache {
            cache.put(text, model, response.embedding.clone()).await;
        }
        Ok(response.embedding)
    }
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("provider", &self.provider.name())
            .field("cached", &self.cache.is_some())
            .field("deadline", &self.deadline)
            .finish()
    }
}
