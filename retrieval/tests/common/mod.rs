//! Shared providers and fixtures for the integration suites.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use longctx_embeddings::{EmbeddingRequest, EmbeddingResponse};
use longctx_index::IndexConfig;
use longctx_retrieval::{
    ContextManager, EmbeddingProvider, GenerationProvider, ManagerConfig,
};
use longctx_text::{ChunkerConfig, ChunkingStrategy, TextError};

/// Embeds text by counting the numbers 0..=20 it mentions, plus a constant
/// bias component, normalized to unit length.
#[derive(Default)]
pub struct DigitEmbedder {
    pub calls: AtomicUsize,
}

impl DigitEmbedder {
    pub const DIMENSION: usize = 22;

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for DigitEmbedder {
    fn name(&self) -> &str {
        "digits"
    }

    fn default_model(&self) -> &str {
        "digits-v1"
    }

    fn default_dimension(&self) -> usize {
        Self::DIMENSION
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> longctx_embeddings::Result<EmbeddingResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut embedding = vec![0.0f32; Self::DIMENSION];
        embedding[Self::DIMENSION - 1] = 1.0;
        for token in request.text.split(|c: char| !c.is_alphanumeric()) {
            if let Ok(n) = token.parse::<usize>() {
                if n <= 20 {
                    embedding[n] += 1.0;
                }
            }
        }
        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        embedding.iter_mut().for_each(|x| *x /= norm);

        Ok(EmbeddingResponse {
            embedding,
            model: "digits-v1".to_string(),
            tokens_used: None,
        })
    }
}

/// Answers every prompt with the same reply and records the prompts.
pub struct ScriptedGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> longctx_text::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Fails every call.
pub struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _prompt: &str) -> longctx_text::Result<String> {
        Err(TextError::ApiRequest("model unavailable".to_string()))
    }
}

/// Twenty paragraphs of roughly 600 bytes, each opening with
/// "Paragraph N". Only the heading carries a number.
pub fn twenty_paragraphs() -> String {
    (1..=20)
        .map(|n| {
            let mut paragraph = format!("Paragraph {n} opens the section.");
            while paragraph.len() < 590 {
                paragraph.push_str(" The archive notes describe routine maintenance of the reading room.");
            }
            paragraph
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Paragraph chunking at 1000/200 with a 1000-token context budget.
pub fn config(dir: &Path) -> ManagerConfig {
    ManagerConfig::new(dir)
        .with_index(IndexConfig::new("test", DigitEmbedder::DIMENSION))
        .with_chunker(
            ChunkerConfig::default()
                .with_strategy(ChunkingStrategy::Paragraph)
                .with_sizes(1000, 200),
        )
        .with_max_context_tokens(1000)
}

pub fn manager(
    config: ManagerConfig,
    generator: Option<Arc<dyn GenerationProvider>>,
) -> ContextManager {
    let mut builder = ContextManager::builder()
        .with_config(config)
        .with_embedding_provider(Arc::new(DigitEmbedder::default()));
    if let Some(generator) = generator {
        builder = builder.with_generation_provider(generator);
    }
    builder.build().unwrap()
}
