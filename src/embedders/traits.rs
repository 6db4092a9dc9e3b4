//! Embedder capability trait
//!
//! Defines the narrow contract the orchestrator depends on. Concrete hosted
//! providers (OpenAI, Cohere, local runtimes) live outside this crate and
//! plug in through `EmbedderRegistry` factories.

use async_trait::async_trait;

use crate::error::Result;

/// Unified interface for embedding backends.
///
/// Contract: deterministic row-per-input ordering, fixed dimensionality per
/// model, no internal retries. Failures propagate as `BenchError::Embedding`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Catalog id this embedder was resolved for
    fn model_id(&self) -> &str;

    /// Vector dimensionality produced by this model
    fn dimension(&self) -> usize;

    /// Embed a batch of documents. Returns one row per input text.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a batch of queries. Returns one row per input text.
    async fn embed_queries(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Whether the backend is ready to serve (credentials present, model loaded)
    async fn is_available(&self) -> bool;
}

/// Prepend a model-specific prefix to each text (E5/BGE instruction style).
pub fn apply_prefix(texts: &[String], prefix: &str) -> Vec<String> {
    if prefix.is_empty() {
        return texts.to_vec();
    }
    texts.iter().map(|t| format!("{}{}", prefix, t)).collect()
}
