//! Embedding backend abstraction
//!
//! The orchestrator consumes backends only through the `Embedder` trait;
//! `EmbedderRegistry` performs provider dispatch from the model catalog.

pub mod hash;
pub mod registry;
pub mod traits;

pub use hash::HashEmbedder;
pub use registry::{EmbedderRegistry, ModelStatus, ProviderFactory};
pub use traits::{apply_prefix, Embedder};
