//! Provider dispatch and embedder instance cache
//!
//! Resolves a catalog model id to a live `Embedder` through provider
//! factories registered once at startup. Instances are cached per model id so
//! repeated runs reuse loaded backends.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::hash::HashEmbedder;
use super::traits::Embedder;
use crate::config::{ModelCatalog, ModelEntry};
use crate::error::{BenchError, Result};

/// Readiness of a catalog model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// Resolvable and responding
    Ready,
    /// Provider known but backend cannot serve (no credentials, load failure)
    Unavailable,
    /// No factory registered for the provider, or unknown model id
    Unknown,
}

/// Constructs an embedder for a catalog entry
pub type ProviderFactory =
    Arc<dyn Fn(&str, &ModelEntry) -> Result<Arc<dyn Embedder>> + Send + Sync>;

/// Registry mapping provider keys to factories and caching resolved embedders
pub struct EmbedderRegistry {
    catalog: ModelCatalog,
    factories: HashMap<String, ProviderFactory>,
    instances: RwLock<HashMap<String, Arc<dyn Embedder>>>,
}

impl EmbedderRegistry {
    /// Create a registry over a catalog with the built-in `hash` provider.
    pub fn new(catalog: ModelCatalog) -> Self {
        let mut registry = Self {
            catalog,
            factories: HashMap::new(),
            instances: RwLock::new(HashMap::new()),
        };

        registry.register_provider("hash", |model_id, entry| {
            Ok(Arc::new(HashEmbedder::new(
                model_id,
                entry.dimension,
                entry.query_prefix.clone(),
                entry.document_prefix.clone(),
            )) as Arc<dyn Embedder>)
        });

        registry
    }

    /// Register a factory for a provider key, replacing any existing one.
    pub fn register_provider<F>(&mut self, provider: &str, factory: F)
    where
        F: Fn(&str, &ModelEntry) -> Result<Arc<dyn Embedder>> + Send + Sync + 'static,
    {
        self.factories.insert(provider.to_string(), Arc::new(factory));
    }

    /// The catalog this registry resolves against
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Resolve a model id to an embedder, creating and caching it on first use.
    pub fn resolve(&self, model_id: &str) -> Result<Arc<dyn Embedder>> {
        if let Some(existing) = self.instances.read().unwrap().get(model_id) {
            return Ok(Arc::clone(existing));
        }

        let entry = self
            .catalog
            .get(model_id)
            .ok_or_else(|| BenchError::Config(format!("unknown model: {}", model_id)))?;

        let factory = self.factories.get(&entry.provider).ok_or_else(|| {
            BenchError::Config(format!(
                "no provider registered for '{}' (model {})",
                entry.provider, model_id
            ))
        })?;

        let embedder = factory(model_id, entry)?;
        self.instances
            .write()
            .unwrap()
            .insert(model_id.to_string(), Arc::clone(&embedder));
        Ok(embedder)
    }

    /// Check whether a model can be resolved and is ready to serve.
    pub async fn validate_model(&self, model_id: &str) -> ModelStatus {
        match self.resolve(model_id) {
            Ok(embedder) => {
                if embedder.is_available().await {
                    ModelStatus::Ready
                } else {
                    ModelStatus::Unavailable
                }
            }
            Err(_) => ModelStatus::Unknown,
        }
    }
}
