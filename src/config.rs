//! Model catalog configuration
//!
//! Defines the models.toml schema: every model that can participate in a
//! benchmark run, keyed by a `provider/model` id, with the dimension and
//! pricing metadata the performance tracker needs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default top-k cutoffs evaluated when a run does not specify its own
pub const DEFAULT_TOP_K_VALUES: &[usize] = &[1, 3, 5, 10, 20];

/// Maximum number of models in a single run
pub const MAX_MODELS_PER_RUN: usize = 6;

/// Maximum documents accepted in a dataset
pub const MAX_DATASET_DOCUMENTS: usize = 1000;

/// Maximum queries accepted in a dataset
pub const MAX_DATASET_QUERIES: usize = 500;

/// Documents embedded per provider call
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// A single model entry in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Provider key used for embedder dispatch (e.g. "openai", "cohere", "local", "hash")
    pub provider: String,

    /// Provider-side model name (e.g. "text-embedding-3-small")
    pub model_name: String,

    /// Embedding dimensionality
    pub dimension: usize,

    /// Maximum input tokens per text
    pub max_tokens: usize,

    /// Price per 1000 tokens in USD (0.0 for local/no-cost providers)
    #[serde(default)]
    pub cost_per_1k_tokens: f64,

    /// Prefix prepended to queries before embedding (E5/BGE style)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub query_prefix: String,

    /// Prefix prepended to documents before embedding
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub document_prefix: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,
}

/// Model catalog loaded from TOML
///
/// The catalog is resolved once at startup; runs refer to models by id and
/// fail submission if an id is missing here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog {
    /// Model id -> entry, e.g. `[models."openai/text-embedding-3-small"]`
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let mut models = BTreeMap::new();

        models.insert(
            "openai/text-embedding-3-small".to_string(),
            ModelEntry {
                provider: "openai".to_string(),
                model_name: "text-embedding-3-small".to_string(),
                dimension: 1536,
                max_tokens: 8191,
                cost_per_1k_tokens: 0.00002,
                query_prefix: String::new(),
                document_prefix: String::new(),
                description: "OpenAI small v3 - best value".to_string(),
            },
        );
        models.insert(
            "openai/text-embedding-3-large".to_string(),
            ModelEntry {
                provider: "openai".to_string(),
                model_name: "text-embedding-3-large".to_string(),
                dimension: 3072,
                max_tokens: 8191,
                cost_per_1k_tokens: 0.00013,
                query_prefix: String::new(),
                document_prefix: String::new(),
                description: "OpenAI large v3 - highest quality".to_string(),
            },
        );
        models.insert(
            "cohere/embed-english-v3.0".to_string(),
            ModelEntry {
                provider: "cohere".to_string(),
                model_name: "embed-english-v3.0".to_string(),
                dimension: 1024,
                max_tokens: 512,
                cost_per_1k_tokens: 0.0001,
                query_prefix: String::new(),
                document_prefix: String::new(),
                description: "Cohere English v3 - high quality".to_string(),
            },
        );
        models.insert(
            "cohere/embed-english-light-v3.0".to_string(),
            ModelEntry {
                provider: "cohere".to_string(),
                model_name: "embed-english-light-v3.0".to_string(),
                dimension: 384,
                max_tokens: 512,
                cost_per_1k_tokens: 0.0001,
                query_prefix: String::new(),
                document_prefix: String::new(),
                description: "Cohere English Light v3 - fast & compact".to_string(),
            },
        );
        models.insert(
            "local/all-MiniLM-L6-v2".to_string(),
            ModelEntry {
                provider: "local".to_string(),
                model_name: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
                dimension: 384,
                max_tokens: 256,
                cost_per_1k_tokens: 0.0,
                query_prefix: String::new(),
                document_prefix: String::new(),
                description: "MiniLM - lightweight, fast, 384d".to_string(),
            },
        );
        models.insert(
            "local/e5-small-v2".to_string(),
            ModelEntry {
                provider: "local".to_string(),
                model_name: "intfloat/e5-small-v2".to_string(),
                dimension: 384,
                max_tokens: 512,
                cost_per_1k_tokens: 0.0,
                query_prefix: "query: ".to_string(),
                document_prefix: "passage: ".to_string(),
                description: "E5 Small - 384d, needs prefixes".to_string(),
            },
        );
        models.insert(
            "local/bge-small-en-v1.5".to_string(),
            ModelEntry {
                provider: "local".to_string(),
                model_name: "BAAI/bge-small-en-v1.5".to_string(),
                dimension: 384,
                max_tokens: 512,
                cost_per_1k_tokens: 0.0,
                query_prefix: "Represent this sentence for searching relevant passages: "
                    .to_string(),
                document_prefix: String::new(),
                description: "BGE Small - 384d, instruction prefix for queries".to_string(),
            },
        );
        models.insert(
            "hash/fnv-384".to_string(),
            ModelEntry {
                provider: "hash".to_string(),
                model_name: "fnv-384".to_string(),
                dimension: 384,
                max_tokens: 8192,
                cost_per_1k_tokens: 0.0,
                query_prefix: String::new(),
                document_prefix: String::new(),
                description: "Deterministic hash embedder - offline baseline".to_string(),
            },
        );
        models.insert(
            "hash/fnv-768".to_string(),
            ModelEntry {
                provider: "hash".to_string(),
                model_name: "fnv-768".to_string(),
                dimension: 768,
                max_tokens: 8192,
                cost_per_1k_tokens: 0.0,
                query_prefix: String::new(),
                document_prefix: String::new(),
                description: "Deterministic hash embedder - 768d variant".to_string(),
            },
        );

        Self { models }
    }
}

impl ModelCatalog {
    /// Load catalog from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model catalog: {:?}", path))?;
        let catalog: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse model catalog: {:?}", path))?;
        Ok(catalog)
    }

    /// Load from default location (./models.toml) or return built-in defaults
    pub fn load_default() -> Result<Self> {
        let local_path = Path::new("models.toml");
        if local_path.exists() {
            return Self::load(local_path);
        }
        Ok(Self::default())
    }

    /// Save catalog to TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Look up a model entry by id
    pub fn get(&self, model_id: &str) -> Option<&ModelEntry> {
        self.models.get(model_id)
    }

    /// Whether a model id is registered
    pub fn contains(&self, model_id: &str) -> bool {
        self.models.contains_key(model_id)
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the catalog has no models
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Iterate over (model_id, entry) pairs in id order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelEntry)> {
        self.models.iter()
    }
}
