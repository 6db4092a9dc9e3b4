//! Embedding model comparison library
//!
//! Benchmarks text-embedding models on retrieval tasks: run orchestration,
//! exact vector search, IR quality metrics, and performance/cost tracking.

pub mod benchmark;
pub mod config;
pub mod dataset;
pub mod embedders;
pub mod error;
pub mod evaluation;
pub mod report;

pub use benchmark::{BenchmarkResults, BenchmarkRunner, RunOptions, RunProgress, RunStatus};
pub use config::{ModelCatalog, ModelEntry};
pub use dataset::Dataset;
pub use embedders::{Embedder, EmbedderRegistry};
pub use error::{BenchError, Result};
