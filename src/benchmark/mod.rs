//! Benchmark core: run orchestration, retrieval, caching, exploration

pub mod cache;
pub mod explore;
pub mod retrieval;
pub mod runner;

pub use cache::{CacheEntry, EmbeddingCache};
pub use explore::{LiveQueryHit, LiveQueryModelResult, LiveQueryResponse, ModelQuality};
pub use retrieval::{FlatIndex, SimilarityMetric};
pub use runner::{
    BenchmarkResults, BenchmarkRunner, ModelBenchmarkResult, QueryDiagnostic, RetrievedDoc,
    RunOptions, RunProgress, RunRegistry, RunStatus,
};
