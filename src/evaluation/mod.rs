//! Evaluation engines
//!
//! - `ir_metrics`: ranking-quality metrics from retrieved lists vs judgments
//! - `performance`: latency percentiles, throughput, memory and cost estimates
//! - `quality`: embedding-space geometry analysis over cached vectors

pub mod ir_metrics;
pub mod performance;
pub mod quality;

pub use ir_metrics::{compute_all_metrics, IRMetrics};
pub use performance::{
    compute_performance_metrics, estimate_token_count, LatencyTracker, PerformanceMetrics,
};
pub use quality::{
    cosine_similarity, inter_cluster_separation, intra_cluster_similarity,
    nearest_neighbor_overlap,
};
