//! Performance and cost tracking
//!
//! Latency percentile accumulation plus throughput, memory, and token-cost
//! estimates. Percentiles use linear interpolation over collected samples and
//! are 0 on empty sample sets.

use serde::{Deserialize, Serialize};

/// Throughput guard when no embedding time was recorded (cache hits)
const MIN_EMBED_TIME_SEC: f64 = 0.01;

/// Append-only collection of millisecond latency samples
#[derive(Debug, Clone, Default)]
pub struct LatencyTracker {
    samples: Vec<f64>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample in milliseconds
    pub fn record(&mut self, duration_ms: f64) {
        self.samples.push(duration_ms);
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Sum of all samples in milliseconds
    pub fn total_ms(&self) -> f64 {
        self.samples.iter().sum()
    }

    /// Arithmetic mean, 0 when empty
    pub fn avg(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.total_ms() / self.samples.len() as f64
    }

    /// Linearly interpolated percentile, 0 when empty.
    ///
    /// `p` is in [0, 100]. Matches the numpy default: the percentile rank is
    /// `p/100 * (n-1)` and the value is interpolated between the two nearest
    /// sorted samples.
    pub fn percentile(&self, p: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let rank = (p / 100.0) * (sorted.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        if lo == hi {
            return sorted[lo];
        }
        let weight = rank - lo as f64;
        sorted[lo] + (sorted[hi] - sorted[lo]) * weight
    }

    pub fn p50(&self) -> f64 {
        self.percentile(50.0)
    }

    pub fn p95(&self) -> f64 {
        self.percentile(95.0)
    }

    pub fn p99(&self) -> f64 {
        self.percentile(99.0)
    }
}

/// Latency, throughput, memory, and cost figures for one model run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub embedding_latency_avg_ms: f64,
    pub embedding_latency_p50_ms: f64,
    pub embedding_latency_p95_ms: f64,
    pub embedding_latency_p99_ms: f64,
    pub query_latency_avg_ms: f64,
    pub query_latency_p50_ms: f64,
    pub query_latency_p95_ms: f64,
    pub query_latency_p99_ms: f64,
    /// Documents embedded per second of wall time
    pub throughput_docs_per_sec: f64,
    pub total_embedding_time_sec: f64,
    pub embedding_dimension: usize,
    /// Estimated index memory assuming float32 storage, not a measurement
    pub memory_usage_mb: f64,
    pub api_cost_usd: f64,
    pub cost_per_1k_queries_usd: f64,
}

/// Rough token estimate: ~4 characters per token, minimum 1.
pub fn estimate_token_count(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

/// Compute performance and cost metrics for one model run.
pub fn compute_performance_metrics(
    embedding_latencies: &LatencyTracker,
    query_latencies: &LatencyTracker,
    total_embedding_time_sec: f64,
    num_documents: usize,
    dimension: usize,
    total_tokens: usize,
    cost_per_1k_tokens: f64,
) -> PerformanceMetrics {
    let throughput = num_documents as f64 / total_embedding_time_sec.max(MIN_EMBED_TIME_SEC);
    let memory_mb = (num_documents * dimension * 4) as f64 / (1024.0 * 1024.0);
    let api_cost = (total_tokens as f64 / 1000.0) * cost_per_1k_tokens;
    let cost_per_1k_queries = if cost_per_1k_tokens > 0.0 {
        (1000.0 * query_latencies.avg() / 1000.0) * cost_per_1k_tokens
    } else {
        0.0
    };

    PerformanceMetrics {
        embedding_latency_avg_ms: round2(embedding_latencies.avg()),
        embedding_latency_p50_ms: round2(embedding_latencies.p50()),
        embedding_latency_p95_ms: round2(embedding_latencies.p95()),
        embedding_latency_p99_ms: round2(embedding_latencies.p99()),
        query_latency_avg_ms: round2(query_latencies.avg()),
        query_latency_p50_ms: round2(query_latencies.p50()),
        query_latency_p95_ms: round2(query_latencies.p95()),
        query_latency_p99_ms: round2(query_latencies.p99()),
        throughput_docs_per_sec: round2(throughput),
        total_embedding_time_sec: round2(total_embedding_time_sec),
        embedding_dimension: dimension,
        memory_usage_mb: round2(memory_mb),
        api_cost_usd: round6(api_cost),
        cost_per_1k_queries_usd: round6(cost_per_1k_queries),
    }
}
