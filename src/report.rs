//! Report export
//!
//! Renders a run's results as a JSON artifact or a Markdown comparison
//! report with retrieval-accuracy and performance/cost tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::benchmark::runner::{BenchmarkResults, ModelBenchmarkResult, RunStatus};
use crate::error::{BenchError, Result};

/// Export format for a benchmark report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "markdown" | "md" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// Serializable report bundle for a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub run_id: String,
    pub dataset_id: String,
    pub timestamp: DateTime<Utc>,
    pub similarity_metric: String,
    pub top_k_values: Vec<usize>,
    pub total_models: usize,
    pub elapsed_seconds: f64,
    pub models: Vec<ModelBenchmarkResult>,
}

impl BenchmarkReport {
    /// Build a report from run results. Only completed runs are reportable.
    pub fn from_results(results: &BenchmarkResults) -> Result<Self> {
        if results.status != RunStatus::Completed {
            return Err(BenchError::Validation(format!(
                "run '{}' is not completed",
                results.run_id
            )));
        }

        let mut models = results.model_results.clone();
        // diagnostics are per-query detail, not report material
        for model in models.iter_mut() {
            model.per_query_results = None;
        }

        Ok(Self {
            run_id: results.run_id.clone(),
            dataset_id: results.dataset_id.clone(),
            timestamp: Utc::now(),
            similarity_metric: results.similarity_metric.name().to_string(),
            top_k_values: results.top_k_values.clone(),
            total_models: models.len(),
            elapsed_seconds: (results.elapsed_seconds * 10.0).round() / 10.0,
            models,
        })
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| BenchError::Config(format!("report serialization failed: {}", e))),
            ReportFormat::Markdown => Ok(self.to_markdown()),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            "# Embedding Model Comparison Report".to_string(),
            String::new(),
            format!("**Run ID:** {}  ", self.run_id),
            format!("**Dataset:** {}  ", self.dataset_id),
            format!("**Timestamp:** {}  ", self.timestamp.to_rfc3339()),
            format!("**Similarity Metric:** {}  ", self.similarity_metric),
            format!("**Duration:** {}s  ", self.elapsed_seconds),
            String::new(),
            "## Retrieval Accuracy".to_string(),
            String::new(),
            "| Model | MRR | MAP | P@5 | R@5 | NDCG@10 | HR@1 |".to_string(),
            "|-------|-----|-----|-----|-----|---------|------|".to_string(),
        ];

        for m in &self.models {
            let ir = &m.ir_metrics;
            let at = |map: &std::collections::BTreeMap<usize, f64>, k: usize| {
                map.get(&k).copied().unwrap_or(0.0)
            };
            lines.push(format!(
                "| {} | {} | {} | {} | {} | {} | {} |",
                m.model_id,
                ir.mrr,
                ir.map_score,
                at(&ir.precision_at_k, 5),
                at(&ir.recall_at_k, 5),
                at(&ir.ndcg_at_k, 10),
                at(&ir.hit_rate_at_k, 1),
            ));
        }

        lines.extend([
            String::new(),
            "## Performance & Cost".to_string(),
            String::new(),
            "| Model | Embed Avg (ms) | P95 (ms) | Query Avg (ms) | Throughput | Dim | Memory (MB) | Cost ($) |".to_string(),
            "|-------|---------------|----------|---------------|------------|-----|-------------|----------|".to_string(),
        ]);

        for m in &self.models {
            let p = &m.performance;
            lines.push(format!(
                "| {} | {} | {} | {} | {}/s | {} | {} | ${} |",
                m.model_id,
                p.embedding_latency_avg_ms,
                p.embedding_latency_p95_ms,
                p.query_latency_avg_ms,
                p.throughput_docs_per_sec,
                p.embedding_dimension,
                p.memory_usage_mb,
                p.api_cost_usd,
            ));
        }

        lines.extend([
            String::new(),
            "---".to_string(),
            "*Generated by embed-compare*".to_string(),
        ]);
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::retrieval::SimilarityMetric;
    use crate::evaluation::{compute_performance_metrics, IRMetrics, LatencyTracker};
    use std::collections::BTreeMap;

    fn sample_results(status: RunStatus) -> BenchmarkResults {
        let ks: BTreeMap<usize, f64> = [(1, 1.0), (5, 0.6), (10, 0.4)].into_iter().collect();
        let mut embed = LatencyTracker::new();
        embed.record(12.0);
        let query = LatencyTracker::new();

        BenchmarkResults {
            run_id: "abc12345".to_string(),
            dataset_id: "ds-1".to_string(),
            status,
            model_results: vec![ModelBenchmarkResult {
                model_id: "hash/fnv-384".to_string(),
                ir_metrics: IRMetrics {
                    precision_at_k: ks.clone(),
                    recall_at_k: ks.clone(),
                    mrr: 0.9,
                    ndcg_at_k: ks.clone(),
                    map_score: 0.85,
                    hit_rate_at_k: ks,
                },
                performance: compute_performance_metrics(&embed, &query, 1.0, 10, 384, 400, 0.0),
                per_query_results: Some(Vec::new()),
            }],
            top_k_values: vec![1, 5, 10],
            similarity_metric: SimilarityMetric::Cosine,
            elapsed_seconds: 3.14,
            error: None,
        }
    }

    #[test]
    fn test_markdown_report_layout() {
        let report = BenchmarkReport::from_results(&sample_results(RunStatus::Completed)).unwrap();
        let md = report.to_markdown();

        assert!(md.starts_with("# Embedding Model Comparison Report"));
        assert!(md.contains("**Run ID:** abc12345"));
        assert!(md.contains("**Duration:** 3.1s"));
        assert!(md.contains("| Model | MRR | MAP | P@5 | R@5 | NDCG@10 | HR@1 |"));
        assert!(md.contains("| hash/fnv-384 | 0.9 | 0.85 | 0.6 | 0.6 | 0.4 | 1 |"));
        assert!(md.contains("## Performance & Cost"));
        assert!(md.contains("| 384 |"));
    }

    #[test]
    fn test_json_report_drops_diagnostics() {
        let report = BenchmarkReport::from_results(&sample_results(RunStatus::Completed)).unwrap();
        let json = report.render(ReportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["total_models"], 1);
        assert_eq!(value["similarity_metric"], "cosine");
        assert!(value["models"][0].get("per_query_results").is_none());
    }

    #[test]
    fn test_incomplete_run_not_reportable() {
        let err = BenchmarkReport::from_results(&sample_results(RunStatus::Running)).unwrap_err();
        assert!(matches!(err, BenchError::Validation(_)));

        let err = BenchmarkReport::from_results(&sample_results(RunStatus::Failed)).unwrap_err();
        assert!(matches!(err, BenchError::Validation(_)));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ReportFormat::parse("json"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::parse("md"), Some(ReportFormat::Markdown));
        assert_eq!(ReportFormat::parse("pdf"), None);
    }
}
