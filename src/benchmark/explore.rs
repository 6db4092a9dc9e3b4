//! Live exploration over a run's cached embeddings
//!
//! Ad-hoc queries and text similarity checks against the models of an
//! existing run, reusing the cached document embeddings so no corpus
//! re-embedding happens. Only the query (or probe texts) hit the provider.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::warn;

use crate::dataset::Dataset;
use crate::error::{BenchError, Result};
use crate::evaluation::{
    cosine_similarity, inter_cluster_separation, intra_cluster_similarity,
    nearest_neighbor_overlap,
};

use super::retrieval::FlatIndex;
use super::runner::BenchmarkRunner;

/// Longest document excerpt returned with a live hit
const EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveQueryHit {
    pub doc_id: String,
    /// Document text truncated to 500 characters
    pub text: String,
    pub score: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveQueryModelResult {
    pub model_id: String,
    pub hits: Vec<LiveQueryHit>,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveQueryResponse {
    pub query: String,
    pub results: Vec<LiveQueryModelResult>,
}

/// Geometry summary of one model's cached embedding space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelQuality {
    pub intra_cluster_similarity: f64,
    pub inter_cluster_separation: f64,
    pub embedding_dimension: usize,
    pub num_embeddings: usize,
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

impl BenchmarkRunner {
    /// Run an ad-hoc query against every model of an existing run.
    ///
    /// Models whose document embeddings are not cached (e.g. the run has not
    /// reached them yet) are skipped rather than failing the whole request.
    pub async fn live_query(
        &self,
        run_id: &str,
        dataset: &Dataset,
        query: &str,
        top_k: usize,
    ) -> Result<LiveQueryResponse> {
        let handle = self
            .registry()
            .handle(run_id)
            .ok_or_else(|| BenchError::RunNotFound(run_id.to_string()))?;
        let (dataset_id, model_ids, metric) = handle.run_config();

        let text_by_id: HashMap<&str, &str> = dataset
            .documents
            .iter()
            .map(|d| (d.doc_id.as_str(), d.text.as_str()))
            .collect();

        let mut results = Vec::new();
        for model_id in &model_ids {
            let Some(cached) = self.cache().get(model_id, &dataset_id) else {
                continue;
            };

            let t0 = Instant::now();
            let embedder = self.embedders().resolve(model_id)?;
            let mut rows = embedder
                .embed_queries(std::slice::from_ref(&query.to_string()))
                .await?;
            let q_vec = rows.pop().ok_or_else(|| {
                BenchError::Embedding(format!(
                    "model '{}' returned no rows for query embedding",
                    model_id
                ))
            })?;

            let index = FlatIndex::build(&cached.embeddings, metric)?;
            let hits = index.search(std::slice::from_ref(&q_vec), &cached.doc_ids, top_k)?;
            let latency_ms = t0.elapsed().as_secs_f64() * 1000.0;

            let hits = hits
                .into_iter()
                .next()
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(i, (doc_id, score))| LiveQueryHit {
                    text: excerpt(text_by_id.get(doc_id.as_str()).copied().unwrap_or("")),
                    doc_id,
                    score: round4(score as f64),
                    rank: i + 1,
                })
                .collect();

            results.push(LiveQueryModelResult {
                model_id: model_id.clone(),
                hits,
                latency_ms: round4(latency_ms),
            });
        }

        Ok(LiveQueryResponse {
            query: query.to_string(),
            results,
        })
    }

    /// Cosine similarity of two texts under every model of a run.
    ///
    /// A model that fails to embed reports 0.0 instead of failing the
    /// comparison for the others.
    pub async fn text_similarity(
        &self,
        run_id: &str,
        text_a: &str,
        text_b: &str,
    ) -> Result<HashMap<String, f64>> {
        let handle = self
            .registry()
            .handle(run_id)
            .ok_or_else(|| BenchError::RunNotFound(run_id.to_string()))?;
        let (_, model_ids, _) = handle.run_config();

        let texts = vec![text_a.to_string(), text_b.to_string()];
        let mut similarities = HashMap::new();
        for model_id in &model_ids {
            let sim = match self.embed_pair(model_id, &texts).await {
                Ok((a, b)) => round4(cosine_similarity(&a, &b)),
                Err(e) => {
                    warn!(model = %model_id, error = %e, "similarity probe failed");
                    0.0
                }
            };
            similarities.insert(model_id.clone(), sim);
        }

        Ok(similarities)
    }

    /// Embedding-space quality analysis over a run's cached document vectors.
    ///
    /// Models without cached embeddings are omitted from the result map.
    pub fn embedding_quality(
        &self,
        run_id: &str,
        dataset: &Dataset,
    ) -> Result<HashMap<String, ModelQuality>> {
        let handle = self
            .registry()
            .handle(run_id)
            .ok_or_else(|| BenchError::RunNotFound(run_id.to_string()))?;
        let (dataset_id, model_ids, _) = handle.run_config();

        let relevant_sets: Vec<_> = dataset.queries.iter().map(|q| q.relevant_set()).collect();

        let mut quality = HashMap::new();
        for model_id in &model_ids {
            let Some(cached) = self.cache().get(model_id, &dataset_id) else {
                continue;
            };
            quality.insert(
                model_id.clone(),
                ModelQuality {
                    intra_cluster_similarity: intra_cluster_similarity(
                        &cached.embeddings,
                        &cached.doc_ids,
                        &relevant_sets,
                    ),
                    inter_cluster_separation: inter_cluster_separation(
                        &cached.embeddings,
                        &cached.doc_ids,
                        &relevant_sets,
                    ),
                    embedding_dimension: cached.embeddings.first().map(|v| v.len()).unwrap_or(0),
                    num_embeddings: cached.embeddings.len(),
                },
            );
        }

        Ok(quality)
    }

    /// Fraction of shared k-nearest neighbors between two models' cached
    /// embedding spaces for the same run.
    pub fn neighbor_agreement(
        &self,
        run_id: &str,
        model_a: &str,
        model_b: &str,
        k: usize,
    ) -> Result<f64> {
        let handle = self
            .registry()
            .handle(run_id)
            .ok_or_else(|| BenchError::RunNotFound(run_id.to_string()))?;
        let (dataset_id, _, _) = handle.run_config();

        let a = self.cache().get(model_a, &dataset_id).ok_or_else(|| {
            BenchError::Validation(format!("no cached embeddings for '{}'", model_a))
        })?;
        let b = self.cache().get(model_b, &dataset_id).ok_or_else(|| {
            BenchError::Validation(format!("no cached embeddings for '{}'", model_b))
        })?;

        Ok(nearest_neighbor_overlap(&a.embeddings, &b.embeddings, k))
    }

    async fn embed_pair(&self, model_id: &str, texts: &[String]) -> Result<(Vec<f32>, Vec<f32>)> {
        let embedder = self.embedders().resolve(model_id)?;
        let mut rows = embedder.embed_documents(texts).await?;
        if rows.len() != 2 {
            return Err(BenchError::Embedding(format!(
                "model '{}' returned {} rows for 2 texts",
                model_id,
                rows.len()
            )));
        }
        let b = rows.pop().unwrap_or_default();
        let a = rows.pop().unwrap_or_default();
        Ok((a, b))
    }
}
