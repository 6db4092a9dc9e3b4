//! Exact nearest-neighbor retrieval
//!
//! Brute-force flat index over an embedding matrix. No approximation: the
//! benchmark must measure true model quality, not index noise. All metrics
//! expose a uniformly higher-is-better score; euclidean distances are
//! converted via `1 / (1 + d)`.

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Similarity semantics for index construction and search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// L2-normalize both sides, rank by inner product
    #[default]
    Cosine,
    /// Raw inner product, no normalization
    DotProduct,
    /// L2 distance converted to similarity via 1/(1+d)
    Euclidean,
}

impl SimilarityMetric {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::DotProduct => "dot_product",
            Self::Euclidean => "euclidean",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Some(Self::Cosine),
            "dot_product" | "dot" | "inner_product" => Some(Self::DotProduct),
            "euclidean" | "l2" => Some(Self::Euclidean),
            _ => None,
        }
    }
}

/// L2-normalize a vector in place, guarding zero norms.
fn l2_normalize(vec: &mut [f32]) {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm = norm.max(1e-10);
    for x in vec.iter_mut() {
        *x /= norm;
    }
}

/// Exact flat index over a document embedding matrix
#[derive(Debug, Clone)]
pub struct FlatIndex {
    metric: SimilarityMetric,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    /// Build an index from document embeddings.
    ///
    /// Vectors are copied; for cosine the copies are L2-normalized so search
    /// reduces to an inner product. Row order is preserved, which is what
    /// ties break on.
    pub fn build(embeddings: &[Vec<f32>], metric: SimilarityMetric) -> Result<Self> {
        let dimension = embeddings.first().map(|v| v.len()).unwrap_or(0);
        let mut vectors = Vec::with_capacity(embeddings.len());
        for (i, row) in embeddings.iter().enumerate() {
            if row.len() != dimension {
                return Err(BenchError::Retrieval(format!(
                    "embedding row {} has dimension {} (expected {})",
                    i,
                    row.len(),
                    dimension
                )));
            }
            let mut copy = row.clone();
            if metric == SimilarityMetric::Cosine {
                l2_normalize(&mut copy);
            }
            vectors.push(copy);
        }

        Ok(Self {
            metric,
            dimension,
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    fn score(&self, query: &[f32], doc: &[f32]) -> f32 {
        match self.metric {
            SimilarityMetric::Cosine | SimilarityMetric::DotProduct => {
                query.iter().zip(doc).map(|(q, d)| q * d).sum()
            }
            SimilarityMetric::Euclidean => {
                let dist: f32 = query
                    .iter()
                    .zip(doc)
                    .map(|(q, d)| (q - d) * (q - d))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
        }
    }

    /// Search the index, returning up to `min(top_k, corpus_size)` scored
    /// (doc_id, score) pairs per query, ordered by descending score. Ties
    /// keep index insertion order (stable sort) so identical inputs always
    /// rank identically.
    pub fn search(
        &self,
        query_embeddings: &[Vec<f32>],
        doc_ids: &[String],
        top_k: usize,
    ) -> Result<Vec<Vec<(String, f32)>>> {
        if doc_ids.len() != self.vectors.len() {
            return Err(BenchError::Retrieval(format!(
                "doc_ids length {} does not match index size {}",
                doc_ids.len(),
                self.vectors.len()
            )));
        }

        let k = top_k.min(self.vectors.len());
        let mut results = Vec::with_capacity(query_embeddings.len());

        for query in query_embeddings {
            if query.len() != self.dimension && !self.vectors.is_empty() {
                return Err(BenchError::Retrieval(format!(
                    "query dimension {} does not match index dimension {}",
                    query.len(),
                    self.dimension
                )));
            }

            let mut normalized;
            let query = if self.metric == SimilarityMetric::Cosine {
                normalized = query.clone();
                l2_normalize(&mut normalized);
                &normalized
            } else {
                query
            };

            let mut scored: Vec<(usize, f32)> = self
                .vectors
                .iter()
                .enumerate()
                .map(|(i, doc)| (i, self.score(query, doc)))
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            results.push(
                scored
                    .into_iter()
                    .take(k)
                    .map(|(i, score)| (doc_ids[i].clone(), score))
                    .collect(),
            );
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("d{}", i)).collect()
    }

    #[test]
    fn test_cosine_identical_query_ranks_first() {
        let embeddings = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.5, 0.5, 0.0],
        ];
        let index = FlatIndex::build(&embeddings, SimilarityMetric::Cosine).unwrap();
        let hits = index
            .search(&[vec![0.0, 2.0, 0.0]], &doc_ids(3), 3)
            .unwrap();

        assert_eq!(hits[0][0].0, "d2");
        assert!((hits[0][0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_dot_product_no_normalization() {
        // larger magnitude wins under dot product even with same direction
        let embeddings = vec![vec![1.0, 0.0], vec![3.0, 0.0]];
        let index = FlatIndex::build(&embeddings, SimilarityMetric::DotProduct).unwrap();
        let hits = index.search(&[vec![1.0, 0.0]], &doc_ids(2), 2).unwrap();

        assert_eq!(hits[0][0].0, "d2");
        assert_eq!(hits[0][0].1, 3.0);
        assert_eq!(hits[0][1].1, 1.0);
    }

    #[test]
    fn test_euclidean_score_decreasing_in_distance() {
        let embeddings = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 0.0]];
        let index = FlatIndex::build(&embeddings, SimilarityMetric::Euclidean).unwrap();
        let hits = index.search(&[vec![0.0, 0.0]], &doc_ids(3), 3).unwrap();

        // exact match scores 1/(1+0) = 1.0, scores strictly decrease with distance
        assert_eq!(hits[0][0].0, "d1");
        assert!((hits[0][0].1 - 1.0).abs() < 1e-6);
        assert!(hits[0][0].1 > hits[0][1].1);
        assert!(hits[0][1].1 > hits[0][2].1);
        assert!((hits[0][1].1 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_k_capped_to_corpus_size() {
        let embeddings = vec![vec![1.0], vec![2.0]];
        let index = FlatIndex::build(&embeddings, SimilarityMetric::DotProduct).unwrap();
        let hits = index.search(&[vec![1.0]], &doc_ids(2), 10).unwrap();
        assert_eq!(hits[0].len(), 2);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let embeddings = vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]];
        let index = FlatIndex::build(&embeddings, SimilarityMetric::DotProduct).unwrap();
        let hits = index.search(&[vec![1.0, 0.0]], &doc_ids(3), 3).unwrap();
        let order: Vec<&str> = hits[0].iter().map(|(d, _)| d.as_str()).collect();
        assert_eq!(order, vec!["d1", "d2", "d3"]);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let embeddings = vec![vec![1.0, 0.0], vec![1.0]];
        let err = FlatIndex::build(&embeddings, SimilarityMetric::Cosine).unwrap_err();
        assert!(matches!(err, BenchError::Retrieval(_)));
    }

    #[test]
    fn test_doc_id_count_mismatch_rejected() {
        let embeddings = vec![vec![1.0], vec![2.0]];
        let index = FlatIndex::build(&embeddings, SimilarityMetric::DotProduct).unwrap();
        let err = index.search(&[vec![1.0]], &doc_ids(3), 1).unwrap_err();
        assert!(matches!(err, BenchError::Retrieval(_)));
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!(SimilarityMetric::parse("cosine"), Some(SimilarityMetric::Cosine));
        assert_eq!(SimilarityMetric::parse("dot"), Some(SimilarityMetric::DotProduct));
        assert_eq!(SimilarityMetric::parse("l2"), Some(SimilarityMetric::Euclidean));
        assert_eq!(SimilarityMetric::parse("hnsw"), None);
    }
}
