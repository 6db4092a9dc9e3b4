//! Deterministic hash-based embedder
//!
//! Produces pseudo-embeddings from text via SHA-256 over character trigrams.
//! Not a language model: texts sharing surface trigrams land near each other,
//! which is enough for offline smoke runs, CI, and cost-free baselines.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::traits::{apply_prefix, Embedder};
use crate::error::Result;

/// Hash embedder configuration
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    model_id: String,
    dimension: usize,
    query_prefix: String,
    document_prefix: String,
}

impl HashEmbedder {
    pub fn new(
        model_id: impl Into<String>,
        dimension: usize,
        query_prefix: impl Into<String>,
        document_prefix: impl Into<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            dimension,
            query_prefix: query_prefix.into(),
            document_prefix: document_prefix.into(),
        }
    }

    /// Embed a single text deterministically.
    ///
    /// Each character trigram is hashed into a bucket; identical texts always
    /// produce identical vectors. The result is L2-normalized.
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        if chars.is_empty() {
            vec[0] = 1.0;
            return vec;
        }

        for window in chars.windows(3.min(chars.len())) {
            let gram: String = window.iter().collect();
            let digest = Sha256::digest(gram.as_bytes());
            let bucket = u64::from_le_bytes(digest[0..8].try_into().unwrap());
            let sign_bits = u64::from_le_bytes(digest[8..16].try_into().unwrap());

            let idx = (bucket % self.dimension as u64) as usize;
            let sign = if sign_bits % 2 == 0 { 1.0 } else { -1.0 };
            vec[idx] += sign;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vec.iter_mut() {
                *x /= norm;
            }
        } else {
            vec[0] = 1.0;
        }
        vec
    }

    fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let prefixed = apply_prefix(texts, &self.document_prefix);
        Ok(self.embed_batch(&prefixed))
    }

    async fn embed_queries(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let prefixed = apply_prefix(texts, &self.query_prefix);
        Ok(self.embed_batch(&prefixed))
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = HashEmbedder::new("hash/fnv-64", 64, "", "");
        let texts = vec!["the quick brown fox".to_string()];
        let a = embedder.embed_documents(&texts).await.unwrap();
        let b = embedder.embed_documents(&texts).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 64);
    }

    #[tokio::test]
    async fn test_normalized_output() {
        let embedder = HashEmbedder::new("hash/fnv-64", 64, "", "");
        let texts = vec!["some document text".to_string()];
        let vecs = embedder.embed_documents(&texts).await.unwrap();
        let norm: f32 = vecs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_similar_texts_score_higher() {
        let embedder = HashEmbedder::new("hash/fnv-256", 256, "", "");
        let texts = vec![
            "rust is a systems programming language".to_string(),
            "rust is a systems language".to_string(),
            "pelicans eat fish near the shore".to_string(),
        ];
        let vecs = embedder.embed_documents(&texts).await.unwrap();
        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };

        let near = dot(&vecs[0], &vecs[1]);
        let far = dot(&vecs[0], &vecs[2]);
        assert!(near > far, "near={} far={}", near, far);
    }

    #[tokio::test]
    async fn test_empty_text() {
        let embedder = HashEmbedder::new("hash/fnv-64", 64, "", "");
        let vecs = embedder
            .embed_documents(&[String::new()])
            .await
            .unwrap();
        let norm: f32 = vecs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
