//! Embedding-space quality analysis
//!
//! Geometry checks over cached document embeddings: do relevant documents
//! cluster together, are clusters separated from the rest of the corpus, and
//! how much do two models' neighborhoods agree.

use std::collections::{HashMap, HashSet};

/// Cap on non-relevant docs sampled per query in separation analysis
const SEPARATION_SAMPLE_CAP: usize = 50;

/// Cosine similarity of two vectors, 0 for mismatched lengths or zero norms.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Mean pairwise cosine similarity between relevant document pairs.
///
/// Queries with fewer than two resolvable relevant docs are skipped; returns
/// 0 when nothing is comparable.
pub fn intra_cluster_similarity(
    embeddings: &[Vec<f32>],
    doc_ids: &[String],
    relevant_sets: &[HashSet<String>],
) -> f64 {
    let id_to_idx: HashMap<&str, usize> = doc_ids
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), i))
        .collect();

    let mut sims = Vec::new();
    for rel_set in relevant_sets {
        let idxs: Vec<usize> = rel_set
            .iter()
            .filter_map(|d| id_to_idx.get(d.as_str()).copied())
            .collect();
        if idxs.len() < 2 {
            continue;
        }
        for i in 0..idxs.len() {
            for j in (i + 1)..idxs.len() {
                sims.push(cosine_similarity(&embeddings[idxs[i]], &embeddings[idxs[j]]));
            }
        }
    }

    if sims.is_empty() {
        0.0
    } else {
        round4(sims.iter().sum::<f64>() / sims.len() as f64)
    }
}

/// Mean separation (1 - mean cross cosine) between each query's relevant docs
/// and a capped sample of its non-relevant docs.
pub fn inter_cluster_separation(
    embeddings: &[Vec<f32>],
    doc_ids: &[String],
    relevant_sets: &[HashSet<String>],
) -> f64 {
    let id_to_idx: HashMap<&str, usize> = doc_ids
        .iter()
        .enumerate()
        .map(|(i, d)| (d.as_str(), i))
        .collect();

    let mut separations = Vec::new();
    for rel_set in relevant_sets {
        let rel_idxs: Vec<usize> = rel_set
            .iter()
            .filter_map(|d| id_to_idx.get(d.as_str()).copied())
            .collect();
        let non_rel_idxs: Vec<usize> = doc_ids
            .iter()
            .enumerate()
            .filter(|(_, d)| !rel_set.contains(*d))
            .map(|(i, _)| i)
            .take(SEPARATION_SAMPLE_CAP)
            .collect();
        if rel_idxs.is_empty() || non_rel_idxs.is_empty() {
            continue;
        }

        let mut cross = Vec::with_capacity(rel_idxs.len() * non_rel_idxs.len());
        for &ri in &rel_idxs {
            for &ni in &non_rel_idxs {
                cross.push(cosine_similarity(&embeddings[ri], &embeddings[ni]));
            }
        }
        separations.push(1.0 - cross.iter().sum::<f64>() / cross.len() as f64);
    }

    if separations.is_empty() {
        0.0
    } else {
        round4(separations.iter().sum::<f64>() / separations.len() as f64)
    }
}

/// Fraction of shared k-nearest neighbors between two embedding spaces over
/// the same document set. 1.0 means the models agree on every neighborhood.
pub fn nearest_neighbor_overlap(
    embeddings_a: &[Vec<f32>],
    embeddings_b: &[Vec<f32>],
    k: usize,
) -> f64 {
    let n = embeddings_a.len().min(embeddings_b.len());
    if n < 2 {
        return 0.0;
    }
    let k = k.min(n - 1).max(1);

    let neighbors = |embeddings: &[Vec<f32>], i: usize| -> HashSet<usize> {
        let mut scored: Vec<(usize, f64)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (j, cosine_similarity(&embeddings[i], &embeddings[j])))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(k).map(|(j, _)| j).collect()
    };

    let mut overlaps = Vec::with_capacity(n);
    for i in 0..n {
        let nn_a = neighbors(embeddings_a, i);
        let nn_b = neighbors(embeddings_b, i);
        overlaps.push(nn_a.intersection(&nn_b).count() as f64 / k as f64);
    }

    round4(overlaps.iter().sum::<f64>() / overlaps.len() as f64)
}
