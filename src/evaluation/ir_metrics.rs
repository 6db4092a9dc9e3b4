//! Information retrieval metrics
//!
//! Pure functions over a retrieved id sequence, a relevant-id set, and (for
//! NDCG) a doc-id -> grade mapping: Precision@K, Recall@K, MRR, nDCG@K, MAP,
//! and Hit Rate@K. `compute_all_metrics` averages each metric arithmetically
//! across queries, independently per requested k.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Aggregated ranking-quality metrics for one model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IRMetrics {
    /// k -> mean precision@k
    pub precision_at_k: BTreeMap<usize, f64>,
    /// k -> mean recall@k
    pub recall_at_k: BTreeMap<usize, f64>,
    /// Mean reciprocal rank
    pub mrr: f64,
    /// k -> mean nDCG@k
    pub ndcg_at_k: BTreeMap<usize, f64>,
    /// Mean average precision
    pub map_score: f64,
    /// k -> mean hit rate@k
    pub hit_rate_at_k: BTreeMap<usize, f64>,
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Fraction of top-k retrieved docs that are relevant. 0 if top-k is empty.
pub fn precision_at_k(retrieved: &[String], relevant: &HashSet<String>, k: usize) -> f64 {
    let top_k = &retrieved[..k.min(retrieved.len())];
    if top_k.is_empty() {
        return 0.0;
    }
    let hits = top_k.iter().filter(|d| relevant.contains(*d)).count();
    hits as f64 / top_k.len() as f64
}

/// Fraction of relevant docs found in top-k. 0 if the relevant set is empty.
pub fn recall_at_k(retrieved: &[String], relevant: &HashSet<String>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let top_k = &retrieved[..k.min(retrieved.len())];
    let hits = top_k.iter().filter(|d| relevant.contains(*d)).count();
    hits as f64 / relevant.len() as f64
}

/// 1 / rank of the first relevant document. 0 if none retrieved.
pub fn reciprocal_rank(retrieved: &[String], relevant: &HashSet<String>) -> f64 {
    for (i, doc_id) in retrieved.iter().enumerate() {
        if relevant.contains(doc_id) {
            return 1.0 / (i + 1) as f64;
        }
    }
    0.0
}

fn dcg(gains: impl Iterator<Item = f64>) -> f64 {
    gains
        .enumerate()
        .map(|(i, g)| g / (i as f64 + 2.0).log2())
        .sum()
}

/// Normalized discounted cumulative gain at k.
///
/// Linear gain with log2 position discount; the ideal ranking is the grade
/// values sorted descending, truncated to k. Returns 0 when the ideal DCG is
/// 0 (all grades zero), never dividing by zero.
pub fn ndcg_at_k(retrieved: &[String], relevance_grades: &HashMap<String, u8>, k: usize) -> f64 {
    let top_k = &retrieved[..k.min(retrieved.len())];
    let actual = dcg(
        top_k
            .iter()
            .map(|d| relevance_grades.get(d).copied().unwrap_or(0) as f64),
    );

    let mut ideal_gains: Vec<f64> = relevance_grades.values().map(|&g| g as f64).collect();
    ideal_gains.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let ideal = dcg(ideal_gains.into_iter().take(k));

    if ideal == 0.0 {
        0.0
    } else {
        actual / ideal
    }
}

/// Average precision for a single query: mean of precision at each relevant
/// hit position, divided by the total relevant count. 0 if no relevant docs.
pub fn average_precision(retrieved: &[String], relevant: &HashSet<String>) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let mut hits = 0usize;
    let mut sum_precision = 0.0;
    for (i, doc_id) in retrieved.iter().enumerate() {
        if relevant.contains(doc_id) {
            hits += 1;
            sum_precision += hits as f64 / (i + 1) as f64;
        }
    }
    sum_precision / relevant.len() as f64
}

/// 1.0 if at least one relevant doc appears in top-k, else 0.0.
pub fn hit_rate_at_k(retrieved: &[String], relevant: &HashSet<String>, k: usize) -> f64 {
    let top_k = &retrieved[..k.min(retrieved.len())];
    if top_k.iter().any(|d| relevant.contains(d)) {
        1.0
    } else {
        0.0
    }
}

/// Compute all IR metrics averaged across queries.
///
/// An empty query batch yields all-zero metrics for every requested k.
pub fn compute_all_metrics(
    all_retrieved: &[Vec<String>],
    all_relevant: &[HashSet<String>],
    all_relevance_grades: &[HashMap<String, u8>],
    top_k_values: &[usize],
) -> IRMetrics {
    let n = all_retrieved.len();
    if n == 0 {
        let zeros: BTreeMap<usize, f64> = top_k_values.iter().map(|&k| (k, 0.0)).collect();
        return IRMetrics {
            precision_at_k: zeros.clone(),
            recall_at_k: zeros.clone(),
            mrr: 0.0,
            ndcg_at_k: zeros.clone(),
            map_score: 0.0,
            hit_rate_at_k: zeros,
        };
    }

    let mean_over = |f: &dyn Fn(&Vec<String>, &HashSet<String>) -> f64| -> f64 {
        all_retrieved
            .iter()
            .zip(all_relevant)
            .map(|(r, rel)| f(r, rel))
            .sum::<f64>()
            / n as f64
    };

    let per_k = |f: &dyn Fn(&Vec<String>, &HashSet<String>, usize) -> f64| -> BTreeMap<usize, f64> {
        top_k_values
            .iter()
            .map(|&k| {
                let mean = all_retrieved
                    .iter()
                    .zip(all_relevant)
                    .map(|(r, rel)| f(r, rel, k))
                    .sum::<f64>()
                    / n as f64;
                (k, round4(mean))
            })
            .collect()
    };

    let ndcg: BTreeMap<usize, f64> = top_k_values
        .iter()
        .map(|&k| {
            let mean = all_retrieved
                .iter()
                .zip(all_relevance_grades)
                .map(|(r, g)| ndcg_at_k(r, g, k))
                .sum::<f64>()
                / n as f64;
            (k, round4(mean))
        })
        .collect();

    IRMetrics {
        precision_at_k: per_k(&|r, rel, k| precision_at_k(r, rel, k)),
        recall_at_k: per_k(&|r, rel, k| recall_at_k(r, rel, k)),
        mrr: round4(mean_over(&|r, rel| reciprocal_rank(r, rel))),
        ndcg_at_k: ndcg,
        map_score: round4(mean_over(&|r, rel| average_precision(r, rel))),
        hit_rate_at_k: per_k(&|r, rel, k| hit_rate_at_k(r, rel, k)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn id_set(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn grades(pairs: &[(&str, u8)]) -> HashMap<String, u8> {
        pairs.iter().map(|(d, g)| (d.to_string(), *g)).collect()
    }

    #[test]
    fn test_scenario_perfect_ranking() {
        // docs {d1,d2,d3}; relevant=[d2] grade 3; retrieved [d2,d1,d3]
        let retrieved = ids(&["d2", "d1", "d3"]);
        let relevant = id_set(&["d2"]);
        let g = grades(&[("d2", 3)]);

        assert_eq!(precision_at_k(&retrieved, &relevant, 1), 1.0);
        assert_eq!(recall_at_k(&retrieved, &relevant, 1), 1.0);
        assert_eq!(reciprocal_rank(&retrieved, &relevant), 1.0);
        assert!((ndcg_at_k(&retrieved, &g, 1) - 1.0).abs() < 1e-9);
        assert_eq!(average_precision(&retrieved, &relevant), 1.0);
        assert_eq!(hit_rate_at_k(&retrieved, &relevant, 1), 1.0);
    }

    #[test]
    fn test_scenario_relevant_at_rank_two() {
        // same query, retrieved [d1,d2,d3]
        let retrieved = ids(&["d1", "d2", "d3"]);
        let relevant = id_set(&["d2"]);

        assert_eq!(precision_at_k(&retrieved, &relevant, 1), 0.0);
        assert_eq!(recall_at_k(&retrieved, &relevant, 1), 0.0);
        assert_eq!(reciprocal_rank(&retrieved, &relevant), 0.5);
        assert_eq!(average_precision(&retrieved, &relevant), 0.5);
        assert_eq!(hit_rate_at_k(&retrieved, &relevant, 1), 0.0);
        assert_eq!(hit_rate_at_k(&retrieved, &relevant, 2), 1.0);
    }

    #[test]
    fn test_precision_bounds() {
        let retrieved = ids(&["a", "b", "c", "d"]);
        let relevant = id_set(&["b", "d", "x"]);
        for k in 1..=6 {
            let p = precision_at_k(&retrieved, &relevant, k);
            assert!((0.0..=1.0).contains(&p), "p@{} = {}", k, p);
        }
    }

    #[test]
    fn test_recall_non_decreasing_in_k() {
        let retrieved = ids(&["a", "b", "c", "d", "e"]);
        let relevant = id_set(&["b", "e"]);
        let mut prev = 0.0;
        for k in 1..=5 {
            let r = recall_at_k(&retrieved, &relevant, k);
            assert!(r >= prev, "recall@{} decreased: {} < {}", k, r, prev);
            prev = r;
        }
        assert_eq!(prev, 1.0);
    }

    #[test]
    fn test_hit_rate_binary_and_non_decreasing() {
        let retrieved = ids(&["a", "b", "c"]);
        let relevant = id_set(&["c"]);
        let mut prev = 0.0;
        for k in 1..=3 {
            let h = hit_rate_at_k(&retrieved, &relevant, k);
            assert!(h == 0.0 || h == 1.0);
            assert!(h >= prev);
            prev = h;
        }
        assert_eq!(prev, 1.0);
    }

    #[test]
    fn test_ndcg_all_zero_grades() {
        let retrieved = ids(&["a", "b"]);
        let g = grades(&[("a", 0), ("b", 0)]);
        for k in [1, 2, 5] {
            assert_eq!(ndcg_at_k(&retrieved, &g, k), 0.0);
        }
    }

    #[test]
    fn test_ndcg_imperfect_ranking() {
        // grade-3 doc at rank 2: DCG = 3/log2(3), IDCG = 3/log2(2)
        let retrieved = ids(&["x", "d2"]);
        let g = grades(&[("d2", 3)]);
        let expected = (3.0 / 3.0f64.log2()) / 3.0;
        assert!((ndcg_at_k(&retrieved, &g, 2) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_average_precision_multiple_relevant() {
        // relevant at ranks 1 and 3: AP = (1/1 + 2/3) / 2
        let retrieved = ids(&["a", "b", "c"]);
        let relevant = id_set(&["a", "c"]);
        let expected = (1.0 + 2.0 / 3.0) / 2.0;
        assert!((average_precision(&retrieved, &relevant) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_relevant_set() {
        let retrieved = ids(&["a"]);
        let relevant = HashSet::new();
        assert_eq!(recall_at_k(&retrieved, &relevant, 1), 0.0);
        assert_eq!(average_precision(&retrieved, &relevant), 0.0);
        assert_eq!(reciprocal_rank(&retrieved, &relevant), 0.0);
    }

    #[test]
    fn test_compute_all_metrics_empty_batch() {
        let metrics = compute_all_metrics(&[], &[], &[], &[1, 5, 10]);
        for k in [1, 5, 10] {
            assert_eq!(metrics.precision_at_k[&k], 0.0);
            assert_eq!(metrics.recall_at_k[&k], 0.0);
            assert_eq!(metrics.ndcg_at_k[&k], 0.0);
            assert_eq!(metrics.hit_rate_at_k[&k], 0.0);
        }
        assert_eq!(metrics.mrr, 0.0);
        assert_eq!(metrics.map_score, 0.0);
    }

    #[test]
    fn test_compute_all_metrics_averages() {
        // two queries: perfect ranking and relevant-at-rank-2
        let all_retrieved = vec![ids(&["d2", "d1", "d3"]), ids(&["d1", "d2", "d3"])];
        let all_relevant = vec![id_set(&["d2"]), id_set(&["d2"])];
        let all_grades = vec![grades(&[("d2", 3)]), grades(&[("d2", 3)])];

        let metrics = compute_all_metrics(&all_retrieved, &all_relevant, &all_grades, &[1, 2]);
        assert_eq!(metrics.precision_at_k[&1], 0.5);
        assert_eq!(metrics.mrr, 0.75);
        assert_eq!(metrics.map_score, 0.75);
        assert_eq!(metrics.hit_rate_at_k[&1], 0.5);
        assert_eq!(metrics.hit_rate_at_k[&2], 1.0);
    }
}
