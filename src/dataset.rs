//! Dataset model and validation
//!
//! A dataset is an immutable-for-the-run snapshot of documents plus queries
//! with relevance judgments. Storage and upload live outside this crate; the
//! orchestrator only needs loading and submission-time validation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::config::{MAX_DATASET_DOCUMENTS, MAX_DATASET_QUERIES};
use crate::error::BenchError;

/// A single document in the corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A query with its relevance judgments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceJudgment {
    pub query: String,
    pub relevant_doc_ids: Vec<String>,
    /// doc_id -> grade (0-3); absent means binary relevance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_grades: Option<HashMap<String, u8>>,
}

impl RelevanceJudgment {
    /// Relevance grades for this query, defaulting every relevant id to
    /// grade 3 when no explicit grades were supplied.
    pub fn grades(&self) -> HashMap<String, u8> {
        match &self.relevance_grades {
            Some(grades) if !grades.is_empty() => grades.clone(),
            _ => self
                .relevant_doc_ids
                .iter()
                .map(|d| (d.clone(), 3))
                .collect(),
        }
    }

    /// Set of relevant doc ids
    pub fn relevant_set(&self) -> HashSet<String> {
        self.relevant_doc_ids.iter().cloned().collect()
    }
}

/// A full dataset: corpus plus judged queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub documents: Vec<Document>,
    pub queries: Vec<RelevanceJudgment>,
}

impl Dataset {
    /// Load a dataset from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset: {:?}", path))?;
        let dataset: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse dataset: {:?}", path))?;
        Ok(dataset)
    }

    /// Validate the dataset for benchmark submission.
    ///
    /// Rejects empty corpora, size-cap violations, queries with no relevant
    /// ids, and judgments referencing unknown documents. Runs synchronously
    /// before any background work starts.
    pub fn validate(&self) -> std::result::Result<(), BenchError> {
        if self.documents.is_empty() {
            return Err(BenchError::Validation(format!(
                "dataset '{}' has no documents",
                self.id
            )));
        }
        if self.documents.len() > MAX_DATASET_DOCUMENTS {
            return Err(BenchError::Validation(format!(
                "dataset '{}' has {} documents (max {})",
                self.id,
                self.documents.len(),
                MAX_DATASET_DOCUMENTS
            )));
        }
        if self.queries.is_empty() {
            return Err(BenchError::Validation(format!(
                "dataset '{}' has no queries",
                self.id
            )));
        }
        if self.queries.len() > MAX_DATASET_QUERIES {
            return Err(BenchError::Validation(format!(
                "dataset '{}' has {} queries (max {})",
                self.id,
                self.queries.len(),
                MAX_DATASET_QUERIES
            )));
        }

        let known_ids: HashSet<&str> = self.documents.iter().map(|d| d.doc_id.as_str()).collect();
        if known_ids.len() != self.documents.len() {
            return Err(BenchError::Validation(format!(
                "dataset '{}' contains duplicate doc_ids",
                self.id
            )));
        }

        for judgment in &self.queries {
            if judgment.relevant_doc_ids.is_empty() {
                return Err(BenchError::Validation(format!(
                    "query '{}' has no relevant doc ids",
                    judgment.query
                )));
            }
            for doc_id in &judgment.relevant_doc_ids {
                if !known_ids.contains(doc_id.as_str()) {
                    return Err(BenchError::Validation(format!(
                        "query '{}' references unknown doc_id '{}'",
                        judgment.query, doc_id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Average document length in characters
    pub fn avg_doc_length(&self) -> f64 {
        if self.documents.is_empty() {
            return 0.0;
        }
        let total: usize = self.documents.iter().map(|d| d.text.chars().count()).sum();
        total as f64 / self.documents.len() as f64
    }
}
