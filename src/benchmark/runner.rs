//! Benchmark run orchestration
//!
//! Each submitted run gets one background worker that drives every model
//! through embed -> index -> query -> evaluate, publishing progress into a
//! shared run registry. Models run sequentially inside a run to bound memory
//! and keep progress monotonic; separate runs execute concurrently as
//! independent workers.
//!
//! Cancellation is cooperative: the flag is polled before each model, each
//! document batch, and each query, which bounds cancellation latency to one
//! batch or one query. Provider calls have no timeout; a stalled provider
//! stalls its run (documented limitation, not silently fixed).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{info, warn};

use crate::config::{DEFAULT_BATCH_SIZE, DEFAULT_TOP_K_VALUES, MAX_MODELS_PER_RUN};
use crate::dataset::{Dataset, Document, RelevanceJudgment};
use crate::embedders::{Embedder, EmbedderRegistry};
use crate::error::{BenchError, Result};
use crate::evaluation::{
    compute_all_metrics, compute_performance_metrics, estimate_token_count, IRMetrics,
    LatencyTracker, PerformanceMetrics,
};

use super::cache::EmbeddingCache;
use super::retrieval::{FlatIndex, SimilarityMetric};

/// Lifecycle of a run. Transitions are strictly forward: a run starts in
/// `Running` and ends in exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        *self != Self::Running
    }
}

/// Options for a benchmark submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    pub model_ids: Vec<String>,
    pub top_k_values: Vec<usize>,
    pub similarity_metric: SimilarityMetric,
    pub normalize_embeddings: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            model_ids: Vec::new(),
            top_k_values: DEFAULT_TOP_K_VALUES.to_vec(),
            similarity_metric: SimilarityMetric::Cosine,
            normalize_embeddings: true,
        }
    }
}

/// One retrieved document with its similarity score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDoc {
    pub doc_id: String,
    pub score: f64,
}

/// Bounded per-query diagnostic kept with each model result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDiagnostic {
    pub query: String,
    /// Top-10 retrieved documents
    pub retrieved: Vec<RetrievedDoc>,
    pub relevant: Vec<String>,
}

/// Everything measured for one model in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBenchmarkResult {
    pub model_id: String,
    pub ir_metrics: IRMetrics,
    pub performance: PerformanceMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_query_results: Option<Vec<QueryDiagnostic>>,
}

/// Progress snapshot served to status polls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub run_id: String,
    pub status: RunStatus,
    pub current_model: Option<String>,
    pub models_completed: usize,
    pub total_models: usize,
    pub documents_embedded: usize,
    pub total_documents: usize,
    pub queries_processed: usize,
    pub total_queries: usize,
    pub elapsed_seconds: f64,
    pub eta_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full results bundle for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub run_id: String,
    pub dataset_id: String,
    pub status: RunStatus,
    pub model_results: Vec<ModelBenchmarkResult>,
    pub top_k_values: Vec<usize>,
    pub similarity_metric: SimilarityMetric,
    pub elapsed_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Mutable record of one run. Written only by its owning worker, except for
/// status, which a cancel request may flip through the handle.
#[derive(Debug)]
struct RunState {
    run_id: String,
    dataset_id: String,
    model_ids: Vec<String>,
    top_k_values: Vec<usize>,
    similarity_metric: SimilarityMetric,
    status: RunStatus,
    current_model: Option<String>,
    models_completed: usize,
    documents_embedded: usize,
    total_documents: usize,
    queries_processed: usize,
    total_queries: usize,
    elapsed_seconds: f64,
    eta_seconds: Option<f64>,
    model_results: Vec<ModelBenchmarkResult>,
    error: Option<String>,
}

/// Shared handle to a run: guarded state plus the atomic cancel flag, the
/// one legitimate cross-thread write into a live run.
pub(crate) struct RunHandle {
    state: RwLock<RunState>,
    cancelled: AtomicBool,
}

impl RunHandle {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Move to a terminal status. Only applies while the run is still
    /// `Running`, which keeps transitions monotonic under races with cancel.
    fn finish(&self, status: RunStatus, error: Option<String>) {
        let mut state = self.state.write().unwrap();
        if state.status == RunStatus::Running {
            state.status = status;
            state.error = error;
        }
    }

    fn progress(&self) -> RunProgress {
        let state = self.state.read().unwrap();
        RunProgress {
            run_id: state.run_id.clone(),
            status: state.status,
            current_model: state.current_model.clone(),
            models_completed: state.models_completed,
            total_models: state.model_ids.len(),
            documents_embedded: state.documents_embedded,
            total_documents: state.total_documents,
            queries_processed: state.queries_processed,
            total_queries: state.total_queries,
            elapsed_seconds: state.elapsed_seconds,
            eta_seconds: state.eta_seconds,
            error: state.error.clone(),
        }
    }

    fn results(&self) -> BenchmarkResults {
        let state = self.state.read().unwrap();
        BenchmarkResults {
            run_id: state.run_id.clone(),
            dataset_id: state.dataset_id.clone(),
            status: state.status,
            model_results: state.model_results.clone(),
            top_k_values: state.top_k_values.clone(),
            similarity_metric: state.similarity_metric,
            elapsed_seconds: state.elapsed_seconds,
            error: state.error.clone(),
        }
    }

    pub(crate) fn run_config(&self) -> (String, Vec<String>, SimilarityMetric) {
        let state = self.state.read().unwrap();
        (
            state.dataset_id.clone(),
            state.model_ids.clone(),
            state.similarity_metric,
        )
    }
}

/// Process-wide registry of runs. Never evicts: run records live for the
/// process lifetime (known resource-growth limitation).
#[derive(Default)]
pub struct RunRegistry {
    runs: RwLock<HashMap<String, Arc<RunHandle>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, handle: Arc<RunHandle>) {
        let run_id = handle.state.read().unwrap().run_id.clone();
        self.runs.write().unwrap().insert(run_id, handle);
    }

    pub(crate) fn handle(&self, run_id: &str) -> Option<Arc<RunHandle>> {
        self.runs.read().unwrap().get(run_id).cloned()
    }

    /// Non-blocking progress snapshot; None for unknown run ids.
    pub fn progress(&self, run_id: &str) -> Option<RunProgress> {
        self.handle(run_id).map(|h| h.progress())
    }

    /// Full results bundle including any partial per-model results.
    pub fn results(&self, run_id: &str) -> Option<BenchmarkResults> {
        self.handle(run_id).map(|h| h.results())
    }

    /// Request cancellation. Returns true only if the run was running; a
    /// second cancel or a cancel of a terminal run reports false.
    pub fn cancel(&self, run_id: &str) -> bool {
        let Some(handle) = self.handle(run_id) else {
            return false;
        };
        let mut state = handle.state.write().unwrap();
        if state.status != RunStatus::Running {
            return false;
        }
        handle.cancelled.store(true, Ordering::SeqCst);
        state.status = RunStatus::Cancelled;
        true
    }

    /// Progress snapshots of every known run.
    pub fn list(&self) -> Vec<RunProgress> {
        self.runs
            .read()
            .unwrap()
            .values()
            .map(|h| h.progress())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.runs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().unwrap().is_empty()
    }
}

/// Orchestrator service: owns the run registry and embedding cache, spawns
/// one worker per submitted run.
pub struct BenchmarkRunner {
    registry: Arc<RunRegistry>,
    cache: Arc<EmbeddingCache>,
    embedders: Arc<EmbedderRegistry>,
    batch_size: usize,
}

impl BenchmarkRunner {
    pub fn new(embedders: Arc<EmbedderRegistry>) -> Self {
        Self {
            registry: Arc::new(RunRegistry::new()),
            cache: Arc::new(EmbeddingCache::new()),
            embedders,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Replace the shared embedding cache (e.g. to share one across services).
    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    pub fn embedders(&self) -> &Arc<EmbedderRegistry> {
        &self.embedders
    }

    /// Submit a benchmark run.
    ///
    /// Validates the request and dataset synchronously, then spawns the
    /// background worker and returns the new run id. Must be called from
    /// within a tokio runtime.
    pub fn submit(&self, dataset: &Dataset, options: RunOptions) -> Result<String> {
        if options.model_ids.is_empty() {
            return Err(BenchError::Validation("no models selected".to_string()));
        }
        if options.model_ids.len() > MAX_MODELS_PER_RUN {
            return Err(BenchError::Validation(format!(
                "{} models selected (max {})",
                options.model_ids.len(),
                MAX_MODELS_PER_RUN
            )));
        }
        if options.top_k_values.is_empty() {
            return Err(BenchError::Validation("no top-k values given".to_string()));
        }
        if options.top_k_values.iter().any(|&k| k == 0) {
            return Err(BenchError::Validation("top-k values must be >= 1".to_string()));
        }
        dataset.validate()?;

        // Resolve every model up front so configuration errors fail the
        // submission, not the background run.
        for model_id in &options.model_ids {
            self.embedders.resolve(model_id)?;
        }

        let run_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let handle = Arc::new(RunHandle {
            state: RwLock::new(RunState {
                run_id: run_id.clone(),
                dataset_id: dataset.id.clone(),
                model_ids: options.model_ids.clone(),
                top_k_values: options.top_k_values.clone(),
                similarity_metric: options.similarity_metric,
                status: RunStatus::Running,
                current_model: None,
                models_completed: 0,
                documents_embedded: 0,
                total_documents: dataset.documents.len(),
                queries_processed: 0,
                total_queries: dataset.queries.len(),
                elapsed_seconds: 0.0,
                eta_seconds: None,
                model_results: Vec::new(),
                error: None,
            }),
            cancelled: AtomicBool::new(false),
        });
        self.registry.insert(Arc::clone(&handle));

        info!(
            run_id = %run_id,
            dataset = %dataset.id,
            models = options.model_ids.len(),
            documents = dataset.documents.len(),
            queries = dataset.queries.len(),
            "benchmark run submitted"
        );

        let worker = RunWorker {
            handle,
            cache: Arc::clone(&self.cache),
            embedders: Arc::clone(&self.embedders),
            batch_size: self.batch_size,
            dataset_id: dataset.id.clone(),
            documents: dataset.documents.clone(),
            queries: dataset.queries.clone(),
            options,
        };
        tokio::spawn(worker.run());

        Ok(run_id)
    }

    pub fn progress(&self, run_id: &str) -> Option<RunProgress> {
        self.registry.progress(run_id)
    }

    pub fn results(&self, run_id: &str) -> Option<BenchmarkResults> {
        self.registry.results(run_id)
    }

    pub fn cancel(&self, run_id: &str) -> bool {
        self.registry.cancel(run_id)
    }
}

/// Owned context for one background worker
struct RunWorker {
    handle: Arc<RunHandle>,
    cache: Arc<EmbeddingCache>,
    embedders: Arc<EmbedderRegistry>,
    batch_size: usize,
    dataset_id: String,
    documents: Vec<Document>,
    queries: Vec<RelevanceJudgment>,
    options: RunOptions,
}

impl RunWorker {
    async fn run(self) {
        let started = Instant::now();
        let model_ids = self.options.model_ids.clone();
        let total_models = model_ids.len();

        for (model_idx, model_id) in model_ids.iter().enumerate() {
            // Cancel may land between models; the registry already flipped
            // the status, the worker just stops producing.
            if self.handle.is_cancelled() {
                info!(run_id = %self.run_id(), model = %model_id, "run cancelled before model");
                return;
            }

            {
                let mut state = self.handle.state.write().unwrap();
                state.current_model = Some(model_id.clone());
            }
            info!(run_id = %self.run_id(), model = %model_id, "benchmarking model");

            match self.process_model(model_id).await {
                Ok(Some(result)) => {
                    let elapsed = started.elapsed().as_secs_f64();
                    let mut state = self.handle.state.write().unwrap();
                    state.model_results.push(result);
                    state.models_completed = model_idx + 1;
                    state.documents_embedded = 0;
                    state.queries_processed = 0;
                    state.elapsed_seconds = elapsed;
                    if model_idx + 1 < total_models {
                        // Linear heuristic: average completed-model time times
                        // models remaining. Ignores per-model rate variance.
                        let remaining = (total_models - model_idx - 1) as f64;
                        let avg = elapsed / (model_idx + 1) as f64;
                        state.eta_seconds = Some(avg * remaining);
                    }
                }
                Ok(None) => {
                    info!(run_id = %self.run_id(), model = %model_id, "run cancelled mid-model");
                    return;
                }
                Err(e) => {
                    warn!(run_id = %self.run_id(), model = %model_id, error = %e, "model benchmark failed");
                    let msg = e.to_string();
                    {
                        let mut state = self.handle.state.write().unwrap();
                        state.elapsed_seconds = started.elapsed().as_secs_f64();
                    }
                    self.handle.finish(RunStatus::Failed, Some(msg));
                    return;
                }
            }
        }

        {
            let mut state = self.handle.state.write().unwrap();
            state.elapsed_seconds = started.elapsed().as_secs_f64();
            state.eta_seconds = Some(0.0);
            state.current_model = None;
        }
        self.handle.finish(RunStatus::Completed, None);
        info!(run_id = %self.run_id(), models = total_models, "benchmark run completed");
    }

    fn run_id(&self) -> String {
        self.handle.state.read().unwrap().run_id.clone()
    }

    /// Run the full pipeline for one model. Returns Ok(None) when a cancel
    /// request was observed mid-model.
    async fn process_model(&self, model_id: &str) -> Result<Option<ModelBenchmarkResult>> {
        let embedder = self.embedders.resolve(model_id)?;
        if !embedder.is_available().await {
            return Err(BenchError::ProviderUnavailable(format!(
                "model '{}' failed availability check",
                model_id
            )));
        }

        let entry = self
            .embedders
            .catalog()
            .get(model_id)
            .ok_or_else(|| BenchError::Config(format!("unknown model: {}", model_id)))?
            .clone();

        let doc_texts: Vec<String> = self.documents.iter().map(|d| d.text.clone()).collect();
        let doc_ids: Vec<String> = self.documents.iter().map(|d| d.doc_id.clone()).collect();
        let max_k = self.options.top_k_values.iter().copied().max().unwrap_or(10);

        let mut embed_latency = LatencyTracker::new();
        let mut query_latency = LatencyTracker::new();

        // Document embedding: cache hit skips provider calls entirely.
        let (doc_embeddings, index_doc_ids) =
            match self.cache.get(model_id, &self.dataset_id) {
                Some(entry) => (entry.embeddings.clone(), entry.doc_ids.clone()),
                None => {
                    match self
                        .embed_documents(&embedder, &doc_texts, &mut embed_latency)
                        .await?
                    {
                        Some(mut embeddings) => {
                            if self.options.normalize_embeddings {
                                for row in embeddings.iter_mut() {
                                    l2_normalize_row(row);
                                }
                            }
                            self.cache.set(
                                model_id,
                                &self.dataset_id,
                                embeddings.clone(),
                                doc_ids.clone(),
                            );
                            (embeddings, doc_ids.clone())
                        }
                        None => return Ok(None),
                    }
                }
            };

        let total_embed_time_sec = if embed_latency.is_empty() {
            0.01
        } else {
            embed_latency.total_ms() / 1000.0
        };

        // The index is rebuilt per run; only raw vectors are cached because
        // index layout depends on the metric choice.
        let index = FlatIndex::build(&doc_embeddings, self.options.similarity_metric)?;

        // Query stage
        let mut all_retrieved: Vec<Vec<String>> = Vec::with_capacity(self.queries.len());
        let mut diagnostics: Vec<QueryDiagnostic> = Vec::with_capacity(self.queries.len());

        for (qi, judgment) in self.queries.iter().enumerate() {
            if self.handle.is_cancelled() {
                return Ok(None);
            }

            let t0 = Instant::now();
            let mut q_rows = embedder
                .embed_queries(std::slice::from_ref(&judgment.query))
                .await
                .map_err(into_embedding_error)?;
            let mut q_vec = q_rows.pop().ok_or_else(|| {
                BenchError::Embedding(format!(
                    "model '{}' returned no rows for query embedding",
                    model_id
                ))
            })?;
            if self.options.normalize_embeddings {
                l2_normalize_row(&mut q_vec);
            }
            query_latency.record(t0.elapsed().as_secs_f64() * 1000.0);

            let hits = index.search(std::slice::from_ref(&q_vec), &index_doc_ids, max_k)?;
            let hits = hits.into_iter().next().unwrap_or_default();

            all_retrieved.push(hits.iter().map(|(d, _)| d.clone()).collect());
            diagnostics.push(QueryDiagnostic {
                query: judgment.query.clone(),
                retrieved: hits
                    .iter()
                    .take(10)
                    .map(|(d, s)| RetrievedDoc {
                        doc_id: d.clone(),
                        score: round4(*s as f64),
                    })
                    .collect(),
                relevant: judgment.relevant_doc_ids.clone(),
            });

            let mut state = self.handle.state.write().unwrap();
            state.queries_processed = qi + 1;
        }

        // Evaluation
        let all_relevant: Vec<_> = self.queries.iter().map(|q| q.relevant_set()).collect();
        let all_grades: Vec<_> = self.queries.iter().map(|q| q.grades()).collect();
        let ir_metrics: IRMetrics = compute_all_metrics(
            &all_retrieved,
            &all_relevant,
            &all_grades,
            &self.options.top_k_values,
        );

        let total_tokens: usize = doc_texts.iter().map(|t| estimate_token_count(t)).sum();
        let performance: PerformanceMetrics = compute_performance_metrics(
            &embed_latency,
            &query_latency,
            total_embed_time_sec,
            doc_texts.len(),
            entry.dimension,
            total_tokens,
            entry.cost_per_1k_tokens,
        );

        Ok(Some(ModelBenchmarkResult {
            model_id: model_id.to_string(),
            ir_metrics,
            performance,
            per_query_results: Some(diagnostics),
        }))
    }

    /// Embed documents in fixed-size batches, polling cancellation between
    /// batches. Per-document latency is the batch wall time divided evenly
    /// across its members. Returns Ok(None) on cancellation.
    async fn embed_documents(
        &self,
        embedder: &Arc<dyn Embedder>,
        doc_texts: &[String],
        embed_latency: &mut LatencyTracker,
    ) -> Result<Option<Vec<Vec<f32>>>> {
        let mut all_rows: Vec<Vec<f32>> = Vec::with_capacity(doc_texts.len());

        for batch_start in (0..doc_texts.len()).step_by(self.batch_size) {
            if self.handle.is_cancelled() {
                return Ok(None);
            }
            let batch = &doc_texts[batch_start..(batch_start + self.batch_size).min(doc_texts.len())];

            let t0 = Instant::now();
            let rows = embedder
                .embed_documents(batch)
                .await
                .map_err(into_embedding_error)?;
            let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;

            if rows.len() != batch.len() {
                return Err(BenchError::Embedding(format!(
                    "embedder returned {} rows for a batch of {}",
                    rows.len(),
                    batch.len()
                )));
            }
            for _ in batch {
                embed_latency.record(elapsed_ms / batch.len() as f64);
            }
            all_rows.extend(rows);

            let mut state = self.handle.state.write().unwrap();
            state.documents_embedded = all_rows.len();
        }

        Ok(Some(all_rows))
    }
}

fn l2_normalize_row(row: &mut [f32]) {
    let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm = norm.max(1e-10);
    for x in row.iter_mut() {
        *x /= norm;
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Keep provider error kinds intact, wrap anything else as an embedding failure.
fn into_embedding_error(e: BenchError) -> BenchError {
    match e {
        BenchError::Embedding(_) | BenchError::ProviderUnavailable(_) => e,
        other => BenchError::Embedding(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelCatalog, ModelEntry};
    use crate::dataset::Document;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Scripted embedder: fixed vector per known text, optional failure and
    /// an optional gate that blocks document embedding until notified.
    struct ScriptedEmbedder {
        model_id: String,
        dimension: usize,
        vectors: HashMap<String, Vec<f32>>,
        fail_documents: bool,
        gate: Option<Arc<Notify>>,
        doc_calls: Arc<AtomicUsize>,
    }

    impl ScriptedEmbedder {
        fn lookup(&self, text: &str) -> Vec<f32> {
            self.vectors.get(text).cloned().unwrap_or_else(|| {
                let mut v = vec![0.0; self.dimension];
                v[0] = 1.0;
                v
            })
        }
    }

    #[async_trait]
    impl Embedder for ScriptedEmbedder {
        fn model_id(&self) -> &str {
            &self.model_id
        }
        fn dimension(&self) -> usize {
            self.dimension
        }
        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail_documents {
                return Err(BenchError::Embedding("scripted failure: boom".to_string()));
            }
            self.doc_calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| self.lookup(t)).collect())
        }
        async fn embed_queries(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| self.lookup(t)).collect())
        }
        async fn is_available(&self) -> bool {
            true
        }
    }

    struct MockSetup {
        runner: BenchmarkRunner,
        doc_calls: Arc<AtomicUsize>,
        gate: Arc<Notify>,
    }

    /// Catalog with mock/m1 and mock/m2; m2 optionally gated or failing.
    fn setup(gate_m2: bool, fail_m2: bool) -> MockSetup {
        let mut models = BTreeMap::new();
        for name in ["m1", "m2"] {
            models.insert(
                format!("mock/{}", name),
                ModelEntry {
                    provider: "mock".to_string(),
                    model_name: name.to_string(),
                    dimension: 3,
                    max_tokens: 512,
                    cost_per_1k_tokens: 0.0,
                    query_prefix: String::new(),
                    document_prefix: String::new(),
                    description: String::new(),
                },
            );
        }
        let catalog = ModelCatalog { models };

        let mut vectors = HashMap::new();
        vectors.insert("alpha text".to_string(), vec![1.0, 0.0, 0.0]);
        vectors.insert("beta text".to_string(), vec![0.0, 1.0, 0.0]);
        vectors.insert("gamma text".to_string(), vec![0.0, 0.0, 1.0]);
        vectors.insert("find beta".to_string(), vec![0.0, 1.0, 0.0]);

        let doc_calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut registry = EmbedderRegistry::new(catalog);
        {
            let vectors = vectors.clone();
            let doc_calls = Arc::clone(&doc_calls);
            let gate = Arc::clone(&gate);
            registry.register_provider("mock", move |model_id, entry| {
                let is_m2 = model_id.ends_with("/m2");
                Ok(Arc::new(ScriptedEmbedder {
                    model_id: model_id.to_string(),
                    dimension: entry.dimension,
                    vectors: vectors.clone(),
                    fail_documents: fail_m2 && is_m2,
                    gate: (gate_m2 && is_m2).then(|| Arc::clone(&gate)),
                    doc_calls: Arc::clone(&doc_calls),
                }) as Arc<dyn Embedder>)
            });
        }

        MockSetup {
            runner: BenchmarkRunner::new(Arc::new(registry)),
            doc_calls,
            gate,
        }
    }

    fn test_dataset() -> Dataset {
        Dataset {
            id: "ds-test".to_string(),
            name: "Test".to_string(),
            description: String::new(),
            documents: vec![
                Document {
                    doc_id: "d1".to_string(),
                    text: "alpha text".to_string(),
                    metadata: None,
                },
                Document {
                    doc_id: "d2".to_string(),
                    text: "beta text".to_string(),
                    metadata: None,
                },
                Document {
                    doc_id: "d3".to_string(),
                    text: "gamma text".to_string(),
                    metadata: None,
                },
            ],
            queries: vec![RelevanceJudgment {
                query: "find beta".to_string(),
                relevant_doc_ids: vec!["d2".to_string()],
                relevance_grades: None,
            }],
        }
    }

    fn options(model_ids: &[&str]) -> RunOptions {
        RunOptions {
            model_ids: model_ids.iter().map(|s| s.to_string()).collect(),
            top_k_values: vec![1, 3],
            similarity_metric: SimilarityMetric::Cosine,
            normalize_embeddings: true,
        }
    }

    async fn wait_until<F>(runner: &BenchmarkRunner, run_id: &str, predicate: F) -> RunProgress
    where
        F: Fn(&RunProgress) -> bool,
    {
        for _ in 0..1000 {
            if let Some(progress) = runner.progress(run_id) {
                if predicate(&progress) {
                    return progress;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for run {}", run_id);
    }

    #[tokio::test]
    async fn test_full_run_completes() {
        let setup = setup(false, false);
        let dataset = test_dataset();
        let run_id = setup.runner.submit(&dataset, options(&["mock/m1"])).unwrap();

        let progress = wait_until(&setup.runner, &run_id, |p| p.status.is_terminal()).await;
        assert_eq!(progress.status, RunStatus::Completed);
        assert_eq!(progress.models_completed, 1);
        assert_eq!(progress.eta_seconds, Some(0.0));
        assert!(progress.current_model.is_none());

        let results = setup.runner.results(&run_id).unwrap();
        assert_eq!(results.model_results.len(), 1);

        let result = &results.model_results[0];
        assert_eq!(result.model_id, "mock/m1");
        // query vector equals d2's document vector, so d2 must rank first
        assert_eq!(result.ir_metrics.precision_at_k[&1], 1.0);
        assert_eq!(result.ir_metrics.mrr, 1.0);
        assert_eq!(result.ir_metrics.hit_rate_at_k[&1], 1.0);
        assert_eq!(result.performance.embedding_dimension, 3);

        let diags = result.per_query_results.as_ref().unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].retrieved[0].doc_id, "d2");
        assert_eq!(diags[0].relevant, vec!["d2".to_string()]);
    }

    #[tokio::test]
    async fn test_cancellation_between_models() {
        let setup = setup(true, false);
        let dataset = test_dataset();
        let run_id = setup
            .runner
            .submit(&dataset, options(&["mock/m1", "mock/m2"]))
            .unwrap();

        // wait for the worker to finish m1 and block inside m2's gated embed
        wait_until(&setup.runner, &run_id, |p| {
            p.models_completed == 1 && p.current_model.as_deref() == Some("mock/m2")
        })
        .await;

        assert!(setup.runner.cancel(&run_id));
        let progress = setup.runner.progress(&run_id).unwrap();
        assert_eq!(progress.status, RunStatus::Cancelled);

        // unblock the worker; it must observe the flag and stop
        setup.gate.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let progress = setup.runner.progress(&run_id).unwrap();
        assert_eq!(progress.status, RunStatus::Cancelled, "status must never revert");
        let results = setup.runner.results(&run_id).unwrap();
        assert_eq!(results.model_results.len(), 1);

        // cancel of a terminal run reports failure
        assert!(!setup.runner.cancel(&run_id));
    }

    #[tokio::test]
    async fn test_failure_marks_run_failed_keeps_prior_results() {
        let setup = setup(false, true);
        let dataset = test_dataset();
        let run_id = setup
            .runner
            .submit(&dataset, options(&["mock/m1", "mock/m2"]))
            .unwrap();

        let progress = wait_until(&setup.runner, &run_id, |p| p.status.is_terminal()).await;
        assert_eq!(progress.status, RunStatus::Failed);
        assert!(progress.error.as_ref().unwrap().contains("boom"));

        let results = setup.runner.results(&run_id).unwrap();
        assert_eq!(results.model_results.len(), 1);
        assert_eq!(results.model_results[0].model_id, "mock/m1");
    }

    #[tokio::test]
    async fn test_cache_reuse_across_runs() {
        let setup = setup(false, false);
        let dataset = test_dataset();

        let run1 = setup.runner.submit(&dataset, options(&["mock/m1"])).unwrap();
        wait_until(&setup.runner, &run1, |p| p.status.is_terminal()).await;
        let calls_after_first = setup.doc_calls.load(Ordering::SeqCst);
        assert_eq!(calls_after_first, 1, "3 docs fit one batch");
        assert!(setup.runner.cache().has("mock/m1", "ds-test"));

        let run2 = setup.runner.submit(&dataset, options(&["mock/m1"])).unwrap();
        let progress = wait_until(&setup.runner, &run2, |p| p.status.is_terminal()).await;
        assert_eq!(progress.status, RunStatus::Completed);
        assert_eq!(
            setup.doc_calls.load(Ordering::SeqCst),
            calls_after_first,
            "second run must reuse cached document embeddings"
        );
    }

    #[tokio::test]
    async fn test_submit_validation() {
        let setup = setup(false, false);
        let dataset = test_dataset();

        let err = setup.runner.submit(&dataset, options(&[])).unwrap_err();
        assert!(matches!(err, BenchError::Validation(_)));

        let err = setup
            .runner
            .submit(&dataset, options(&["mock/unknown"]))
            .unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));

        let seven: Vec<&str> = std::iter::repeat("mock/m1").take(7).collect();
        let err = setup.runner.submit(&dataset, options(&seven)).unwrap_err();
        assert!(matches!(err, BenchError::Validation(_)));

        let mut bad_dataset = dataset.clone();
        bad_dataset.queries[0].relevant_doc_ids = vec!["nope".to_string()];
        let err = setup
            .runner
            .submit(&bad_dataset, options(&["mock/m1"]))
            .unwrap_err();
        assert!(matches!(err, BenchError::Validation(_)));

        let mut zero_k = options(&["mock/m1"]);
        zero_k.top_k_values = vec![0];
        let err = setup.runner.submit(&dataset, zero_k).unwrap_err();
        assert!(matches!(err, BenchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_run_queries() {
        let setup = setup(false, false);
        assert!(setup.runner.progress("missing").is_none());
        assert!(setup.runner.results("missing").is_none());
        assert!(!setup.runner.cancel("missing"));
    }
}
