//! Top-level orchestration.
//!
//! [`AdvancedManager`] owns one instance of every orchestration component and
//! wires them together for a run:
//!
//! 1. each document is looked up in the result cache,
//! 2. misses are analyzed through the streaming analyzer (large batches), the
//!    parallel processor, or the sequential fallback,
//! 3. fresh results get plugin metrics merged in and are cached,
//! 4. cached and fresh results are aggregated into an [`AnalysisRunResult`].
//!
//! Any component can be disabled in [`DriftConfig`]; a disabled component is
//! simply absent.
//!
//! # Examples
//!
//! ```
//! use tokdrift::analysis::TokenizerRegistry;
//! use tokdrift::config::DriftConfig;
//! use tokdrift::document::Document;
//! use tokdrift::manager::AdvancedManager;
//! use tokdrift::util::CancellationToken;
//!
//! let manager = AdvancedManager::new(
//!     DriftConfig::default(),
//!     TokenizerRegistry::with_builtins().unwrap(),
//! ).unwrap();
//!
//! let docs = Document::from_texts(["the cat sat", "the dog sat"]);
//! let run = manager
//!     .analyze_with_advanced(&CancellationToken::new(), docs, "whitespace", None)
//!     .unwrap();
//! assert_eq!(run.results.len(), 2);
//! manager.close().unwrap();
//! ```

pub mod result;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use ahash::AHashMap;
use chrono::Utc;
use uuid::Uuid;

use crate::analysis::registry::{TokenizerHandle, TokenizerRegistry};
use crate::cache::{CacheKey, ResultCache};
use crate::config::DriftConfig;
use crate::document::Document;
use crate::error::{DriftError, Result};
use crate::metrics::{AnalysisResult, DriftMetrics, MetricValue, MetricsEngine};
use crate::parallel::{
    AnalyzeFn, ParallelProcessor, ProcessOutcome, WorkFailure, WorkItem, process_sequential,
};
use crate::plugin::{AnalysisContext, PluginRegistry};
use crate::streaming::{ProgressUpdate, StreamingAnalyzer, VecSource};
use crate::util::CancellationToken;

pub use result::{AnalysisRunResult, ComparisonReport, RunStatistics};

/// Progress callback accepted by the manager.
pub type ProgressFn<'a> = &'a mut dyn FnMut(&ProgressUpdate);

/// Owns and coordinates the cache, processor, streamer and plugin registry.
pub struct AdvancedManager {
    config: DriftConfig,
    tokenizers: TokenizerRegistry,
    engine: Arc<MetricsEngine>,
    cache: Option<ResultCache>,
    processor: Option<Arc<ParallelProcessor>>,
    streamer: Option<StreamingAnalyzer>,
    plugins: Option<PluginRegistry>,
    closed: AtomicBool,
}

impl AdvancedManager {
    /// Build a manager, constructing every enabled component.
    ///
    /// Fails with `InvalidConfig` when any section is invalid.
    pub fn new(config: DriftConfig, tokenizers: TokenizerRegistry) -> Result<Self> {
        config.validate()?;

        let engine = Arc::new(MetricsEngine::new(config.analysis.clone())?);

        let cache = if config.cache.enabled {
            Some(ResultCache::new(config.cache.clone())?)
        } else {
            None
        };

        let processor = if config.parallel.enabled {
            Some(Arc::new(ParallelProcessor::new(config.parallel.clone())?))
        } else {
            None
        };

        let streamer = if config.streaming.enabled {
            Some(StreamingAnalyzer::new(
                config.streaming.clone(),
                processor.clone(),
                config.parallel.clone(),
            )?)
        } else {
            None
        };

        let plugins = if config.plugins.enabled {
            Some(PluginRegistry::from_config(&config.plugins)?)
        } else {
            None
        };

        log::info!(
            "manager ready (cache: {}, parallel: {}, streaming: {}, plugins: {})",
            cache.is_some(),
            processor
                .as_ref()
                .map_or(0, |p| p.worker_count()),
            streamer.is_some(),
            plugins.as_ref().map_or(0, PluginRegistry::len)
        );

        Ok(Self {
            config,
            tokenizers,
            engine,
            cache,
            processor,
            streamer,
            plugins,
            closed: AtomicBool::new(false),
        })
    }

    /// Configuration in effect.
    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// The tokenizers this manager resolves names through.
    pub fn tokenizer_registry(&self) -> &TokenizerRegistry {
        &self.tokenizers
    }

    /// The metrics engine.
    pub fn engine(&self) -> &MetricsEngine {
        &self.engine
    }

    /// The result cache, when enabled.
    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    /// The parallel processor, when enabled.
    pub fn processor(&self) -> Option<&ParallelProcessor> {
        self.processor.as_deref()
    }

    /// The streaming analyzer, when enabled.
    pub fn streamer(&self) -> Option<&StreamingAnalyzer> {
        self.streamer.as_ref()
    }

    /// The plugin registry, when enabled.
    pub fn plugin_registry(&self) -> Option<&PluginRegistry> {
        self.plugins.as_ref()
    }

    /// Analyze `documents` with the tokenizer registered as `tokenizer_name`.
    ///
    /// Tokenizer failures of individual documents are listed in the run's
    /// `failures`. A plugin failure aborts the run with `Err`. When streaming
    /// times out or `cancel` fires, the run returns `Ok` with what finished
    /// and `interrupted` set.
    pub fn analyze_with_advanced(
        &self,
        cancel: &CancellationToken,
        documents: Vec<Document>,
        tokenizer_name: &str,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<AnalysisRunResult> {
        self.ensure_open()?;

        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = Uuid::new_v4();

        let handle = self.tokenizers.get(tokenizer_name).map_err(|_| {
            DriftError::invalid_config(format!("unknown tokenizer '{tokenizer_name}'"))
        })?;
        let key_config = self.key_config(&handle);

        let mut order = AHashMap::with_capacity(documents.len());
        let mut statistics = RunStatistics {
            documents: documents.len(),
            ..RunStatistics::default()
        };
        let mut results = Vec::with_capacity(documents.len());
        let mut misses = Vec::new();

        for (index, document) in documents.into_iter().enumerate() {
            order.entry(document.id().to_string()).or_insert(index);

            let cached = self.cache.as_ref().and_then(|cache| {
                cache.get(&CacheKey::new(document.text(), &handle.name, &key_config))
            });
            match cached {
                Some(hit) => {
                    statistics.cache_hits += 1;
                    results.push(rebind(hit, document));
                }
                None => misses.push(document),
            }
        }
        statistics.cache_misses = misses.len();

        log::debug!(
            "run {run_id}: {} documents, {} cached, {} to analyze with '{}'",
            statistics.documents,
            statistics.cache_hits,
            statistics.cache_misses,
            handle.name
        );

        let analyze = self.analyze_fn(&handle);
        let mut failures = Vec::new();
        let mut interrupted = None;

        let stream_threshold = self.config.streaming.chunk_size;
        match &self.streamer {
            Some(streamer) if misses.len() > stream_threshold => {
                statistics.streamed = true;
                let mut sink = |result: AnalysisResult| -> Result<()> {
                    results.push(self.finish_result(cancel, &key_config, result)?);
                    Ok(())
                };
                let outcome = streamer.stream_with_sink(
                    cancel,
                    VecSource::new(misses),
                    &handle.name,
                    analyze,
                    progress,
                    &mut sink,
                )?;
                failures = outcome.failures;
                statistics.process = outcome.metrics;
                statistics.stream = Some(outcome.stats);
                interrupted = outcome.interruption.map(|e| e.to_string());
            }
            _ if !misses.is_empty() => {
                let chunk_start = Instant::now();
                let documents_in_chunk = misses.len();
                let items: Vec<WorkItem> = misses
                    .into_iter()
                    .map(|doc| WorkItem::new(Arc::new(doc), handle.name.clone()))
                    .collect();

                let outcome = self.dispatch(cancel, items, analyze);
                for result in outcome.results {
                    results.push(self.finish_result(cancel, &key_config, result)?);
                }
                failures = outcome.failures;
                statistics.process = outcome.metrics;

                if let Some(callback) = progress.filter(|_| self.config.streaming.enable_progress) {
                    callback(&ProgressUpdate {
                        chunk_index: 0,
                        total_chunks: Some(1),
                        documents_in_chunk,
                        documents_processed: documents_in_chunk,
                        elapsed: chunk_start.elapsed(),
                    });
                }
                if cancel.is_cancelled() {
                    interrupted = cancel.check("analysis run").err().map(|e| e.to_string());
                }
            }
            _ => {}
        }

        let position = |id: &str| order.get(id).copied().unwrap_or(usize::MAX);
        results.sort_by_key(|r| position(r.document_id()));
        failures.sort_by_key(|f: &WorkFailure| position(&f.document_id));

        statistics.cache = self.cache.as_ref().map(ResultCache::stats);

        let finished_at = Utc::now();
        let duration = start.elapsed();
        log::info!(
            "run {run_id} with '{}': {} results ({} cached), {} failures in {:?}",
            handle.name,
            results.len(),
            statistics.cache_hits,
            failures.len(),
            duration
        );

        Ok(AnalysisRunResult {
            run_id,
            tokenizer: handle.name,
            started_at,
            finished_at,
            duration,
            config: self.config.clone(),
            results,
            failures,
            statistics,
            interrupted,
        })
    }

    /// Analyze `documents` with each tokenizer and compute pairwise drift.
    ///
    /// Drift is computed for every pair `(A, B)` where A comes before B in
    /// `tokenizer_names`, pairing results by document id. When drift detection
    /// is disabled only the runs are returned.
    pub fn compare_tokenizers<S: AsRef<str>>(
        &self,
        cancel: &CancellationToken,
        documents: Vec<Document>,
        tokenizer_names: &[S],
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<ComparisonReport> {
        self.ensure_open()?;
        if tokenizer_names.is_empty() {
            return Err(DriftError::invalid_config(
                "at least one tokenizer is required for a comparison",
            ));
        }
        let names: Vec<String> = tokenizer_names.iter().map(|n| n.as_ref().to_string()).collect();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(DriftError::invalid_config(format!(
                    "tokenizer '{name}' is listed twice"
                )));
            }
        }

        let start = Instant::now();
        let mut runs = Vec::with_capacity(names.len());
        for name in &names {
            let run = self.analyze_with_advanced(
                cancel,
                documents.clone(),
                name,
                progress
                    .as_mut()
                    .map(|p| &mut **p as &mut dyn FnMut(&ProgressUpdate)),
            )?;
            runs.push(run);
        }

        let drift = if self.config.analysis.drift_detection {
            self.pairwise_drift(&runs)?
        } else {
            Vec::new()
        };

        Ok(ComparisonReport {
            comparison_id: Uuid::new_v4(),
            tokenizers: names,
            runs,
            drift,
            duration: start.elapsed(),
        })
    }

    /// Stop the cache sweeper and close the plugin registry.
    ///
    /// Closing twice is a no-op. After closing, runs fail with
    /// `InvalidOperation`.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(cache) = &self.cache {
            cache.close();
        }
        if let Some(plugins) = &self.plugins {
            plugins.close()?;
        }
        log::debug!("manager closed");
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DriftError::invalid_operation("manager is closed"));
        }
        Ok(())
    }

    /// Everything besides text and tokenizer name that changes a result.
    fn key_config(&self, handle: &TokenizerHandle) -> BTreeMap<String, String> {
        let options = &self.config.analysis;
        let mut config: BTreeMap<String, String> = handle
            .config_snapshot()
            .into_iter()
            .map(|(k, v)| (format!("tokenizer.{k}"), v))
            .collect();
        config.insert(
            "analysis.entropy_window_size".to_string(),
            options.entropy_window_size.to_string(),
        );
        config.insert(
            "analysis.normalize_entropy".to_string(),
            options.normalize_entropy.to_string(),
        );
        config.insert(
            "analysis.compression_ratio".to_string(),
            options.compression_ratio.to_string(),
        );
        if let Some(plugins) = &self.plugins {
            config.insert("plugins.fingerprint".to_string(), plugins.fingerprint());
        }
        config
    }

    fn analyze_fn(&self, handle: &TokenizerHandle) -> Arc<AnalyzeFn> {
        let engine = Arc::clone(&self.engine);
        let handle = handle.clone();
        Arc::new(move |item: &WorkItem, token: &CancellationToken| {
            engine.analyze_document(token, Arc::clone(&item.document), &handle)
        })
    }

    fn dispatch(
        &self,
        cancel: &CancellationToken,
        items: Vec<WorkItem>,
        analyze: Arc<AnalyzeFn>,
    ) -> ProcessOutcome {
        match &self.processor {
            Some(processor) => processor.process_shared(cancel, items, analyze),
            None => process_sequential(cancel, items, &self.config.parallel, analyze.as_ref()),
        }
    }

    /// Merge plugin metrics into a fresh result and cache it.
    fn finish_result(
        &self,
        cancel: &CancellationToken,
        key_config: &BTreeMap<String, String>,
        mut result: AnalysisResult,
    ) -> Result<Arc<AnalysisResult>> {
        if let Some(plugins) = &self.plugins {
            let ctx = AnalysisContext::new(
                result.document.id(),
                result.document.text(),
                &result.tokenization,
                &result.tokenizer,
                cancel,
            );
            let plugin_metrics = plugins.execute_metrics(&ctx)?;
            for (plugin, metrics) in plugin_metrics {
                for metric in metrics {
                    result.metrics.insert(
                        format!("{plugin}.{}", metric.name),
                        MetricValue {
                            value: metric.value,
                            unit: metric.unit,
                            metadata: metric.metadata,
                        },
                    );
                }
            }
        }

        let result = Arc::new(result);
        if let Some(cache) = &self.cache {
            let key = CacheKey::new(result.document.text(), &result.tokenizer, key_config);
            cache.put(key, Arc::clone(&result));
        }
        Ok(result)
    }

    fn pairwise_drift(&self, runs: &[AnalysisRunResult]) -> Result<Vec<DriftMetrics>> {
        let mut drift = Vec::new();
        for (i, run_a) in runs.iter().enumerate() {
            for run_b in &runs[i + 1..] {
                let by_id: AHashMap<&str, &Arc<AnalysisResult>> = run_b
                    .results
                    .iter()
                    .map(|r| (r.document_id(), r))
                    .collect();
                for a in &run_a.results {
                    if let Some(b) = by_id.get(a.document_id()) {
                        drift.push(self.engine.drift(a, b)?);
                    }
                }
            }
        }
        Ok(drift)
    }
}

/// Attach a cached result to the document that asked for it.
///
/// Keys are content addressed, so a hit may have been computed for another
/// document with the same text.
fn rebind(hit: Arc<AnalysisResult>, document: Document) -> Arc<AnalysisResult> {
    if hit.document.id() == document.id() {
        return hit;
    }
    let mut result = (*hit).clone();
    result.document = Arc::new(document);
    Arc::new(result)
}

impl Drop for AdvancedManager {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("error while closing manager: {e}");
        }
    }
}

impl std::fmt::Debug for AdvancedManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvancedManager")
            .field("tokenizers", &self.tokenizers.names())
            .field("cache", &self.cache.is_some())
            .field("processor", &self.processor.is_some())
            .field("streamer", &self.streamer.is_some())
            .field("plugins", &self.plugins.as_ref().map(PluginRegistry::names))
            .field("closed", &self.is_closed())
            .finish()
    }
}
