//! Chunked, memory-bounded analysis of a document stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, bounded};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{DriftError, Result};
use crate::metrics::result::AnalysisResult;
use crate::parallel::config::ParallelConfig;
use crate::parallel::metrics::ProcessMetrics;
use crate::parallel::processor::{AnalyzeFn, ParallelProcessor, process_sequential};
use crate::parallel::work::{ProcessOutcome, WorkFailure, WorkItem};
use crate::streaming::config::StreamingConfig;
use crate::streaming::memory::{Admission, MemoryBudget, MemoryUsage};
use crate::streaming::source::DocumentSource;
use crate::util::CancellationToken;
use crate::util::size::EstimateSize;

/// Progress report passed to the progress callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Zero-based index of the chunk just finished.
    pub chunk_index: usize,

    /// Total chunk count, when the source knows its length.
    pub total_chunks: Option<usize>,

    /// Documents in the chunk just finished.
    pub documents_in_chunk: usize,

    /// Documents finished so far, this chunk included.
    pub documents_processed: usize,

    /// Time since the stream started.
    #[serde(with = "crate::util::duration_ms")]
    pub elapsed: Duration,
}

/// Aggregate statistics of one stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Chunks processed.
    pub chunks: usize,

    /// Documents processed.
    pub documents: usize,

    /// Successful analyses.
    pub results: usize,

    /// Failed analyses.
    pub failures: usize,

    /// Memory budget usage at the end of the stream.
    pub memory: MemoryUsage,

    /// Chunks admitted over the memory ceiling because they were too large
    /// to ever fit.
    pub oversized_chunks: usize,

    /// Wall-clock duration.
    #[serde(with = "crate::util::duration_ms")]
    pub elapsed: Duration,
}

/// Result of one stream.
#[derive(Debug, Default)]
pub struct StreamOutcome {
    /// Results, unless they were handed to a sink.
    pub results: Vec<AnalysisResult>,

    /// Failed items.
    pub failures: Vec<WorkFailure>,

    /// Stream statistics.
    pub stats: StreamStats,

    /// Processor metrics summed over chunks, when enabled.
    pub metrics: Option<ProcessMetrics>,

    /// Why the stream stopped early, if it did.
    pub interruption: Option<DriftError>,
}

impl StreamOutcome {
    /// Whether the stream stopped before the source was exhausted.
    pub fn is_interrupted(&self) -> bool {
        self.interruption.is_some()
    }
}

struct Chunk {
    index: usize,
    documents: Vec<Document>,
    bytes: usize,
    admission: Admission,
}

#[derive(Default)]
struct ReaderSummary {
    error: Option<DriftError>,
}

/// Splits a document stream into chunks and analyzes them one at a time.
pub struct StreamingAnalyzer {
    config: StreamingConfig,
    processor: Option<Arc<ParallelProcessor>>,
    fallback: ParallelConfig,
}

impl StreamingAnalyzer {
    /// Create a streamer.
    ///
    /// Chunks go through `processor` when given, otherwise through the
    /// sequential fallback configured by `fallback`.
    pub fn new(
        config: StreamingConfig,
        processor: Option<Arc<ParallelProcessor>>,
        fallback: ParallelConfig,
    ) -> Result<Self> {
        config.validate()?;
        fallback.validate()?;
        Ok(Self {
            config,
            processor,
            fallback,
        })
    }

    /// Configuration in effect.
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Stream `source`, collecting every result in the outcome.
    pub fn stream<S>(
        &self,
        cancel: &CancellationToken,
        source: S,
        tokenizer: &str,
        analyze: Arc<AnalyzeFn>,
        progress: Option<&mut dyn FnMut(&ProgressUpdate)>,
    ) -> Result<StreamOutcome>
    where
        S: DocumentSource,
    {
        let mut results = Vec::new();
        let mut sink = |result: AnalysisResult| -> Result<()> {
            results.push(result);
            Ok(())
        };
        let mut outcome =
            self.stream_with_sink(cancel, source, tokenizer, analyze, progress, &mut sink)?;
        outcome.results = results;
        Ok(outcome)
    }

    /// Stream `source`, handing each result to `sink` as soon as its chunk is
    /// done.
    ///
    /// A result stays charged against the memory ceiling until the sink
    /// returns. A sink error stops the stream and is returned as `Err`. Hitting
    /// the overall timeout or cancellation is not an error: the outcome holds
    /// what was finished and `interruption` says why it stopped.
    pub fn stream_with_sink<S>(
        &self,
        cancel: &CancellationToken,
        source: S,
        tokenizer: &str,
        analyze: Arc<AnalyzeFn>,
        mut progress: Option<&mut dyn FnMut(&ProgressUpdate)>,
        sink: &mut dyn FnMut(AnalysisResult) -> Result<()>,
    ) -> Result<StreamOutcome>
    where
        S: DocumentSource,
    {
        let start = Instant::now();
        let deadline = start.checked_add(self.config.timeout);
        let chunk_size = self.config.chunk_size;
        let total_chunks = source.size_hint().map(|n| n.div_ceil(chunk_size));
        let budget = MemoryBudget::new(self.config.max_memory_bytes());
        let stop = AtomicBool::new(false);

        let mut outcome = StreamOutcome::default();
        let mut sink_error = None;

        let reader_summary = thread::scope(|scope| -> Result<ReaderSummary> {
            let (chunks_tx, chunks_rx) = bounded::<Chunk>(self.config.buffer_size);

            let reader = thread::Builder::new()
                .name("tokdrift-stream-reader".to_string())
                .spawn_scoped(scope, || {
                    read_chunks(source, chunk_size, deadline, &budget, &stop, chunks_tx)
                })?;

            for chunk in chunks_rx.iter() {
                if let Some(reason) = stop_reason(cancel, deadline) {
                    budget.release(chunk.bytes);
                    outcome.interruption = Some(reason);
                    break;
                }

                let chunk_index = chunk.index;
                let documents = chunk.documents.len();
                if chunk.admission == Admission::Oversized {
                    outcome.stats.oversized_chunks += 1;
                }

                let processed = self.process_chunk(cancel, chunk, tokenizer, &analyze, &budget);
                let delivered = deliver(processed, &budget, sink, &mut outcome);

                outcome.stats.chunks += 1;
                outcome.stats.documents += documents;

                if let Err(error) = delivered {
                    sink_error = Some(error);
                    break;
                }

                if self.config.enable_progress
                    && (chunk_index + 1) % self.config.progress_interval == 0
                {
                    if let Some(callback) = progress.as_mut() {
                        callback(&ProgressUpdate {
                            chunk_index,
                            total_chunks,
                            documents_in_chunk: documents,
                            documents_processed: outcome.stats.documents,
                            elapsed: start.elapsed(),
                        });
                    }
                }

                if cancel.is_cancelled() {
                    outcome.interruption =
                        Some(cancel.check("streaming").err().unwrap_or_else(|| {
                            DriftError::cancelled("streaming")
                        }));
                    break;
                }
            }

            stop.store(true, Ordering::Release);
            budget.close();
            // The reader exits on `stop` or the closed budget, ending this drain.
            let mut dropped = 0;
            for chunk in chunks_rx.iter() {
                budget.release(chunk.bytes);
                dropped += 1;
            }
            if dropped > 0 {
                log::debug!("dropped {dropped} buffered chunks");
            }

            reader
                .join()
                .map_err(|_| DriftError::other("stream reader thread panicked"))
        })?;

        if let Some(error) = sink_error {
            return Err(error);
        }

        if outcome.interruption.is_none() {
            outcome.interruption = reader_summary.error;
        }
        if let Some(interruption) = &outcome.interruption {
            log::warn!(
                "stream interrupted after {} chunks: {interruption}",
                outcome.stats.chunks
            );
        }

        outcome.stats.memory = budget.usage();
        outcome.stats.elapsed = start.elapsed();
        log::info!(
            "streamed {} documents in {} chunks ({} ok, {} failed, peak {} bytes)",
            outcome.stats.documents,
            outcome.stats.chunks,
            outcome.stats.results,
            outcome.stats.failures,
            outcome.stats.memory.peak_bytes
        );
        Ok(outcome)
    }

    fn process_chunk(
        &self,
        cancel: &CancellationToken,
        chunk: Chunk,
        tokenizer: &str,
        analyze: &Arc<AnalyzeFn>,
        budget: &MemoryBudget,
    ) -> ProcessOutcome {
        let items: Vec<WorkItem> = chunk
            .documents
            .into_iter()
            .map(|doc| WorkItem::new(Arc::new(doc), tokenizer))
            .collect();

        log::debug!("processing chunk {} ({} documents)", chunk.index, items.len());

        let processed = match &self.processor {
            Some(processor) => processor.process_shared(cancel, items, Arc::clone(analyze)),
            None => process_sequential(cancel, items, &self.fallback, analyze.as_ref()),
        };

        // Results replace the chunk's documents in the budget.
        let result_bytes: usize = processed.results.iter().map(|r| r.estimated_size()).sum();
        budget.charge(result_bytes);
        budget.release(chunk.bytes);
        processed
    }
}

/// Why the consumer should stop taking chunks, if it should.
fn stop_reason(cancel: &CancellationToken, deadline: Option<Instant>) -> Option<DriftError> {
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Some(DriftError::timeout("streaming exceeded its time budget"));
    }
    cancel.check("streaming").err()
}

/// Hand results to the sink, releasing each one's charge as it goes.
fn deliver(
    processed: ProcessOutcome,
    budget: &MemoryBudget,
    sink: &mut dyn FnMut(AnalysisResult) -> Result<()>,
    outcome: &mut StreamOutcome,
) -> Result<()> {
    let ProcessOutcome {
        results,
        failures,
        metrics,
    } = processed;

    outcome.stats.failures += failures.len();
    outcome.failures.extend(failures);
    if let Some(metrics) = metrics {
        outcome
            .metrics
            .get_or_insert_with(ProcessMetrics::default)
            .merge(&metrics);
    }

    let mut results = results.into_iter();
    while let Some(result) = results.next() {
        let bytes = result.estimated_size();
        let delivered = sink(result);
        budget.release(bytes);
        if let Err(error) = delivered {
            let undelivered: usize = results.map(|r| r.estimated_size()).sum();
            budget.release(undelivered);
            return Err(error);
        }
        outcome.stats.results += 1;
    }
    Ok(())
}

fn read_chunks<S: DocumentSource>(
    mut source: S,
    chunk_size: usize,
    deadline: Option<Instant>,
    budget: &MemoryBudget,
    stop: &AtomicBool,
    chunks: Sender<Chunk>,
) -> ReaderSummary {
    let mut summary = ReaderSummary::default();
    let mut index = 0;

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            summary.error = Some(DriftError::timeout("streaming exceeded its time budget"));
            break;
        }

        let mut documents = Vec::with_capacity(chunk_size);
        let mut exhausted = false;
        while documents.len() < chunk_size {
            match source.next_document() {
                Ok(Some(document)) => documents.push(document),
                Ok(None) => {
                    exhausted = true;
                    break;
                }
                Err(error) => {
                    summary.error = Some(error);
                    exhausted = true;
                    break;
                }
            }
        }
        if documents.is_empty() {
            break;
        }

        let bytes = documents.estimated_size();
        let admission = match budget.acquire(bytes, deadline) {
            Ok(admission) => admission,
            Err(error) => {
                if error.is_timeout() {
                    summary.error = Some(DriftError::timeout(
                        "streaming exceeded its time budget while waiting for memory",
                    ));
                }
                break;
            }
        };
        if admission == Admission::Oversized {
            log::warn!(
                "chunk {index} needs {bytes} bytes, over the {} byte ceiling; admitted alone",
                budget.limit()
            );
        }

        let chunk = Chunk {
            index,
            documents,
            bytes,
            admission,
        };
        if chunks.send(chunk).is_err() {
            budget.release(bytes);
            break;
        }
        index += 1;

        if exhausted {
            break;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Cursor;

    use super::*;
    use crate::analysis::token::TokenizationResult;
    use crate::metrics::result::Timing;
    use crate::streaming::source::{LineSource, VecSource};

    fn analyze_ok() -> Arc<AnalyzeFn> {
        Arc::new(|item: &WorkItem, _: &CancellationToken| {
            let now = chrono::Utc::now();
            Ok(AnalysisResult {
                document: Arc::clone(&item.document),
                tokenizer: item.tokenizer.clone(),
                tokenization: TokenizationResult::new(item.tokenizer.clone(), Vec::new()),
                metrics: BTreeMap::new(),
                rolling_entropy: None,
                timing: Timing {
                    started_at: now,
                    finished_at: now,
                    duration: Duration::ZERO,
                },
            })
        })
    }

    fn streamer(config: StreamingConfig) -> StreamingAnalyzer {
        StreamingAnalyzer::new(config, None, ParallelConfig::sequential()).unwrap()
    }

    #[test]
    fn test_stream_all_documents_with_progress() {
        let streamer = streamer(StreamingConfig::default().with_chunk_size(3).with_progress(true, 1));
        let source = VecSource::new(Document::from_texts((0..10).map(|i| format!("text {i}"))));

        let mut updates = Vec::new();
        let mut on_progress = |update: &ProgressUpdate| updates.push(update.clone());
        let outcome = streamer
            .stream(
                &CancellationToken::new(),
                source,
                "mock",
                analyze_ok(),
                Some(&mut on_progress),
            )
            .unwrap();

        assert_eq!(outcome.results.len(), 10);
        assert_eq!(outcome.stats.chunks, 4);
        assert!(!outcome.is_interrupted());
        assert_eq!(updates.len(), 4);
        assert_eq!(updates[0].total_chunks, Some(4));
        assert_eq!(updates[3].documents_in_chunk, 1);
        assert_eq!(updates[3].documents_processed, 10);
    }

    #[test]
    fn test_progress_interval() {
        let streamer = streamer(StreamingConfig::default().with_chunk_size(1).with_progress(true, 2));
        let source = LineSource::new(Cursor::new("a\nb\nc\nd\ne\n"));

        let mut updates = Vec::new();
        let mut on_progress = |update: &ProgressUpdate| updates.push(update.chunk_index);
        streamer
            .stream(
                &CancellationToken::new(),
                source,
                "mock",
                analyze_ok(),
                Some(&mut on_progress),
            )
            .unwrap();

        assert_eq!(updates, vec![1, 3]);
    }

    #[test]
    fn test_sink_receives_results_and_memory_is_returned() {
        let streamer = streamer(StreamingConfig::default().with_chunk_size(2));
        let source = VecSource::new(Document::from_texts(["a", "b", "c"]));

        let mut seen = Vec::new();
        let mut sink = |result: AnalysisResult| -> Result<()> {
            seen.push(result.document_id().to_string());
            Ok(())
        };
        let outcome = streamer
            .stream_with_sink(
                &CancellationToken::new(),
                source,
                "mock",
                analyze_ok(),
                None,
                &mut sink,
            )
            .unwrap();

        assert_eq!(seen, vec!["doc-0", "doc-1", "doc-2"]);
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.stats.results, 3);
        assert_eq!(outcome.stats.memory.current_bytes, 0);
    }

    #[test]
    fn test_sink_error_aborts() {
        let streamer = streamer(StreamingConfig::default().with_chunk_size(1));
        let source = VecSource::new(Document::from_texts(["a", "b", "c"]));

        let mut sink = |_: AnalysisResult| -> Result<()> { Err(DriftError::plugin("rejected")) };
        let result = streamer.stream_with_sink(
            &CancellationToken::new(),
            source,
            "mock",
            analyze_ok(),
            None,
            &mut sink,
        );
        assert!(matches!(result, Err(DriftError::Plugin(_))));
    }

    #[test]
    fn test_timeout_returns_partial_outcome() {
        let streamer = streamer(
            StreamingConfig::default()
                .with_chunk_size(1)
                .with_buffer_size(1)
                .with_timeout(Duration::from_millis(80)),
        );
        let source = VecSource::new(Document::from_texts((0..50).map(|i| format!("t{i}"))));
        let slow: Arc<AnalyzeFn> = {
            let inner = analyze_ok();
            Arc::new(move |item: &WorkItem, token: &CancellationToken| {
                thread::sleep(Duration::from_millis(20));
                inner(item, token)
            })
        };

        let outcome = streamer
            .stream(&CancellationToken::new(), source, "mock", slow, None)
            .unwrap();

        assert!(outcome.is_interrupted());
        assert!(outcome.interruption.as_ref().unwrap().is_timeout());
        assert!(outcome.results.len() < 50);
        assert!(!outcome.results.is_empty());
    }

    #[test]
    fn test_timeout_skips_buffered_chunks() {
        let streamer = streamer(
            StreamingConfig::default()
                .with_chunk_size(1)
                .with_buffer_size(10)
                .with_timeout(Duration::from_millis(60)),
        );
        let source = VecSource::new(Document::from_texts((0..40).map(|i| format!("t{i}"))));
        let slow: Arc<AnalyzeFn> = {
            let inner = analyze_ok();
            Arc::new(move |item: &WorkItem, token: &CancellationToken| {
                thread::sleep(Duration::from_millis(40));
                inner(item, token)
            })
        };

        let started = Instant::now();
        let outcome = streamer
            .stream(&CancellationToken::new(), source, "mock", slow, None)
            .unwrap();

        assert!(outcome.interruption.as_ref().unwrap().is_timeout());
        assert!(outcome.stats.chunks <= 3, "ran {} chunks", outcome.stats.chunks);
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(outcome.stats.memory.current_bytes, 0);
    }

    #[test]
    fn test_cancellation_interrupts() {
        let streamer = streamer(StreamingConfig::default().with_chunk_size(1));
        let source = VecSource::new(Document::from_texts((0..20).map(|i| format!("t{i}"))));
        let cancel = CancellationToken::new();

        let mut chunks_seen = 0;
        let canceller = cancel.clone();
        let mut on_progress = |_: &ProgressUpdate| {
            chunks_seen += 1;
            if chunks_seen == 2 {
                canceller.cancel();
            }
        };
        let outcome = streamer
            .stream(&cancel, source, "mock", analyze_ok(), Some(&mut on_progress))
            .unwrap();

        assert!(matches!(outcome.interruption, Some(DriftError::Cancelled(_))));
        assert_eq!(outcome.stats.chunks, 2);
    }

    #[test]
    fn test_memory_ceiling_respected() {
        let streamer = streamer(
            StreamingConfig::default()
                .with_chunk_size(4)
                .with_buffer_size(64)
                .with_max_memory_mb(1),
        );
        let text = "x".repeat(64 * 1024);
        let source = VecSource::new(Document::from_texts((0..64).map(|_| text.clone())));

        let outcome = streamer
            .stream(&CancellationToken::new(), source, "mock", analyze_ok(), None)
            .unwrap();

        assert_eq!(outcome.results.len(), 64);
        assert!(outcome.stats.memory.peak_bytes <= outcome.stats.memory.limit_bytes);
        assert_eq!(outcome.stats.oversized_chunks, 0);
    }
}
