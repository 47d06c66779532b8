//! Bounded worker pool for work items.
//!
//! Items are split into batches. Each worker starts on its own batch and
//! claims items from it one at a time through an atomic cursor; once its
//! batch is drained it moves on to the next batch with unclaimed items, so a
//! worker stuck on a slow item never holds the rest of its batch hostage.
//!
//! Workers report `Started` and `Finished` events over a channel. The calling
//! thread collects them and enforces the per-item deadline: an item that runs
//! past it is recorded as a timeout, its token is cancelled, and any result it
//! produces later is discarded. Items that have not started yet keep waiting
//! for the next free worker, even when every worker is busy past a deadline;
//! only the caller's token turns them into failures.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use ahash::AHashMap;
use crossbeam_channel::{RecvTimeoutError, Sender, unbounded};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{DriftError, Result};
use crate::metrics::result::AnalysisResult;
use crate::parallel::config::ParallelConfig;
use crate::parallel::metrics::{ProcessMetrics, ProcessMetricsCollector};
use crate::parallel::work::{FailureKind, ProcessOutcome, WorkFailure, WorkItem};
use crate::util::CancellationToken;

/// The analysis applied to each work item.
pub type AnalyzeFn =
    dyn Fn(&WorkItem, &CancellationToken) -> Result<AnalysisResult> + Send + Sync;

/// Upper bound on how long the collector sleeps between checks of the
/// caller's token.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

type ItemOutcome = std::result::Result<AnalysisResult, WorkFailure>;

enum Event {
    Started {
        index: usize,
        worker: usize,
        token: CancellationToken,
        at: Instant,
    },
    Finished {
        index: usize,
        worker: usize,
        outcome: ItemOutcome,
        elapsed: Duration,
    },
    WorkerExit {
        worker: usize,
    },
}

struct Batch {
    end: usize,
    cursor: AtomicUsize,
}

struct Dispatch {
    items: Vec<WorkItem>,
    batches: Vec<Batch>,
    stop: AtomicBool,
}

impl Dispatch {
    fn new(items: Vec<WorkItem>, batch_size: usize) -> Self {
        let batches = (0..items.len())
            .step_by(batch_size)
            .map(|start| Batch {
                end: (start + batch_size).min(items.len()),
                cursor: AtomicUsize::new(start),
            })
            .collect();
        Self {
            items,
            batches,
            stop: AtomicBool::new(false),
        }
    }

    /// Claim the next item, starting at batch `from`. Returns the item index
    /// and the batch it came from.
    fn claim(&self, from: usize) -> Option<(usize, usize)> {
        let count = self.batches.len();
        (0..count).find_map(|offset| {
            let b = (from + offset) % count;
            let batch = &self.batches[b];
            if batch.cursor.load(Ordering::Acquire) >= batch.end {
                return None;
            }
            let index = batch.cursor.fetch_add(1, Ordering::AcqRel);
            (index < batch.end).then_some((index, b))
        })
    }

    /// Claim every item no worker has taken yet.
    fn claim_remaining(&self) -> Vec<usize> {
        self.batches
            .iter()
            .flat_map(|batch| {
                let first = batch.cursor.swap(batch.end, Ordering::AcqRel);
                first.min(batch.end)..batch.end
            })
            .collect()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `analyze` on one item, turning errors and panics into failures.
fn run_item(item: &WorkItem, token: &CancellationToken, analyze: &AnalyzeFn) -> ItemOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| analyze(item, token))) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(error)) => Err(WorkFailure::from_error(item, &error)),
        Err(payload) => Err(WorkFailure::new(
            item,
            FailureKind::Panicked,
            format!("analysis panicked: {}", panic_message(payload)),
        )),
    }
}

fn timeout_failure(item: &WorkItem, timeout: Duration) -> WorkFailure {
    WorkFailure::from_error(
        item,
        &DriftError::timeout(format!(
            "'{}' with '{}' exceeded {}ms",
            item.document.id(),
            item.tokenizer,
            timeout.as_millis()
        )),
    )
}

fn cancelled_failure(item: &WorkItem) -> WorkFailure {
    WorkFailure::from_error(
        item,
        &DriftError::cancelled(format!(
            "'{}' with '{}' was not started",
            item.document.id(),
            item.tokenizer
        )),
    )
}

/// Accumulates item outcomes and optional per-run metrics.
struct Recorder {
    outcome: ProcessOutcome,
    metrics: Option<ProcessMetricsCollector>,
}

impl Recorder {
    fn new(enable_metrics: bool, capacity: usize) -> Self {
        Self {
            outcome: ProcessOutcome {
                results: Vec::with_capacity(capacity),
                failures: Vec::new(),
                metrics: None,
            },
            metrics: enable_metrics.then(ProcessMetricsCollector::new),
        }
    }

    fn record(&mut self, outcome: ItemOutcome, elapsed: Duration) {
        match outcome {
            Ok(result) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_success(elapsed);
                }
                self.outcome.results.push(result);
            }
            Err(failure) => {
                log::debug!(
                    "'{}' with '{}' failed: {}",
                    failure.document_id,
                    failure.tokenizer,
                    failure.error
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(failure.kind, elapsed);
                }
                self.outcome.failures.push(failure);
            }
        }
    }

    fn finish(mut self) -> ProcessOutcome {
        self.outcome.metrics = self.metrics.map(|m| m.snapshot());
        self.outcome
    }
}

/// Fixed-size worker pool applying an analysis to work items.
pub struct ParallelProcessor {
    config: ParallelConfig,
    pool: ThreadPool,
    metrics: ProcessMetricsCollector,
}

impl ParallelProcessor {
    /// Create a processor with `config.effective_workers()` threads.
    pub fn new(config: ParallelConfig) -> Result<Self> {
        config.validate()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.effective_workers())
            .thread_name(|i| format!("tokdrift-worker-{i}"))
            .build()
            .map_err(|e| DriftError::other(format!("Failed to create thread pool: {e}")))?;

        Ok(Self {
            config,
            pool,
            metrics: ProcessMetricsCollector::new(),
        })
    }

    /// Configuration in effect.
    pub fn config(&self) -> &ParallelConfig {
        &self.config
    }

    /// Number of pool threads.
    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Cumulative metrics over every run; all zero when metrics are disabled.
    pub fn metrics(&self) -> ProcessMetrics {
        self.metrics.snapshot()
    }

    /// Process `items` with `analyze`.
    pub fn process<F>(
        &self,
        cancel: &CancellationToken,
        items: Vec<WorkItem>,
        analyze: F,
    ) -> ProcessOutcome
    where
        F: Fn(&WorkItem, &CancellationToken) -> Result<AnalysisResult> + Send + Sync + 'static,
    {
        self.process_shared(cancel, items, Arc::new(analyze))
    }

    /// Process `items` with a shared analysis function.
    ///
    /// Cancelling `cancel` stops dispatch: items not yet started are reported
    /// as cancelled, items already running finish (their tokens are children
    /// of `cancel`, so cooperative analyses stop early).
    pub fn process_shared(
        &self,
        cancel: &CancellationToken,
        items: Vec<WorkItem>,
        analyze: Arc<AnalyzeFn>,
    ) -> ProcessOutcome {
        let total = items.len();
        let mut recorder = Recorder::new(self.config.enable_metrics, total);
        if total == 0 {
            return recorder.finish();
        }

        let timeout = self.config.timeout;
        let dispatch = Arc::new(Dispatch::new(items, self.config.batch_size));
        let workers = self.worker_count().min(total);
        let (events, inbox) = unbounded::<Event>();

        log::debug!(
            "dispatching {total} items in {} batches to {workers} workers",
            dispatch.batches.len()
        );

        for worker in 0..workers {
            let dispatch = Arc::clone(&dispatch);
            let analyze = Arc::clone(&analyze);
            let cancel = cancel.clone();
            let events = events.clone();
            self.pool.spawn(move || {
                run_worker(worker, workers, &dispatch, &cancel, timeout, &*analyze, &events);
            });
        }
        drop(events);

        #[derive(Clone, Copy, PartialEq)]
        enum Slot {
            Pending,
            Running,
            Done,
        }

        struct Running {
            worker: usize,
            token: CancellationToken,
            started: Instant,
            deadline: Instant,
        }

        let mut slots = vec![Slot::Pending; total];
        let mut running: AHashMap<usize, Running> = AHashMap::new();
        let mut live_workers = workers;
        let mut remaining = total;
        let mut dispatch_cancelled = false;

        while remaining > 0 {
            if !dispatch_cancelled && cancel.is_cancelled() {
                dispatch_cancelled = true;
                dispatch.stop.store(true, Ordering::Release);
                for index in dispatch.claim_remaining() {
                    if slots[index] == Slot::Pending {
                        slots[index] = Slot::Done;
                        remaining -= 1;
                        recorder.record(Err(cancelled_failure(&dispatch.items[index])), Duration::ZERO);
                    }
                }
                log::debug!("dispatch cancelled with {} items still running", running.len());
            }

            if live_workers == 0 {
                // Nothing can report anymore; anything left was never claimed.
                for index in 0..total {
                    if slots[index] == Slot::Pending {
                        recorder.record(Err(cancelled_failure(&dispatch.items[index])), Duration::ZERO);
                    }
                }
                break;
            }

            let now = Instant::now();
            let wait = running
                .values()
                .map(|r| r.deadline.saturating_duration_since(now))
                .min()
                .map_or(POLL_INTERVAL, |d| d.min(POLL_INTERVAL));

            match inbox.recv_timeout(wait) {
                Ok(Event::Started {
                    index,
                    worker,
                    token,
                    at,
                }) => {
                    if slots[index] == Slot::Pending {
                        slots[index] = Slot::Running;
                        running.insert(
                            index,
                            Running {
                                worker,
                                token,
                                started: at,
                                deadline: at + timeout,
                            },
                        );
                    } else {
                        // Already reported as cancelled.
                        token.cancel();
                    }
                }
                Ok(Event::Finished {
                    index,
                    worker,
                    outcome,
                    elapsed,
                }) => {
                    running.remove(&index);
                    if slots[index] == Slot::Done {
                        log::warn!(
                            "discarding late result for '{}' with '{}' from worker {worker}",
                            dispatch.items[index].document.id(),
                            dispatch.items[index].tokenizer
                        );
                    } else {
                        slots[index] = Slot::Done;
                        remaining -= 1;
                        recorder.record(outcome, elapsed);
                    }
                }
                Ok(Event::WorkerExit { worker }) => {
                    log::debug!("worker {worker} exited");
                    live_workers = live_workers.saturating_sub(1);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    live_workers = 0;
                }
            }

            let now = Instant::now();
            let expired: Vec<usize> = running
                .iter()
                .filter(|(_, r)| r.deadline <= now)
                .map(|(&index, _)| index)
                .collect();
            for index in expired {
                if let Some(run) = running.remove(&index) {
                    run.token.cancel();
                    log::debug!(
                        "worker {} passed the deadline on '{}'",
                        run.worker,
                        dispatch.items[index].document.id()
                    );
                    slots[index] = Slot::Done;
                    remaining -= 1;
                    recorder.record(
                        Err(timeout_failure(&dispatch.items[index], timeout)),
                        now.saturating_duration_since(run.started),
                    );
                }
            }
        }

        dispatch.stop.store(true, Ordering::Release);
        let outcome = recorder.finish();
        if let Some(run) = &outcome.metrics {
            self.metrics.absorb(run);
        }
        outcome
    }
}

fn run_worker(
    worker: usize,
    workers: usize,
    dispatch: &Dispatch,
    cancel: &CancellationToken,
    timeout: Duration,
    analyze: &AnalyzeFn,
    events: &Sender<Event>,
) {
    let batch_count = dispatch.batches.len();
    let mut batch = if batch_count == 0 {
        0
    } else {
        (worker * batch_count / workers.max(1)) % batch_count
    };

    while !dispatch.stop.load(Ordering::Acquire) && !cancel.is_cancelled() {
        let Some((index, from)) = dispatch.claim(batch) else {
            break;
        };
        batch = from;

        let item = &dispatch.items[index];
        let token = cancel.child_with_timeout(timeout);
        let start = Instant::now();
        let started = Event::Started {
            index,
            worker,
            token: token.clone(),
            at: start,
        };
        if events.send(started).is_err() {
            break;
        }

        let outcome = run_item(item, &token, analyze);
        let finished = Event::Finished {
            index,
            worker,
            outcome,
            elapsed: start.elapsed(),
        };
        if events.send(finished).is_err() {
            break;
        }
    }

    let _ = events.send(Event::WorkerExit { worker });
}

/// Process `items` one at a time on the calling thread.
///
/// Same contract as [`ParallelProcessor::process`]: every item ends up in
/// `results` or `failures`. The timeout cannot preempt a running item here,
/// so a result that arrives after its deadline is discarded and recorded as a
/// timeout.
pub fn process_sequential(
    cancel: &CancellationToken,
    items: Vec<WorkItem>,
    config: &ParallelConfig,
    analyze: &AnalyzeFn,
) -> ProcessOutcome {
    let mut recorder = Recorder::new(config.enable_metrics, items.len());

    for item in &items {
        if cancel.is_cancelled() {
            recorder.record(Err(cancelled_failure(item)), Duration::ZERO);
            continue;
        }

        let token = cancel.child_with_timeout(config.timeout);
        let start = Instant::now();
        let outcome = run_item(item, &token, analyze);
        let elapsed = start.elapsed();

        if elapsed > config.timeout && outcome.is_ok() {
            log::warn!(
                "discarding late result for '{}' with '{}'",
                item.document.id(),
                item.tokenizer
            );
            recorder.record(Err(timeout_failure(item, config.timeout)), elapsed);
        } else {
            recorder.record(outcome, elapsed);
        }
    }

    recorder.finish()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::thread;

    use super::*;
    use crate::analysis::token::TokenizationResult;
    use crate::document::Document;
    use crate::error::TokenizerErrorKind;
    use crate::metrics::result::Timing;

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::new(Arc::new(Document::new(format!("doc-{i}"), format!("text {i}"))), "mock"))
            .collect()
    }

    fn ok(item: &WorkItem) -> Result<AnalysisResult> {
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
    }

    fn processor(workers: usize, batch: usize, timeout: Duration) -> ParallelProcessor {
        ParallelProcessor::new(
            ParallelConfig::default()
                .with_max_workers(workers)
                .with_batch_size(batch)
                .with_timeout(timeout),
        )
        .unwrap()
    }

    #[test]
    fn test_all_items_processed() {
        let processor = processor(4, 3, Duration::from_secs(5));
        let outcome = processor.process(&CancellationToken::new(), items(25), |item, _| ok(item));

        assert_eq!(outcome.results.len(), 25);
        assert!(outcome.failures.is_empty());
        let metrics = outcome.metrics.unwrap();
        assert_eq!(metrics.items_processed, 25);
        assert_eq!(metrics.successes, 25);
        assert_eq!(processor.metrics().items_processed, 25);
    }

    #[test]
    fn test_empty_batch() {
        let processor = processor(2, 4, Duration::from_secs(1));
        let outcome = processor.process(&CancellationToken::new(), Vec::new(), |item, _| ok(item));
        assert_eq!(outcome.total(), 0);
    }

    #[test]
    fn test_partial_failure() {
        let processor = processor(3, 2, Duration::from_secs(5));
        let outcome = processor.process(&CancellationToken::new(), items(10), |item, _| {
            if item.document.id() == "doc-4" {
                Err(DriftError::tokenizer(TokenizerErrorKind::Runtime, "bad input"))
            } else {
                ok(item)
            }
        });

        assert_eq!(outcome.results.len(), 9);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].document_id, "doc-4");
        assert_eq!(
            outcome.failures[0].kind,
            FailureKind::Tokenizer(TokenizerErrorKind::Runtime)
        );
    }

    #[test]
    fn test_panics_become_failures() {
        let processor = processor(2, 1, Duration::from_secs(5));
        let outcome = processor.process(&CancellationToken::new(), items(3), |item, _| {
            if item.document.id() == "doc-1" {
                panic!("tokenizer exploded");
            }
            ok(item)
        });

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.failures[0].kind, FailureKind::Panicked);
        assert!(outcome.failures[0].error.contains("exploded"));
    }

    #[test]
    fn test_slow_item_times_out_and_others_finish() {
        let processor = processor(2, 4, Duration::from_millis(100));
        let outcome = processor.process(&CancellationToken::new(), items(6), |item, token| {
            if item.document.id() == "doc-0" {
                // Ignores its token for a while, then gives up.
                thread::sleep(Duration::from_millis(400));
                token.check("slow")?;
            }
            ok(item)
        });

        assert_eq!(outcome.total(), 6);
        assert_eq!(outcome.results.len(), 5);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].kind, FailureKind::Timeout);
        assert_eq!(outcome.metrics.unwrap().timeouts, 1);
    }

    #[test]
    fn test_single_worker_resumes_after_timed_out_item() {
        let processor = processor(1, 1, Duration::from_millis(100));
        let outcome = processor.process(&CancellationToken::new(), items(5), |item, _| {
            if item.document.id() == "doc-0" {
                thread::sleep(Duration::from_millis(300));
            }
            ok(item)
        });

        assert_eq!(outcome.total(), 5);
        assert_eq!(outcome.results.len(), 4);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].document_id, "doc-0");
        assert_eq!(outcome.failures[0].kind, FailureKind::Timeout);

        let mut ids: Vec<&str> = outcome.results.iter().map(|r| r.document.id()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["doc-1", "doc-2", "doc-3", "doc-4"]);
    }

    #[test]
    fn test_items_queued_behind_slow_items_get_their_own_deadline() {
        let processor = processor(2, 2, Duration::from_millis(80));
        let outcome = processor.process(&CancellationToken::new(), items(6), |item, _| {
            if matches!(item.document.id(), "doc-0" | "doc-2") {
                thread::sleep(Duration::from_millis(200));
            }
            ok(item)
        });

        assert_eq!(outcome.total(), 6);
        assert_eq!(outcome.results.len(), 4);
        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome.failures.iter().all(|f| f.kind == FailureKind::Timeout));
    }

    #[test]
    fn test_cancellation_reports_unstarted_items() {
        let processor = processor(1, 1, Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let outcome = processor.process(&cancel, items(20), move |item, _| {
            if item.document.id() == "doc-2" {
                trigger.cancel();
            }
            ok(item)
        });

        assert_eq!(outcome.total(), 20);
        assert!(outcome.results.len() >= 3);
        assert!(outcome
            .failures
            .iter()
            .all(|f| f.kind == FailureKind::Cancelled));
        assert!(!outcome.failures.is_empty());
    }

    #[test]
    fn test_metrics_disabled() {
        let processor = ParallelProcessor::new(ParallelConfig::default().with_metrics(false)).unwrap();
        let outcome = processor.process(&CancellationToken::new(), items(3), |item, _| ok(item));
        assert!(outcome.metrics.is_none());
        assert_eq!(processor.metrics().items_processed, 0);
    }

    #[test]
    fn test_sequential_fallback() {
        let config = ParallelConfig::sequential();
        let analyze = |item: &WorkItem, _: &CancellationToken| {
            if item.document.id() == "doc-1" {
                Err(DriftError::analysis("broken"))
            } else {
                ok(item)
            }
        };
        let outcome = process_sequential(&CancellationToken::new(), items(3), &config, &analyze);

        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.failures[0].kind, FailureKind::Analysis);
        assert_eq!(outcome.metrics.unwrap().items_processed, 3);
    }

    #[test]
    fn test_sequential_discards_late_results() {
        let config = ParallelConfig::sequential().with_timeout(Duration::from_millis(10));
        let analyze = |item: &WorkItem, _: &CancellationToken| {
            thread::sleep(Duration::from_millis(30));
            ok(item)
        };
        let outcome = process_sequential(&CancellationToken::new(), items(1), &config, &analyze);
        assert_eq!(outcome.failures[0].kind, FailureKind::Timeout);
    }
}
