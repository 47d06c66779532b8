use std::io::Cursor;
use std::sync::Arc;

use tokdrift::analysis::registry::TokenizerHandle;
use tokdrift::analysis::tokenizer::whitespace::WhitespaceTokenizer;
use tokdrift::error::Result;
use tokdrift::metrics::{AnalysisOptions, AnalysisResult, MetricsEngine};
use tokdrift::parallel::{AnalyzeFn, ParallelConfig, ParallelProcessor, WorkItem};
use tokdrift::streaming::{LineSource, ProgressUpdate, StreamingAnalyzer, StreamingConfig};
use tokdrift::util::CancellationToken;

fn analyze_fn() -> Result<Arc<AnalyzeFn>> {
    let engine = Arc::new(MetricsEngine::new(AnalysisOptions::default())?);
    let handle = TokenizerHandle {
        name: "mock".to_string(),
        tokenizer: Arc::new(WhitespaceTokenizer::new()),
    };
    Ok(Arc::new(move |item: &WorkItem, cancel: &CancellationToken| {
        engine.analyze_document(cancel, Arc::clone(&item.document), &handle)
    }))
}

fn corpus(lines: usize, words_per_line: usize) -> String {
    let mut text = String::new();
    for line in 0..lines {
        for word in 0..words_per_line {
            text.push_str(&format!("w{} ", (line * 7 + word) % 97));
        }
        text.push('\n');
    }
    text
}

#[test]
fn test_peak_memory_stays_under_ceiling() -> Result<()> {
    let processor = Arc::new(ParallelProcessor::new(
        ParallelConfig::default().with_max_workers(4).with_batch_size(4),
    )?);
    let config = StreamingConfig::default()
        .with_chunk_size(16)
        .with_buffer_size(32)
        .with_max_memory_mb(1);
    let streamer = StreamingAnalyzer::new(config, Some(processor), ParallelConfig::default())?;

    let mut delivered = 0;
    let mut sink = |_: AnalysisResult| -> Result<()> {
        delivered += 1;
        Ok(())
    };
    let outcome = streamer.stream_with_sink(
        &CancellationToken::new(),
        LineSource::new(Cursor::new(corpus(400, 300))),
        "mock",
        analyze_fn()?,
        None,
        &mut sink,
    )?;

    assert_eq!(delivered, 400);
    assert!(outcome.failures.is_empty());
    assert!(!outcome.is_interrupted());
    assert_eq!(outcome.stats.oversized_chunks, 0);
    assert!(outcome.stats.memory.peak_bytes > 0);
    assert!(outcome.stats.memory.peak_bytes <= outcome.stats.memory.limit_bytes);
    assert_eq!(outcome.stats.memory.current_bytes, 0);
    Ok(())
}

#[test]
fn test_line_source_without_size_hint_reports_unknown_total() -> Result<()> {
    let streamer = StreamingAnalyzer::new(
        StreamingConfig::default().with_chunk_size(3),
        None,
        ParallelConfig::sequential(),
    )?;

    let mut totals = Vec::new();
    let mut on_progress = |update: &ProgressUpdate| totals.push(update.total_chunks);
    let outcome = streamer.stream(
        &CancellationToken::new(),
        LineSource::new(Cursor::new(corpus(7, 4))),
        "mock",
        analyze_fn()?,
        Some(&mut on_progress),
    )?;

    assert_eq!(outcome.results.len(), 7);
    assert_eq!(totals, vec![None, None, None]);
    Ok(())
}
