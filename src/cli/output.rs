//! Output formatting for CLI commands.

use std::fmt::Write as _;

use serde::Serialize;

use crate::cli::args::{OutputFormat, TokdriftArgs};
use crate::error::Result;
use crate::manager::{AnalysisRunResult, ComparisonReport};
use crate::metrics::names;

/// Print `result` as JSON, or the human rendering otherwise.
pub fn output_result<T, F>(result: &T, args: &TokdriftArgs, human: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match args.output_format {
        OutputFormat::Json => {
            let json = if args.pretty {
                serde_json::to_string_pretty(result)?
            } else {
                serde_json::to_string(result)?
            };
            println!("{json}");
        }
        OutputFormat::Human => print!("{}", human(result)),
    }
    Ok(())
}

/// Human summary of one run.
pub fn format_run(run: &AnalysisRunResult, details: bool) -> String {
    let mut out = String::new();
    let stats = &run.statistics;

    let _ = writeln!(out, "Analysis Results ({})", run.tokenizer);
    let _ = writeln!(out, "══════════════════");
    let _ = writeln!(out, "Run id: {}", run.run_id);
    let _ = writeln!(out, "Documents: {}", stats.documents);
    let _ = writeln!(
        out,
        "Analyzed: {} ({} from cache)",
        run.results.len(),
        stats.cache_hits
    );
    let _ = writeln!(out, "Failures: {}", run.failures.len());
    let _ = writeln!(out, "Duration: {} ms", run.duration.as_millis());
    if stats.streamed {
        if let Some(stream) = &stats.stream {
            let _ = writeln!(
                out,
                "Streamed: {} chunks, peak memory {}",
                stream.chunks,
                format_bytes(stream.memory.peak_bytes as u64)
            );
        }
    }
    if let Some(reason) = &run.interrupted {
        let _ = writeln!(out, "Interrupted: {reason}");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Mean metrics:");
    for name in [
        names::TOKEN_COUNT,
        names::UNIQUE_TOKENS,
        names::ENTROPY,
        names::NORMALIZED_ENTROPY,
        names::COMPRESSION_RATIO,
        names::BYTES_PER_TOKEN,
        names::ROLLING_ENTROPY_MEAN,
    ] {
        if let Some(mean) = run.mean_metric(name) {
            let _ = writeln!(out, "  {name}: {mean:.4}");
        }
    }

    if details {
        let _ = writeln!(out);
        for result in &run.results {
            let _ = writeln!(out, "{}:", result.document_id());
            for (name, metric) in &result.metrics {
                match &metric.unit {
                    Some(unit) => {
                        let _ = writeln!(out, "  {name}: {:.4} {unit}", metric.value);
                    }
                    None => {
                        let _ = writeln!(out, "  {name}: {:.4}", metric.value);
                    }
                }
            }
        }
    }

    if !run.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failures:");
        for failure in &run.failures {
            let _ = writeln!(out, "  {}: {}", failure.document_id, failure.error);
        }
    }
    out
}

/// Human summary of a comparison.
pub fn format_comparison(report: &ComparisonReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Tokenizer Comparison");
    let _ = writeln!(out, "════════════════════");
    for run in &report.runs {
        let _ = writeln!(
            out,
            "{:<20} tokens/doc {:>10.2}  entropy {:>8.4}  compression {:>8.4}",
            run.tokenizer,
            run.mean_metric(names::TOKEN_COUNT).unwrap_or(0.0),
            run.mean_metric(names::ENTROPY).unwrap_or(0.0),
            run.mean_metric(names::COMPRESSION_RATIO).unwrap_or(0.0),
        );
    }

    if !report.drift.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Drift:");
        for (i, a) in report.tokenizers.iter().enumerate() {
            for b in &report.tokenizers[i + 1..] {
                let pairs: Vec<_> = report.drift_between(a, b).collect();
                if pairs.is_empty() {
                    continue;
                }
                let count = pairs.len() as f64;
                let token_delta = pairs.iter().map(|d| d.token_count_delta as f64).sum::<f64>() / count;
                let entropy_delta = pairs.iter().map(|d| d.entropy_delta).sum::<f64>() / count;
                let alignment = report.mean_alignment(a, b).unwrap_or(0.0);
                let _ = writeln!(
                    out,
                    "  {a} vs {b}: token delta {token_delta:+.2}, entropy delta {entropy_delta:+.4}, alignment {alignment:.4}"
                );
            }
        }
    }
    if report.is_interrupted() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Some runs were interrupted; results are partial.");
    }
    out
}

/// Human listing of tokenizer names.
pub fn format_tokenizers(names: &[String]) -> String {
    let mut out = String::from("Available tokenizers:\n");
    for name in names {
        let _ = writeln!(out, "  {name}");
    }
    out
}

/// Format bytes in human-readable format.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
