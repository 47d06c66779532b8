//! Command implementations for the tokdrift CLI.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use crate::analysis::TokenizerRegistry;
use crate::analysis::tokenizer::command::CommandTokenizer;
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::DriftConfig;
use crate::document::Document;
use crate::error::{DriftError, Result};
use crate::manager::AdvancedManager;
use crate::streaming::{DocumentSource, LineSource, ProgressUpdate};
use crate::util::CancellationToken;

/// Execute a CLI command.
pub fn execute_command(args: TokdriftArgs) -> Result<()> {
    match &args.command {
        Command::Analyze(analyze_args) => analyze(analyze_args, &args),
        Command::Compare(compare_args) => compare(compare_args, &args),
        Command::Tokenizers => list_tokenizers(&args),
    }
}

/// Build the tokenizer registry: built-ins plus `--external` tokenizers.
pub fn build_registry(args: &TokdriftArgs) -> Result<TokenizerRegistry> {
    let registry = TokenizerRegistry::with_builtins()?;
    for spec in &args.external {
        let (name, program, program_args) = parse_external(spec).ok_or_else(|| {
            DriftError::invalid_config(format!("expected NAME=PROGRAM, got '{spec}'"))
        })?;
        let tokenizer = CommandTokenizer::new(name.clone(), program).with_args(program_args);
        registry.register(name, Arc::new(tokenizer))?;
    }
    Ok(registry)
}

/// Load the configuration file, or the defaults.
pub fn load_config(args: &TokdriftArgs) -> Result<DriftConfig> {
    match &args.config {
        Some(path) => {
            log::info!("loading configuration from {}", path.display());
            DriftConfig::from_json_file(path)
        }
        None => Ok(DriftConfig::default()),
    }
}

/// Read a line-per-document corpus.
pub fn read_corpus(path: &Path) -> Result<Vec<Document>> {
    let file = File::open(path)?;
    let mut source = LineSource::new(BufReader::new(file));
    let mut documents = Vec::new();
    while let Some(document) = source.next_document()? {
        documents.push(document);
    }
    log::info!("read {} documents from {}", documents.len(), path.display());
    Ok(documents)
}

fn build_manager(args: &TokdriftArgs) -> Result<AdvancedManager> {
    AdvancedManager::new(load_config(args)?, build_registry(args)?)
}

fn print_progress(update: &ProgressUpdate) {
    match update.total_chunks {
        Some(total) => eprintln!(
            "chunk {}/{}: {} documents done ({} ms)",
            update.chunk_index + 1,
            total,
            update.documents_processed,
            update.elapsed.as_millis()
        ),
        None => eprintln!(
            "chunk {}: {} documents done ({} ms)",
            update.chunk_index + 1,
            update.documents_processed,
            update.elapsed.as_millis()
        ),
    }
}

/// Analyze a corpus with one tokenizer.
fn analyze(args: &AnalyzeArgs, cli_args: &TokdriftArgs) -> Result<()> {
    let manager = build_manager(cli_args)?;
    let documents = read_corpus(&args.corpus)?;

    let mut on_progress = print_progress;
    let progress: Option<&mut dyn FnMut(&ProgressUpdate)> = if args.progress {
        Some(&mut on_progress)
    } else {
        None
    };

    let run = manager.analyze_with_advanced(
        &CancellationToken::new(),
        documents,
        &args.tokenizer,
        progress,
    )?;
    output_result(&run, cli_args, |run| format_run(run, args.details))?;
    manager.close()
}

/// Compare tokenizers on a corpus.
fn compare(args: &CompareArgs, cli_args: &TokdriftArgs) -> Result<()> {
    if args.tokenizers.len() < 2 {
        return Err(DriftError::invalid_config(
            "compare needs at least two tokenizers",
        ));
    }

    let manager = build_manager(cli_args)?;
    let documents = read_corpus(&args.corpus)?;

    let mut on_progress = print_progress;
    let progress: Option<&mut dyn FnMut(&ProgressUpdate)> = if args.progress {
        Some(&mut on_progress)
    } else {
        None
    };

    let report = manager.compare_tokenizers(
        &CancellationToken::new(),
        documents,
        args.tokenizers.as_slice(),
        progress,
    )?;
    output_result(&report, cli_args, format_comparison)?;
    manager.close()
}

/// List the tokenizers a run could use.
fn list_tokenizers(cli_args: &TokdriftArgs) -> Result<()> {
    let names = build_registry(cli_args)?.names();
    output_result(&names, cli_args, |names| format_tokenizers(names))
}
