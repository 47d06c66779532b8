//! Command line argument parsing for the tokdrift CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// tokdrift - compare how tokenizers segment the same corpus
#[derive(Parser, Debug, Clone)]
#[command(name = "tokdrift")]
#[command(about = "Measure entropy, compression and drift across tokenizers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct TokdriftArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", env = "TOKDRIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Register an external tokenizer as NAME=PROGRAM; may be repeated
    #[arg(long = "external", value_name = "NAME=PROGRAM")]
    pub external: Vec<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl TokdriftArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Analyze a corpus with one tokenizer
    Analyze(AnalyzeArgs),

    /// Compare several tokenizers on a corpus
    Compare(CompareArgs),

    /// List the available tokenizers
    Tokenizers,
}

/// Arguments for analyzing a corpus
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Corpus file, one document per line
    #[arg(value_name = "CORPUS_FILE")]
    pub corpus: PathBuf,

    /// Tokenizer name
    #[arg(short, long, default_value = "whitespace")]
    pub tokenizer: String,

    /// Show progress while analyzing
    #[arg(long)]
    pub progress: bool,

    /// Include every per-document result in the output
    #[arg(long)]
    pub details: bool,
}

/// Arguments for comparing tokenizers
#[derive(Parser, Debug, Clone)]
pub struct CompareArgs {
    /// Corpus file, one document per line
    #[arg(value_name = "CORPUS_FILE")]
    pub corpus: PathBuf,

    /// Tokenizer names, in comparison order; at least two
    #[arg(short, long = "tokenizer", required = true, num_args = 1)]
    pub tokenizers: Vec<String>,

    /// Show progress while analyzing
    #[arg(long)]
    pub progress: bool,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary
    Human,
    /// JSON document
    Json,
}

/// Split a `NAME=PROGRAM` pair, with optional space-separated arguments after
/// the program.
pub fn parse_external(spec: &str) -> Option<(String, String, Vec<String>)> {
    let (name, command) = spec.split_once('=')?;
    let mut parts = command.split_whitespace();
    let program = parts.next()?;
    if name.trim().is_empty() {
        return None;
    }
    Some((
        name.trim().to_string(),
        program.to_string(),
        parts.map(str::to_string).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze() {
        let args = TokdriftArgs::parse_from(["tokdrift", "-vv", "analyze", "corpus.txt", "-t", "char_bigram"]);
        assert_eq!(args.verbosity(), 2);
        match args.command {
            Command::Analyze(analyze) => {
                assert_eq!(analyze.tokenizer, "char_bigram");
                assert_eq!(analyze.corpus, PathBuf::from("corpus.txt"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_compare() {
        let args = TokdriftArgs::parse_from([
            "tokdrift", "-q", "-f", "json", "compare", "c.txt", "-t", "whitespace", "-t", "unicode_word",
        ]);
        assert_eq!(args.verbosity(), 0);
        assert_eq!(args.output_format, OutputFormat::Json);
        match args.command {
            Command::Compare(compare) => {
                assert_eq!(compare.tokenizers, vec!["whitespace", "unicode_word"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_external() {
        let (name, program, args) = parse_external("gpt=./tok.py --model base").unwrap();
        assert_eq!(name, "gpt");
        assert_eq!(program, "./tok.py");
        assert_eq!(args, vec!["--model", "base"]);

        assert!(parse_external("no-equals").is_none());
        assert!(parse_external("=prog").is_none());
        assert!(parse_external("name=").is_none());
    }
}
