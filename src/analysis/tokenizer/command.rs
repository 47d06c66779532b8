//! Tokenizer backed by an external process.
//!
//! The process receives the document text on stdin and must print a JSON
//! array of tokens on stdout, one object per token:
//!
//! ```json
//! [{"text": "the", "start_offset": 0, "end_offset": 3, "id": 464}]
//! ```
//!
//! `position` defaults to the array index and `id` is optional. A non-zero
//! exit status or malformed output is a runtime failure; a program that cannot
//! be spawned is reported as unavailable.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use serde::Deserialize;

use super::Tokenizer;
use crate::analysis::token::Token;
use crate::error::{DriftError, Result, TokenizerErrorKind};

#[derive(Debug, Deserialize)]
struct WireToken {
    text: String,
    #[serde(default)]
    position: Option<usize>,
    #[serde(default)]
    start_offset: usize,
    #[serde(default)]
    end_offset: usize,
    #[serde(default)]
    id: Option<u32>,
}

/// Runs an external program for every `tokenize` call.
#[derive(Clone, Debug)]
pub struct CommandTokenizer {
    label: String,
    program: PathBuf,
    args: Vec<String>,
}

impl CommandTokenizer {
    /// Create a tokenizer that runs `program` with no arguments.
    pub fn new<L: Into<String>, P: Into<PathBuf>>(label: L, program: P) -> Self {
        CommandTokenizer {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append command-line arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn parse_output(stdout: &[u8]) -> Result<Vec<Token>> {
        let wire: Vec<WireToken> = serde_json::from_slice(stdout).map_err(|e| {
            DriftError::tokenizer(
                TokenizerErrorKind::Runtime,
                format!("malformed tokenizer output: {e}"),
            )
        })?;

        Ok(wire
            .into_iter()
            .enumerate()
            .map(|(index, t)| {
                let token = Token::with_offsets(
                    t.text,
                    t.position.unwrap_or(index),
                    t.start_offset,
                    t.end_offset,
                );
                match t.id {
                    Some(id) => token.with_id(id),
                    None => token,
                }
            })
            .collect())
    }
}

impl Tokenizer for CommandTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                let kind = if e.kind() == ErrorKind::NotFound
                    || e.kind() == ErrorKind::PermissionDenied
                {
                    TokenizerErrorKind::Unavailable
                } else {
                    TokenizerErrorKind::Runtime
                };
                DriftError::tokenizer(
                    kind,
                    format!("failed to start {}: {e}", self.program.display()),
                )
            })?;

        // Feed stdin from another thread so a chatty child cannot deadlock
        // on a full stdout pipe.
        let mut stdin = child.stdin.take().ok_or_else(|| {
            DriftError::tokenizer(TokenizerErrorKind::Runtime, "child stdin unavailable")
        })?;
        let input = text.to_owned();
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child.wait_with_output()?;
        match writer.join() {
            Ok(Ok(())) => {}
            // The child may legitimately exit without reading all input.
            Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(DriftError::tokenizer(
                    TokenizerErrorKind::Runtime,
                    "stdin writer panicked",
                ));
            }
        }

        if !output.status.success() {
            return Err(DriftError::tokenizer(
                TokenizerErrorKind::Runtime,
                format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        Self::parse_output(&output.stdout)
    }

    fn name(&self) -> &str {
        &self.label
    }

    fn config_snapshot(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("program".to_string(), self.program.display().to_string()),
            ("args".to_string(), self.args.join("\u{1f}")),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_defaults_position() {
        let tokens = CommandTokenizer::parse_output(
            br#"[{"text":"a","start_offset":0,"end_offset":1},{"text":"b","id":7}]"#,
        )
        .unwrap();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].position, 1);
        assert_eq!(tokens[1].id, Some(7));
    }

    #[test]
    fn test_parse_output_rejects_garbage() {
        match CommandTokenizer::parse_output(b"not json") {
            Err(DriftError::Tokenizer { kind, .. }) => {
                assert_eq!(kind, TokenizerErrorKind::Runtime)
            }
            other => panic!("expected runtime tokenizer error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let tokenizer = CommandTokenizer::new("ghost", "/nonexistent/tokdrift-tokenizer");
        match tokenizer.tokenize("hello") {
            Err(DriftError::Tokenizer { kind, .. }) => {
                assert_eq!(kind, TokenizerErrorKind::Unavailable)
            }
            other => panic!("expected unavailable tokenizer, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_external_process() {
        let tokenizer = CommandTokenizer::new("echo-json", "sh").with_args([
            "-c",
            r#"cat > /dev/null; printf '[{"text":"x","start_offset":0,"end_offset":1}]'"#,
        ]);
        let tokens = tokenizer.tokenize("x").unwrap();
        assert_eq!(tokens[0].text, "x");
        assert_eq!(tokenizer.name(), "echo-json");
    }
}
