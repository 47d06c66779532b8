//! Incremental document sources.

use std::io::BufRead;

use crate::document::Document;
use crate::error::Result;

/// Something that yields documents one at a time.
pub trait DocumentSource: Send {
    /// Next document, or `None` at the end.
    fn next_document(&mut self) -> Result<Option<Document>>;

    /// Total number of documents, when known up front.
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

/// A source over documents already in memory.
#[derive(Debug)]
pub struct VecSource {
    documents: std::vec::IntoIter<Document>,
    total: usize,
}

impl VecSource {
    /// Create a source over `documents`.
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            total: documents.len(),
            documents: documents.into_iter(),
        }
    }
}

impl DocumentSource for VecSource {
    fn next_document(&mut self) -> Result<Option<Document>> {
        Ok(self.documents.next())
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.total)
    }
}

/// One document per non-blank line of a reader.
///
/// Document ids are `"<prefix><line number>"`, with 1-based line numbers, so
/// ids stay stable when blank lines are skipped.
#[derive(Debug)]
pub struct LineSource<R> {
    reader: R,
    prefix: String,
    line_number: usize,
    buffer: String,
}

impl<R: BufRead> LineSource<R> {
    /// Create a source with ids `line-1`, `line-2`, ...
    pub fn new(reader: R) -> Self {
        Self::with_prefix(reader, "line-")
    }

    /// Create a source with a custom id prefix.
    pub fn with_prefix<S: Into<String>>(reader: R, prefix: S) -> Self {
        Self {
            reader,
            prefix: prefix.into(),
            line_number: 0,
            buffer: String::new(),
        }
    }
}

impl<R: BufRead + Send> DocumentSource for LineSource<R> {
    fn next_document(&mut self) -> Result<Option<Document>> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(Document::new(
                format!("{}{}", self.prefix, self.line_number),
                line,
            )));
        }
    }
}
