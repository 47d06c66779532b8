//! Documents fed to the analysis pipeline.
//!
//! A [`Document`] is an identity plus its text. Results are grouped and drift
//! pairs are formed by document id, never by submission position.
//!
//! # Examples
//!
//! ```
//! use tokdrift::document::Document;
//!
//! let docs = Document::from_texts(["the cat sat", "the dog sat"]);
//! assert_eq!(docs[0].id(), "doc-0");
//! assert_eq!(docs[1].text(), "the dog sat");
//! ```

use serde::{Deserialize, Serialize};

use crate::util::size::EstimateSize;

/// A single document to analyze.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    id: String,
    text: String,
}

impl Document {
    /// Create a new document.
    pub fn new<I: Into<String>, T: Into<String>>(id: I, text: T) -> Self {
        Document {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Build documents from plain texts, assigning ids `doc-0`, `doc-1`, ...
    pub fn from_texts<I, T>(texts: I) -> Vec<Document>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Document::new(format!("doc-{i}"), text))
            .collect()
    }

    /// The document identity.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The document text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Check if the document has no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl EstimateSize for Document {
    fn estimated_size(&self) -> usize {
        std::mem::size_of::<Document>() + self.id.capacity() + self.text.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_accessors() {
        let doc = Document::new("a", "hello world");
        assert_eq!(doc.id(), "a");
        assert_eq!(doc.text(), "hello world");
        assert_eq!(doc.len(), 11);
        assert!(!doc.is_empty());
    }

    #[test]
    fn test_from_texts_assigns_sequential_ids() {
        let docs = Document::from_texts(vec!["x", "y", "z"]);
        let ids: Vec<_> = docs.iter().map(Document::id).collect();
        assert_eq!(ids, vec!["doc-0", "doc-1", "doc-2"]);
    }

    #[test]
    fn test_estimated_size_grows_with_text() {
        let small = Document::new("a", "x");
        let large = Document::new("a", "x".repeat(1000));
        assert!(large.estimated_size() > small.estimated_size());
    }
}
