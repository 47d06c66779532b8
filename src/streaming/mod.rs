//! Bounded-memory streaming over large corpora.
//!
//! A reader thread pulls documents from a [`DocumentSource`] in fixed-size
//! chunks and hands them over a bounded channel to the consumer, which runs
//! one processor call per chunk. A [`MemoryBudget`] keeps buffered chunks and
//! undelivered results under a soft ceiling.

pub mod analyzer;
pub mod config;
pub mod memory;
pub mod source;

pub use analyzer::{ProgressUpdate, StreamOutcome, StreamStats, StreamingAnalyzer};
pub use config::StreamingConfig;
pub use memory::{Admission, MemoryBudget, MemoryUsage};
pub use source::{DocumentSource, LineSource, VecSource};
