//! Compression-based redundancy measures.
//!
//! DEFLATE is the reference compressor. The tokenized representation is the
//! token texts joined by the ASCII unit separator, so token boundaries are
//! part of what gets compressed.

use std::io::Write;

use flate2::Compression;
use flate2::write::DeflateEncoder;
use serde::{Deserialize, Serialize};

use crate::error::Result;

const TOKEN_SEPARATOR: &str = "\u{1f}";

/// Compression measures for one tokenization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionStats {
    /// Raw text size in bytes.
    pub raw_bytes: usize,

    /// Size of the deflated tokenized representation.
    pub compressed_bytes: usize,

    /// `raw_bytes / compressed_bytes`; higher means a more redundant
    /// tokenization. 0 for empty input.
    pub compression_ratio: f64,

    /// `raw_bytes / token_count`; 0 when there are no tokens.
    pub bytes_per_token: f64,
}

/// Deflated size of `data`.
pub fn deflated_size(data: &[u8]) -> Result<usize> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?.len())
}

/// Compute compression statistics for `text` tokenized as `tokens`.
pub fn compression_stats<'a, I>(text: &str, tokens: I) -> Result<CompressionStats>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut joined = String::with_capacity(text.len() * 2);
    let mut token_count = 0usize;
    for token in tokens {
        if token_count > 0 {
            joined.push_str(TOKEN_SEPARATOR);
        }
        joined.push_str(token);
        token_count += 1;
    }

    let raw_bytes = text.len();
    if raw_bytes == 0 || token_count == 0 {
        return Ok(CompressionStats {
            raw_bytes,
            compressed_bytes: 0,
            compression_ratio: 0.0,
            bytes_per_token: 0.0,
        });
    }

    let compressed_bytes = deflated_size(joined.as_bytes())?;
    Ok(CompressionStats {
        raw_bytes,
        compressed_bytes,
        compression_ratio: raw_bytes as f64 / compressed_bytes.max(1) as f64,
        bytes_per_token: raw_bytes as f64 / token_count as f64,
    })
}
