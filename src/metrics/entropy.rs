//! Shannon entropy over token frequency distributions.
//!
//! Token texts are interned to dense ids first, so both the global and the
//! rolling computations work on integer counts.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Entropy of a whole token sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntropyStats {
    /// Shannon entropy in bits.
    pub entropy: f64,

    /// Entropy divided by log2 of the observed vocabulary size, in [0, 1].
    pub normalized: f64,

    /// Number of distinct tokens.
    pub unique_tokens: usize,

    /// Total number of tokens.
    pub token_count: usize,
}

/// Entropy over a sliding window of consecutive tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingEntropy {
    /// Window length in tokens.
    pub window_size: usize,

    /// Entropy in bits of each window, in order.
    pub values: Vec<f64>,

    /// Mean of `values`.
    pub mean: f64,

    /// Population variance of `values`.
    pub variance: f64,
}

impl RollingEntropy {
    /// Number of windows.
    pub fn window_count(&self) -> usize {
        self.values.len()
    }
}

/// Map token texts to dense ids in order of first appearance.
pub fn intern<'a, I>(tokens: I) -> (Vec<usize>, usize)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut vocabulary: AHashMap<&'a str, usize> = AHashMap::new();
    let ids = tokens
        .into_iter()
        .map(|text| {
            let next = vocabulary.len();
            *vocabulary.entry(text).or_insert(next)
        })
        .collect();
    (ids, vocabulary.len())
}

/// Shannon entropy in bits of a frequency table.
pub fn shannon_entropy(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    let entropy = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum::<f64>();

    entropy.max(0.0)
}

/// Divide `entropy` by log2 of the vocabulary size, clamped to [0, 1].
pub fn normalize(entropy: f64, unique_tokens: usize) -> f64 {
    if unique_tokens <= 1 {
        return 0.0;
    }
    (entropy / (unique_tokens as f64).log2()).clamp(0.0, 1.0)
}

/// Global entropy statistics for a token sequence.
pub fn token_entropy<'a, I>(tokens: I) -> EntropyStats
where
    I: IntoIterator<Item = &'a str>,
{
    let (ids, unique_tokens) = intern(tokens);
    let mut counts = vec![0usize; unique_tokens];
    for &id in &ids {
        counts[id] += 1;
    }

    let entropy = shannon_entropy(&counts);
    EntropyStats {
        entropy,
        normalized: normalize(entropy, unique_tokens),
        unique_tokens,
        token_count: ids.len(),
    }
}

fn c_log_c(count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        let c = count as f64;
        c * c.log2()
    }
}

/// Entropy of every window of `window_size` consecutive tokens, stepping one
/// token at a time.
///
/// Returns `None` when `window_size` is 0 or larger than the token count.
/// Each step updates the running sum of `c * log2(c)` for the two counts that
/// change, using `H = log2(W) - S / W`, so the whole series costs O(n).
pub fn rolling_entropy<'a, I>(tokens: I, window_size: usize) -> Option<RollingEntropy>
where
    I: IntoIterator<Item = &'a str>,
{
    let (ids, unique_tokens) = intern(tokens);
    if window_size == 0 || window_size > ids.len() {
        return None;
    }

    let w = window_size as f64;
    let log_w = w.log2();
    let mut counts = vec![0usize; unique_tokens];
    let mut sum_c_log_c = 0.0;

    let mut adjust = |id: usize, delta: isize, sum: &mut f64| {
        let before = counts[id];
        let after = before.saturating_add_signed(delta);
        *sum += c_log_c(after) - c_log_c(before);
        counts[id] = after;
    };

    for &id in &ids[..window_size] {
        adjust(id, 1, &mut sum_c_log_c);
    }

    let mut values = Vec::with_capacity(ids.len() - window_size + 1);
    values.push((log_w - sum_c_log_c / w).max(0.0));

    for i in window_size..ids.len() {
        adjust(ids[i - window_size], -1, &mut sum_c_log_c);
        adjust(ids[i], 1, &mut sum_c_log_c);
        values.push((log_w - sum_c_log_c / w).max(0.0));
    }

    let (mean, variance) = mean_variance(&values);
    Some(RollingEntropy {
        window_size,
        values,
        mean,
        variance,
    })
}

/// Mean and population variance; both 0 for an empty slice.
pub fn mean_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}
