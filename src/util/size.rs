//! Rough heap-size estimates used for memory backpressure.
//!
//! These are approximations: they count owned string bytes and the inline
//! size of the containing structs, which is enough to keep the streaming
//! layer's soft memory ceiling honest without a custom allocator.

/// Types that can estimate how many bytes they keep alive.
pub trait EstimateSize {
    /// Approximate number of bytes owned by this value.
    fn estimated_size(&self) -> usize;
}

impl EstimateSize for String {
    fn estimated_size(&self) -> usize {
        std::mem::size_of::<String>() + self.capacity()
    }
}

impl<T: EstimateSize> EstimateSize for Vec<T> {
    fn estimated_size(&self) -> usize {
        std::mem::size_of::<Vec<T>>() + self.iter().map(EstimateSize::estimated_size).sum::<usize>()
    }
}

/// Convert megabytes to bytes.
pub const fn mb_to_bytes(mb: usize) -> usize {
    mb * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_estimate_includes_capacity() {
        let text = String::with_capacity(64);
        assert!(text.estimated_size() >= 64);
    }

    #[test]
    fn test_vec_estimate_sums_elements() {
        let words = vec!["alpha".to_string(), "beta".to_string()];
        assert!(words.estimated_size() >= 9);
    }

    #[test]
    fn test_mb_to_bytes() {
        assert_eq!(mb_to_bytes(2), 2 * 1024 * 1024);
    }
}
