//! Errors reported by the filter.
use thiserror::Error;

use crate::filters::cbcuckoofilter::Entry;

/// Everything that can go wrong while building or mutating a filter.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CbcfError {
    /// Number of buckets is not a power of 2 within `1..=2^31`.
    #[error("n_buckets ({0}) must be a power of 2 between 1 and 2^31")]
    InvalidBucketCount(usize),

    /// Number of cells per bucket is outside of `1..=255`.
    #[error("cells ({0}) must be between 1 and 255")]
    InvalidCellCount(usize),

    /// Small fingerprint width is outside of `1..=23` bits.
    #[error("fingerprint_bits ({0}) must be between 1 and 23")]
    InvalidFingerprintBits(u32),

    /// Requested false positive rate is not within `(0, 1)`.
    #[error("false_positive_rate ({0}) must be greater than 0 and smaller than 1")]
    InvalidFalsePositiveRate(f64),

    /// Sizing was requested for zero elements.
    #[error("expected_elements ({0}) must be at least 1")]
    InvalidExpectedElements(usize),

    /// `n_buckets * cells` does not fit into memory addressing.
    #[error("Table size too large")]
    TableSizeTooLarge,

    /// Placement ran out of rounds.
    ///
    /// The carried fingerprint now sits in the victim slot. If another victim was held before,
    /// it is returned as `dropped`: that element is no longer represented by the filter.
    #[error("placement gave up after {rounds} rounds, victim parked in bucket {}", .victim.bucket)]
    Exhausted {
        /// Rounds spent before giving up.
        rounds: usize,
        /// The entry now held in the victim slot.
        victim: Entry,
        /// The previous victim, lost for good.
        dropped: Option<Entry>,
    },

    /// There is no stored fingerprint that could be removed.
    #[error("filter holds no fingerprints to remove")]
    Empty,
}
