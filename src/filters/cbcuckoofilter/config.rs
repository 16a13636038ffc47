//! Construction parameters.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::CbcfError;

/// Largest supported number of buckets.
pub const MAX_BUCKETS: usize = 1 << 31;

/// Largest supported small fingerprint width in bits. The large width is `4/3` of it and has to
/// stay below 32 bits.
pub const MAX_FINGERPRINT_BITS: u32 = 23;

/// Scrub threshold used by [`Config::with_properties`].
pub const DEFAULT_SCRUB_THRESHOLD: usize = 50;

/// Expected load factor at which [`Config::with_properties`] sizes the table.
const LOAD_FACTOR: f64 = 0.95;

/// How bucket pressure is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mode {
    /// Plain cuckoo filter: every bucket counts as saturated, so lookups always use the small
    /// fingerprint width and scrub reinsertion only lands through eviction.
    Standard,

    /// Buckets are judged by their actual occupancy: lookups use the large fingerprint width until
    /// a bucket fills up.
    Adaptive,
}

/// Parameters of a [`CbCuckooFilter`](super::CbCuckooFilter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Config {
    /// Pressure policy.
    pub mode: Mode,

    /// Number of buckets, a power of 2.
    pub n_buckets: usize,

    /// Number of fingerprint slots per bucket.
    pub cells: usize,

    /// Small fingerprint width `f`; the stored width is `⌊4f/3⌋`.
    pub fingerprint_bits: u32,

    /// Placement rounds during which scrub reinsertion only accepts lightly loaded buckets.
    pub scrub_threshold: usize,
}

impl Config {
    /// Size a filter with `cells` slots per bucket for the given false positive rate and number of
    /// elements.
    ///
    /// The small fingerprint width is picked so that a saturated table stays below
    /// `false_positive_rate`; the table is sized for a load factor of 95%.
    pub fn with_properties(
        mode: Mode,
        cells: usize,
        false_positive_rate: f64,
        expected_elements: usize,
    ) -> Result<Self, CbcfError> {
        if expected_elements == 0 {
            return Err(CbcfError::InvalidExpectedElements(expected_elements));
        }
        if !((false_positive_rate > 0.) && (false_positive_rate < 1.)) {
            return Err(CbcfError::InvalidFalsePositiveRate(false_positive_rate));
        }
        if cells == 0 {
            return Err(CbcfError::InvalidCellCount(cells));
        }

        let fingerprint_bits = (2.0 * (cells as f64) / false_positive_rate)
            .log2()
            .ceil() as u32;
        let n_buckets = ((expected_elements as f64) / ((cells as f64) * LOAD_FACTOR)).ceil();
        if n_buckets > MAX_BUCKETS as f64 {
            return Err(CbcfError::TableSizeTooLarge);
        }
        let n_buckets = (n_buckets as usize)
            .max(1)
            .checked_next_power_of_two()
            .ok_or(CbcfError::TableSizeTooLarge)?;

        let config = Self {
            mode,
            n_buckets,
            cells,
            fingerprint_bits,
            scrub_threshold: DEFAULT_SCRUB_THRESHOLD,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the parameters describe a usable filter.
    pub fn validate(&self) -> Result<(), CbcfError> {
        if !self.n_buckets.is_power_of_two() || self.n_buckets > MAX_BUCKETS {
            return Err(CbcfError::InvalidBucketCount(self.n_buckets));
        }
        if (self.cells == 0) || (self.cells > usize::from(u8::MAX)) {
            return Err(CbcfError::InvalidCellCount(self.cells));
        }
        if (self.fingerprint_bits == 0) || (self.fingerprint_bits > MAX_FINGERPRINT_BITS) {
            return Err(CbcfError::InvalidFingerprintBits(self.fingerprint_bits));
        }
        self.n_buckets
            .checked_mul(self.cells)
            .ok_or(CbcfError::TableSizeTooLarge)?;
        Ok(())
    }

    /// Width of stored fingerprints in bits, `⌊4f/3⌋`.
    pub fn large_fingerprint_bits(&self) -> u32 {
        self.fingerprint_bits * 4 / 3
    }

    /// Number of distinct small fingerprints, `2^f`.
    pub fn small_width(&self) -> u32 {
        1 << self.fingerprint_bits
    }

    /// Number of distinct stored fingerprints, `2^⌊4f/3⌋`.
    pub fn large_width(&self) -> u32 {
        1 << self.large_fingerprint_bits()
    }
}
