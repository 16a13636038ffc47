//! CB-CF: cuckoo filter with adaptive fingerprint width and bucket scrubbing.
use std::fmt;

use log::{debug, trace, warn};
use rand::Rng;
use rand::seq::index;

use crate::error::CbcfError;
use crate::filters::Filter;
use crate::hash_utils::{HashVariant, hash};

mod config;
mod table;

pub use config::{Config, DEFAULT_SCRUB_THRESHOLD, MAX_BUCKETS, MAX_FINGERPRINT_BITS, Mode};
use table::BucketTable;

const MAX_ROUNDS: usize = 1000;

/// A fingerprint together with the bucket it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entry {
    /// Bucket index.
    pub bucket: usize,
    /// Stored (large width) fingerprint.
    pub fingerprint: u32,
}

/// Outcome of one [`scrub`](CbCuckooFilter::scrub) pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrubSummary {
    /// Fingerprints taken out of a full bucket and placed again.
    pub relocated: usize,
    /// Fingerprints whose reinsertion ran out of rounds and ended up in the victim slot.
    pub failed: usize,
    /// Victims overwritten by failed reinsertions, oldest first. These elements are lost.
    pub dropped: Vec<Entry>,
}

/// A cuckoo filter that stores wide fingerprints but matches saturated buckets with narrow ones,
/// and that can relieve saturated buckets by scrubbing.
///
/// # Examples
/// ```
/// use cbcf::filters::Filter;
/// use cbcf::filters::cbcuckoofilter::{CbCuckooFilter, Config, Mode};
/// use cbcf::rand::SeedableRng;
/// use rand_chacha::ChaChaRng;
///
/// let config = Config::with_properties(Mode::Adaptive, 4, 0.02, 1000).unwrap();
/// let mut filter = CbCuckooFilter::new(config, ChaChaRng::from_seed([0; 32])).unwrap();
///
/// filter.insert(1337).unwrap();
/// filter.scrub();
///
/// assert!(filter.query(1337));
/// assert_eq!(filter.len(), 1);
/// ```
///
/// # How It Works
///
/// ## Fingerprints
/// With a small width of `f` bits, every element is stored as a `⌊4f/3⌋` bit fingerprint. A
/// lookup compares against a bucket with all of these bits as long as the bucket has a free slot.
/// Once the bucket is saturated, only the lower `f` bits are compared. Full buckets are the ones
/// that attract most false positives, and they are exactly the ones where the filter falls back to
/// the precision of a plain `f` bit cuckoo filter.
///
/// In [`Mode::Standard`], every bucket is treated as saturated, which results in a plain cuckoo
/// filter with `f` bit fingerprints.
///
/// ## Buckets
/// Every fingerprint `x` has two legal buckets: `i` and `i ^ h(x)`. Since the number of buckets is
/// a power of 2, XORing with `h(x)` flips between both and never leaves the table.
///
/// ## Insertion
/// Slots are probed index by index, each time flipping a coin which of both buckets goes first.
/// If no slot is accepted, a random occupant of a random candidate bucket is kicked out and
/// becomes the fingerprint to place. After 1000 rounds the carried fingerprint is parked in a
/// single victim slot, overwriting an older victim if there was one.
///
/// ## Scrubbing
/// [`scrub`](Self::scrub) takes one random fingerprint out of every full bucket and places it
/// again. For the first `scrub_threshold` rounds, only buckets with at least 2 free slots are
/// accepted; later on, any free slot will do.
///
/// # Victim
/// There is exactly one victim slot. A second placement failure drops the previous victim and
/// the element it stood for is no longer found by [`query`](Self::query). This is reported as
/// [`CbcfError::Exhausted::dropped`](CbcfError::Exhausted).
///
/// # References
/// - ["Cuckoo Filter: Practically Better Than Bloom", Bin Fan, David G. Andersen, Michael
///   Kaminsky, Michael D. Mitzenmacher, 2014](https://www.cs.cmu.edu/~dga/papers/cuckoo-conext2014.pdf).
#[derive(Clone)]
pub struct CbCuckooFilter<R>
where
    R: Rng,
{
    table: BucketTable,
    config: Config,
    n_elements: usize,
    victim: Option<Entry>,
    rng: R,
}

impl<R> CbCuckooFilter<R>
where
    R: Rng,
{
    /// Create new, empty filter from `config`.
    ///
    /// `rng` drives all random decisions: coin flips, evictions, scrub and removal picks.
    pub fn new(config: Config, rng: R) -> Result<Self, CbcfError> {
        config.validate()?;
        let table = BucketTable::new(
            config.n_buckets,
            config.cells,
            config.large_fingerprint_bits(),
        )?;

        Ok(Self {
            table,
            config,
            n_elements: 0,
            victim: None,
            rng,
        })
    }

    /// Create new filter with:
    ///
    /// - `rng`: random number generator used for certain random actions
    /// - `mode`: pressure policy
    /// - `n_buckets`: number of buckets, must be a power of 2
    /// - `cells`: number of slots per bucket, `1..=255`
    /// - `fingerprint_bits`: small fingerprint width `f`, `1..=23`
    /// - `scrub_threshold`: strict rounds during scrub reinsertion
    pub fn with_params(
        rng: R,
        mode: Mode,
        n_buckets: usize,
        cells: usize,
        fingerprint_bits: u32,
        scrub_threshold: usize,
    ) -> Result<Self, CbcfError> {
        let config = Config {
            mode,
            n_buckets,
            cells,
            fingerprint_bits,
            scrub_threshold,
        };
        Self::new(config, rng)
    }

    /// Parameters the filter was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of buckets.
    pub fn n_buckets(&self) -> usize {
        self.config.n_buckets
    }

    /// Number of slots per bucket.
    pub fn cells(&self) -> usize {
        self.config.cells
    }

    /// Small fingerprint width in bits.
    pub fn fingerprint_bits(&self) -> u32 {
        self.config.fingerprint_bits
    }

    /// Currently parked victim, if any.
    pub fn victim(&self) -> Option<Entry> {
        self.victim
    }

    /// Number of fingerprints stored in `bucket`.
    pub fn occupancy(&self, bucket: usize) -> usize {
        self.table.occupancy(bucket)
    }

    /// Insert `key`.
    ///
    /// Returns the number of placement rounds used (at least 1). If no slot could be found within
    /// 1000 rounds, the last displaced fingerprint becomes the victim and
    /// [`CbcfError::Exhausted`] is returned. `key` itself stays queryable in that case.
    pub fn insert(&mut self, key: u64) -> Result<usize, CbcfError> {
        let (fingerprint, bucket) = self.start(key);
        self.place(bucket, fingerprint, 0)
    }

    /// Check whether `key` may have been inserted.
    pub fn query(&self, key: u64) -> bool {
        let (fingerprint, i1) = self.start(key);
        let i2 = i1 ^ self.sibling_offset(fingerprint);

        if self.victim_matches(fingerprint, i1, i2) {
            return true;
        }

        self.has_in_bucket(i1, fingerprint) || self.has_in_bucket(i2, fingerprint)
    }

    /// Remove one copy of `key`.
    ///
    /// Only exact matches of the stored fingerprint are removed. Returns `true` if something was
    /// removed, `false` if the filter was not altered.
    pub fn delete(&mut self, key: u64) -> bool {
        let (fingerprint, i1) = self.start(key);
        let i2 = i1 ^ self.sibling_offset(fingerprint);

        for bucket in [i1, i2] {
            if let Some(slot) = self.table.find(bucket, fingerprint) {
                self.remove_at(bucket, slot);
                return true;
            }
        }

        if self.victim_matches(fingerprint, i1, i2) {
            self.victim = None;
            return true;
        }
        false
    }

    /// Relieve saturated buckets.
    ///
    /// Every bucket that is full when the pass reaches it loses one randomly picked fingerprint,
    /// which is placed again using the configured scrub threshold. The number of stored elements
    /// only shrinks if such a placement fails, by one per failure. Every failure parks its
    /// fingerprint as the victim; victims overwritten that way are listed in
    /// [`ScrubSummary::dropped`].
    pub fn scrub(&mut self) -> ScrubSummary {
        let cells = self.config.cells;
        let mut summary = ScrubSummary::default();

        for bucket in 0..self.table.n_buckets() {
            if self.table.occupancy(bucket) != cells {
                continue;
            }

            let slot = index::sample(&mut self.rng, cells, cells).index(0);
            let Some(fingerprint) = self.table.take(bucket, slot) else {
                continue;
            };
            self.n_elements -= 1;

            match self.place(bucket, fingerprint, self.config.scrub_threshold) {
                Ok(_) => summary.relocated += 1,
                Err(CbcfError::Exhausted { dropped, .. }) => {
                    summary.failed += 1;
                    summary.dropped.extend(dropped);
                }
                Err(e) => unreachable!("placement only fails by exhaustion: {}", e),
            }
        }

        debug!(
            "scrub pass: relocated={} failed={} dropped={} n_elements={}",
            summary.relocated,
            summary.failed,
            summary.dropped.len(),
            self.n_elements
        );
        summary
    }

    /// Remove a uniformly random stored fingerprint and return it.
    ///
    /// The victim slot is never touched. Fails with [`CbcfError::Empty`] if the table holds
    /// nothing.
    pub fn random_remove(&mut self) -> Result<Entry, CbcfError> {
        if self.n_elements == 0 {
            return Err(CbcfError::Empty);
        }

        loop {
            let bucket = self.rng.random_range(0..self.table.n_buckets());
            let slot = self.rng.random_range(0..self.config.cells);
            if let Some(fingerprint) = self.table.get(bucket, slot) {
                self.remove_at(bucket, slot);
                trace!("removed fingerprint {} from bucket {}", fingerprint, bucket);
                return Ok(Entry {
                    bucket,
                    fingerprint,
                });
            }
        }
    }

    /// Recount stored fingerprints, excluding the victim.
    ///
    /// Always equal to [`len`](Filter::len); this walks the whole table though.
    pub fn size(&self) -> usize {
        self.table.count_used()
    }

    /// Fraction of buckets holding `0, 1, ..., cells` fingerprints. Sums up to 1.
    pub fn bucket_occupancy_histogram(&self) -> Vec<f64> {
        self.table.histogram()
    }

    /// Returns `(large width fingerprint, first bucket)`.
    fn start(&self, key: u64) -> (u32, usize) {
        let fingerprint = hash(key, HashVariant::ShiftXor, self.config.large_width());
        let bucket = hash(key, HashVariant::Multiplicative, self.n_buckets() as u32) as usize;
        (fingerprint, bucket)
    }

    fn sibling_offset(&self, fingerprint: u32) -> usize {
        hash(
            u64::from(fingerprint),
            HashVariant::Multiplicative,
            self.n_buckets() as u32,
        ) as usize
    }

    /// Occupancy as seen by width selection and acceptance tiers.
    fn pressure(&self, bucket: usize) -> usize {
        let baseline = match self.config.mode {
            Mode::Standard => self.config.cells,
            Mode::Adaptive => 0,
        };
        self.table.occupancy(bucket) + baseline
    }

    fn match_width(&self, bucket: usize) -> u32 {
        if self.pressure(bucket) < self.config.cells {
            self.config.large_width()
        } else {
            self.config.small_width()
        }
    }

    fn victim_matches(&self, fingerprint: u32, i1: usize, i2: usize) -> bool {
        self.victim.is_some_and(|victim| {
            (victim.fingerprint == fingerprint) && ((victim.bucket == i1) || (victim.bucket == i2))
        })
    }

    fn has_in_bucket(&self, bucket: usize, fingerprint: u32) -> bool {
        let width = self.match_width(bucket);
        let needle = fingerprint % width;
        self.table
            .bucket(bucket)
            .flatten()
            .any(|stored| stored % width == needle)
    }

    /// Acceptance tiers: no restriction for plain inserts, then buckets with at least 2 free slots
    /// before `retry_threshold`, then any bucket with a free slot.
    fn admits(&self, bucket: usize, round: usize, retry_threshold: usize) -> bool {
        let cells = self.config.cells;
        if retry_threshold == 0 {
            true
        } else if round < retry_threshold {
            self.pressure(bucket) < cells - 1
        } else {
            self.pressure(bucket) < cells
        }
    }

    fn place(
        &mut self,
        mut bucket: usize,
        mut fingerprint: u32,
        retry_threshold: usize,
    ) -> Result<usize, CbcfError> {
        let cells = self.config.cells;

        for round in 1..=MAX_ROUNDS {
            let offset = self.sibling_offset(fingerprint);

            for slot in 0..cells {
                if self.rng.random::<bool>() {
                    bucket ^= offset;
                }
                for candidate in [bucket, bucket ^ offset] {
                    if self.admits(candidate, round, retry_threshold)
                        && self.table.get(candidate, slot).is_none()
                    {
                        self.table.replace(candidate, slot, fingerprint);
                        self.n_elements += 1;
                        return Ok(round);
                    }
                }
            }

            // nothing accepted => kick a random occupant
            if self.rng.random::<bool>() {
                bucket ^= offset;
            }
            let slot = self.rng.random_range(0..cells);
            match self.table.replace(bucket, slot, fingerprint) {
                None => {
                    self.n_elements += 1;
                    return Ok(round);
                }
                Some(kicked) => fingerprint = kicked,
            }
        }

        let victim = Entry {
            bucket,
            fingerprint,
        };
        let dropped = self.victim.replace(victim);
        debug!(
            "placement exhausted after {} rounds, parking {:?} as victim",
            MAX_ROUNDS, victim
        );
        if let Some(dropped) = dropped {
            warn!("victim {:?} overwritten, element is lost", dropped);
        }

        Err(CbcfError::Exhausted {
            rounds: MAX_ROUNDS,
            victim,
            dropped,
        })
    }

    fn remove_at(&mut self, bucket: usize, slot: usize) {
        if self.table.take(bucket, slot).is_some() {
            self.table.shift_left(bucket, slot);
            self.n_elements -= 1;
        }
    }
}

impl<R> Filter<u64> for CbCuckooFilter<R>
where
    R: Rng,
{
    type InsertErr = CbcfError;

    fn clear(&mut self) {
        self.table.clear();
        self.n_elements = 0;
        self.victim = None;
    }

    fn insert(&mut self, obj: &u64) -> Result<usize, Self::InsertErr> {
        Self::insert(self, *obj)
    }

    fn is_empty(&self) -> bool {
        self.n_elements == 0
    }

    /// Return exact number of fingerprints in the table, the victim not included.
    fn len(&self) -> usize {
        self.n_elements
    }

    fn query(&self, obj: &u64) -> bool {
        Self::query(self, *obj)
    }
}

impl<R> fmt::Debug for CbCuckooFilter<R>
where
    R: Rng,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CbCuckooFilter {{ mode: {:?}, n_buckets: {}, cells: {}, fingerprint_bits: {}, n_elements: {} }}",
            self.config.mode,
            self.config.n_buckets,
            self.config.cells,
            self.config.fingerprint_bits,
            self.n_elements
        )
    }
}
