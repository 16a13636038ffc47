//! Bit-packed bucket table.
use succinct::{IntVec, IntVecMut, IntVector};

use crate::error::CbcfError;

/// `n_buckets` buckets of `cells` slots each, plus one occupancy counter per bucket.
///
/// Slots are packed into an `IntVector` of `fingerprint_bits + 1` bit wide elements. The stored
/// value is `fingerprint + 1` so that `0` can mark a free slot without stealing a fingerprint
/// value. Callers only ever see `Option<u32>`.
///
/// Occupancy counters are maintained by [`replace`](Self::replace) and [`take`](Self::take) and
/// always equal the number of used slots of their bucket.
#[derive(Clone)]
pub(crate) struct BucketTable {
    slots: IntVector<u64>,
    occupancy: Vec<u8>,
    cells: usize,
    fingerprint_limit: u64,
}

impl BucketTable {
    pub(crate) fn new(
        n_buckets: usize,
        cells: usize,
        fingerprint_bits: u32,
    ) -> Result<Self, CbcfError> {
        let len = n_buckets
            .checked_mul(cells)
            .ok_or(CbcfError::TableSizeTooLarge)?;
        let element_bits = fingerprint_bits as usize + 1;

        Ok(Self {
            slots: IntVector::with_fill(element_bits, len as u64, 0),
            occupancy: vec![0; n_buckets],
            cells,
            fingerprint_limit: 1u64 << fingerprint_bits,
        })
    }

    pub(crate) fn n_buckets(&self) -> usize {
        self.occupancy.len()
    }

    fn position(&self, bucket: usize, slot: usize) -> u64 {
        assert!(
            bucket < self.n_buckets(),
            "bucket ({}) out of range ({})",
            bucket,
            self.n_buckets()
        );
        assert!(
            slot < self.cells,
            "slot ({}) out of range ({})",
            slot,
            self.cells
        );
        (bucket * self.cells + slot) as u64
    }

    fn encode(&self, fingerprint: u32) -> u64 {
        let x = u64::from(fingerprint);
        assert!(
            x < self.fingerprint_limit,
            "fingerprint ({}) does not fit into the table",
            fingerprint
        );
        x + 1
    }

    pub(crate) fn get(&self, bucket: usize, slot: usize) -> Option<u32> {
        match self.slots.get(self.position(bucket, slot)) {
            0 => None,
            x => Some((x - 1) as u32),
        }
    }

    /// Write `fingerprint` into the slot and return the previous content.
    pub(crate) fn replace(&mut self, bucket: usize, slot: usize, fingerprint: u32) -> Option<u32> {
        let previous = self.get(bucket, slot);
        let x = self.encode(fingerprint);
        self.slots.set(self.position(bucket, slot), x);
        if previous.is_none() {
            self.occupancy[bucket] += 1;
        }
        previous
    }

    /// Clear the slot and return what was stored there.
    pub(crate) fn take(&mut self, bucket: usize, slot: usize) -> Option<u32> {
        let previous = self.get(bucket, slot);
        if previous.is_some() {
            self.slots.set(self.position(bucket, slot), 0);
            self.occupancy[bucket] -= 1;
        }
        previous
    }

    /// Move every slot after `slot` one position to the front and free the last slot.
    pub(crate) fn shift_left(&mut self, bucket: usize, slot: usize) {
        for s in slot..(self.cells - 1) {
            let next = self.slots.get(self.position(bucket, s + 1));
            self.slots.set(self.position(bucket, s), next);
        }
        self.slots.set(self.position(bucket, self.cells - 1), 0);
    }

    /// Slots of one bucket, in order.
    pub(crate) fn bucket(&self, bucket: usize) -> impl Iterator<Item = Option<u32>> + '_ {
        (0..self.cells).map(move |slot| self.get(bucket, slot))
    }

    /// First slot of `bucket` that holds exactly `fingerprint`.
    pub(crate) fn find(&self, bucket: usize, fingerprint: u32) -> Option<usize> {
        self.bucket(bucket).position(|x| x == Some(fingerprint))
    }

    pub(crate) fn occupancy(&self, bucket: usize) -> usize {
        usize::from(self.occupancy[bucket])
    }

    /// Recount all used slots, independent of the occupancy counters.
    pub(crate) fn count_used(&self) -> usize {
        self.slots.iter().filter(|&x| x != 0).count()
    }

    /// Fraction of buckets holding `0..=cells` fingerprints.
    pub(crate) fn histogram(&self) -> Vec<f64> {
        let n = self.n_buckets() as f64;
        (0..=self.cells)
            .map(|level| bytecount::count(&self.occupancy, level as u8) as f64 / n)
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.slots = IntVector::with_fill(self.slots.element_bits(), self.slots.len(), 0);
        self.occupancy.iter_mut().for_each(|x| *x = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::BucketTable;

    fn consistent(table: &BucketTable) -> bool {
        (0..table.n_buckets()).all(|b| {
            table.occupancy(b) == table.bucket(b).filter(Option::is_some).count()
        })
    }

    #[test]
    fn starts_empty() {
        let table = BucketTable::new(4, 3, 5).unwrap();
        assert_eq!(table.n_buckets(), 4);
        assert_eq!(table.count_used(), 0);
        for b in 0..4 {
            assert_eq!(table.occupancy(b), 0);
            assert!(table.bucket(b).all(|x| x.is_none()));
        }
    }

    #[test]
    fn zero_is_a_fingerprint() {
        let mut table = BucketTable::new(2, 2, 5).unwrap();
        assert_eq!(table.replace(1, 0, 0), None);
        assert_eq!(table.get(1, 0), Some(0));
        assert_eq!(table.occupancy(1), 1);
        assert_eq!(table.count_used(), 1);
    }

    #[test]
    fn largest_fingerprint_fits() {
        let mut table = BucketTable::new(2, 2, 5).unwrap();
        table.replace(0, 1, 31);
        assert_eq!(table.get(0, 1), Some(31));
        assert_eq!(table.get(0, 0), None);
        assert_eq!(table.get(1, 0), None);
    }

    #[test]
    #[should_panic(expected = "fingerprint (32) does not fit into the table")]
    fn oversized_fingerprint_panics() {
        let mut table = BucketTable::new(2, 2, 5).unwrap();
        table.replace(0, 0, 32);
    }

    #[test]
    #[should_panic(expected = "slot (2) out of range (2)")]
    fn slot_out_of_range_panics() {
        let table = BucketTable::new(2, 2, 5).unwrap();
        table.get(0, 2);
    }

    #[test]
    fn replace_and_take_track_occupancy() {
        let mut table = BucketTable::new(2, 2, 8).unwrap();
        assert_eq!(table.replace(0, 0, 7), None);
        assert_eq!(table.replace(0, 0, 9), Some(7));
        assert_eq!(table.occupancy(0), 1);
        assert_eq!(table.take(0, 1), None);
        assert_eq!(table.occupancy(0), 1);
        assert_eq!(table.take(0, 0), Some(9));
        assert_eq!(table.occupancy(0), 0);
        assert!(consistent(&table));
    }

    #[test]
    fn shift_left_compacts_tail() {
        let mut table = BucketTable::new(1, 4, 8).unwrap();
        for (slot, f) in [10, 11, 12, 13].into_iter().enumerate() {
            table.replace(0, slot, f);
        }
        assert_eq!(table.take(0, 1), Some(11));
        table.shift_left(0, 1);
        let slots: Vec<_> = table.bucket(0).collect();
        assert_eq!(slots, vec![Some(10), Some(12), Some(13), None]);
        assert_eq!(table.occupancy(0), 3);
        assert!(consistent(&table));
    }

    #[test]
    fn find() {
        let mut table = BucketTable::new(2, 3, 8).unwrap();
        table.replace(1, 2, 200);
        assert_eq!(table.find(1, 200), Some(2));
        assert_eq!(table.find(0, 200), None);
        assert_eq!(table.find(1, 201), None);
    }

    #[test]
    fn histogram() {
        let mut table = BucketTable::new(4, 2, 8).unwrap();
        table.replace(0, 0, 1);
        table.replace(0, 1, 2);
        table.replace(1, 0, 3);
        assert_eq!(table.histogram(), vec![0.5, 0.25, 0.25]);
    }

    #[test]
    fn clear() {
        let mut table = BucketTable::new(4, 2, 8).unwrap();
        table.replace(3, 1, 1);
        table.clear();
        assert_eq!(table.count_used(), 0);
        assert_eq!(table.occupancy(3), 0);
        assert_eq!(table.get(3, 1), None);
    }
}
