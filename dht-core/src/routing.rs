//! Per-node routing table: ordered k-buckets keyed by XOR-distance
//! bit-length, with an LRU freshness policy within each bucket.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::address::NodeAddress;
use crate::error::{CoreError, CoreResult};
use crate::key::KeyInt;

/// Outcome of [`RoutingTable::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObserveOutcome {
    /// The address was already present; it was moved to the bucket head.
    Refreshed,
    /// The address was new and the bucket had room.
    Inserted,
    /// The address was new but its bucket is already at capacity `k`.
    /// The table is unchanged. An upper layer may ping the bucket's tail
    /// and, on no reply, call [`RoutingTable::evict_tail`] then retry.
    BucketFull,
}

/// A node's routing state: one ordered bucket per possible XOR-distance
/// bit-length in `0..=b`.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    own_id: KeyInt,
    k: u32,
    /// `buckets[i]` holds addresses whose XOR-distance to `own_id` has
    /// `bit_length() == i`. Index 0 within position 0 is most recently
    /// seen; the back is the eviction candidate.
    buckets: Vec<VecDeque<NodeAddress>>,
}

impl RoutingTable {
    pub fn new(own_id: KeyInt, b: u32, k: u32) -> RoutingTable {
        RoutingTable {
            own_id,
            k,
            buckets: vec![VecDeque::new(); (b + 1) as usize],
        }
    }

    pub fn own_id(&self) -> KeyInt {
        self.own_id
    }

    /// Bit-length of the XOR distance to `id`, clamped to the table's
    /// highest bucket. A well-formed network keeps every id within the
    /// table's own `b`, so this only ever bites a `target` drawn from
    /// outside that range (an arbitrary lookup key, say) — never an
    /// out-of-bounds index into `buckets`.
    fn bucket_index(&self, id: KeyInt) -> usize {
        let distance_bits = self.own_id.xor(&id).bit_length() as usize;
        distance_bits.min(self.buckets.len() - 1)
    }

    /// Refreshes or admits `addr` into its bucket.
    ///
    /// Fails with [`CoreError::SelfReference`] if `addr.id == own_id`.
    pub fn observe(&mut self, addr: &NodeAddress) -> CoreResult<ObserveOutcome> {
        if addr.id == self.own_id {
            return Err(CoreError::SelfReference(addr.id));
        }
        let i = self.bucket_index(addr.id);
        let bucket = &mut self.buckets[i];

        if let Some(pos) = bucket.iter().position(|a| a.id == addr.id) {
            let existing = bucket.remove(pos).expect("position just located");
            bucket.push_front(existing);
            return Ok(ObserveOutcome::Refreshed);
        }

        if bucket.len() < self.k as usize {
            bucket.push_front(addr.clone());
            return Ok(ObserveOutcome::Inserted);
        }

        Ok(ObserveOutcome::BucketFull)
    }

    /// Drops the least-recently-seen address from bucket `i`, if any,
    /// making room for a subsequent `observe` to succeed.
    pub fn evict_tail(&mut self, bucket_index: usize) -> Option<NodeAddress> {
        self.buckets.get_mut(bucket_index)?.pop_back()
    }

    /// Up to `n` addresses closest to `target`, ascending by XOR-distance,
    /// duplicates removed, self excluded (self can never be stored in the
    /// table in the first place).
    pub fn find_closest(&self, target: KeyInt, n: u32) -> Vec<NodeAddress> {
        let primary = self.bucket_index(target);
        let mut candidates: Vec<NodeAddress> = self
            .buckets
            .get(primary)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        if candidates.len() < n as usize {
            for (i, bucket) in self.buckets.iter().enumerate() {
                if i == primary {
                    continue;
                }
                candidates.extend(bucket.iter().cloned());
            }
        }

        candidates.sort_by(|a, b| {
            let da = target.xor(&a.id);
            let db = target.xor(&b.id);
            da.cmp(&db).then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(n as usize);
        candidates
    }

    pub fn connection_count(&self) -> u32 {
        self.buckets.iter().map(|b| b.len() as u32).sum()
    }

    pub fn bucket_size(&self, i: usize) -> usize {
        self.buckets.get(i).map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_bucket_full(&self, i: usize) -> bool {
        self.bucket_size(i) >= self.k as usize
    }

    /// Iterates `(index, ids)` for every non-empty bucket at index >= 1,
    /// head first. Used by the persistence dump and graphviz export.
    pub fn non_empty_buckets(&self) -> impl Iterator<Item = (usize, &VecDeque<NodeAddress>)> {
        self.buckets
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, b)| !b.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(id: u64) -> NodeAddress {
        NodeAddress::new(KeyInt::from_u64(id), "127.0.0.1", 9000)
    }

    #[test]
    fn observe_rejects_self() {
        let mut table = RoutingTable::new(KeyInt::from_u64(1), 8, 20);
        let err = table.observe(&addr(1)).unwrap_err();
        assert_eq!(err, CoreError::SelfReference(KeyInt::from_u64(1)));
    }

    #[test]
    fn observe_inserts_then_refreshes() {
        let mut table = RoutingTable::new(KeyInt::from_u64(0), 8, 20);
        assert_eq!(table.observe(&addr(1)).unwrap(), ObserveOutcome::Inserted);
        assert_eq!(table.observe(&addr(1)).unwrap(), ObserveOutcome::Refreshed);
        assert_eq!(table.connection_count(), 1);
    }

    #[test]
    fn bucket_overflow_returns_bucket_full_and_keeps_first_k() {
        // ids 4,5,6,7 (0b100..0b111) all have bit_length 3 relative to
        // own_id 0, so with k=3 the fourth insert must report BucketFull
        // and the table must still hold exactly the first three.
        let mut table = RoutingTable::new(KeyInt::from_u64(0), 8, 3);
        assert_eq!(table.observe(&addr(4)).unwrap(), ObserveOutcome::Inserted);
        assert_eq!(table.observe(&addr(5)).unwrap(), ObserveOutcome::Inserted);
        assert_eq!(table.observe(&addr(6)).unwrap(), ObserveOutcome::Inserted);
        assert_eq!(table.observe(&addr(7)).unwrap(), ObserveOutcome::BucketFull);
        assert_eq!(table.connection_count(), 3);
    }

    #[test]
    fn idempotent_observe_leaves_same_state() {
        let mut a = RoutingTable::new(KeyInt::from_u64(0), 8, 20);
        let mut b = a.clone();
        a.observe(&addr(5)).unwrap();
        a.observe(&addr(5)).unwrap();
        b.observe(&addr(5)).unwrap();
        assert_eq!(a.connection_count(), b.connection_count());
        assert_eq!(
            a.find_closest(KeyInt::from_u64(5), 10),
            b.find_closest(KeyInt::from_u64(5), 10)
        );
    }

    #[test]
    fn find_closest_is_sorted_ascending_with_no_duplicates() {
        let mut table = RoutingTable::new(KeyInt::from_u64(0), 8, 20);
        for id in [1u64, 2, 3, 4, 5] {
            table.observe(&addr(id)).unwrap();
        }
        let closest = table.find_closest(KeyInt::from_u64(0), 3);
        assert_eq!(closest.len(), 3);
        for w in closest.windows(2) {
            let da = w[0].id.xor(&KeyInt::ZERO);
            let db = w[1].id.xor(&KeyInt::ZERO);
            assert!(da <= db);
        }
    }

    #[test]
    fn find_closest_with_an_out_of_range_target_does_not_panic() {
        // b=4 sizes `buckets` to 5 entries, but the target below sits far
        // outside the 4-bit keyspace its own ids live in.
        let mut table = RoutingTable::new(KeyInt::from_u64(0), 4, 20);
        table.observe(&addr(5)).unwrap();
        let far_target = KeyInt::from_u64(1) << 100;
        let closest = table.find_closest(far_target, 3);
        assert_eq!(closest.len(), 1);
    }
}
