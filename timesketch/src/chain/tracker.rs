// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Tick processing that finds drifted keys through two heaps instead of a full scan.
//!
//! Let `G` be the total decrement of the live summary. A live key's count plus `G` only
//! changes when that key is updated, so as `G` grows the count falls at the same rate for
//! every key. A recorded count `r` with tolerance `t` stays valid while the live count is in
//! `[r - t, r + t]`, which translates into an interval of `G` fixed at the key's last
//! update. The interval ends go into a max-heap (the count rose above `r + t` while `G` is
//! below the end) and a min-heap (the count fell below `r - t` once `G` passed the end), so
//! each tick only looks at the keys whose interval no longer contains `G`.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::chain::RecordedCount;
use crate::chain::arena::CounterArena;
use crate::chain::arena::TrackedCounter;
use crate::chain::heap::HeapOrder;
use crate::chain::heap::IndexedHeap;
use crate::frequencies::MisraGriesSketch;

#[derive(Debug, Clone)]
pub(super) struct IndexedTracker {
    arena: CounterArena,
    slot_of: HashMap<u32, u32>,
    /// Max-heap of the decrement below which the count exceeds its band.
    rising: IndexedHeap,
    /// Min-heap of the decrement above which the count is below its band.
    falling: IndexedHeap,
    /// Slots of recorded keys that left the summary and still owe a removal record.
    parked: HashSet<u32>,
    checkpoint_tolerance: u64,
}

impl IndexedTracker {
    /// Creates a tracker for a summary that keeps at most `k - 1` counters.
    ///
    /// At most `k - 1` live keys and `k - 1` parked keys are tracked at once.
    pub fn new(k: u32) -> Self {
        let capacity = 2 * (k as usize - 1);
        Self {
            arena: CounterArena::with_capacity(capacity),
            slot_of: HashMap::with_capacity(capacity),
            rising: IndexedHeap::new(HeapOrder::Max, capacity),
            falling: IndexedHeap::new(HeapOrder::Min, capacity),
            parked: HashSet::new(),
            checkpoint_tolerance: 0,
        }
    }

    /// Follows an update of `key` that dropped the counters of `evicted` from `live`.
    pub fn on_update(&mut self, live: &MisraGriesSketch, key: u32, evicted: &[u32]) {
        for &evicted_key in evicted {
            self.evict(evicted_key);
        }
        let Some(shifted_count) = live.shifted_count(key) else {
            return;
        };
        let slot = match self.slot_of.get(&key) {
            Some(&slot) => {
                self.parked.remove(&slot);
                self.arena.get_mut(slot).shifted_count = shifted_count;
                slot
            }
            None => {
                let slot = self.arena.alloc(TrackedCounter {
                    key,
                    shifted_count,
                    recorded: None,
                });
                self.slot_of.insert(key, slot);
                slot
            }
        };
        self.index(slot);
    }

    /// Returns every `(key, count)` that has to be written at this tick, sorted by key.
    ///
    /// Parked keys are reported with a count of zero. Keys returned here are out of both
    /// heaps until [`IndexedTracker::commit`] or [`IndexedTracker::reset`].
    pub fn collect(&mut self, live: &MisraGriesSketch) -> Vec<(u32, u64)> {
        let decrement = live.total_decrement();
        let mut slots = vec![];
        while let Some((bound, slot)) = self.rising.peek() {
            if bound <= decrement {
                break;
            }
            self.rising.pop();
            self.falling.remove(slot);
            slots.push(slot);
        }
        while let Some((bound, slot)) = self.falling.peek() {
            if bound >= decrement {
                break;
            }
            self.falling.pop();
            self.rising.remove(slot);
            slots.push(slot);
        }

        let mut batch: Vec<(u32, u64)> = Vec::with_capacity(slots.len() + self.parked.len());
        for slot in slots {
            let counter = self.arena.get(slot);
            let count = counter.shifted_count - decrement;
            debug_assert_eq!(live.estimate(counter.key), count);
            batch.push((counter.key, count));
        }
        batch.extend(self.parked.iter().map(|&slot| (self.arena.get(slot).key, 0)));
        batch.sort_unstable();
        batch
    }

    /// Records a batch returned by [`IndexedTracker::collect`].
    pub fn commit(&mut self, batch: &[(u32, u64)], tolerance: u64) {
        for &(key, count) in batch {
            let slot = self.slot_of[&key];
            if count == 0 {
                self.parked.remove(&slot);
                self.arena.free(slot);
                self.slot_of.remove(&key);
            } else {
                self.arena.get_mut(slot).recorded = Some(RecordedCount { count, tolerance });
                self.index(slot);
            }
        }
    }

    /// Tracks every live counter as recorded at a new checkpoint.
    pub fn reset(&mut self, live: &MisraGriesSketch, checkpoint_tolerance: u64) {
        self.clear();
        self.checkpoint_tolerance = checkpoint_tolerance;
        for (key, count) in live.iter() {
            let Some(shifted_count) = live.shifted_count(key) else {
                continue;
            };
            let slot = self.arena.alloc(TrackedCounter {
                key,
                shifted_count,
                recorded: Some(RecordedCount {
                    count,
                    tolerance: checkpoint_tolerance,
                }),
            });
            self.slot_of.insert(key, slot);
            self.index(slot);
        }
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.slot_of.clear();
        self.rising.clear();
        self.falling.clear();
        self.parked.clear();
        self.checkpoint_tolerance = 0;
    }

    pub fn heap_size(&self) -> usize {
        self.arena.heap_size()
            + self.rising.heap_size()
            + self.falling.heap_size()
            + self.slot_of.capacity() * 2 * size_of::<u32>()
            + self.parked.capacity() * size_of::<u32>()
    }

    /// Checks the bookkeeping against the live summary.
    #[cfg(test)]
    pub fn check_invariants(&self, live: &MisraGriesSketch) {
        self.rising.check_invariants();
        self.falling.check_invariants();
        assert!(self.arena.len() <= self.arena.capacity());
        assert_eq!(self.slot_of.len(), self.arena.len());
        assert_eq!(self.arena.len(), live.num_counters() + self.parked.len());
        assert_eq!(self.rising.len(), live.num_counters());
        assert_eq!(self.falling.len(), live.num_counters());

        for (slot, counter) in self.arena.iter() {
            assert_eq!(self.slot_of.get(&counter.key), Some(&slot));
            match live.shifted_count(counter.key) {
                Some(shifted_count) => {
                    assert_eq!(counter.shifted_count, shifted_count);
                    assert!(!self.parked.contains(&slot));
                    let (rising, falling) = self.bounds(counter);
                    assert_eq!(self.rising.priority(slot), Some(rising));
                    assert_eq!(self.falling.priority(slot), Some(falling));
                }
                None => {
                    assert!(self.parked.contains(&slot), "key {} is lost", counter.key);
                    assert!(counter.recorded.is_some());
                    assert!(!self.rising.contains(slot));
                    assert!(!self.falling.contains(slot));
                }
            }
        }
    }

    fn evict(&mut self, key: u32) {
        let slot = self.slot_of[&key];
        self.rising.remove(slot);
        self.falling.remove(slot);
        if self.arena.get(slot).recorded.is_some() {
            self.parked.insert(slot);
        } else {
            self.arena.free(slot);
            self.slot_of.remove(&key);
        }
    }

    fn index(&mut self, slot: u32) {
        let (rising, falling) = self.bounds(self.arena.get(slot));
        self.rising.upsert(slot, rising);
        self.falling.upsert(slot, falling);
    }

    /// Returns the decrements at which the count leaves its band from above and from below.
    ///
    /// A key without a record only has to be written once its count exceeds the checkpoint
    /// tolerance.
    fn bounds(&self, counter: &TrackedCounter) -> (u64, u64) {
        let shifted = counter.shifted_count;
        match counter.recorded {
            Some(recorded) => (
                shifted.saturating_sub(recorded.count + recorded.tolerance),
                shifted.saturating_sub(recorded.count.saturating_sub(recorded.tolerance)),
            ),
            None => (shifted.saturating_sub(self.checkpoint_tolerance), u64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(
        live: &mut MisraGriesSketch,
        tracker: &mut IndexedTracker,
        updates: &[(u32, u64)],
    ) {
        let mut evicted = vec![];
        for &(key, count) in updates {
            evicted.clear();
            live.update_with_evictions(key, count, &mut evicted);
            tracker.on_update(live, key, &evicted);
            tracker.check_invariants(live);
        }
    }

    #[test]
    fn test_unrecorded_key_breaches_checkpoint_tolerance() {
        let mut live = MisraGriesSketch::with_capacity(4);
        let mut tracker = IndexedTracker::new(4);
        feed(&mut live, &mut tracker, &[(1, 10)]);
        tracker.reset(&live, 2);
        tracker.check_invariants(&live);

        feed(&mut live, &mut tracker, &[(2, 2), (1, 1)]);
        assert!(tracker.collect(&live).is_empty());
        tracker.check_invariants(&live);

        feed(&mut live, &mut tracker, &[(2, 1), (1, 2)]);
        let batch = tracker.collect(&live);
        assert_eq!(batch, vec![(1, 13), (2, 3)]);
        tracker.commit(&batch, 3);
        tracker.check_invariants(&live);
    }

    #[test]
    fn test_decrements_push_counts_below_band() {
        let mut live = MisraGriesSketch::with_capacity(3);
        let mut tracker = IndexedTracker::new(3);
        feed(&mut live, &mut tracker, &[(1, 10), (2, 4)]);
        tracker.reset(&live, 1);

        // Key 3 is absorbed by a decrement of 3: key 1 drops to 7, key 2 to 1.
        feed(&mut live, &mut tracker, &[(3, 3)]);
        assert_eq!(live.estimate(1), 7);
        assert_eq!(live.estimate(2), 1);
        let batch = tracker.collect(&live);
        assert_eq!(batch, vec![(1, 7), (2, 1)]);
        tracker.commit(&batch, 1);
        tracker.check_invariants(&live);
    }

    #[test]
    fn test_evicted_recorded_key_is_parked_until_removed() {
        let mut live = MisraGriesSketch::with_capacity(3);
        let mut tracker = IndexedTracker::new(3);
        feed(&mut live, &mut tracker, &[(1, 10), (2, 1)]);
        tracker.reset(&live, 0);

        feed(&mut live, &mut tracker, &[(3, 2)]);
        assert_eq!(live.estimate(2), 0);
        assert_eq!(tracker.parked.len(), 1);

        let batch = tracker.collect(&live);
        assert_eq!(batch, vec![(1, 9), (2, 0), (3, 1)]);
        tracker.commit(&batch, 0);
        tracker.check_invariants(&live);
        assert!(tracker.parked.is_empty());
        assert!(!tracker.slot_of.contains_key(&2));
    }

    #[test]
    fn test_parked_key_returning_is_tracked_again() {
        let mut live = MisraGriesSketch::with_capacity(3);
        let mut tracker = IndexedTracker::new(3);
        feed(&mut live, &mut tracker, &[(1, 10), (2, 1)]);
        tracker.reset(&live, 0);

        // Key 2 returns and evicts key 3, which was never recorded.
        feed(&mut live, &mut tracker, &[(3, 2), (2, 5)]);
        assert_eq!(live.estimate(2), 4);
        assert!(tracker.parked.is_empty());
        assert_eq!(tracker.arena.len(), 2);
        tracker.check_invariants(&live);
    }

    #[test]
    fn test_unrecorded_key_evicted_frees_slot() {
        let mut live = MisraGriesSketch::with_capacity(3);
        let mut tracker = IndexedTracker::new(3);
        feed(&mut live, &mut tracker, &[(1, 10)]);
        tracker.reset(&live, 5);

        feed(&mut live, &mut tracker, &[(2, 1), (3, 1)]);
        assert_eq!(live.estimate(2), 0);
        assert!(tracker.parked.is_empty());
        assert_eq!(tracker.arena.len(), 1);
        assert!(tracker.collect(&live).is_empty());
    }
}
