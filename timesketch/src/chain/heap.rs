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

//! Binary heap over arena slots with an inverted index for in-place priority updates.

const ABSENT: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum HeapOrder {
    /// The smallest priority is at the root.
    Min,
    /// The largest priority is at the root.
    Max,
}

/// Binary heap of `(priority, slot)` entries in which each slot appears at most once.
///
/// `positions[slot]` holds the index of the slot's entry, so changing the priority of a slot
/// or removing it costs `O(log n)`.
#[derive(Debug, Clone)]
pub(super) struct IndexedHeap {
    order: HeapOrder,
    entries: Vec<(u64, u32)>,
    positions: Vec<u32>,
}

impl IndexedHeap {
    /// Creates a heap for slots in `0..num_slots`.
    pub fn new(order: HeapOrder, num_slots: usize) -> Self {
        Self {
            order,
            entries: Vec::with_capacity(num_slots),
            positions: vec![ABSENT; num_slots],
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn contains(&self, slot: u32) -> bool {
        self.positions[slot as usize] != ABSENT
    }

    /// Returns the priority of `slot`, if present.
    #[cfg(test)]
    pub fn priority(&self, slot: u32) -> Option<u64> {
        match self.positions[slot as usize] {
            ABSENT => None,
            pos => Some(self.entries[pos as usize].0),
        }
    }

    pub fn peek(&self) -> Option<(u64, u32)> {
        self.entries.first().copied()
    }

    /// Inserts `slot` with `priority`, or moves it to `priority` if already present.
    pub fn upsert(&mut self, slot: u32, priority: u64) {
        match self.positions[slot as usize] {
            ABSENT => {
                let pos = self.entries.len();
                self.entries.push((priority, slot));
                self.positions[slot as usize] = pos as u32;
                self.sift_up(pos);
            }
            pos => {
                let pos = pos as usize;
                let old = self.entries[pos].0;
                self.entries[pos].0 = priority;
                if self.precedes(priority, old) {
                    self.sift_up(pos);
                } else {
                    self.sift_down(pos);
                }
            }
        }
    }

    /// Removes `slot` and returns its priority, if present.
    pub fn remove(&mut self, slot: u32) -> Option<u64> {
        let pos = match self.positions[slot as usize] {
            ABSENT => return None,
            pos => pos as usize,
        };
        let (priority, _) = self.take(pos);
        Some(priority)
    }

    /// Removes and returns the root entry.
    pub fn pop(&mut self) -> Option<(u64, u32)> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.take(0))
        }
    }

    pub fn clear(&mut self) {
        for &(_, slot) in &self.entries {
            self.positions[slot as usize] = ABSENT;
        }
        self.entries.clear();
    }

    pub fn heap_size(&self) -> usize {
        self.entries.capacity() * size_of::<(u64, u32)>()
            + self.positions.capacity() * size_of::<u32>()
    }

    /// Checks the heap property and the inverted index.
    #[cfg(test)]
    pub fn check_invariants(&self) {
        for (pos, &(priority, slot)) in self.entries.iter().enumerate() {
            assert_eq!(self.positions[slot as usize], pos as u32);
            if pos > 0 {
                let parent = self.entries[(pos - 1) / 2].0;
                assert!(!self.precedes(priority, parent), "heap property violated at {pos}");
            }
        }
        let indexed = self.positions.iter().filter(|&&pos| pos != ABSENT).count();
        assert_eq!(indexed, self.entries.len());
    }

    fn take(&mut self, pos: usize) -> (u64, u32) {
        let last = self.entries.len() - 1;
        self.swap(pos, last);
        let removed = self.entries[last];
        self.entries.truncate(last);
        self.positions[removed.1 as usize] = ABSENT;
        if pos < self.entries.len() {
            self.sift_down(pos);
            self.sift_up(pos);
        }
        removed
    }

    /// Returns true if priority `a` belongs closer to the root than `b`.
    fn precedes(&self, a: u64, b: u64) -> bool {
        match self.order {
            HeapOrder::Min => a < b,
            HeapOrder::Max => a > b,
        }
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.precedes(self.entries[pos].0, self.entries[parent].0) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.entries.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut child = left;
            if right < len && self.precedes(self.entries[right].0, self.entries[left].0) {
                child = right;
            }
            if !self.precedes(self.entries[child].0, self.entries[pos].0) {
                break;
            }
            self.swap(pos, child);
            pos = child;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.positions[self.entries[a].1 as usize] = a as u32;
        self.positions[self.entries[b].1 as usize] = b as u32;
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn drain(heap: &mut IndexedHeap) -> Vec<u64> {
        let mut out = vec![];
        while let Some((priority, _)) = heap.pop() {
            heap.check_invariants();
            out.push(priority);
        }
        out
    }

    #[test]
    fn test_min_and_max_order() {
        let mut min = IndexedHeap::new(HeapOrder::Min, 8);
        let mut max = IndexedHeap::new(HeapOrder::Max, 8);
        for (slot, priority) in [5u64, 1, 9, 3, 7].into_iter().enumerate() {
            min.upsert(slot as u32, priority);
            max.upsert(slot as u32, priority);
        }
        assert_eq!(min.peek(), Some((1, 1)));
        assert_eq!(max.peek(), Some((9, 2)));
        assert_eq!(drain(&mut min), vec![1, 3, 5, 7, 9]);
        assert_eq!(drain(&mut max), vec![9, 7, 5, 3, 1]);
    }

    #[test]
    fn test_upsert_moves_entry() {
        let mut heap = IndexedHeap::new(HeapOrder::Min, 4);
        heap.upsert(0, 10);
        heap.upsert(1, 20);
        heap.upsert(2, 30);
        heap.upsert(2, 5);
        assert_eq!(heap.peek(), Some((5, 2)));
        heap.upsert(2, 40);
        assert_eq!(heap.peek(), Some((10, 0)));
        assert_eq!(heap.priority(2), Some(40));
        assert_eq!(heap.len(), 3);
        heap.check_invariants();
    }

    #[test]
    fn test_remove() {
        let mut heap = IndexedHeap::new(HeapOrder::Max, 4);
        heap.upsert(0, 10);
        heap.upsert(1, 20);
        heap.upsert(3, 30);
        assert_eq!(heap.remove(3), Some(30));
        assert_eq!(heap.remove(3), None);
        assert!(!heap.contains(3));
        assert_eq!(heap.remove(2), None);
        heap.check_invariants();
        assert_eq!(drain(&mut heap), vec![20, 10]);
    }

    #[test]
    fn test_clear_resets_index() {
        let mut heap = IndexedHeap::new(HeapOrder::Min, 4);
        heap.upsert(1, 1);
        heap.upsert(2, 2);
        heap.clear();
        assert_eq!(heap.len(), 0);
        assert!(!heap.contains(1));
        heap.upsert(1, 3);
        heap.check_invariants();
    }

    #[test]
    fn test_random_operations_match_sorted_model() {
        let mut rng = StdRng::seed_from_u64(7);
        let num_slots = 64;
        let mut heap = IndexedHeap::new(HeapOrder::Max, num_slots);
        let mut model: Vec<Option<u64>> = vec![None; num_slots];
        for _ in 0..5000 {
            let slot = rng.random_range(0..num_slots as u32);
            match rng.random_range(0..3) {
                0 | 1 => {
                    let priority = rng.random_range(0..1000);
                    heap.upsert(slot, priority);
                    model[slot as usize] = Some(priority);
                }
                _ => {
                    assert_eq!(heap.remove(slot), model[slot as usize].take());
                }
            }
            heap.check_invariants();
            let expected_top = model.iter().flatten().max().copied();
            assert_eq!(heap.peek().map(|(priority, _)| priority), expected_top);
        }
    }
}
