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

//! Fixed-capacity slab of tracked counters with a free list.

use crate::chain::RecordedCount;

/// Per-key bookkeeping of the indexed tick algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct TrackedCounter {
    pub key: u32,
    /// Live count plus the summary's total decrement, as of the key's last update.
    pub shifted_count: u64,
    /// The count last written to the history for this key, if any since the last checkpoint.
    pub recorded: Option<RecordedCount>,
}

/// Slab allocator holding at most `capacity` counters.
///
/// Slots are addressed by `u32` indices that stay valid until freed. Freed slots are reused
/// before the slab grows.
#[derive(Debug, Clone)]
pub(super) struct CounterArena {
    slots: Vec<Option<TrackedCounter>>,
    free_list: Vec<u32>,
    capacity: usize,
}

impl CounterArena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            capacity,
        }
    }

    /// Stores a counter and returns its slot.
    ///
    /// # Panics
    ///
    /// Panics if all `capacity` slots are in use.
    pub fn alloc(&mut self, counter: TrackedCounter) -> u32 {
        if let Some(slot) = self.free_list.pop() {
            debug_assert!(self.slots[slot as usize].is_none());
            self.slots[slot as usize] = Some(counter);
            return slot;
        }
        assert!(
            self.slots.len() < self.capacity,
            "counter arena exhausted: capacity {}",
            self.capacity
        );
        self.slots.push(Some(counter));
        (self.slots.len() - 1) as u32
    }

    /// Releases a slot and returns the counter it held.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not allocated.
    pub fn free(&mut self, slot: u32) -> TrackedCounter {
        let counter = self.slots.get_mut(slot as usize).and_then(Option::take);
        match counter {
            Some(counter) => {
                self.free_list.push(slot);
                counter
            }
            None => panic!("slot {slot} is not allocated"),
        }
    }

    pub fn get(&self, slot: u32) -> &TrackedCounter {
        match self.slots.get(slot as usize) {
            Some(Some(counter)) => counter,
            _ => panic!("slot {slot} is not allocated"),
        }
    }

    pub fn get_mut(&mut self, slot: u32) -> &mut TrackedCounter {
        match self.slots.get_mut(slot as usize) {
            Some(Some(counter)) => counter,
            _ => panic!("slot {slot} is not allocated"),
        }
    }

    /// Returns the number of allocated slots.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns an iterator over `(slot, counter)` for every allocated slot.
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (u32, &TrackedCounter)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, counter)| counter.as_ref().map(|c| (slot as u32, c)))
    }

    /// Frees every slot, keeping the allocation.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
    }

    pub fn heap_size(&self) -> usize {
        self.slots.capacity() * size_of::<Option<TrackedCounter>>()
            + self.free_list.capacity() * size_of::<u32>()
    }
}
