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

//! Linear-probing counter map keyed by `u32`.
//!
//! Keys, counts and probe drifts live in parallel arrays. Decrementing every counter is a
//! single pass over the counts followed by a reverse purge that deletes the counters which
//! reached zero, scanning clusters from the back so that backward shifts only ever move
//! entries that were already examined.

const LG_MIN_MAP_SIZE: u8 = 3;
const LOAD_FACTOR: f64 = 0.75;
const DRIFT_LIMIT: usize = 1024;
const HASH_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Linear-probing map from `u32` keys to positive `u64` counts.
#[derive(Debug, Clone)]
pub(super) struct CounterMap {
    load_threshold: usize,
    keys: Vec<u32>,
    values: Vec<u64>,
    states: Vec<u16>,
    num_active: usize,
}

impl CounterMap {
    /// Creates an empty map with the minimum table size.
    pub fn new() -> Self {
        Self::with_lg_length(LG_MIN_MAP_SIZE)
    }

    fn with_lg_length(lg_length: u8) -> Self {
        let map_size = 1usize << lg_length;
        Self {
            load_threshold: (map_size as f64 * LOAD_FACTOR) as usize,
            keys: vec![0; map_size],
            values: vec![0; map_size],
            states: vec![0; map_size],
            num_active: 0,
        }
    }

    /// Returns the count of `key`, or `None` if the key has no counter.
    pub fn get(&self, key: u32) -> Option<u64> {
        let probe = self.hash_probe(key);
        if self.states[probe] > 0 {
            Some(self.values[probe])
        } else {
            None
        }
    }

    /// Adds `amount` to the counter of `key`.
    ///
    /// Returns false, leaving the map untouched, if the key has no counter.
    pub fn adjust(&mut self, key: u32, amount: u64) -> bool {
        let probe = self.hash_probe(key);
        if self.states[probe] == 0 {
            return false;
        }
        self.values[probe] += amount;
        true
    }

    /// Inserts a counter for a key that is not present.
    pub fn insert(&mut self, key: u32, value: u64) {
        debug_assert!(value > 0, "counters must be positive");
        if self.num_active >= self.load_threshold {
            self.resize(self.keys.len() * 2);
        }
        let mask = self.keys.len() - 1;
        let mut probe = (hash_key(key) as usize) & mask;
        let mut drift: usize = 1;
        while self.states[probe] != 0 {
            debug_assert!(self.keys[probe] != key, "key {key} is already present");
            probe = (probe + 1) & mask;
            drift += 1;
            debug_assert!(drift < DRIFT_LIMIT, "drift limit exceeded");
        }
        self.keys[probe] = key;
        self.values[probe] = value;
        self.states[probe] = drift as u16;
        self.num_active += 1;
    }

    /// Subtracts `amount` from every counter and deletes the counters that reach zero.
    ///
    /// `on_evict` observes every deleted key. Returns the smallest surviving count, or
    /// `u64::MAX` if no counter survives.
    pub fn decrement_all<F: FnMut(u32)>(&mut self, amount: u64, on_evict: &mut F) -> u64 {
        for (value, state) in self.values.iter_mut().zip(self.states.iter()) {
            if *state > 0 {
                *value = value.saturating_sub(amount);
            }
        }
        self.keep_only_positive_counts(on_evict);
        self.min_value()
    }

    /// Returns the smallest count, or `u64::MAX` if the map is empty.
    pub fn min_value(&self) -> u64 {
        self.iter().map(|(_, value)| value).min().unwrap_or(u64::MAX)
    }

    /// Returns the number of counters.
    pub fn len(&self) -> usize {
        self.num_active
    }

    /// Returns the log2 of the table length.
    #[cfg(test)]
    pub fn lg_length(&self) -> u8 {
        self.keys.len().trailing_zeros() as u8
    }

    /// Drops every counter and shrinks the table back to its minimum size.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Returns the bytes held by the table arrays.
    pub fn heap_size(&self) -> usize {
        self.keys.capacity() * size_of::<u32>()
            + self.values.capacity() * size_of::<u64>()
            + self.states.capacity() * size_of::<u16>()
    }

    /// Returns an iterator over `(key, count)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| **state > 0)
            .map(|(i, _)| (self.keys[i], self.values[i]))
    }

    fn keep_only_positive_counts<F: FnMut(u32)>(&mut self, on_evict: &mut F) {
        let len = self.keys.len();
        let mut first_probe = len - 1;
        while self.states[first_probe] > 0 {
            first_probe -= 1;
        }
        for probe in (0..first_probe).rev() {
            if self.states[probe] > 0 && self.values[probe] == 0 {
                on_evict(self.keys[probe]);
                self.hash_delete(probe);
                self.num_active -= 1;
            }
        }
        for probe in (first_probe..len).rev() {
            if self.states[probe] > 0 && self.values[probe] == 0 {
                on_evict(self.keys[probe]);
                self.hash_delete(probe);
                self.num_active -= 1;
            }
        }
    }

    fn resize(&mut self, new_size: usize) {
        debug_assert!(new_size.is_power_of_two(), "new_size must be power of 2");
        let old = std::mem::replace(self, Self::with_lg_length(new_size.trailing_zeros() as u8));
        for (key, value) in old.iter() {
            self.insert(key, value);
        }
    }

    fn hash_probe(&self, key: u32) -> usize {
        let mask = self.keys.len() - 1;
        let mut probe = (hash_key(key) as usize) & mask;
        while self.states[probe] > 0 && self.keys[probe] != key {
            probe = (probe + 1) & mask;
        }
        probe
    }

    fn hash_delete(&mut self, mut delete_probe: usize) {
        self.states[delete_probe] = 0;
        let mut drift: usize = 1;
        let mask = self.keys.len() - 1;
        let mut probe = (delete_probe + drift) & mask;
        while self.states[probe] != 0 {
            if self.states[probe] as usize > drift {
                self.keys[delete_probe] = self.keys[probe];
                self.values[delete_probe] = self.values[probe];
                self.states[delete_probe] = self.states[probe] - drift as u16;
                self.states[probe] = 0;
                drift = 0;
                delete_probe = probe;
            }
            probe = (probe + 1) & mask;
            drift += 1;
            debug_assert!(drift < DRIFT_LIMIT, "drift limit exceeded");
        }
    }
}

/// MurmurHash3 `fmix64` finalizer over the seeded key.
#[inline]
fn hash_key(key: u32) -> u64 {
    let mut h = key as u64 ^ HASH_SEED;
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(map: &CounterMap) -> Vec<(u32, u64)> {
        let mut entries: Vec<_> = map.iter().collect();
        entries.sort_unstable();
        entries
    }

    #[test]
    fn test_insert_get_adjust() {
        let mut map = CounterMap::new();
        assert_eq!(map.get(7), None);
        assert!(!map.adjust(7, 1));

        map.insert(7, 3);
        map.insert(0, 1);
        assert!(map.adjust(7, 2));
        assert_eq!(map.get(7), Some(5));
        assert_eq!(map.get(0), Some(1));
        assert_eq!(map.len(), 2);
        assert_eq!(map.min_value(), 1);
    }

    #[test]
    fn test_resize_keeps_counters() {
        let mut map = CounterMap::new();
        for key in 0..100u32 {
            map.insert(key * 31, key as u64 + 1);
        }
        assert_eq!(map.len(), 100);
        assert!(map.lg_length() > LG_MIN_MAP_SIZE);
        for key in 0..100u32 {
            assert_eq!(map.get(key * 31), Some(key as u64 + 1));
        }
    }

    #[test]
    fn test_decrement_all_evicts_zeros() {
        let mut map = CounterMap::new();
        for key in 0..40u32 {
            map.insert(key, (key % 5) as u64 + 1);
        }
        let mut evicted = vec![];
        let min = map.decrement_all(2, &mut |key| evicted.push(key));
        evicted.sort_unstable();

        let expected_evicted: Vec<u32> = (0..40).filter(|key| key % 5 < 2).collect();
        assert_eq!(evicted, expected_evicted);
        assert_eq!(map.len(), 40 - expected_evicted.len());
        assert_eq!(min, 1);
        for key in 0..40u32 {
            let expected = ((key % 5) as u64 + 1).checked_sub(2).filter(|v| *v > 0);
            assert_eq!(map.get(key), expected, "key {key}");
        }
    }

    #[test]
    fn test_decrement_everything() {
        let mut map = CounterMap::new();
        map.insert(1, 1);
        map.insert(2, 1);
        let min = map.decrement_all(1, &mut |_| {});
        assert_eq!(min, u64::MAX);
        assert_eq!(map.len(), 0);
        assert!(sorted(&map).is_empty());
    }

    #[test]
    fn test_clear_shrinks_table() {
        let mut map = CounterMap::new();
        for key in 0..64u32 {
            map.insert(key, 1);
        }
        map.clear();
        assert_eq!(map.len(), 0);
        assert_eq!(map.lg_length(), LG_MIN_MAP_SIZE);
        assert_eq!(map.get(3), None);
    }
}
