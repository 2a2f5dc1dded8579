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

//! Misra-Gries summary implementation.

use crate::HeavyHitter;
use crate::frequencies::counter_map::CounterMap;
use crate::persistent::sort_heavy_hitters;

/// Misra-Gries frequency counter summary over `u32` keys.
///
/// The summary keeps at most `k - 1` counters. Each count underestimates the true frequency
/// of its key by at most [`MisraGriesSketch::maximum_error`], which never exceeds
/// `total_weight / k`.
///
/// See [`crate::frequencies`] for an overview.
#[derive(Debug, Clone)]
pub struct MisraGriesSketch {
    epsilon: f64,
    k: u32,
    counters: CounterMap,
    /// Lower bound of the smallest stored count; `u64::MAX` when there are no counters.
    min_count: u64,
    /// Decrement owed by every stored count but not yet subtracted.
    pending: u64,
    /// Decrements already subtracted from every stored count, plus merged-in error.
    offset: u64,
    stream_weight: u64,
}

impl MisraGriesSketch {
    /// Creates a summary whose additive error is at most `epsilon` times the total weight.
    ///
    /// The summary uses `k = ceil(1 / epsilon)`.
    ///
    /// # Panics
    ///
    /// Panics if `epsilon` is not in `(0, 1)`.
    pub fn new(epsilon: f64) -> Self {
        assert!(
            epsilon > 0.0 && epsilon < 1.0,
            "epsilon must be in (0, 1), got {epsilon}"
        );
        let k = (1.0 / epsilon).ceil().max(2.0) as u32;
        Self::with_parts(epsilon, k)
    }

    /// Creates a summary that keeps at most `k - 1` counters.
    ///
    /// # Panics
    ///
    /// Panics if `k` is less than 2.
    pub fn with_capacity(k: u32) -> Self {
        assert!(k >= 2, "k must be at least 2, got {k}");
        Self::with_parts(1.0 / k as f64, k)
    }

    fn with_parts(epsilon: f64, k: u32) -> Self {
        Self {
            epsilon,
            k,
            counters: CounterMap::new(),
            min_count: u64::MAX,
            pending: 0,
            offset: 0,
            stream_weight: 0,
        }
    }

    /// Returns the configured error bound.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Returns `k`; the summary keeps at most `k - 1` counters.
    pub fn capacity(&self) -> u32 {
        self.k
    }

    /// Returns the number of live counters.
    pub fn num_counters(&self) -> usize {
        self.counters.len()
    }

    /// Returns true if the summary holds no counters.
    pub fn is_empty(&self) -> bool {
        self.counters.len() == 0
    }

    /// Returns the sum of all counts passed to the summary, including merged summaries.
    pub fn total_weight(&self) -> u64 {
        self.stream_weight
    }

    /// Returns the largest amount by which any count may underestimate its true frequency.
    pub fn maximum_error(&self) -> u64 {
        self.offset + self.pending
    }

    /// Returns the count of `key`, a lower bound on its true frequency.
    ///
    /// Keys without a counter estimate to zero.
    pub fn estimate(&self, key: u32) -> u64 {
        self.counters
            .get(key)
            .map_or(0, |stored| stored - self.pending)
    }

    /// Returns an upper bound on the true frequency of `key`.
    pub fn upper_bound(&self, key: u32) -> u64 {
        self.estimate(key) + self.maximum_error()
    }

    /// Returns an iterator over `(key, count)` for every live counter.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        let pending = self.pending;
        self.counters
            .iter()
            .map(move |(key, stored)| (key, stored - pending))
    }

    /// Updates the summary with a count of one.
    pub fn update(&mut self, key: u32) {
        self.update_with_count(key, 1);
    }

    /// Updates the summary with a key and count.
    ///
    /// A count of zero is a no-op.
    pub fn update_with_count(&mut self, key: u32, count: u64) {
        if count == 0 {
            return;
        }
        self.insert_or_decrement(key, count, &mut |_| {});
    }

    /// Same as [`MisraGriesSketch::update_with_count`], appending every key whose counter
    /// was dropped to `evicted`.
    pub(crate) fn update_with_evictions(&mut self, key: u32, count: u64, evicted: &mut Vec<u32>) {
        if count == 0 {
            return;
        }
        self.insert_or_decrement(key, count, &mut |key| evicted.push(key));
    }

    /// Merges another summary into this one.
    ///
    /// Counts of keys present in either summary are added after each side's pending
    /// decrement is applied. If more than `k - 1` counters result, the `k`-th largest count
    /// is subtracted from all of them and the non-positive ones are dropped. The error of
    /// the result is the sum of both errors plus that subtracted amount.
    pub fn merge(&mut self, other: &Self) {
        self.apply_pending_decrement();
        for (key, count) in other.iter() {
            if !self.counters.adjust(key, count) {
                self.counters.insert(key, count);
            }
        }
        self.offset += other.maximum_error();
        self.stream_weight += other.stream_weight;

        let max_counters = self.max_counters();
        if self.counters.len() > max_counters {
            let mut counts: Vec<u64> = self.counters.iter().map(|(_, count)| count).collect();
            let (_, kth_largest, _) = counts.select_nth_unstable_by(max_counters, |a, b| b.cmp(a));
            let kth_largest = *kth_largest;
            self.counters.decrement_all(kth_largest, &mut |_| {});
            self.offset += kth_largest;
        }
        self.min_count = self.counters.min_value();
    }

    /// Resets the summary to an empty state.
    pub fn clear(&mut self) {
        self.counters.clear();
        self.min_count = u64::MAX;
        self.pending = 0;
        self.offset = 0;
        self.stream_weight = 0;
    }

    /// Returns every key whose count exceeds `threshold_fraction * total`.
    ///
    /// Each key is reported with `count / total` as its estimated fraction. Every key whose
    /// true fraction exceeds `threshold_fraction + epsilon` is returned, and no key whose
    /// true fraction is at most `threshold_fraction` is returned.
    pub fn estimate_heavy_hitters(&self, threshold_fraction: f64, total: u64) -> Vec<HeavyHitter> {
        if total == 0 {
            return vec![];
        }
        let total = total as f64;
        let threshold = threshold_fraction * total;
        let mut hitters: Vec<HeavyHitter> = self
            .iter()
            .filter(|(_, count)| *count as f64 > threshold)
            .map(|(key, count)| HeavyHitter::new(key, count as f64 / total))
            .collect();
        sort_heavy_hitters(&mut hitters);
        hitters
    }

    /// Returns the approximate memory footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        size_of::<Self>() + self.counters.heap_size()
    }

    /// Returns the cumulative decrement every live count has received, pending included.
    ///
    /// A live count plus this value only changes when its own key is updated.
    pub(crate) fn total_decrement(&self) -> u64 {
        self.offset + self.pending
    }

    /// Returns the count of `key` plus [`MisraGriesSketch::total_decrement`], or `None` if
    /// the key has no counter.
    pub(crate) fn shifted_count(&self, key: u32) -> Option<u64> {
        self.counters.get(key).map(|stored| stored + self.offset)
    }

    /// Subtracts the pending decrement from every stored count.
    ///
    /// Counts reported by the summary and its future behavior are unchanged; the minimum
    /// stays a lazy lower bound.
    pub(crate) fn apply_pending_decrement(&mut self) {
        if self.pending == 0 {
            return;
        }
        self.counters.decrement_all(self.pending, &mut |key| {
            unreachable!("pending decrement dropped counter {key}")
        });
        self.offset += self.pending;
        self.min_count -= self.pending;
        self.pending = 0;
    }

    fn max_counters(&self) -> usize {
        self.k as usize - 1
    }

    fn insert_or_decrement<F: FnMut(u32)>(&mut self, key: u32, count: u64, on_evict: &mut F) {
        debug_assert!(self.min_count > self.pending);
        self.stream_weight += count;
        if self.counters.adjust(key, count) {
            return;
        }
        let max_counters = self.max_counters();
        if self.counters.len() < max_counters {
            self.counters.insert(key, count);
            self.min_count = self.min_count.min(count);
            return;
        }

        self.pending += count;
        if self.pending < self.min_count {
            return;
        }
        // The lazy minimum may be below the true minimum, in which case this pass frees no
        // counter. It always leaves the minimum exact.
        self.decrement_by(self.min_count, on_evict);
        if self.pending == 0 {
            return;
        }
        if self.counters.len() < max_counters {
            self.insert_remainder(key);
            return;
        }
        if self.pending >= self.min_count {
            self.decrement_by(self.min_count, on_evict);
            debug_assert!(self.counters.len() < max_counters);
            if self.pending > 0 {
                self.insert_remainder(key);
            }
        }
    }

    fn decrement_by<F: FnMut(u32)>(&mut self, amount: u64, on_evict: &mut F) {
        self.pending -= amount;
        self.offset += amount;
        self.min_count = self.counters.decrement_all(amount, on_evict);
    }

    fn insert_remainder(&mut self, key: u32) {
        self.counters.insert(key, self.pending);
        self.min_count = self.min_count.min(self.pending);
        self.pending = 0;
    }
}
