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

use std::collections::HashMap;

use crate::HeavyHitter;
use crate::PersistentHeavyHitterSketch;
use crate::persistent::sort_heavy_hitters;

/// Cumulative count of a key at the end of a timestamp.
#[derive(Debug, Clone, Copy)]
struct Entry {
    ts: u64,
    count: u64,
}

/// Persistent heavy hitters computed from exact per-key count histories.
#[derive(Debug, Clone, Default)]
pub struct ExactHeavyHitters {
    histories: HashMap<u32, Vec<Entry>>,
    last_ts: u64,
}

impl ExactHeavyHitters {
    /// Creates an empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates with a key at the given timestamp.
    pub fn update(&mut self, ts: u64, key: u32) {
        self.update_with_count(ts, key, 1);
    }

    /// Updates with a key and count at the given timestamp.
    ///
    /// A count of zero is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if `ts` is earlier than the timestamp of a previous update.
    pub fn update_with_count(&mut self, ts: u64, key: u32, count: u64) {
        assert!(
            ts >= self.last_ts,
            "timestamps must be non-decreasing, got {ts} after {}",
            self.last_ts
        );
        if count == 0 {
            return;
        }
        self.last_ts = ts;
        let history = self.histories.entry(key).or_default();
        match history.last_mut() {
            Some(last) if last.ts == ts => last.count += count,
            Some(last) => {
                let count = last.count + count;
                history.push(Entry { ts, count });
            }
            None => history.push(Entry { ts, count }),
        }
    }

    /// Returns the number of occurrences of `key` up to and including `ts`.
    pub fn count_at(&self, ts: u64, key: u32) -> u64 {
        self.histories
            .get(&key)
            .map_or(0, |history| Self::lookup(history, ts))
    }

    /// Returns the total count of all keys up to and including `ts`.
    pub fn total_count_at(&self, ts: u64) -> u64 {
        self.histories
            .values()
            .map(|history| Self::lookup(history, ts))
            .sum()
    }

    /// Returns every key whose share of the stream up to and including `ts` exceeds
    /// `fraction`.
    pub fn estimate_heavy_hitters(&self, ts: u64, fraction: f64) -> Vec<HeavyHitter> {
        let counts: Vec<(u32, u64)> = self
            .histories
            .iter()
            .map(|(&key, history)| (key, Self::lookup(history, ts)))
            .filter(|&(_, count)| count > 0)
            .collect();
        let total: u64 = counts.iter().map(|&(_, count)| count).sum();
        if total == 0 {
            return vec![];
        }

        let threshold = fraction * total as f64;
        let mut hitters: Vec<HeavyHitter> = counts
            .into_iter()
            .filter(|&(_, count)| count as f64 > threshold)
            .map(|(key, count)| HeavyHitter::new(key, count as f64 / total as f64))
            .collect();
        sort_heavy_hitters(&mut hitters);
        hitters
    }

    /// Resets to the empty state.
    pub fn clear(&mut self) {
        self.histories = HashMap::new();
        self.last_ts = 0;
    }

    /// Returns the approximate memory footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        let entries: usize = self
            .histories
            .values()
            .map(|history| history.capacity() * size_of::<Entry>())
            .sum();
        size_of::<Self>()
            + self.histories.capacity() * (size_of::<u32>() + size_of::<Vec<Entry>>())
            + entries
    }

    fn lookup(history: &[Entry], ts: u64) -> u64 {
        match history.partition_point(|entry| entry.ts <= ts) {
            0 => 0,
            n => history[n - 1].count,
        }
    }
}

impl PersistentHeavyHitterSketch for ExactHeavyHitters {
    fn update_with_count(&mut self, ts: u64, key: u32, count: u64) {
        ExactHeavyHitters::update_with_count(self, ts, key, count);
    }

    fn estimate_heavy_hitters(&self, ts: u64, fraction: f64) -> Vec<HeavyHitter> {
        ExactHeavyHitters::estimate_heavy_hitters(self, ts, fraction)
    }

    fn clear(&mut self) {
        ExactHeavyHitters::clear(self);
    }

    fn memory_usage(&self) -> usize {
        ExactHeavyHitters::memory_usage(self)
    }

    fn short_description(&self) -> String {
        "EXACT_HH".to_string()
    }
}
