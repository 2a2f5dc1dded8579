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

use std::cmp::Ordering;

/// A key reported by a heavy hitter query, together with its estimated share of the total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeavyHitter {
    key: u32,
    fraction: f32,
}

impl HeavyHitter {
    /// Creates a heavy hitter from a key and its estimated fraction of the total count.
    pub fn new(key: u32, fraction: f64) -> Self {
        Self {
            key,
            fraction: fraction as f32,
        }
    }

    /// Returns the key.
    pub fn key(&self) -> u32 {
        self.key
    }

    /// Returns the estimated fraction of the total count.
    pub fn fraction(&self) -> f32 {
        self.fraction
    }
}

/// Common interface of the point-in-time heavy hitter sketches.
///
/// Timestamps passed to updates must be non-decreasing. Implementations panic on a
/// timestamp regression.
pub trait PersistentHeavyHitterSketch {
    /// Updates the sketch with a key at the given timestamp.
    fn update(&mut self, ts: u64, key: u32) {
        self.update_with_count(ts, key, 1);
    }

    /// Updates the sketch with a key and count at the given timestamp.
    ///
    /// A count of zero is a no-op.
    fn update_with_count(&mut self, ts: u64, key: u32, count: u64);

    /// Returns the heavy hitters whose share of the stream prefix up to and including `ts`
    /// exceeds `fraction`, sorted by descending fraction.
    fn estimate_heavy_hitters(&self, ts: u64, fraction: f64) -> Vec<HeavyHitter>;

    /// Resets the sketch to its empty state.
    fn clear(&mut self);

    /// Returns the approximate memory footprint in bytes.
    fn memory_usage(&self) -> usize;

    /// Returns a short name identifying the sketch type and its parameters.
    fn short_description(&self) -> String;
}

/// Sorts heavy hitters by descending fraction, then by ascending key.
pub(crate) fn sort_heavy_hitters(hitters: &mut [HeavyHitter]) {
    hitters.sort_unstable_by(|a, b| {
        b.fraction
            .partial_cmp(&a.fraction)
            .unwrap_or(Ordering::Equal)
            .then(a.key.cmp(&b.key))
    });
}

/// A cumulative total count observed at a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reading {
    pub ts: u64,
    pub total: u64,
}

impl Reading {
    pub fn new(ts: u64, total: u64) -> Self {
        Self { ts, total }
    }
}

/// Linearly interpolates the total count at `ts` between two readings with
/// `before.ts <= ts < after.ts`.
pub(crate) fn interpolate_total(before: Reading, after: Reading, ts: u64) -> f64 {
    debug_assert!(before.ts <= ts && ts < after.ts);
    debug_assert!(before.total <= after.total);
    let span = (after.ts - before.ts) as f64;
    let growth = (after.total - before.total) as f64;
    before.total as f64 + growth * (ts - before.ts) as f64 / span
}
