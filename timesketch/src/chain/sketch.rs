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

//! Checkpoint chain implementation

use tracing::debug;
use tracing::trace;

use crate::HeavyHitter;
use crate::PersistentHeavyHitterSketch;
use crate::chain::history::Checkpoint;
use crate::chain::history::DeltaRecord;
use crate::chain::history::History;
use crate::chain::history::tolerance;
use crate::chain::scan::ScanTracker;
use crate::chain::tracker::IndexedTracker;
use crate::frequencies::MisraGriesSketch;
use crate::persistent::Reading;
use crate::persistent::sort_heavy_hitters;

const DEFAULT_EPSILON: f64 = 0.01;

/// How a tick finds the keys whose counts drifted out of their tolerance band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickAlgorithm {
    /// Compare every live counter with its recorded count. `O(k)` per tick.
    Scan,
    /// Keep per-key drift bounds in two heaps and only visit the keys that crossed them.
    #[default]
    Indexed,
}

#[derive(Debug, Clone)]
enum Tracker {
    Scan(ScanTracker),
    Indexed(IndexedTracker),
}

impl Tracker {
    fn collect(&mut self, live: &MisraGriesSketch) -> Vec<(u32, u64)> {
        match self {
            Tracker::Scan(tracker) => tracker.collect(live),
            Tracker::Indexed(tracker) => tracker.collect(live),
        }
    }

    fn commit(&mut self, batch: &[(u32, u64)], tolerance: u64) {
        match self {
            Tracker::Scan(tracker) => tracker.commit(batch, tolerance),
            Tracker::Indexed(tracker) => tracker.commit(batch, tolerance),
        }
    }

    fn reset(&mut self, live: &MisraGriesSketch, checkpoint_tolerance: u64) {
        match self {
            Tracker::Scan(tracker) => tracker.reset(live, checkpoint_tolerance),
            Tracker::Indexed(tracker) => tracker.reset(live, checkpoint_tolerance),
        }
    }

    fn clear(&mut self) {
        match self {
            Tracker::Scan(tracker) => tracker.clear(),
            Tracker::Indexed(tracker) => tracker.clear(),
        }
    }

    fn heap_size(&self) -> usize {
        match self {
            Tracker::Scan(tracker) => tracker.heap_size(),
            Tracker::Indexed(tracker) => tracker.heap_size(),
        }
    }
}

/// Persistent heavy hitters sketch built from a chain of checkpoints and delta records.
///
/// See [`crate::chain`] for an overview.
#[derive(Debug, Clone)]
pub struct ChainMisraGries {
    epsilon: f64,
    epsilon_over_3: f64,
    tick_algorithm: TickAlgorithm,
    live: MisraGriesSketch,
    total_count: u64,
    last_ts: u64,
    history: History,
    tracker: Tracker,
    evicted: Vec<u32>,
}

impl ChainMisraGries {
    /// Creates a sketch with the given error bound and the default tick algorithm.
    ///
    /// # Panics
    ///
    /// Panics if `epsilon` is not in `(0, 1)`.
    pub fn new(epsilon: f64) -> Self {
        Self::builder().epsilon(epsilon).build()
    }

    /// Create a new builder for ChainMisraGries
    pub fn builder() -> ChainMisraGriesBuilder {
        ChainMisraGriesBuilder::default()
    }

    /// Returns the error bound of the sketch.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Returns the tick algorithm in use.
    pub fn tick_algorithm(&self) -> TickAlgorithm {
        self.tick_algorithm
    }

    /// Returns the total count of all updates.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Returns the timestamp of the latest update, or zero if the sketch is empty.
    pub fn last_timestamp(&self) -> u64 {
        self.last_ts
    }

    /// Returns the summary of the whole stream seen so far.
    pub fn live_summary(&self) -> &MisraGriesSketch {
        &self.live
    }

    /// Returns the checkpoints in timestamp order.
    pub fn checkpoints(&self) -> &[Checkpoint] {
        self.history.checkpoints()
    }

    /// Returns every delta record in the order they were written.
    pub fn delta_records(&self) -> &[DeltaRecord] {
        self.history.deltas()
    }

    /// Returns the delta records written after the checkpoint at `index` and before the
    /// next one.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn checkpoint_deltas(&self, index: usize) -> &[DeltaRecord] {
        self.history.checkpoint_deltas(index)
    }

    /// Updates the sketch with a key at the given timestamp.
    pub fn update(&mut self, ts: u64, key: u32) {
        self.update_with_count(ts, key, 1);
    }

    /// Updates the sketch with a key and count at the given timestamp.
    ///
    /// The first update at a new timestamp writes the state of the previous timestamp to the
    /// history. A count of zero is a no-op.
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
        if self.total_count > 0 && ts != self.last_ts {
            self.tick();
        }

        match &mut self.tracker {
            Tracker::Scan(_) => self.live.update_with_count(key, count),
            Tracker::Indexed(tracker) => {
                self.evicted.clear();
                self.live
                    .update_with_evictions(key, count, &mut self.evicted);
                tracker.on_update(&self.live, key, &self.evicted);
            }
        }
        self.last_ts = ts;
        self.total_count += count;
    }

    /// Returns the heavy hitters of the stream prefix up to and including `ts`.
    ///
    /// Queries older than the latest timestamp estimate the prefix total by interpolating
    /// between recorded totals. Provided that estimate is exact, every key whose true share
    /// of the prefix exceeds `fraction + epsilon` is returned, and no key whose share is at
    /// most `fraction - epsilon`. Bursty streams can skew the estimate between sparse
    /// readings and make a key near the threshold go missing.
    pub fn estimate_heavy_hitters(&self, ts: u64, fraction: f64) -> Vec<HeavyHitter> {
        if self.total_count == 0 {
            return vec![];
        }
        if ts >= self.last_ts {
            let threshold = (fraction - self.epsilon_over_3).max(0.0);
            return self.live.estimate_heavy_hitters(threshold, self.total_count);
        }

        let now = Reading::new(self.last_ts, self.total_count);
        let Some((counts, total)) = self.history.reconstruct(ts, self.epsilon_over_3, now)
        else {
            return vec![];
        };
        let threshold = ((self.epsilon_over_3 + fraction - self.epsilon) * total).ceil();
        let mut hitters: Vec<HeavyHitter> = counts
            .into_iter()
            .filter(|&(_, count)| count as f64 >= threshold)
            .map(|(key, count)| HeavyHitter::new(key, count as f64 / total))
            .collect();
        sort_heavy_hitters(&mut hitters);
        hitters
    }

    /// Resets the sketch to its empty state.
    pub fn clear(&mut self) {
        self.live.clear();
        self.total_count = 0;
        self.last_ts = 0;
        self.history.clear();
        self.tracker.clear();
        self.evicted.clear();
    }

    /// Returns the approximate memory footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        size_of::<Self>()
            + self.live.memory_usage()
            + self.history.heap_size()
            + self.tracker.heap_size()
            + self.evicted.capacity() * size_of::<u32>()
    }

    /// Writes the state at the end of `last_ts` to the history.
    fn tick(&mut self) {
        if let Tracker::Scan(_) = self.tracker {
            self.live.apply_pending_decrement();
        }
        if self.history.is_empty() {
            self.make_checkpoint("first tick");
            return;
        }

        let batch = self.tracker.collect(&self.live);
        if batch.is_empty() {
            return;
        }
        let budget = self.total_count.ilog2() as usize;
        if self.history.deltas_since_checkpoint() + batch.len() > budget {
            self.make_checkpoint("delta budget exceeded");
            return;
        }

        let tolerance = tolerance(self.total_count, self.epsilon_over_3);
        self.tracker.commit(&batch, tolerance);
        self.history
            .append_deltas(self.last_ts, self.total_count, &batch);
        trace!(
            ts = self.last_ts,
            total_count = self.total_count,
            deltas = batch.len(),
            "appended delta batch"
        );
    }

    fn make_checkpoint(&mut self, reason: &'static str) {
        let checkpoint_tolerance = tolerance(self.total_count, self.epsilon_over_3);
        let mut counters: Vec<(u32, u64)> = self.live.iter().collect();
        counters.sort_unstable();
        debug!(
            ts = self.last_ts,
            total_count = self.total_count,
            counters = counters.len(),
            reason,
            "created checkpoint"
        );
        self.tracker.reset(&self.live, checkpoint_tolerance);
        self.history
            .push_checkpoint(self.last_ts, self.total_count, counters);
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        assert!(self.live.num_counters() < self.live.capacity() as usize);
        if self.total_count > 0 {
            assert!(self.history.deltas_since_checkpoint() <= self.total_count.ilog2() as usize);
        }
        if let Tracker::Indexed(tracker) = &self.tracker {
            tracker.check_invariants(&self.live);
        }
    }
}

impl PersistentHeavyHitterSketch for ChainMisraGries {
    fn update_with_count(&mut self, ts: u64, key: u32, count: u64) {
        ChainMisraGries::update_with_count(self, ts, key, count);
    }

    fn estimate_heavy_hitters(&self, ts: u64, fraction: f64) -> Vec<HeavyHitter> {
        ChainMisraGries::estimate_heavy_hitters(self, ts, fraction)
    }

    fn clear(&mut self) {
        ChainMisraGries::clear(self);
    }

    fn memory_usage(&self) -> usize {
        ChainMisraGries::memory_usage(self)
    }

    fn short_description(&self) -> String {
        format!("CMG-e{:.6}", self.epsilon)
    }
}

/// Builder for ChainMisraGries
#[derive(Debug)]
pub struct ChainMisraGriesBuilder {
    epsilon: f64,
    tick_algorithm: TickAlgorithm,
}

impl Default for ChainMisraGriesBuilder {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            tick_algorithm: TickAlgorithm::default(),
        }
    }
}

impl ChainMisraGriesBuilder {
    /// Set the error bound.
    ///
    /// # Panics
    ///
    /// If epsilon is not in range (0, 1)
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        assert!(
            epsilon > 0.0 && epsilon < 1.0,
            "epsilon must be in (0, 1), got {epsilon}"
        );
        self.epsilon = epsilon;
        self
    }

    /// Set the tick algorithm.
    pub fn tick_algorithm(mut self, tick_algorithm: TickAlgorithm) -> Self {
        self.tick_algorithm = tick_algorithm;
        self
    }

    /// Build the ChainMisraGries.
    pub fn build(self) -> ChainMisraGries {
        let epsilon_over_3 = self.epsilon / 3.0;
        let live = MisraGriesSketch::new(epsilon_over_3);
        let tracker = match self.tick_algorithm {
            TickAlgorithm::Scan => Tracker::Scan(ScanTracker::default()),
            TickAlgorithm::Indexed => Tracker::Indexed(IndexedTracker::new(live.capacity())),
        };
        ChainMisraGries {
            epsilon: self.epsilon,
            epsilon_over_3,
            tick_algorithm: self.tick_algorithm,
            live,
            total_count: 0,
            last_ts: 0,
            history: History::default(),
            tracker,
            evicted: vec![],
        }
    }
}
