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

//! Append-only history of checkpoints and delta records.

use std::collections::HashMap;

use crate::persistent::Reading;
use crate::persistent::interpolate_total;

/// Returns how far a recorded count may drift before it has to be written again.
pub(super) fn tolerance(total_count: u64, epsilon_over_3: f64) -> u64 {
    (total_count as f64 * epsilon_over_3).floor() as u64
}

/// A count written to the history, with the tolerance in effect when it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct RecordedCount {
    pub count: u64,
    pub tolerance: u64,
}

impl RecordedCount {
    /// Returns true if `count` is within the tolerance band around the recorded count.
    pub fn admits(&self, count: u64) -> bool {
        count >= self.count.saturating_sub(self.tolerance) && count <= self.count + self.tolerance
    }
}

/// Full copy of the live summary taken at the end of a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    ts: u64,
    total_count: u64,
    counters: Vec<(u32, u64)>,
    first_delta: usize,
}

impl Checkpoint {
    /// Returns the timestamp the checkpoint describes.
    pub fn ts(&self) -> u64 {
        self.ts
    }

    /// Returns the total count of the stream up to and including [`Checkpoint::ts`].
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Returns the `(key, count)` pairs of the summary, sorted by key.
    pub fn counters(&self) -> &[(u32, u64)] {
        &self.counters
    }
}

/// Change of a single key's count since the last record of that key.
///
/// A count of zero means the key left the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaRecord {
    ts: u64,
    total_count: u64,
    key: u32,
    count: u64,
}

impl DeltaRecord {
    /// Returns the timestamp the record describes.
    pub fn ts(&self) -> u64 {
        self.ts
    }

    /// Returns the total count of the stream up to and including [`DeltaRecord::ts`].
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Returns the key.
    pub fn key(&self) -> u32 {
        self.key
    }

    /// Returns the new approximate count of the key, or zero if it was removed.
    pub fn count(&self) -> u64 {
        self.count
    }

    fn reading(&self) -> Reading {
        Reading::new(self.ts, self.total_count)
    }
}

/// Checkpoints in timestamp order, and every delta record in one vector. Each checkpoint
/// owns the records from its `first_delta` up to the next checkpoint's.
#[derive(Debug, Clone, Default)]
pub(super) struct History {
    checkpoints: Vec<Checkpoint>,
    deltas: Vec<DeltaRecord>,
}

impl History {
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn deltas(&self) -> &[DeltaRecord] {
        &self.deltas
    }

    /// Returns the delta records following the checkpoint at `index`.
    pub fn checkpoint_deltas(&self, index: usize) -> &[DeltaRecord] {
        let start = self.checkpoints[index].first_delta;
        let end = self
            .checkpoints
            .get(index + 1)
            .map_or(self.deltas.len(), |next| next.first_delta);
        &self.deltas[start..end]
    }

    /// Returns the number of delta records appended since the last checkpoint.
    pub fn deltas_since_checkpoint(&self) -> usize {
        self.checkpoints
            .last()
            .map_or(0, |last| self.deltas.len() - last.first_delta)
    }

    /// Appends a checkpoint; `counters` must be sorted by key.
    pub fn push_checkpoint(&mut self, ts: u64, total_count: u64, counters: Vec<(u32, u64)>) {
        debug_assert!(counters.is_sorted_by_key(|&(key, _)| key));
        debug_assert!(self.checkpoints.last().is_none_or(|last| last.ts < ts));
        self.checkpoints.push(Checkpoint {
            ts,
            total_count,
            counters,
            first_delta: self.deltas.len(),
        });
    }

    /// Appends one record per `(key, count)` of `batch`.
    pub fn append_deltas(&mut self, ts: u64, total_count: u64, batch: &[(u32, u64)]) {
        debug_assert!(!self.is_empty());
        self.deltas
            .extend(batch.iter().map(|&(key, count)| DeltaRecord {
                ts,
                total_count,
                key,
                count,
            }));
    }

    /// Rebuilds lower-biased counts as of `ts`, together with the estimated total count at
    /// `ts`.
    ///
    /// Each count has the tolerance of its record subtracted; counts that drop to zero are
    /// omitted. `now` is the latest reading of the live summary and must be later than
    /// `ts`. Returns `None` if `ts` precedes the first checkpoint.
    pub fn reconstruct(
        &self,
        ts: u64,
        epsilon_over_3: f64,
        now: Reading,
    ) -> Option<(HashMap<u32, u64>, f64)> {
        debug_assert!(ts < now.ts);
        let index = self.checkpoints.partition_point(|c| c.ts <= ts);
        if index == 0 {
            return None;
        }
        let checkpoint = &self.checkpoints[index - 1];
        let base_tolerance = tolerance(checkpoint.total_count, epsilon_over_3);
        let mut counts: HashMap<u32, u64> = checkpoint
            .counters
            .iter()
            .filter(|&&(_, count)| count > base_tolerance)
            .map(|&(key, count)| (key, count - base_tolerance))
            .collect();

        let deltas = self.checkpoint_deltas(index - 1);
        let replayed = deltas.partition_point(|d| d.ts <= ts);
        for delta in &deltas[..replayed] {
            let tolerance = tolerance(delta.total_count, epsilon_over_3);
            if delta.count > tolerance {
                counts.insert(delta.key, delta.count - tolerance);
            } else {
                counts.remove(&delta.key);
            }
        }

        let before = deltas[..replayed]
            .last()
            .map_or(Reading::new(checkpoint.ts, checkpoint.total_count), |d| {
                d.reading()
            });
        let after = deltas
            .get(replayed)
            .map(DeltaRecord::reading)
            .or_else(|| {
                self.checkpoints
                    .get(index)
                    .map(|next| Reading::new(next.ts, next.total_count))
            })
            .unwrap_or(now);
        Some((counts, interpolate_total(before, after, ts)))
    }

    pub fn clear(&mut self) {
        self.checkpoints.clear();
        self.deltas.clear();
    }

    pub fn heap_size(&self) -> usize {
        let counters: usize = self
            .checkpoints
            .iter()
            .map(|c| c.counters.capacity() * size_of::<(u32, u64)>())
            .sum();
        counters
            + self.checkpoints.capacity() * size_of::<Checkpoint>()
            + self.deltas.capacity() * size_of::<DeltaRecord>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS3: f64 = 0.1;

    /// Checkpoint at ts 10 (total 100), records at ts 12 and 15, checkpoint at ts 20.
    fn sample() -> History {
        let mut history = History::default();
        history.push_checkpoint(10, 100, vec![(1, 50), (2, 30), (3, 8)]);
        history.append_deltas(12, 120, &[(2, 0), (4, 25)]);
        history.append_deltas(15, 150, &[(1, 80)]);
        history.push_checkpoint(20, 200, vec![(1, 90), (4, 40)]);
        history
    }

    fn sorted(counts: HashMap<u32, u64>) -> Vec<(u32, u64)> {
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort_unstable();
        counts
    }

    #[test]
    fn test_tolerance() {
        assert_eq!(tolerance(0, EPS3), 0);
        assert_eq!(tolerance(29, EPS3), 2);
        assert_eq!(tolerance(30, 0.5), 15);
    }

    #[test]
    fn test_recorded_count_band() {
        let recorded = RecordedCount {
            count: 10,
            tolerance: 3,
        };
        assert!(recorded.admits(7));
        assert!(recorded.admits(13));
        assert!(!recorded.admits(6));
        assert!(!recorded.admits(14));

        let wide = RecordedCount {
            count: 2,
            tolerance: 5,
        };
        assert!(wide.admits(0));
    }

    #[test]
    fn test_checkpoint_deltas() {
        let history = sample();
        assert_eq!(history.checkpoint_deltas(0).len(), 3);
        assert!(history.checkpoint_deltas(1).is_empty());
        assert_eq!(history.deltas_since_checkpoint(), 0);
        assert_eq!(history.deltas().len(), 3);
    }

    #[test]
    fn test_reconstruct_before_first_checkpoint() {
        let history = sample();
        assert!(history.reconstruct(9, EPS3, Reading::new(30, 300)).is_none());
    }

    #[test]
    fn test_reconstruct_at_checkpoint() {
        let history = sample();
        let (counts, total) = history.reconstruct(10, EPS3, Reading::new(30, 300)).unwrap();
        // tolerance 10 drops key 3
        assert_eq!(sorted(counts), vec![(1, 40), (2, 20)]);
        assert_eq!(total, 100.0);
    }

    #[test]
    fn test_reconstruct_replays_deltas() {
        let history = sample();
        let (counts, total) = history.reconstruct(13, EPS3, Reading::new(30, 300)).unwrap();
        assert_eq!(sorted(counts), vec![(1, 40), (4, 13)]);
        assert_eq!(total, 130.0);

        let (counts, total) = history.reconstruct(17, EPS3, Reading::new(30, 300)).unwrap();
        assert_eq!(sorted(counts), vec![(1, 65), (4, 13)]);
        assert_eq!(total, 170.0);
    }

    #[test]
    fn test_reconstruct_interpolates_towards_live_reading() {
        let history = sample();
        let (counts, total) = history.reconstruct(25, EPS3, Reading::new(30, 300)).unwrap();
        assert_eq!(sorted(counts), vec![(1, 70), (4, 20)]);
        assert_eq!(total, 250.0);
    }
}
