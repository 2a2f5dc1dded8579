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

//! Tick processing by diffing every live counter against the recorded counts.

use std::collections::HashMap;

use crate::chain::RecordedCount;
use crate::frequencies::MisraGriesSketch;

/// Recorded counts of the keys written to the history since the last checkpoint.
#[derive(Debug, Clone, Default)]
pub(super) struct ScanTracker {
    recorded: HashMap<u32, RecordedCount>,
    checkpoint_tolerance: u64,
}

impl ScanTracker {
    /// Returns every `(key, count)` that has to be written at this tick, sorted by key.
    ///
    /// Recorded keys that left the summary are reported with a count of zero.
    pub fn collect(&self, live: &MisraGriesSketch) -> Vec<(u32, u64)> {
        let mut batch: Vec<(u32, u64)> = self
            .recorded
            .keys()
            .filter(|&&key| live.estimate(key) == 0)
            .map(|&key| (key, 0))
            .collect();
        for (key, count) in live.iter() {
            let breached = match self.recorded.get(&key) {
                Some(recorded) => !recorded.admits(count),
                None => count > self.checkpoint_tolerance,
            };
            if breached {
                batch.push((key, count));
            }
        }
        batch.sort_unstable();
        batch
    }

    /// Records a batch returned by [`ScanTracker::collect`].
    pub fn commit(&mut self, batch: &[(u32, u64)], tolerance: u64) {
        for &(key, count) in batch {
            if count == 0 {
                self.recorded.remove(&key);
            } else {
                self.recorded.insert(key, RecordedCount { count, tolerance });
            }
        }
    }

    /// Records every live counter at a new checkpoint.
    pub fn reset(&mut self, live: &MisraGriesSketch, checkpoint_tolerance: u64) {
        self.recorded.clear();
        self.recorded.extend(live.iter().map(|(key, count)| {
            let recorded = RecordedCount {
                count,
                tolerance: checkpoint_tolerance,
            };
            (key, recorded)
        }));
        self.checkpoint_tolerance = checkpoint_tolerance;
    }

    pub fn clear(&mut self) {
        self.recorded.clear();
        self.checkpoint_tolerance = 0;
    }

    pub fn heap_size(&self) -> usize {
        self.recorded.capacity() * (size_of::<u32>() + size_of::<RecordedCount>())
    }
}
