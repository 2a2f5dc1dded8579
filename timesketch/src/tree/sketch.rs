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

use std::mem;

use tracing::debug;

use crate::HeavyHitter;
use crate::PersistentHeavyHitterSketch;
use crate::frequencies::MisraGriesSketch;
use crate::persistent::Reading;
use crate::persistent::interpolate_total;

/// Immutable summary of a contiguous range of timestamps.
#[derive(Debug, Clone)]
struct TreeNode {
    start_ts: u64,
    end_ts: u64,
    /// Total count before the first update of the node.
    start_total: u64,
    /// Total count before the updates at `end_ts`.
    end_ts_start_total: u64,
    /// Total count after the last update of the node.
    end_total: u64,
    summary: MisraGriesSketch,
    children: Option<(usize, usize)>,
}

impl TreeNode {
    /// Estimates the total count at `ts` in `[start_ts, end_ts)`.
    ///
    /// The weight at `end_ts` is unbounded, so the estimate only spans the weight before it.
    fn interpolate_total(&self, ts: u64) -> f64 {
        interpolate_total(
            Reading::new(self.start_ts, self.start_total),
            Reading::new(self.end_ts, self.end_ts_start_total),
            ts,
        )
    }
}

/// Persistent heavy hitters sketch built from a forest of merged Misra-Gries summaries.
///
/// See [`crate::tree`] for an overview.
#[derive(Debug, Clone)]
pub struct TreeMisraGries {
    epsilon: f64,
    epsilon_over_2: f64,
    live: MisraGriesSketch,
    live_start_ts: u64,
    live_start_total: u64,
    last_ts: u64,
    /// Total count before the updates at `last_ts`.
    last_ts_start_total: u64,
    total_count: u64,
    /// Smallest power of two above the total count.
    target: u64,
    leaf_capacity: u64,
    nodes: Vec<TreeNode>,
    /// Root of each level, newest at level 0.
    levels: Vec<Option<usize>>,
}

impl TreeMisraGries {
    /// Creates a sketch with the given error bound.
    ///
    /// # Panics
    ///
    /// Panics if `epsilon` is not in `(0, 1)`.
    pub fn new(epsilon: f64) -> Self {
        assert!(
            epsilon > 0.0 && epsilon < 1.0,
            "epsilon must be in (0, 1), got {epsilon}"
        );
        let epsilon_over_2 = epsilon / 2.0;
        Self {
            epsilon,
            epsilon_over_2,
            live: MisraGriesSketch::new(epsilon_over_2),
            live_start_ts: 0,
            live_start_total: 0,
            last_ts: 0,
            last_ts_start_total: 0,
            total_count: 0,
            target: 1,
            leaf_capacity: 1,
            nodes: vec![],
            levels: vec![],
        }
    }

    /// Returns the error bound of the sketch.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Returns the total count of all updates.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Returns the number of frozen and merged nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of levels of the forest.
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Updates the sketch with a key at the given timestamp.
    pub fn update(&mut self, ts: u64, key: u32) {
        self.update_with_count(ts, key, 1);
    }

    /// Updates the sketch with a key and count at the given timestamp.
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
        let live_weight = self.total_count - self.live_start_total;
        if ts != self.last_ts {
            if live_weight >= self.leaf_capacity {
                self.freeze_live();
            }
            self.last_ts_start_total = self.total_count;
        }
        if self.total_count == self.live_start_total {
            self.live_start_ts = ts;
        }

        self.live.update_with_count(key, count);
        self.last_ts = ts;
        self.total_count += count;
        while self.total_count >= self.target {
            self.target *= 2;
        }
        let capacity = (self.target / 2) as f64 * self.epsilon_over_2;
        self.leaf_capacity = (capacity.floor() as u64).max(1);
    }

    /// Returns the heavy hitters of the stream prefix up to and including `ts`.
    ///
    /// Nodes entirely at or before `ts` are merged. A node straddling `ts` is split into its
    /// children. A straddling leaf is left out, and the prefix total is interpolated across
    /// its weight before its last timestamp, which is smaller than a leaf.
    pub fn estimate_heavy_hitters(&self, ts: u64, fraction: f64) -> Vec<HeavyHitter> {
        if self.total_count == 0 {
            return vec![];
        }
        let threshold = (fraction - self.epsilon_over_2).max(0.0);
        if ts >= self.last_ts {
            let mut merged = self.live.clone();
            for summary in self.roots().map(|node| &node.summary) {
                merged.merge(summary);
            }
            return merged.estimate_heavy_hitters(threshold, self.total_count);
        }

        let mut included = vec![];
        let mut boundary_total = None;
        for index in self.levels.iter().rev().flatten() {
            boundary_total = self.visit(*index, ts, &mut included);
            if boundary_total.is_some() {
                break;
            }
        }
        let total = boundary_total.unwrap_or_else(|| {
            if self.live_start_ts > ts {
                self.live_start_total as f64
            } else {
                interpolate_total(
                    Reading::new(self.live_start_ts, self.live_start_total),
                    Reading::new(self.last_ts, self.last_ts_start_total),
                    ts,
                )
            }
        });

        let Some((first, rest)) = included.split_first() else {
            return vec![];
        };
        let mut merged = (*first).clone();
        for summary in rest {
            merged.merge(summary);
        }
        merged.estimate_heavy_hitters(threshold, total.round() as u64)
    }

    /// Resets the sketch to its empty state.
    pub fn clear(&mut self) {
        *self = Self::new(self.epsilon);
    }

    /// Returns the approximate memory footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        let nodes: usize = self
            .nodes
            .iter()
            .map(|node| node.summary.memory_usage() - size_of::<MisraGriesSketch>())
            .sum();
        size_of::<Self>()
            + self.live.memory_usage()
            + self.nodes.capacity() * size_of::<TreeNode>()
            + nodes
            + self.levels.capacity() * size_of::<Option<usize>>()
    }

    fn roots(&self) -> impl Iterator<Item = &TreeNode> + '_ {
        self.levels.iter().flatten().map(|&index| &self.nodes[index])
    }

    /// Collects the summaries of the nodes under `index` that end at or before `ts`, oldest
    /// first. Returns the prefix total at `ts` once a node reaching past `ts` is found.
    fn visit<'a>(
        &'a self,
        index: usize,
        ts: u64,
        included: &mut Vec<&'a MisraGriesSketch>,
    ) -> Option<f64> {
        let node = &self.nodes[index];
        if node.end_ts <= ts {
            included.push(&node.summary);
            return None;
        }
        if node.start_ts > ts {
            return Some(node.start_total as f64);
        }
        match node.children {
            Some((left, right)) => self
                .visit(left, ts, included)
                .or_else(|| self.visit(right, ts, included)),
            None => Some(node.interpolate_total(ts)),
        }
    }

    fn freeze_live(&mut self) {
        let summary = mem::replace(&mut self.live, MisraGriesSketch::new(self.epsilon_over_2));
        debug!(
            start_ts = self.live_start_ts,
            end_ts = self.last_ts,
            weight = summary.total_weight(),
            "froze leaf"
        );
        self.nodes.push(TreeNode {
            start_ts: self.live_start_ts,
            end_ts: self.last_ts,
            start_total: self.live_start_total,
            end_ts_start_total: self.last_ts_start_total,
            end_total: self.total_count,
            summary,
            children: None,
        });
        self.live_start_total = self.total_count;

        let mut index = self.nodes.len() - 1;
        let mut level = 0;
        loop {
            if level == self.levels.len() {
                self.levels.push(None);
            }
            match self.levels[level].take() {
                None => {
                    self.levels[level] = Some(index);
                    return;
                }
                Some(older) => {
                    index = self.merge_nodes(older, index);
                    level += 1;
                }
            }
        }
    }

    fn merge_nodes(&mut self, left: usize, right: usize) -> usize {
        let (older, newer) = (&self.nodes[left], &self.nodes[right]);
        debug_assert_eq!(older.end_total, newer.start_total);
        let mut summary = older.summary.clone();
        summary.merge(&newer.summary);
        let node = TreeNode {
            start_ts: older.start_ts,
            end_ts: newer.end_ts,
            start_total: older.start_total,
            end_ts_start_total: newer.end_ts_start_total,
            end_total: newer.end_total,
            summary,
            children: Some((left, right)),
        };
        debug!(
            start_ts = node.start_ts,
            end_ts = node.end_ts,
            weight = node.end_total - node.start_total,
            "merged nodes"
        );
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

impl PersistentHeavyHitterSketch for TreeMisraGries {
    fn update_with_count(&mut self, ts: u64, key: u32, count: u64) {
        TreeMisraGries::update_with_count(self, ts, key, count);
    }

    fn estimate_heavy_hitters(&self, ts: u64, fraction: f64) -> Vec<HeavyHitter> {
        TreeMisraGries::estimate_heavy_hitters(self, ts, fraction)
    }

    fn clear(&mut self) {
        TreeMisraGries::clear(self);
    }

    fn memory_usage(&self) -> usize {
        TreeMisraGries::memory_usage(self)
    }

    fn short_description(&self) -> String {
        format!("TMG-e{:.6}", self.epsilon)
    }
}
