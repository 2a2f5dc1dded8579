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

//! Checkpoint tree index for point-in-time heavy hitter queries.
//!
//! # Overview
//!
//! [`TreeMisraGries`] accumulates updates into a live Misra-Gries summary. Once the live
//! summary holds at least a leaf's worth of weight, the next change of timestamp freezes it
//! into a leaf. New leaves are merged bottom-up like a binary counter: a leaf takes level 0
//! if it is empty and otherwise merges with the node there and carries on to level 1, and so
//! on. Merged nodes keep both children, so every level's root covers a contiguous range of
//! timestamps that can be split again at query time.
//!
//! The leaf size grows with the stream: it is `epsilon / 2` times half of the smallest power
//! of two above the total count.
//!
//! # Accuracy
//!
//! The error bound is split in two halves: the error of the merged summaries and the weight
//! of the leaf left out when a query falls inside it. A leaf only freezes at a change of
//! timestamp, so its weight before its last timestamp is below the leaf size, while the
//! weight at its last timestamp is unbounded. A query inside a leaf therefore estimates the
//! prefix total from the former alone. Queries are answered with the threshold
//! `fraction - epsilon / 2`.
//!
//! # Examples
//!
//! ```
//! # use timesketch::tree::TreeMisraGries;
//! let mut sketch = TreeMisraGries::new(0.1);
//! for ts in 1..=200u64 {
//!     sketch.update(ts, if ts % 2 == 0 { 4 } else { ts as u32 });
//! }
//! let hitters = sketch.estimate_heavy_hitters(200, 0.4);
//! assert_eq!(hitters[0].key(), 4);
//! ```

mod sketch;

pub use self::sketch::TreeMisraGries;
