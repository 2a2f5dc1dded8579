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

//! Checkpoint chain index for point-in-time heavy hitter queries.
//!
//! # Overview
//!
//! [`ChainMisraGries`] keeps a live [`MisraGriesSketch`](crate::frequencies::MisraGriesSketch)
//! over the whole stream and an append-only history. The history is a chain of
//! [`Checkpoint`]s, full copies of the live summary, each followed by [`DeltaRecord`]s that
//! describe single keys whose counts changed since they were last written.
//!
//! Whenever the timestamp advances, the state at the end of the previous timestamp is
//! compared against the history. A key is written again only once its count leaves the band
//! `[r - d, r + d]` around its recorded count `r`, where `d` is `epsilon / 3` times the total
//! count when `r` was written. If the records since the last checkpoint would exceed
//! `log2(total_count)`, a new checkpoint is taken instead, so rebuilding any past state costs
//! at most one checkpoint plus a logarithmic number of records.
//!
//! # Accuracy
//!
//! The error bound `epsilon` is split in three equal parts: the error of the live summary,
//! the tolerance band of recorded counts, and the slack of the reported threshold. A query at
//! timestamp `t` returns every key whose share of the stream up to `t` exceeds
//! `fraction + epsilon` and no key whose share is at most `fraction - epsilon`, provided the
//! estimated total at `t` is exact. Totals between recorded readings are interpolated
//! linearly.
//!
//! # Tick algorithms
//!
//! [`TickAlgorithm::Scan`] compares every live counter against its record at each tick.
//! [`TickAlgorithm::Indexed`] derives for each key the range of the summary's cumulative
//! decrement in which its count stays inside the band, keeps the range ends in a max-heap and
//! a min-heap, and only visits keys whose range no longer contains the current decrement.
//! Both produce identical histories.
//!
//! # Examples
//!
//! ```
//! # use timesketch::chain::ChainMisraGries;
//! # use timesketch::chain::TickAlgorithm;
//! let mut sketch = ChainMisraGries::builder()
//!     .epsilon(0.05)
//!     .tick_algorithm(TickAlgorithm::Scan)
//!     .build();
//! for ts in 1..=1000u64 {
//!     let key = if ts <= 500 { 1 } else { 2 };
//!     sketch.update(ts, key);
//! }
//!
//! let hitters = sketch.estimate_heavy_hitters(500, 0.5);
//! assert_eq!(hitters.len(), 1);
//! assert_eq!(hitters[0].key(), 1);
//! ```

mod arena;
mod heap;
mod history;
mod scan;
mod sketch;
mod tracker;

use self::history::RecordedCount;

pub use self::history::Checkpoint;
pub use self::history::DeltaRecord;
pub use self::sketch::ChainMisraGries;
pub use self::sketch::ChainMisraGriesBuilder;
pub use self::sketch::TickAlgorithm;
