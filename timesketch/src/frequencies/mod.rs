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

//! Misra-Gries frequency summary over `u32` keys.
//!
//! # Overview
//!
//! [`MisraGriesSketch`] tracks approximate frequencies of keys with associated counts. It keeps
//! at most `k - 1` counters, where `k = ceil(1 / epsilon)`, and every count it reports
//! underestimates the true frequency by at most `epsilon` times the total weight.
//!
//! When the counter map is full and a new key arrives, every counter would have to be
//! decremented by the smallest count. The summary instead accumulates the decrement in a
//! pending amount and only walks the counters once the pending amount reaches a lower bound
//! of the smallest count. The bound is maintained lazily and only recomputed during such a walk.
//!
//! The summary only knows the present. The temporal indexes in [`crate::chain`] and
//! [`crate::tree`] build point-in-time queries on top of it.
//!
//! # Examples
//!
//! ```
//! # use timesketch::frequencies::MisraGriesSketch;
//! let mut sketch = MisraGriesSketch::new(0.1);
//! for _ in 0..50 {
//!     sketch.update(1);
//! }
//! for key in 2..52 {
//!     sketch.update(key);
//! }
//! assert!(sketch.estimate(1) >= 40);
//!
//! let hitters = sketch.estimate_heavy_hitters(0.3, sketch.total_weight());
//! assert_eq!(hitters.len(), 1);
//! assert_eq!(hitters[0].key(), 1);
//! ```

mod counter_map;
mod sketch;

pub use self::sketch::MisraGriesSketch;
