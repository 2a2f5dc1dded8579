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

//! Point-in-time heavy hitters over timestamped streams of `u32` keys.
//!
//! A plain streaming summary only answers "which keys are frequent now". The sketches in
//! this crate also answer "which keys were frequent as of timestamp `t`", for any `t` at or
//! before the latest update, without storing the stream or a snapshot per timestamp.
//!
//! * [`frequencies::MisraGriesSketch`] is the bounded-error, mergeable counter summary every
//!   temporal index is built on.
//! * [`chain::ChainMisraGries`] keeps a chain of full checkpoints, each followed by a bounded
//!   number of per-key delta records.
//! * [`tree::TreeMisraGries`] freezes the live summary into leaves and merges them bottom-up
//!   into a forest of summaries covering doubling time ranges.
//! * [`exact::ExactHeavyHitters`] stores exact count histories and is mostly useful as a
//!   baseline.
//!
//! All of them implement [`PersistentHeavyHitterSketch`]. [`config::SketchConfig`] builds
//! any of them from runtime configuration.
//!
//! # Examples
//!
//! ```
//! use timesketch::PersistentHeavyHitterSketch;
//! use timesketch::chain::ChainMisraGries;
//!
//! let mut sketch: Box<dyn PersistentHeavyHitterSketch> = Box::new(ChainMisraGries::new(0.1));
//! for ts in 1..=100u64 {
//!     sketch.update(ts, if ts <= 50 { 7 } else { ts as u32 });
//! }
//!
//! // Key 7 made up the whole stream up to timestamp 50, and half of it at the end.
//! let past = sketch.estimate_heavy_hitters(50, 0.5);
//! assert_eq!(past[0].key(), 7);
//! let now = sketch.estimate_heavy_hitters(100, 0.3);
//! assert_eq!(now[0].key(), 7);
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod exact;
pub mod frequencies;
pub mod tree;

mod persistent;

pub use self::persistent::HeavyHitter;
pub use self::persistent::PersistentHeavyHitterSketch;
