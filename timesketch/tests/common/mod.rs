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

#![allow(dead_code)]

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use timesketch::HeavyHitter;
use timesketch::exact::ExactHeavyHitters;

/// A stream of `(ts, key)` pairs with `per_tick` updates at each timestamp `1..=ticks`.
///
/// The hot key changes every quarter of the stream and takes 40% of the updates, key 100
/// takes 15% throughout, and the rest is spread over 2000 cold keys.
pub fn phased_stream(seed: u64, ticks: u64, per_tick: usize) -> Vec<(u64, u32)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut stream = Vec::with_capacity(ticks as usize * per_tick);
    for ts in 1..=ticks {
        let hot = ((ts - 1) * 4 / ticks) as u32;
        for _ in 0..per_tick {
            let p: f64 = rng.random();
            let key = if p < 0.4 {
                hot
            } else if p < 0.55 {
                100
            } else {
                rng.random_range(1000..3000)
            };
            stream.push((ts, key));
        }
    }
    stream
}

/// A stream of `(ts, key, count)` with irregular timestamp gaps and counts.
pub fn irregular_stream(seed: u64, len: usize, num_keys: u32) -> Vec<(u64, u32, u64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ts = 1;
    let mut stream = Vec::with_capacity(len);
    for _ in 0..len {
        if rng.random_bool(0.2) {
            ts += rng.random_range(1..5);
        }
        let key = if rng.random_bool(0.3) {
            rng.random_range(0..5)
        } else {
            rng.random_range(0..num_keys)
        };
        stream.push((ts, key, rng.random_range(1..6)));
    }
    stream
}

/// A stream of `(ts, key, count)` with one update per timestamp `1..=ticks`. About one
/// timestamp in ten carries a burst of one of the keys `0..5`, much heavier than the rest.
pub fn bursty_stream(seed: u64, ticks: u64) -> Vec<(u64, u32, u64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut stream = Vec::with_capacity(ticks as usize);
    for ts in 1..=ticks {
        let update = if rng.random_bool(0.1) {
            (ts, rng.random_range(0..5), rng.random_range(200..2000))
        } else if rng.random_bool(0.3) {
            (ts, rng.random_range(0..5), rng.random_range(1..5))
        } else {
            (ts, rng.random_range(5..500), rng.random_range(1..5))
        };
        stream.push(update);
    }
    stream
}

pub fn exact_of_weighted(stream: &[(u64, u32, u64)]) -> ExactHeavyHitters {
    let mut exact = ExactHeavyHitters::new();
    for &(ts, key, count) in stream {
        exact.update_with_count(ts, key, count);
    }
    exact
}

pub fn exact_of(stream: &[(u64, u32)]) -> ExactHeavyHitters {
    let mut exact = ExactHeavyHitters::new();
    for &(ts, key) in stream {
        exact.update(ts, key);
    }
    exact
}

/// Asserts that `hitters` contains every key whose true share at `ts` is at least
/// `fraction + epsilon`, and no key whose true share is at most `fraction - epsilon`.
pub fn assert_within_error_bound(
    exact: &ExactHeavyHitters,
    hitters: &[HeavyHitter],
    ts: u64,
    fraction: f64,
    epsilon: f64,
) {
    let total = exact.total_count_at(ts) as f64;
    for hitter in hitters {
        let share = exact.count_at(ts, hitter.key()) as f64 / total;
        assert!(
            share > fraction - epsilon,
            "key {} reported at ts {ts} with true share {share}",
            hitter.key()
        );
    }
    for must in exact.estimate_heavy_hitters(ts, fraction + epsilon) {
        assert!(
            hitters.iter().any(|h| h.key() == must.key()),
            "key {} with true share {} missing at ts {ts}",
            must.key(),
            must.fraction()
        );
    }
}

pub fn keys(hitters: &[HeavyHitter]) -> Vec<u32> {
    hitters.iter().map(|h| h.key()).collect()
}
