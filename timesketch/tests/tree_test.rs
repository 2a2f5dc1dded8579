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

mod common;

use common::assert_within_error_bound;
use common::bursty_stream;
use common::exact_of;
use common::exact_of_weighted;
use common::keys;
use common::phased_stream;
use googletest::prelude::*;
use timesketch::tree::TreeMisraGries;

fn feed(sketch: &mut TreeMisraGries, stream: &[(u64, u32)]) {
    for &(ts, key) in stream {
        sketch.update(ts, key);
    }
}

#[test]
#[should_panic(expected = "epsilon must be in (0, 1)")]
fn test_rejects_epsilon() {
    TreeMisraGries::new(-0.1);
}

#[test]
fn test_forest_grows_logarithmically() {
    let mut sketch = TreeMisraGries::new(0.1);
    feed(&mut sketch, &phased_stream(1, 4_000, 5));
    assert_eq!(sketch.total_count(), 20_000);
    assert_that!(sketch.num_nodes(), gt(1usize));
    // Leaves grow with the total, so the forest stays far below one node per timestamp.
    assert_that!(sketch.num_nodes(), lt(1_000usize));
    assert_that!(sketch.num_levels(), le(usize::BITS as usize));
}

#[test]
fn test_point_in_time_queries_within_error_bound() {
    let epsilon = 0.08;
    let stream = phased_stream(7, 500, 20);
    let exact = exact_of(&stream);
    let mut sketch = TreeMisraGries::new(epsilon);
    feed(&mut sketch, &stream);

    for ts in (25..=500).step_by(25) {
        for fraction in [0.1, 0.3] {
            let hitters = sketch.estimate_heavy_hitters(ts, fraction);
            assert_within_error_bound(&exact, &hitters, ts, fraction, epsilon);
        }
    }
}

#[test]
fn test_past_queries_follow_the_hot_key() {
    let mut sketch = TreeMisraGries::new(0.05);
    feed(&mut sketch, &phased_stream(9, 400, 25));

    let first_quarter = keys(&sketch.estimate_heavy_hitters(100, 0.3));
    assert!(first_quarter.contains(&0));
    assert!(!first_quarter.contains(&1));

    let last_quarter = keys(&sketch.estimate_heavy_hitters(400, 0.05));
    for key in [0, 1, 2, 3, 100] {
        assert!(last_quarter.contains(&key), "key {key} missing");
    }
}

#[test]
fn test_query_between_updates() {
    let mut sketch = TreeMisraGries::new(0.2);
    sketch.update_with_count(10, 1, 50);
    sketch.update_with_count(20, 2, 50);
    sketch.update_with_count(30, 2, 50);

    // Timestamp 15 lies between the leaf of ts 10 and the next node: the total is exact.
    let hitters = sketch.estimate_heavy_hitters(15, 0.5);
    assert_eq!(keys(&hitters), vec![1]);
    assert_that!(hitters[0].fraction(), eq(1.0f32));
    assert!(sketch.estimate_heavy_hitters(5, 0.0).is_empty());
}

#[test]
fn test_burst_at_end_of_leaf_does_not_inflate_past_totals() {
    let mut sketch = TreeMisraGries::new(0.2);
    let stream = [(1, 1, 100), (2, 1, 1), (3, 1, 1), (10, 9, 1000), (11, 9, 1)];
    for &(ts, key, count) in &stream {
        sketch.update_with_count(ts, key, count);
    }
    let exact = exact_of_weighted(&stream);
    assert_eq!(keys(&exact.estimate_heavy_hitters(3, 0.6)), vec![1]);

    // The leaf over ts 2..=10 straddles ts 3 and ends with the burst of key 9.
    let hitters = sketch.estimate_heavy_hitters(3, 0.6);
    assert_eq!(keys(&hitters), vec![1]);
    assert_that!(hitters[0].fraction(), near(1.0f32, 0.05));
    assert_within_error_bound(&exact, &hitters, 3, 0.6, 0.2);
}

#[test]
fn test_bursty_streams_within_error_bound() {
    let epsilon = 0.1;
    for seed in 0..4 {
        let stream = bursty_stream(seed, 400);
        let exact = exact_of_weighted(&stream);
        let mut sketch = TreeMisraGries::new(epsilon);
        for &(ts, key, count) in &stream {
            sketch.update_with_count(ts, key, count);
        }

        for ts in 1..=400 {
            for fraction in [0.1, 0.3] {
                let hitters = sketch.estimate_heavy_hitters(ts, fraction);
                assert_within_error_bound(&exact, &hitters, ts, fraction, epsilon);
            }
        }
    }
}

#[test]
fn test_memory_usage_grows_with_nodes() {
    let mut sketch = TreeMisraGries::new(0.1);
    let empty = sketch.memory_usage();
    feed(&mut sketch, &phased_stream(3, 200, 10));
    assert_that!(sketch.memory_usage(), gt(empty));
    sketch.clear();
    assert_eq!(sketch.memory_usage(), empty);
}
