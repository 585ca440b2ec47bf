// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Stress test for event records: writers append, a reader snapshots and a
//! trimmer drops the oldest records, all at the same time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use vigil_core::telemetry::{Event, FieldValue, MetricTags, MetricValueProvider};
use vigil_telemetry::MetricsContext;

const WRITERS: usize = 4;
const PER_WRITER: usize = 500;

#[test]
fn test_concurrent_record_snapshot_and_trim() {
    let _ = env_logger::builder().is_test(true).try_init();
    // ARRANGE
    let root = MetricsContext::new("root");
    let event = root.event("orders", &MetricTags::NONE);
    let done = Arc::new(AtomicBool::new(false));

    // ACT
    let reader = {
        let event = event.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut snapshots = 0usize;
            while !done.load(Ordering::SeqCst) {
                let value = event.get_value(false);
                // Every copied record is complete.
                assert!(value.events.iter().all(|d| d.field("writer").is_some()));
                snapshots += 1;
            }
            snapshots
        })
    };

    let writers: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let event = event.clone();
            thread::spawn(move || {
                for i in 0..PER_WRITER {
                    event.record_fields(vec![
                        ("writer".to_string(), FieldValue::from(writer as i64)),
                        ("seq".to_string(), FieldValue::from(i as i64)),
                    ]);
                }
            })
        })
        .collect();

    let trimmer = {
        let event = event.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                event.remove_range_from_start_index(3);
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    trimmer.join().unwrap();
    done.store(true, Ordering::SeqCst);
    let snapshots = reader.join().unwrap();

    // ASSERT
    let total = WRITERS * PER_WRITER;
    let remaining = event.len();
    assert!(snapshots > 0);
    assert!(remaining <= total);
    assert!(remaining >= total - 300, "At most 300 records were trimmed");
}

#[test]
fn test_get_value_with_reset_hands_over_each_record_once() {
    let root = MetricsContext::new("root");
    let event = root.event("orders", &MetricTags::NONE);

    let writers: Vec<_> = (0..WRITERS)
        .map(|_| {
            let event = event.clone();
            thread::spawn(move || {
                for _ in 0..PER_WRITER {
                    event.record();
                }
            })
        })
        .collect();

    let mut collected = 0;
    while writers.iter().any(|w| !w.is_finished()) {
        collected += event.get_value(true).len();
    }
    for writer in writers {
        writer.join().unwrap();
    }
    collected += event.get_value(true).len();

    assert_eq!(collected, WRITERS * PER_WRITER);
    assert!(event.is_empty());
}
