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

//! The default event metric: a FIFO store of occurrence records.

use crate::utils::sync::lock;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use vigil_core::telemetry::{
    Event, EventDetails, EventValue, FieldValue, MetricLifecycle, MetricValueProvider,
};

/// Thread-safe, append-only record store for one event metric.
///
/// Every structural operation (append, copy, trim, clear) holds the same lock,
/// so a reader always sees a contiguous, ordered run of records. Records only
/// ever leave from the front.
#[derive(Debug, Default)]
pub struct EventMetric {
    records: Mutex<VecDeque<EventDetails>>,
}

impl EventMetric {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Event for EventMetric {
    fn record_details(&self, fields: Vec<(String, FieldValue)>, timestamp: DateTime<Utc>) {
        // Built outside the lock.
        let details = EventDetails::new(fields, timestamp);
        lock(&self.records).push_back(details);
    }

    fn remove_range_from_start_index(&self, count: usize) {
        if count == 0 {
            return;
        }
        let mut records = lock(&self.records);
        let available = records.len();
        records.drain(..count.min(available));
    }

    fn len(&self) -> usize {
        lock(&self.records).len()
    }
}

impl MetricValueProvider<EventValue> for EventMetric {
    fn get_value(&self, reset: bool) -> EventValue {
        let copy = {
            let mut records = lock(&self.records);
            let copy: Vec<EventDetails> = records.iter().cloned().collect();
            if reset {
                records.clear();
            }
            copy
        };
        EventValue::new(copy)
    }
}

impl MetricLifecycle for EventMetric {
    fn reset(&self) {
        lock(&self.records).clear();
    }

    fn dispose(&self) {
        lock(&self.records).clear();
    }
}
