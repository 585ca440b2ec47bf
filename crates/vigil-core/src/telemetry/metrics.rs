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

//! Abstract definitions for the six metric kinds and the builder that creates them.

use crate::telemetry::units::{SamplingType, TimeUnit, Unit};
use crate::telemetry::values::{
    CounterValue, EventValue, FieldValue, HistogramValue, MeterValue, TimerValue,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The fundamental kind of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetricKind {
    /// An instantaneous value read on demand (e.g., current memory usage).
    Gauge,
    /// A value that is incremented and decremented (e.g., open connections).
    Counter,
    /// A rate of occurrences (e.g., requests per second).
    Meter,
    /// The distribution of a set of measurements.
    Histogram,
    /// A histogram of durations combined with a meter of their rate.
    Timer,
    /// Free-form occurrence records retained until every reporter has seen them.
    Event,
}

impl MetricKind {
    /// All kinds, in reporting order.
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Gauge,
        MetricKind::Counter,
        MetricKind::Meter,
        MetricKind::Histogram,
        MetricKind::Timer,
        MetricKind::Event,
    ];

    /// The suffix appended to user-given names so that kinds never collide.
    pub fn suffix(self) -> &'static str {
        match self {
            MetricKind::Gauge => ".gauge",
            MetricKind::Counter => ".counter",
            MetricKind::Meter => ".meter",
            MetricKind::Histogram => ".histogram",
            MetricKind::Timer => ".timer",
            MetricKind::Event => ".event",
        }
    }

    /// Appends this kind's suffix to `name`.
    pub fn qualify(self, name: &str) -> String {
        format!("{name}{}", self.suffix())
    }
}

impl Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.suffix()[1..])
    }
}

/// Read access to a metric's current value.
pub trait MetricValueProvider<T>: Send + Sync {
    /// Returns a copy of the value, optionally resetting the metric right after.
    fn get_value(&self, reset: bool) -> T;

    /// Returns a copy of the current value.
    fn value(&self) -> T {
        self.get_value(false)
    }
}

/// Lifecycle hooks the registry invokes on the metrics it owns.
pub trait MetricLifecycle: Send + Sync {
    /// Reverts the metric to its empty value. Metrics without state ignore this.
    fn reset(&self) {}

    /// Releases state once the metric has left its registry.
    fn dispose(&self) {}
}

/// A value computed on demand.
pub trait Gauge: MetricLifecycle + MetricValueProvider<f64> + Debug {}

/// A 64-bit count that can move in both directions.
pub trait Counter: MetricLifecycle + MetricValueProvider<CounterValue> + Debug {
    /// Adds `amount` (which may be negative) to the counter.
    fn increment_by(&self, amount: i64);

    /// Adds `amount` to both the total and the named item's sub-count.
    fn increment_item(&self, item: &str, amount: i64);

    /// Adds one.
    fn increment(&self) {
        self.increment_by(1);
    }

    /// Subtracts one.
    fn decrement(&self) {
        self.increment_by(-1);
    }

    /// Subtracts `amount`.
    fn decrement_by(&self, amount: i64) {
        self.increment_by(-amount);
    }
}

/// Tracks the rate at which something happens.
pub trait Meter: MetricLifecycle + MetricValueProvider<MeterValue> + Debug {
    /// Records `count` occurrences.
    fn mark_by(&self, count: i64);

    /// Records one occurrence.
    fn mark(&self) {
        self.mark_by(1);
    }
}

/// Tracks the distribution of recorded values.
pub trait Histogram: MetricLifecycle + MetricValueProvider<HistogramValue> + Debug {
    /// Records `value`, optionally labelled with a user value.
    fn update(&self, value: i64, user_value: Option<&str>);
}

/// Measures durations and the rate at which they occur.
pub trait Timer: MetricLifecycle + MetricValueProvider<TimerValue> + Debug {
    /// Records a finished duration.
    fn record(&self, duration: Duration, user_value: Option<&str>);

    /// Marks the start of a timing session.
    fn begin_session(&self);

    /// Marks the end of a session started with [`Timer::begin_session`].
    fn end_session(&self, elapsed: Duration, user_value: Option<&str>);
}

impl dyn Timer {
    /// Runs `action` inside a timing session and records its duration.
    pub fn time<R>(&self, action: impl FnOnce() -> R) -> R {
        self.begin_session();
        let start = Instant::now();
        let result = action();
        self.end_session(start.elapsed(), None);
        result
    }
}

/// Records free-form occurrences.
///
/// Records are appended in order and retained until removed from the front by
/// [`Event::remove_range_from_start_index`] or dropped by [`MetricLifecycle::reset`].
pub trait Event: MetricLifecycle + MetricValueProvider<EventValue> + Debug {
    /// Appends one record with the given fields and timestamp.
    fn record_details(&self, fields: Vec<(String, FieldValue)>, timestamp: DateTime<Utc>);

    /// Removes up to `count` of the oldest records.
    fn remove_range_from_start_index(&self, count: usize);

    /// Number of records currently held.
    fn len(&self) -> usize;

    /// Returns `true` when no records are held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records an occurrence now, with the default timestamp field.
    fn record(&self) {
        self.record_details(Vec::new(), Utc::now());
    }

    /// Records an occurrence at `timestamp`, with the default timestamp field.
    fn record_at(&self, timestamp: DateTime<Utc>) {
        self.record_details(Vec::new(), timestamp);
    }

    /// Records an occurrence now with the given fields.
    fn record_fields(&self, fields: Vec<(String, FieldValue)>) {
        self.record_details(fields, Utc::now());
    }
}

/// A closure that produces a gauge reading.
pub type GaugeFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Factory for the concrete metric implementations used by a context.
///
/// Swappable at runtime per context; the change cascades to child contexts.
pub trait MetricsBuilder: Send + Sync + Debug {
    /// Builds a gauge backed by `value_provider`.
    fn build_gauge(&self, name: &str, unit: &Unit, value_provider: GaugeFn) -> Arc<dyn Gauge>;

    /// Builds a counter.
    fn build_counter(&self, name: &str, unit: &Unit) -> Arc<dyn Counter>;

    /// Builds a meter reporting its rate in `rate_unit`.
    fn build_meter(&self, name: &str, unit: &Unit, rate_unit: TimeUnit) -> Arc<dyn Meter>;

    /// Builds a histogram with the requested sampling strategy.
    fn build_histogram(
        &self,
        name: &str,
        unit: &Unit,
        sampling: SamplingType,
    ) -> Arc<dyn Histogram>;

    /// Builds a timer.
    fn build_timer(
        &self,
        name: &str,
        unit: &Unit,
        rate_unit: TimeUnit,
        duration_unit: TimeUnit,
        sampling: SamplingType,
    ) -> Arc<dyn Timer>;

    /// Builds an event metric.
    fn build_event(&self, name: &str) -> Arc<dyn Event>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_suffixes_are_distinct() {
        let mut suffixes: Vec<_> = MetricKind::ALL.iter().map(|k| k.suffix()).collect();
        suffixes.sort();
        suffixes.dedup();
        assert_eq!(suffixes.len(), 6);
    }

    #[test]
    fn test_qualify_appends_suffix() {
        assert_eq!(MetricKind::Event.qualify("test"), "test.event");
        assert_eq!(MetricKind::Counter.to_string(), "counter");
    }
}
