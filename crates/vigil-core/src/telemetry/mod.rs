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

//! Provides the foundational traits and data structures for application metrics.
//!
//! This module defines the "common language" of the instrumentation stack: how a
//! metric is named and tagged, how its identity is derived, what each metric kind
//! accepts and exposes, and the read-only snapshot shape handed to reporters.
//!
//! `vigil-core` defines the abstract "what"; `vigil-telemetry` provides the
//! registries, the context tree and the retention cleaner that implement it.

pub mod error;
pub mod identifier;
pub mod metrics;
pub mod registry;
pub mod scheduling;
pub mod source;
pub mod tags;
pub mod units;
pub mod values;

pub use self::error::{MetricsError, MetricsResult};
pub use self::metrics::{
    Counter, Event, Gauge, GaugeFn, Histogram, Meter, MetricKind, MetricLifecycle,
    MetricValueProvider, MetricsBuilder, Timer,
};
pub use self::registry::{MetricFactory, MetricsRegistry, RegistryDataProvider};
pub use self::scheduling::{
    CancellationToken, IntervalTimer, MetricsReport, ScheduledAction, Scheduler, TickHandler,
};
pub use self::source::{
    MetricSnapshot, MetricValueSource, MetricsData, MetricsDataProvider, MetricsFilter,
};
pub use self::tags::MetricTags;
pub use self::units::{SamplingType, TimeUnit, Unit};
pub use self::values::{
    CounterItem, CounterValue, EventDetails, EventValue, FieldValue, HistogramValue, MeterValue,
    TimerValue,
};
