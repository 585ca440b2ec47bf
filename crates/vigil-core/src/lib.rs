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

//! # Vigil Core
//!
//! Foundational crate containing the traits, identities and plain data types
//! shared by every part of the instrumentation stack. Nothing here spawns
//! threads or owns global state.

#![warn(missing_docs)]

pub mod settings;
pub mod telemetry;

pub use settings::MetricsSettings;
pub use telemetry::{
    identifier, Counter, Event, EventDetails, EventValue, FieldValue, Gauge, Histogram,
    MetricKind, MetricTags, MetricsBuilder, MetricsData, MetricsError, MetricsRegistry,
    MetricsResult, Meter, Timer, TimeUnit, Unit,
};
