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

//! Telemetry service for the vigil metrics stack.
//!
//! This crate provides the concrete side of the contracts in `vigil-core`:
//! per-kind metric catalogs and the registries built on them, the context tree
//! that owns registries, the retention cleaner that trims event backlogs once
//! every interested reporter has seen them, and the schedulers and reports that
//! drain snapshots.

#![warn(missing_docs)]

pub mod cleaner;
pub mod context;
pub mod error_handler;
pub mod metrics;
pub mod monitoring;
pub mod reporting;
pub mod scheduling;
pub mod service;
pub mod utils;

pub use cleaner::{CleanerHandle, EventMetricsCleaner, RegistryKey, ReportId};
pub use context::{ContextEvent, MetricsContext};
pub use error_handler::MetricsErrorHandler;
pub use metrics::{DefaultMetricsBuilder, DefaultMetricsRegistry, NullMetricsRegistry};
pub use reporting::{JsonReport, LogReport, ScheduledReporter};
pub use scheduling::{ActionScheduler, ManualScheduler, ManualTimer, ThreadingTimer};
pub use service::MetricsService;
pub use utils::timer::TimerContext;
