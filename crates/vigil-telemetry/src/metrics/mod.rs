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

//! Metric catalogs, registries and the default metric implementations.

pub mod builder;
pub mod catalog;
pub mod event;
pub mod null_registry;
pub mod registry;
pub mod simple;

pub use builder::DefaultMetricsBuilder;
pub use catalog::{CatalogEntry, MetricCatalog};
pub use event::EventMetric;
pub use null_registry::NullMetricsRegistry;
pub use registry::{DefaultMetricsRegistry, DefaultRegistryDataProvider};
pub use simple::{
    AtomicCounter, DerivedGauge, FunctionGauge, SimpleHistogram, SimpleMeter, SimpleTimer,
};
