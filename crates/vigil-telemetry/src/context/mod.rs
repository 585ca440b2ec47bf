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

//! The context tree: named namespaces, each owning a registry and its children.
//!
//! A context is either active or disabled. A disabled context answers every
//! call with something usable: child lookups return the context itself and
//! metric accessors hand out no-op metrics. Disabling cascades to every
//! descendant; disposal does not.

use crate::cleaner::{CleanerHandle, EventMetricsCleaner, RegistryKey};
use crate::error_handler::MetricsErrorHandler;
use crate::metrics::{DefaultMetricsBuilder, DefaultMetricsRegistry, NullMetricsRegistry};
use crate::utils::sync::{lock, read, write};
use dashmap::DashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use vigil_core::settings::MetricsSettings;
use vigil_core::telemetry::{
    Counter, Event, Gauge, GaugeFn, Histogram, Meter, MetricTags, MetricsBuilder, MetricsData,
    MetricsDataProvider, MetricsError, MetricsRegistry, MetricsResult, SamplingType, TimeUnit,
    Timer, Unit,
};

/// Lifecycle notifications delivered to [`MetricsContext::subscribe`] receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextEvent {
    /// The context is being disposed or disabled.
    ShuttingDown,
    /// The context has been completely disabled.
    Disabled,
}

/// A named metrics namespace.
///
/// Contexts are handed out as `Arc<MetricsContext>`. A parent owns its
/// children; a child never references its parent.
pub struct MetricsContext {
    name: String,
    path: String,
    registry_key: RegistryKey,
    registry: RwLock<Arc<dyn MetricsRegistry>>,
    builder: RwLock<Arc<dyn MetricsBuilder>>,
    children: DashMap<String, Arc<MetricsContext>>,
    cleaner: CleanerHandle,
    default_sampling: SamplingType,
    disabled: AtomicBool,
    disposed: AtomicBool,
    subscribers: Mutex<Vec<flume::Sender<ContextEvent>>>,
}

impl MetricsContext {
    /// Creates a root context that no cleaner services.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Self::create(
            name.clone(),
            name,
            CleanerHandle::detached(),
            Arc::new(DefaultMetricsBuilder),
            SamplingType::default(),
        )
    }

    /// Creates a root context whose registry, and those of its descendants,
    /// are trimmed by `cleaner`.
    pub fn with_cleaner(name: impl Into<String>, cleaner: &EventMetricsCleaner) -> Arc<Self> {
        let name = name.into();
        Self::create(
            name.clone(),
            name,
            cleaner.handle(),
            Arc::new(DefaultMetricsBuilder),
            SamplingType::default(),
        )
    }

    /// Creates the root context described by `settings`.
    ///
    /// The context starts completely disabled if the settings say so.
    pub fn from_settings(settings: &MetricsSettings, cleaner: &EventMetricsCleaner) -> Arc<Self> {
        let context = Self::create(
            settings.global_context_name.clone(),
            settings.global_context_name.clone(),
            cleaner.handle(),
            Arc::new(DefaultMetricsBuilder),
            settings.default_sampling,
        );
        if settings.completely_disabled {
            context.completely_disable_metrics();
        }
        context
    }

    fn create(
        name: String,
        path: String,
        cleaner: CleanerHandle,
        builder: Arc<dyn MetricsBuilder>,
        default_sampling: SamplingType,
    ) -> Arc<Self> {
        let registry: Arc<dyn MetricsRegistry> =
            Arc::new(DefaultMetricsRegistry::with_cleaner(cleaner.clone()));
        let registry_key = RegistryKey::next();
        cleaner.register_registry(registry_key, &path, registry.clone());
        log::debug!("[MetricsContext] Created '{path}'.");

        Arc::new(Self {
            name,
            path,
            registry_key,
            registry: RwLock::new(registry),
            builder: RwLock::new(builder),
            children: DashMap::new(),
            cleaner,
            default_sampling,
            disabled: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// The context's own name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dotted path from the root (`root.child.grandchild`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `true` once the context has been completely disabled.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    /// The registry currently installed.
    pub fn registry(&self) -> Arc<dyn MetricsRegistry> {
        read(&self.registry).clone()
    }

    /// The builder currently installed.
    pub fn builder(&self) -> Arc<dyn MetricsBuilder> {
        read(&self.builder).clone()
    }

    /// The child installed under `name`, if any.
    pub fn child(&self, name: &str) -> Option<Arc<MetricsContext>> {
        self.children.get(name).map(|child| child.value().clone())
    }

    /// Number of installed children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Receives a [`ContextEvent`] for every later lifecycle transition.
    pub fn subscribe(&self) -> flume::Receiver<ContextEvent> {
        let (sender, receiver) = flume::unbounded();
        lock(&self.subscribers).push(sender);
        receiver
    }

    fn notify(&self, event: ContextEvent) {
        lock(&self.subscribers).retain(|subscriber| subscriber.send(event).is_ok());
    }

    /// Children sorted by key, copied out of the live map.
    fn children_snapshot(&self) -> Vec<Arc<MetricsContext>> {
        let mut children: Vec<(String, Arc<MetricsContext>)> = self
            .children
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        children.into_iter().map(|(_, child)| child).collect()
    }

    // --- Tree ---

    /// Returns the child named `name`, creating it if needed.
    ///
    /// Returns this context itself when it is disabled or `name` is blank.
    pub fn context(self: &Arc<Self>, name: &str) -> Arc<MetricsContext> {
        if self.is_disabled() || name.trim().is_empty() {
            return self.clone();
        }
        let child = self
            .children
            .entry(name.to_string())
            .or_insert_with(|| self.create_child(name))
            .clone();
        // Lost a race with completely_disable_metrics.
        if self.is_disabled() {
            child.completely_disable_metrics();
        }
        child
    }

    /// Returns the child named `name`, building it with `factory` if needed.
    ///
    /// If another caller installs a child first, the context built here is
    /// discarded and the installed one returned.
    pub fn context_with(
        self: &Arc<Self>,
        name: &str,
        factory: impl FnOnce(&str) -> Arc<MetricsContext>,
    ) -> Arc<MetricsContext> {
        if self.is_disabled() || name.trim().is_empty() {
            return self.clone();
        }
        if let Some(existing) = self.child(name) {
            return existing;
        }

        let candidate = factory(name);
        let installed = self
            .children
            .entry(name.to_string())
            .or_insert_with(|| candidate.clone())
            .clone();
        if !Arc::ptr_eq(&installed, &candidate) {
            candidate.unregister_tree();
            candidate.dispose();
        }
        installed
    }

    fn create_child(&self, name: &str) -> Arc<MetricsContext> {
        Self::create(
            name.to_string(),
            format!("{}.{}", self.path, name),
            self.cleaner.clone(),
            self.builder(),
            self.default_sampling,
        )
    }

    /// Installs an externally built context as the child `name`.
    ///
    /// Returns `Ok(true)` if `context` is the child now installed under `name`,
    /// `Ok(false)` if another context was already there. A disabled context
    /// accepts and ignores the call.
    pub fn attach_context(&self, name: &str, context: Arc<MetricsContext>) -> MetricsResult<bool> {
        if self.is_disabled() {
            return Ok(true);
        }
        if name.trim().is_empty() {
            return Err(MetricsError::InvalidContextName {
                operation: "attach_context",
            });
        }
        let installed = self
            .children
            .entry(name.to_string())
            .or_insert_with(|| context.clone())
            .clone();
        Ok(Arc::ptr_eq(&installed, &context))
    }

    /// Removes and disposes the child `name`, and stops the cleaner servicing
    /// its subtree. Unknown names are ignored.
    pub fn shutdown_context(&self, name: &str) -> MetricsResult<()> {
        if name.trim().is_empty() {
            return Err(MetricsError::InvalidContextName {
                operation: "shutdown_context",
            });
        }
        if let Some((_, child)) = self.children.remove(name) {
            child.unregister_tree();
            child.dispose();
            log::info!("[MetricsContext] Shut down '{}'.", child.path());
        }
        Ok(())
    }

    fn unregister_tree(&self) {
        self.cleaner.unregister_registry(self.registry_key);
        for child in self.children_snapshot() {
            child.unregister_tree();
        }
    }

    /// Swaps in the no-op registry, clears the old one and disables every
    /// descendant. Fires [`ContextEvent::ShuttingDown`] then
    /// [`ContextEvent::Disabled`] exactly once. Idempotent.
    pub fn completely_disable_metrics(&self) {
        if self
            .disabled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let previous = std::mem::replace(
            &mut *write(&self.registry),
            Arc::new(NullMetricsRegistry::new()) as Arc<dyn MetricsRegistry>,
        );
        self.cleaner.unregister_registry(self.registry_key);
        previous.clear_all_metrics();

        for child in self.children_snapshot() {
            child.completely_disable_metrics();
        }

        self.notify(ContextEvent::ShuttingDown);
        self.notify(ContextEvent::Disabled);
        log::info!("[MetricsContext] '{}' completely disabled.", self.path);
    }

    /// Resets every metric value in this context and its descendants.
    pub fn reset_metrics_values(&self) {
        self.registry().reset_metrics_values();
        for child in self.children_snapshot() {
            child.reset_metrics_values();
        }
    }

    /// Installs `builder` here and in every descendant. Metrics already
    /// registered keep their implementation.
    pub fn with_custom_metrics_builder(&self, builder: Arc<dyn MetricsBuilder>) {
        *write(&self.builder) = builder.clone();
        for child in self.children_snapshot() {
            child.with_custom_metrics_builder(builder.clone());
        }
    }

    /// Fires [`ContextEvent::ShuttingDown`] unless already disabled. Does not
    /// touch children. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.is_disabled() {
            self.notify(ContextEvent::ShuttingDown);
        }
    }

    // --- Metrics ---

    /// Registers a gauge reading `value`.
    pub fn gauge(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        value: impl Fn() -> f64 + Send + Sync + 'static,
    ) {
        let provider: GaugeFn = Arc::new(value);
        let builder = self.builder();
        self.gauge_with(name, unit, tags, move || {
            Ok(builder.build_gauge(name, unit, provider))
        });
    }

    /// Registers a gauge built by `factory`.
    ///
    /// A failing factory is reported to the [`MetricsErrorHandler`] and the
    /// gauge is skipped.
    pub fn gauge_with(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: impl FnOnce() -> MetricsResult<Arc<dyn Gauge>>,
    ) {
        if let Err(error) = self.registry().gauge(name, unit, tags, Box::new(factory)) {
            MetricsErrorHandler::handle(
                &error,
                &format!("Unable to register gauge '{name}' in '{}'", self.path),
            );
        }
    }

    /// Gets or creates a counter.
    pub fn counter(&self, name: &str, unit: &Unit, tags: &MetricTags) -> Arc<dyn Counter> {
        let builder = self.builder();
        self.counter_with(name, unit, tags, move || builder.build_counter(name, unit))
    }

    /// Gets or creates a counter, building it with `factory` if absent.
    pub fn counter_with(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: impl FnOnce() -> Arc<dyn Counter>,
    ) -> Arc<dyn Counter> {
        self.registry().counter(name, unit, tags, Box::new(factory))
    }

    /// Gets or creates a meter.
    pub fn meter(
        &self,
        name: &str,
        unit: &Unit,
        rate_unit: TimeUnit,
        tags: &MetricTags,
    ) -> Arc<dyn Meter> {
        let builder = self.builder();
        self.meter_with(name, unit, tags, move || {
            builder.build_meter(name, unit, rate_unit)
        })
    }

    /// Gets or creates a meter, building it with `factory` if absent.
    pub fn meter_with(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: impl FnOnce() -> Arc<dyn Meter>,
    ) -> Arc<dyn Meter> {
        self.registry().meter(name, unit, tags, Box::new(factory))
    }

    /// Gets or creates a histogram with the context's default sampling.
    pub fn histogram(&self, name: &str, unit: &Unit, tags: &MetricTags) -> Arc<dyn Histogram> {
        self.histogram_with_sampling(name, unit, self.default_sampling, tags)
    }

    /// Gets or creates a histogram with an explicit sampling strategy.
    pub fn histogram_with_sampling(
        &self,
        name: &str,
        unit: &Unit,
        sampling: SamplingType,
        tags: &MetricTags,
    ) -> Arc<dyn Histogram> {
        let builder = self.builder();
        self.histogram_with(name, unit, tags, move || {
            builder.build_histogram(name, unit, sampling)
        })
    }

    /// Gets or creates a histogram, building it with `factory` if absent.
    pub fn histogram_with(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: impl FnOnce() -> Arc<dyn Histogram>,
    ) -> Arc<dyn Histogram> {
        self.registry().histogram(name, unit, tags, Box::new(factory))
    }

    /// Gets or creates a timer: rate per second, durations in milliseconds,
    /// default sampling.
    pub fn timer(&self, name: &str, unit: &Unit, tags: &MetricTags) -> Arc<dyn Timer> {
        self.timer_with_units(
            name,
            unit,
            self.default_sampling,
            TimeUnit::Seconds,
            TimeUnit::Milliseconds,
            tags,
        )
    }

    /// Gets or creates a timer with explicit sampling and units.
    pub fn timer_with_units(
        &self,
        name: &str,
        unit: &Unit,
        sampling: SamplingType,
        rate_unit: TimeUnit,
        duration_unit: TimeUnit,
        tags: &MetricTags,
    ) -> Arc<dyn Timer> {
        let builder = self.builder();
        self.timer_with(name, unit, tags, move || {
            builder.build_timer(name, unit, rate_unit, duration_unit, sampling)
        })
    }

    /// Gets or creates a timer, building it with `factory` if absent.
    pub fn timer_with(
        &self,
        name: &str,
        unit: &Unit,
        tags: &MetricTags,
        factory: impl FnOnce() -> Arc<dyn Timer>,
    ) -> Arc<dyn Timer> {
        self.registry().timer(name, unit, tags, Box::new(factory))
    }

    /// Gets or creates an event metric.
    pub fn event(&self, name: &str, tags: &MetricTags) -> Arc<dyn Event> {
        let builder = self.builder();
        self.event_with(name, tags, move || builder.build_event(name))
    }

    /// Gets or creates an event metric, building it with `factory` if absent.
    pub fn event_with(
        &self,
        name: &str,
        tags: &MetricTags,
        factory: impl FnOnce() -> Arc<dyn Event>,
    ) -> Arc<dyn Event> {
        self.registry().event(name, tags, Box::new(factory))
    }

    // --- Deregistration ---

    /// Removes a gauge.
    pub fn deregister_gauge(&self, name: &str, tags: &MetricTags) {
        self.registry().deregister_gauge(name, tags);
    }

    /// Removes a counter.
    pub fn deregister_counter(&self, name: &str, tags: &MetricTags) {
        self.registry().deregister_counter(name, tags);
    }

    /// Removes a meter.
    pub fn deregister_meter(&self, name: &str, tags: &MetricTags) {
        self.registry().deregister_meter(name, tags);
    }

    /// Removes a histogram.
    pub fn deregister_histogram(&self, name: &str, tags: &MetricTags) {
        self.registry().deregister_histogram(name, tags);
    }

    /// Removes a timer.
    pub fn deregister_timer(&self, name: &str, tags: &MetricTags) {
        self.registry().deregister_timer(name, tags);
    }

    /// Removes an event metric and every reporter's watermark for it.
    pub fn deregister_event(&self, name: &str, tags: &MetricTags) {
        self.registry().deregister_event(name, tags);
    }
}

impl MetricsDataProvider for MetricsContext {
    fn current_metrics_data(&self) -> MetricsData {
        if self.is_disabled() {
            return MetricsData::empty(self.name.clone());
        }
        let children = self
            .children_snapshot()
            .iter()
            .map(|child| child.current_metrics_data())
            .collect();
        MetricsData::capture(
            self.name.clone(),
            self.registry().data_provider().as_ref(),
            children,
        )
    }
}

impl Debug for MetricsContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsContext")
            .field("path", &self.path)
            .field("disabled", &self.is_disabled())
            .field("children", &self.children.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_with_blank_name_returns_self() {
        let root = MetricsContext::new("root");
        assert!(Arc::ptr_eq(&root.context(""), &root));
        assert!(Arc::ptr_eq(&root.context("   "), &root));
    }

    #[test]
    fn test_child_path_is_dotted() {
        let root = MetricsContext::new("root");
        let grandchild = root.context("api").context("v1");
        assert_eq!(grandchild.path(), "root.api.v1");
        assert_eq!(grandchild.name(), "v1");
    }

    #[test]
    fn test_context_returns_same_child() {
        let root = MetricsContext::new("root");
        let first = root.context("db");
        let second = root.context("db");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn test_attach_context_rejects_blank_name() {
        let root = MetricsContext::new("root");
        let result = root.attach_context("", MetricsContext::new("external"));
        assert!(matches!(
            result,
            Err(MetricsError::InvalidContextName {
                operation: "attach_context"
            })
        ));
    }

    #[test]
    fn test_context_with_discards_losing_candidate() {
        let root = MetricsContext::new("root");
        let winner = root.context("jobs");
        let returned = root.context_with("jobs", |_| panic!("factory must not run"));
        assert!(Arc::ptr_eq(&winner, &returned));
    }

    #[test]
    fn test_dispose_fires_shutting_down_once() {
        let root = MetricsContext::new("root");
        let events = root.subscribe();

        root.dispose();
        root.dispose();

        assert_eq!(events.try_recv(), Ok(ContextEvent::ShuttingDown));
        assert!(events.try_recv().is_err());
    }
}
