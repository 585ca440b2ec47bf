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

//! The retention cleaner: multi-reporter low-water-mark trimming of event backlogs.
//!
//! Every scheduled reporter registers once and, after each run, posts how many
//! records of each event metric it has seen (its watermark). On each tick the
//! cleaner trims every event metric down by the smallest nonzero watermark any
//! reporter holds for it, across every registry in its directory.
//!
//! A missing or zero watermark means the reporter filters that metric out; it
//! never holds back cleanup. When no reporter is registered, or none has ever
//! seen a record, every event backlog is cleared outright.

use crate::scheduling::timer::ThreadingTimer;
use crate::utils::sync::{lock, read, write};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, TryLockError, Weak};
use std::time::Duration;
use vigil_core::telemetry::{
    EventValue, IntervalTimer, MetricSnapshot, MetricsRegistry, MetricsResult,
};

/// Identifies a reporter registered with [`EventMetricsCleaner::register_report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportId(usize);

impl ReportId {
    /// The position of this report in registration order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A directory slot for one registry.
///
/// Allocated from a process-wide counter, so two contexts whose dotted paths
/// render the same still get distinct slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryKey(u64);

impl RegistryKey {
    /// Allocates a key no other registry holds.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

struct CleanerInner {
    buffer: Duration,
    interval: Mutex<Duration>,
    registries: RwLock<HashMap<RegistryKey, Arc<dyn MetricsRegistry>>>,
    reports: Mutex<Vec<HashMap<String, usize>>>,
    timer: Mutex<Option<Arc<dyn IntervalTimer>>>,
    cleaning: Mutex<()>,
    shut_down: AtomicBool,
}

/// The retention cleaner.
///
/// Cheap to clone; clones share state. Owned by the service, not a global.
#[derive(Clone)]
pub struct EventMetricsCleaner {
    inner: Arc<CleanerInner>,
}

/// A non-owning reference to a cleaner, held by registries and contexts.
///
/// Calls on a handle whose cleaner is gone do nothing.
#[derive(Clone, Default)]
pub struct CleanerHandle {
    inner: Weak<CleanerInner>,
}

impl EventMetricsCleaner {
    /// Creates a cleaner driven by a background [`ThreadingTimer`], initially
    /// running every `buffer`.
    pub fn new(buffer: Duration) -> MetricsResult<Self> {
        let timer = ThreadingTimer::new("event-cleaner")?;
        Ok(Self::with_timer(buffer, Arc::new(timer)))
    }

    /// Creates a cleaner driven by `timer`.
    pub fn with_timer(buffer: Duration, timer: Arc<dyn IntervalTimer>) -> Self {
        let cleaner = Self {
            inner: Arc::new(CleanerInner {
                buffer,
                interval: Mutex::new(buffer),
                registries: RwLock::new(HashMap::new()),
                reports: Mutex::new(Vec::new()),
                timer: Mutex::new(None),
                cleaning: Mutex::new(()),
                shut_down: AtomicBool::new(false),
            }),
        };
        cleaner.install_timer(timer);
        log::info!("[EventMetricsCleaner] Started with a {buffer:?} interval buffer.");
        cleaner
    }

    /// A non-owning handle to this cleaner.
    pub fn handle(&self) -> CleanerHandle {
        CleanerHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Replaces the timer driving the cleaner, disposing the previous one.
    ///
    /// Only one timer drives the cleaner at a time.
    pub fn enable_test_timer(&self, timer: Arc<dyn IntervalTimer>) {
        self.install_timer(timer);
    }

    fn install_timer(&self, timer: Arc<dyn IntervalTimer>) {
        let weak = Arc::downgrade(&self.inner);
        timer.set_tick_handler(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                EventMetricsCleaner { inner }.clean();
            }
        }));
        let interval = self.current_interval();
        timer.change(interval, interval);

        let previous = lock(&self.inner.timer).replace(timer);
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    /// Adds `registry` to the directory under `key`. `label` is only logged.
    pub fn register_registry(
        &self,
        key: RegistryKey,
        label: &str,
        registry: Arc<dyn MetricsRegistry>,
    ) {
        log::debug!("[EventMetricsCleaner] Servicing registry '{label}' as {key:?}.");
        write(&self.inner.registries).insert(key, registry);
    }

    /// Removes the registry stored under `key`.
    pub fn unregister_registry(&self, key: RegistryKey) {
        if write(&self.inner.registries).remove(&key).is_some() {
            log::debug!("[EventMetricsCleaner] Stopped servicing {key:?}.");
        }
    }

    /// Number of registries in the directory.
    pub fn registry_count(&self) -> usize {
        read(&self.inner.registries).len()
    }

    /// Registers a reporter running every `interval` and returns its id.
    ///
    /// Grows the cleaner's own interval to `interval + buffer` if that is
    /// longer than the current one, so the cleaner runs after the slowest
    /// reporter. The interval never shrinks here.
    pub fn register_report(&self, interval: Duration) -> ReportId {
        let candidate = interval.saturating_add(self.inner.buffer);
        {
            let mut current = lock(&self.inner.interval);
            if candidate > *current {
                *current = candidate;
                if let Some(timer) = lock(&self.inner.timer).as_ref() {
                    timer.change(candidate, candidate);
                }
                log::debug!("[EventMetricsCleaner] Interval raised to {candidate:?}.");
            }
        }

        let mut reports = lock(&self.inner.reports);
        reports.push(HashMap::new());
        ReportId(reports.len() - 1)
    }

    /// Records, for every event snapshot a reporter just delivered, how many
    /// records that reporter has now seen.
    ///
    /// When the same identifier appears more than once (same name and tags in
    /// different contexts), the smallest count is kept. Unknown report ids are
    /// ignored.
    pub fn update_total_reported_events<'a>(
        &self,
        report: ReportId,
        events: impl IntoIterator<Item = &'a MetricSnapshot<EventValue>>,
    ) {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for snapshot in events {
            let count = snapshot.value.len();
            seen.entry(snapshot.identifier())
                .and_modify(|existing| *existing = (*existing).min(count))
                .or_insert(count);
        }

        let mut reports = lock(&self.inner.reports);
        let Some(watermarks) = reports.get_mut(report.0) else {
            log::warn!("[EventMetricsCleaner] Ignoring watermarks for unknown {report:?}.");
            return;
        };
        watermarks.extend(seen);
    }

    /// Forgets `identifier` in every reporter's watermarks.
    pub fn remove_event(&self, identifier: &str) {
        if identifier.trim().is_empty() {
            return;
        }
        for watermarks in lock(&self.inner.reports).iter_mut() {
            watermarks.remove(identifier);
        }
    }

    /// Runs one trimming pass. Skipped if another pass is still running.
    pub fn clean(&self) {
        let _pass = match self.inner.cleaning.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                log::debug!("[EventMetricsCleaner] Previous pass still running; skipping.");
                return;
            }
        };

        let lowest = {
            let reports = lock(&self.inner.reports);
            let mut lowest: HashMap<String, usize> = HashMap::new();
            for watermarks in reports.iter() {
                for (identifier, &count) in watermarks {
                    if count == 0 {
                        continue;
                    }
                    lowest
                        .entry(identifier.clone())
                        .and_modify(|min| *min = (*min).min(count))
                        .or_insert(count);
                }
            }
            lowest
        };

        let registries: Vec<Arc<dyn MetricsRegistry>> =
            read(&self.inner.registries).values().cloned().collect();

        if lowest.is_empty() {
            log::trace!(
                "[EventMetricsCleaner] No watermarks; clearing events in {} registries.",
                registries.len()
            );
            for registry in &registries {
                registry.clear_event_values();
            }
            return;
        }

        log::trace!(
            "[EventMetricsCleaner] Trimming {} event metrics in {} registries.",
            lowest.len(),
            registries.len()
        );
        for (identifier, count) in &lowest {
            for registry in &registries {
                registry.event_values_remove_range_from_start_index(identifier, *count);
            }
        }
    }

    /// Disposes the timer and drops every registry and watermark. Idempotent.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let timer = lock(&self.inner.timer).take();
        if let Some(timer) = timer {
            timer.dispose();
        }
        write(&self.inner.registries).clear();
        lock(&self.inner.reports).clear();
        log::info!("[EventMetricsCleaner] Shut down.");
    }

    /// Returns `true` after [`EventMetricsCleaner::shutdown`].
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Number of registered reporters.
    pub fn total_reports(&self) -> usize {
        lock(&self.inner.reports).len()
    }

    /// The cleaner's current run interval.
    pub fn current_interval(&self) -> Duration {
        *lock(&self.inner.interval)
    }

    /// Number of event metrics `report` holds a watermark for.
    pub fn reports_event_count(&self, report: ReportId) -> usize {
        lock(&self.inner.reports)
            .get(report.0)
            .map_or(0, HashMap::len)
    }

    /// The watermark `report` holds for `identifier`, or zero.
    pub fn reported_event_detail_count(&self, report: ReportId, identifier: &str) -> usize {
        lock(&self.inner.reports)
            .get(report.0)
            .and_then(|watermarks| watermarks.get(identifier).copied())
            .unwrap_or(0)
    }

    /// Total records currently held by event metrics named `name` (kind
    /// suffix included) across every registry in the directory.
    pub fn event_detail_count(&self, name: &str) -> usize {
        let registries: Vec<Arc<dyn MetricsRegistry>> =
            read(&self.inner.registries).values().cloned().collect();
        registries
            .iter()
            .flat_map(|registry| registry.data_provider().events())
            .filter(|source| source.name() == name)
            .map(|source| source.value().len())
            .sum()
    }

    /// Forgets every reporter.
    pub fn clear(&self) {
        lock(&self.inner.reports).clear();
    }

    /// Restores the interval to the bare buffer and reschedules the timer.
    pub fn reset_interval(&self) {
        let buffer = self.inner.buffer;
        *lock(&self.inner.interval) = buffer;
        if let Some(timer) = lock(&self.inner.timer).as_ref() {
            timer.change(buffer, buffer);
        }
    }
}

impl Debug for EventMetricsCleaner {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventMetricsCleaner")
            .field("interval", &self.current_interval())
            .field("reports", &self.total_reports())
            .field("registries", &self.registry_count())
            .finish()
    }
}

impl CleanerHandle {
    /// A handle that is not attached to any cleaner.
    pub fn detached() -> Self {
        Self::default()
    }

    /// The cleaner, if it is still alive.
    pub fn upgrade(&self) -> Option<EventMetricsCleaner> {
        self.inner
            .upgrade()
            .map(|inner| EventMetricsCleaner { inner })
    }

    /// Forwards to [`EventMetricsCleaner::remove_event`].
    pub fn remove_event(&self, identifier: &str) {
        if let Some(cleaner) = self.upgrade() {
            cleaner.remove_event(identifier);
        }
    }

    /// Forwards to [`EventMetricsCleaner::register_registry`].
    pub fn register_registry(
        &self,
        key: RegistryKey,
        label: &str,
        registry: Arc<dyn MetricsRegistry>,
    ) {
        if let Some(cleaner) = self.upgrade() {
            cleaner.register_registry(key, label, registry);
        }
    }

    /// Forwards to [`EventMetricsCleaner::unregister_registry`].
    pub fn unregister_registry(&self, key: RegistryKey) {
        if let Some(cleaner) = self.upgrade() {
            cleaner.unregister_registry(key);
        }
    }
}

impl Debug for CleanerHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanerHandle")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::DefaultMetricsRegistry;
    use crate::scheduling::ManualTimer;

    fn cleaner() -> (EventMetricsCleaner, Arc<ManualTimer>) {
        let timer = Arc::new(ManualTimer::new());
        let cleaner = EventMetricsCleaner::with_timer(Duration::from_secs(5), timer.clone());
        (cleaner, timer)
    }

    #[test]
    fn test_starts_with_zero_reports() {
        let (cleaner, _) = cleaner();
        assert_eq!(cleaner.total_reports(), 0);
        assert!(cleaner.current_interval() > Duration::ZERO);
    }

    #[test]
    fn test_register_report_updates_interval() {
        let (cleaner, timer) = cleaner();
        assert_eq!(cleaner.current_interval(), Duration::from_secs(5));

        cleaner.register_report(Duration::from_secs(60));

        assert_eq!(cleaner.total_reports(), 1);
        assert_eq!(cleaner.current_interval(), Duration::from_secs(65));
        assert_eq!(
            timer.schedule(),
            Some((Duration::from_secs(65), Duration::from_secs(65)))
        );
    }

    #[test]
    fn test_interval_follows_the_slowest_report() {
        let (cleaner, _) = cleaner();
        cleaner.register_report(Duration::from_secs(3));
        cleaner.register_report(Duration::from_secs(8));
        cleaner.register_report(Duration::from_secs(2));

        assert_eq!(cleaner.current_interval(), Duration::from_secs(13));
    }

    #[test]
    fn test_clear_and_reset_interval() {
        let (cleaner, _) = cleaner();
        cleaner.register_report(Duration::from_secs(60));

        cleaner.clear();
        cleaner.reset_interval();

        assert_eq!(cleaner.total_reports(), 0);
        assert_eq!(cleaner.current_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_report_is_ignored() {
        let (cleaner, _) = cleaner();
        cleaner.update_total_reported_events(ReportId(3), std::iter::empty());
        assert_eq!(cleaner.reports_event_count(ReportId(3)), 0);
    }

    #[test]
    fn test_enable_test_timer_disposes_previous() {
        let (cleaner, first) = cleaner();
        let second = Arc::new(ManualTimer::new());

        cleaner.enable_test_timer(second.clone());

        assert!(first.is_disposed());
        assert!(!second.is_disposed());
        assert_eq!(
            second.schedule(),
            Some((Duration::from_secs(5), Duration::from_secs(5)))
        );
    }

    #[test]
    fn test_handle_does_not_keep_cleaner_alive() {
        let (cleaner, _) = cleaner();
        let handle = cleaner.handle();
        let registry: Arc<dyn MetricsRegistry> = Arc::new(DefaultMetricsRegistry::new());
        handle.register_registry(RegistryKey::next(), "root", registry);
        assert_eq!(cleaner.registry_count(), 1);

        drop(cleaner);
        assert!(handle.upgrade().is_none());
        handle.remove_event("test.event17");
    }

    #[test]
    fn test_shutdown_disposes_timer() {
        let (cleaner, timer) = cleaner();
        cleaner.shutdown();
        cleaner.shutdown();
        assert!(timer.is_disposed());
        assert!(cleaner.is_shut_down());
    }
}
