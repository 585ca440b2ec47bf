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

//! A concurrent, per-kind map from identifier to live metric and value source.

use crate::utils::sync::lock;
use dashmap::DashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Mutex, OnceLock};
use vigil_core::telemetry::{identifier, MetricLifecycle, MetricTags, MetricValueSource};

/// A registered metric: the write side and its read-only source.
pub struct CatalogEntry<M: ?Sized, V> {
    /// The live implementation accepting writes.
    pub metric: Arc<M>,
    /// The read-only view handed to data providers.
    pub source: MetricValueSource<V>,
}

/// A creation slot. Inserted before the factory runs so that concurrent
/// callers for the same identifier wait on `init` instead of constructing twice.
struct Slot<M: ?Sized, V> {
    entry: OnceLock<CatalogEntry<M, V>>,
    init: Mutex<()>,
}

impl<M: ?Sized, V> Slot<M, V> {
    fn new() -> Self {
        Self {
            entry: OnceLock::new(),
            init: Mutex::new(()),
        }
    }
}

/// One metric kind's worth of registered metrics.
///
/// Registration of different identifiers only contends on the map's shard
/// locks. Bulk operations (`clear`, `reset`, enumeration, event trimming)
/// serialize on a single catalog lock.
pub struct MetricCatalog<M: ?Sized, V> {
    entries: DashMap<String, Arc<Slot<M, V>>>,
    bulk: Mutex<()>,
}

impl<M, V> MetricCatalog<M, V>
where
    M: ?Sized + MetricLifecycle,
{
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            bulk: Mutex::new(()),
        }
    }

    /// Returns the metric registered under `name` and `tags`, building it with
    /// `factory` if absent.
    ///
    /// The factory runs at most once per identifier, even under concurrent
    /// calls. If it fails, nothing is registered and the error is returned.
    pub fn get_or_add<E>(
        &self,
        name: &str,
        tags: &MetricTags,
        factory: impl FnOnce() -> Result<CatalogEntry<M, V>, E>,
    ) -> Result<Arc<M>, E> {
        let id = identifier::calculate(name, tags);
        loop {
            let slot = self
                .entries
                .entry(id.clone())
                .or_insert_with(|| Arc::new(Slot::new()))
                .clone();
            if let Some(entry) = slot.entry.get() {
                return Ok(entry.metric.clone());
            }

            let _init = lock(&slot.init);
            if let Some(entry) = slot.entry.get() {
                return Ok(entry.metric.clone());
            }
            // A failed construction or a removal may have retired this slot
            // while we waited.
            let current = self
                .entries
                .get(&id)
                .is_some_and(|live| Arc::ptr_eq(live.value(), &slot));
            if !current {
                continue;
            }

            return match factory() {
                Ok(entry) => {
                    let metric = entry.metric.clone();
                    if slot.entry.set(entry).is_err() {
                        log::warn!("[MetricCatalog] Slot for '{id}' was filled twice");
                    }
                    Ok(metric)
                }
                Err(error) => {
                    self.entries
                        .remove_if(&id, |_, live| Arc::ptr_eq(live, &slot));
                    Err(error)
                }
            };
        }
    }

    /// Returns the metric registered under `name` and `tags`, if any.
    pub fn get(&self, name: &str, tags: &MetricTags) -> Option<Arc<M>> {
        let id = identifier::calculate(name, tags);
        let slot = self.entries.get(&id)?.clone();
        slot.entry.get().map(|entry| entry.metric.clone())
    }

    /// Removes the entry registered under `name` and `tags`.
    ///
    /// Returns the identifier if an entry was removed. The metric itself is
    /// not disposed; holders of it keep a working instance.
    pub fn remove(&self, name: &str, tags: &MetricTags) -> Option<String> {
        let id = identifier::calculate(name, tags);
        self.entries.remove(&id).map(|(key, _)| key)
    }

    /// Removes every entry and disposes its metric.
    pub fn clear(&self) {
        let _bulk = lock(&self.bulk);
        let slots: Vec<Arc<Slot<M, V>>> = self
            .entries
            .iter()
            .map(|slot| slot.value().clone())
            .collect();
        self.entries.clear();
        for slot in slots {
            if let Some(entry) = slot.entry.get() {
                entry.metric.dispose();
            }
        }
    }

    /// Resets every metric to its empty value, keeping the registrations.
    pub fn reset(&self) {
        let _bulk = lock(&self.bulk);
        for slot in self.initialized() {
            if let Some(entry) = slot.entry.get() {
                entry.metric.reset();
            }
        }
    }

    /// A copy of every value source, sorted by name.
    pub fn all(&self) -> Vec<MetricValueSource<V>> {
        let slots = {
            let _bulk = lock(&self.bulk);
            self.initialized()
        };
        let mut sources: Vec<MetricValueSource<V>> = slots
            .iter()
            .filter_map(|slot| slot.entry.get().map(|entry| entry.source.clone()))
            .collect();
        sources.sort_by(|a, b| {
            a.name()
                .cmp(b.name())
                .then_with(|| a.tags().to_string().cmp(&b.tags().to_string()))
        });
        sources
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.initialized().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `action` on the metric registered under `identifier` while holding
    /// the catalog lock.
    pub(crate) fn with_metric(&self, identifier: &str, action: impl FnOnce(&M)) {
        let _bulk = lock(&self.bulk);
        let Some(slot) = self.entries.get(identifier).map(|slot| slot.value().clone()) else {
            return;
        };
        if let Some(entry) = slot.entry.get() {
            action(entry.metric.as_ref());
        }
    }

    /// Copies the slots whose metric has been built. Never iterates the live
    /// map while calling into metrics.
    fn initialized(&self) -> Vec<Arc<Slot<M, V>>> {
        self.entries
            .iter()
            .filter(|slot| slot.value().entry.get().is_some())
            .map(|slot| slot.value().clone())
            .collect()
    }
}

impl<M, V> Default for MetricCatalog<M, V>
where
    M: ?Sized + MetricLifecycle,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ?Sized, V> Debug for MetricCatalog<M, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricCatalog")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::simple::AtomicCounter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use vigil_core::telemetry::{Counter, CounterValue, MetricValueProvider, Unit};

    type CounterCatalog = MetricCatalog<dyn Counter, CounterValue>;

    fn entry(name: &str, tags: &MetricTags) -> CatalogEntry<dyn Counter, CounterValue> {
        let counter = Arc::new(AtomicCounter::new());
        CatalogEntry {
            metric: counter.clone(),
            source: MetricValueSource::new(name, Unit::none(), tags.clone(), counter),
        }
    }

    #[test]
    fn test_get_or_add_builds_once() {
        let catalog = CounterCatalog::new();
        let tags = MetricTags::NONE;

        let first = catalog
            .get_or_add::<()>("requests", &tags, || Ok(entry("requests", &tags)))
            .unwrap();
        let second = catalog
            .get_or_add::<()>("requests", &tags, || panic!("factory must not run twice"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_concurrent_get_or_add_runs_factory_exactly_once() {
        let catalog = Arc::new(CounterCatalog::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let catalog = catalog.clone();
                let builds = builds.clone();
                thread::spawn(move || {
                    let tags = MetricTags::pair("shard", "a");
                    catalog
                        .get_or_add::<()>("hits", &tags, || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            Ok(entry("hits", &tags))
                        })
                        .unwrap()
                })
            })
            .collect();
        let metrics: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(metrics.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_factory_leaves_catalog_unchanged() {
        let catalog = CounterCatalog::new();
        let tags = MetricTags::NONE;

        let result = catalog.get_or_add("broken", &tags, || Err("no source"));
        assert_eq!(result.err(), Some("no source"));
        assert!(catalog.is_empty());

        // A later registration under the same identifier still succeeds.
        assert!(catalog
            .get_or_add::<()>("broken", &tags, || Ok(entry("broken", &tags)))
            .is_ok());
    }

    #[test]
    fn test_all_is_sorted_by_name() {
        let catalog = CounterCatalog::new();
        for name in ["zeta", "alpha", "mid"] {
            catalog
                .get_or_add::<()>(name, &MetricTags::NONE, || Ok(entry(name, &MetricTags::NONE)))
                .unwrap();
        }

        let names: Vec<String> = catalog.all().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_remove_uses_the_same_identifier() {
        let catalog = CounterCatalog::new();
        let tags = MetricTags::pair("host", "a");
        catalog
            .get_or_add::<()>("requests", &tags, || Ok(entry("requests", &tags)))
            .unwrap();

        assert_eq!(catalog.remove("requests", &MetricTags::NONE), None);
        assert_eq!(
            catalog.remove("requests", &tags),
            Some(identifier::calculate("requests", &tags))
        );
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_reset_keeps_registrations() {
        let catalog = CounterCatalog::new();
        let counter = catalog
            .get_or_add::<()>("c", &MetricTags::NONE, || Ok(entry("c", &MetricTags::NONE)))
            .unwrap();
        counter.increment_by(5);

        catalog.reset();

        assert_eq!(catalog.len(), 1);
        assert_eq!(counter.value().count, 0);
    }
}
