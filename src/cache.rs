use std::sync::Arc;

use anyhow::Result;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::debug;

use crate::model::{Event, Family, Handle, Person};
use crate::source::DataSource;

pub const PERSON_CAPACITY: u64 = 100_000;
pub const FAMILY_CAPACITY: u64 = 100_000;
pub const EVENT_CAPACITY: u64 = 200_000;

/// Read-through LRU caches over a data source, one per entity kind.
///
/// Cached entities are shared snapshots; nothing hands out mutable access.
/// Lookups of handles the source does not know are not cached.
///
/// moka records reads and writes in buffers and applies them lazily. Each
/// miss flushes those buffers right after its insert, so the recency order
/// always reflects every access so far and an insert past capacity evicts
/// the least recently accessed entry.
pub struct ObjectCache {
    people: Cache<Handle, Arc<Person>>,
    families: Cache<Handle, Arc<Family>>,
    events: Cache<Handle, Arc<Event>>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::with_capacities(PERSON_CAPACITY, FAMILY_CAPACITY, EVENT_CAPACITY)
    }

    pub fn with_capacities(people: u64, families: u64, events: u64) -> Self {
        Self {
            people: lru_cache(people),
            families: lru_cache(families),
            events: lru_cache(events),
        }
    }

    pub fn person(&self, source: &dyn DataSource, handle: &str) -> Result<Option<Arc<Person>>> {
        if let Some(hit) = self.people.get(handle) {
            return Ok(Some(hit));
        }
        let fetched = source.person(handle)?.map(Arc::new);
        if let Some(person) = &fetched {
            self.people.insert(handle.to_string(), Arc::clone(person));
            self.people.run_pending_tasks();
        }
        Ok(fetched)
    }

    pub fn family(&self, source: &dyn DataSource, handle: &str) -> Result<Option<Arc<Family>>> {
        if let Some(hit) = self.families.get(handle) {
            return Ok(Some(hit));
        }
        let fetched = source.family(handle)?.map(Arc::new);
        if let Some(family) = &fetched {
            self.families.insert(handle.to_string(), Arc::clone(family));
            self.families.run_pending_tasks();
        }
        Ok(fetched)
    }

    pub fn event(&self, source: &dyn DataSource, handle: &str) -> Result<Option<Arc<Event>>> {
        if let Some(hit) = self.events.get(handle) {
            return Ok(Some(hit));
        }
        let fetched = source.event(handle)?.map(Arc::new);
        if let Some(event) = &fetched {
            self.events.insert(handle.to_string(), Arc::clone(event));
            self.events.run_pending_tasks();
        }
        Ok(fetched)
    }

    /// Walks the whole source once and inserts every entity.
    pub fn preload_all(&self, source: &dyn DataSource) -> Result<()> {
        for handle in source.event_handles() {
            if let Some(event) = source.event(&handle)? {
                self.events.insert(handle, Arc::new(event));
            }
        }
        for handle in source.person_handles() {
            if let Some(person) = source.person(&handle)? {
                self.people.insert(handle, Arc::new(person));
            }
        }
        for handle in source.family_handles() {
            if let Some(family) = source.family(&handle)? {
                self.families.insert(handle, Arc::new(family));
            }
        }

        self.run_pending_tasks();
        debug!(
            people = self.people.entry_count(),
            families = self.families.entry_count(),
            events = self.events.entry_count(),
            "object cache preloaded"
        );
        Ok(())
    }

    pub fn clear(&self) {
        self.people.invalidate_all();
        self.families.invalidate_all();
        self.events.invalidate_all();
        self.run_pending_tasks();
    }

    #[cfg(test)]
    pub fn len(&self) -> u64 {
        self.run_pending_tasks();
        self.people.entry_count() + self.families.entry_count() + self.events.entry_count()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn run_pending_tasks(&self) {
        self.people.run_pending_tasks();
        self.families.run_pending_tasks();
        self.events.run_pending_tasks();
    }
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new()
    }
}

fn lru_cache<V>(capacity: u64) -> Cache<Handle, V>
where
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(capacity)
        .eviction_policy(EvictionPolicy::lru())
        .build()
}
