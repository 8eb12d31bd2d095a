use std::sync::Arc;

use anyhow::Result;
use chrono::Local;

use crate::cache::ObjectCache;
use crate::model::{Event, Family, Person, julian_day};
use crate::source::DataSource;

/// Everything one verification run reads through: the data source, the
/// object caches in front of it and the "today" reference date.
pub struct VerificationContext<'a> {
    source: &'a dyn DataSource,
    cache: ObjectCache,
    today: i64,
}

impl<'a> VerificationContext<'a> {
    pub fn new(source: &'a dyn DataSource) -> Self {
        Self {
            source,
            cache: ObjectCache::new(),
            today: julian_day(Local::now().date_naive()),
        }
    }

    pub fn with_reference_date(mut self, sort_value: i64) -> Self {
        self.today = sort_value;
        self
    }

    pub fn source(&self) -> &'a dyn DataSource {
        self.source
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    pub fn today(&self) -> i64 {
        self.today
    }

    pub fn person(&self, handle: &str) -> Result<Option<Arc<Person>>> {
        self.cache.person(self.source, handle)
    }

    pub fn family(&self, handle: &str) -> Result<Option<Arc<Family>>> {
        self.cache.family(self.source, handle)
    }

    pub fn event(&self, handle: &str) -> Result<Option<Arc<Event>>> {
        self.cache.event(self.source, handle)
    }

    pub fn father(&self, family: &Family) -> Result<Option<Arc<Person>>> {
        match &family.father {
            Some(handle) => self.person(handle),
            None => Ok(None),
        }
    }

    pub fn mother(&self, family: &Family) -> Result<Option<Arc<Person>>> {
        match &family.mother {
            Some(handle) => self.person(handle),
            None => Ok(None),
        }
    }

    /// "Father and Mother" from the parents' primary names, as far as known.
    pub fn family_name(&self, family: &Family) -> Result<String> {
        let father = self.father(family)?.map(|p| p.primary_name.display());
        let mother = self.mother(family)?.map(|p| p.primary_name.display());
        Ok(match (father, mother) {
            (Some(father), Some(mother)) => format!("{father} and {mother}"),
            (Some(name), None) | (None, Some(name)) => name,
            (None, None) => String::new(),
        })
    }
}
