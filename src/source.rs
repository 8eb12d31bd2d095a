use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::info;

use crate::model::{Event, Family, Handle, Person};

/// Read-only access to the record graph being verified.
pub trait DataSource {
    /// Stable identity of the underlying dataset; the ignore store is keyed on it.
    fn identity(&self) -> &str;

    fn person_handles(&self) -> Vec<Handle>;
    fn family_handles(&self) -> Vec<Handle>;
    fn event_handles(&self) -> Vec<Handle>;

    fn person(&self, handle: &str) -> Result<Option<Person>>;
    fn family(&self, handle: &str) -> Result<Option<Family>>;
    fn event(&self, handle: &str) -> Result<Option<Event>>;

    fn person_count(&self) -> usize {
        self.person_handles().len()
    }

    fn family_count(&self) -> usize {
        self.family_handles().len()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub people: Vec<Person>,
    #[serde(default)]
    pub families: Vec<Family>,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// A dataset held in memory, iterated in the order it was loaded.
#[derive(Debug)]
pub struct JsonDataSource {
    identity: String,
    people: Vec<Person>,
    families: Vec<Family>,
    events: Vec<Event>,
    person_index: HashMap<Handle, usize>,
    family_index: HashMap<Handle, usize>,
    event_index: HashMap<Handle, usize>,
}

impl JsonDataSource {
    pub fn open(path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let dataset: Dataset = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        let identity = fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();

        let source = Self::from_dataset(identity, dataset)?;
        info!(
            path = %path.display(),
            people = source.people.len(),
            families = source.families.len(),
            events = source.events.len(),
            "loaded dataset"
        );
        Ok(source)
    }

    pub fn from_dataset(identity: impl Into<String>, dataset: Dataset) -> Result<Self> {
        let person_index = index_handles(dataset.people.iter().map(|p| &p.handle), "person")?;
        let family_index = index_handles(dataset.families.iter().map(|f| &f.handle), "family")?;
        let event_index = index_handles(dataset.events.iter().map(|e| &e.handle), "event")?;

        Ok(Self {
            identity: identity.into(),
            people: dataset.people,
            families: dataset.families,
            events: dataset.events,
            person_index,
            family_index,
            event_index,
        })
    }
}

fn index_handles<'a>(
    handles: impl Iterator<Item = &'a Handle>,
    kind: &str,
) -> Result<HashMap<Handle, usize>> {
    let mut index = HashMap::new();
    for (position, handle) in handles.enumerate() {
        if index.insert(handle.clone(), position).is_some() {
            bail!("duplicate {kind} handle in dataset: {handle}");
        }
    }
    Ok(index)
}

impl DataSource for JsonDataSource {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn person_handles(&self) -> Vec<Handle> {
        self.people.iter().map(|p| p.handle.clone()).collect()
    }

    fn family_handles(&self) -> Vec<Handle> {
        self.families.iter().map(|f| f.handle.clone()).collect()
    }

    fn event_handles(&self) -> Vec<Handle> {
        self.events.iter().map(|e| e.handle.clone()).collect()
    }

    fn person(&self, handle: &str) -> Result<Option<Person>> {
        Ok(self
            .person_index
            .get(handle)
            .map(|&position| self.people[position].clone()))
    }

    fn family(&self, handle: &str) -> Result<Option<Family>> {
        Ok(self
            .family_index
            .get(handle)
            .map(|&position| self.families[position].clone()))
    }

    fn event(&self, handle: &str) -> Result<Option<Event>> {
        Ok(self
            .event_index
            .get(handle)
            .map(|&position| self.events[position].clone()))
    }

    fn person_count(&self) -> usize {
        self.people.len()
    }

    fn family_count(&self) -> usize {
        self.families.len()
    }
}
