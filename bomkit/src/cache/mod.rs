//! Component cache
//!
//! Remembers supplier data the user entered for a component so the same
//! part can be reused in later projects. The cache is a three-level map
//! `library reference -> value -> footprint` whose leaves hold records keyed
//! by their content hash:
//!
//! ```text
//! {
//!   "Device:C": {
//!     "100n": {
//!       "Capacitor_SMD:C_0603": {
//!         "<hash>": { "Supplier": "Farnell", "Supplier no": "8820023" }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Reads never create intermediate levels. Every mutation saves the whole
//! tree through the [`CacheBackend`].

pub mod backend;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

pub use backend::{CacheBackend, FileBackend, MemoryBackend};

use crate::schematic::{ComponentRecord, SupplierData};

/// Records of one triple, by content hash.
pub type HashedRecords = BTreeMap<String, SupplierData>;
/// The persisted cache layout.
pub type CacheTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, HashedRecords>>>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no components selected")]
    EmptySelection,
    #[error("selected components differ in library reference, value or footprint: {}", .triples.join("; "))]
    AmbiguousSelection { triples: Vec<String> },
    #[error("supplier data is empty, nothing to store")]
    EmptyRecord,
    #[error("cache IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid cache file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// `(library reference, value, footprint)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CacheKey {
    pub library_reference: String,
    pub value: String,
    pub footprint: String,
}

impl CacheKey {
    pub fn new(
        library_reference: impl Into<String>,
        value: impl Into<String>,
        footprint: impl Into<String>,
    ) -> Self {
        Self {
            library_reference: library_reference.into(),
            value: value.into(),
            footprint: footprint.into(),
        }
    }

    pub fn of(record: &ComponentRecord) -> Self {
        let (library_reference, value, footprint) = record.triple();
        Self::new(library_reference, value, footprint)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.library_reference, self.value, self.footprint)
    }
}

/// Emitted once per record that was not in the cache before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Inserted {
        key: CacheKey,
        hash: String,
        record: SupplierData,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Inserted { hash: String },
    AlreadyPresent { hash: String },
}

impl StoreOutcome {
    pub fn hash(&self) -> &str {
        match self {
            StoreOutcome::Inserted { hash } | StoreOutcome::AlreadyPresent { hash } => hash,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, StoreOutcome::Inserted { .. })
    }
}

/// Flat view of one cached record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub key: CacheKey,
    pub hash: String,
    pub record: SupplierData,
}

type Listener = Box<dyn FnMut(&CacheEvent) + Send>;

pub struct ComponentCache {
    tree: CacheTree,
    backend: Box<dyn CacheBackend>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for ComponentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCache")
            .field("backend", &self.backend.name())
            .field("entries", &self.len())
            .finish()
    }
}

impl ComponentCache {
    /// Load the cache from `backend`.
    pub fn open(backend: impl CacheBackend + 'static) -> Result<Self, CacheError> {
        let tree = backend.load()?;
        let cache = Self {
            tree,
            backend: Box::new(backend),
            listeners: Vec::new(),
        };
        tracing::debug!(
            "Loaded {} cached records from {}",
            cache.len(),
            cache.backend.name()
        );
        Ok(cache)
    }

    /// Empty cache that is never persisted anywhere else.
    pub fn in_memory() -> Self {
        Self {
            tree: CacheTree::new(),
            backend: Box::new(MemoryBackend::new()),
            listeners: Vec::new(),
        }
    }

    pub fn backend_name(&self) -> String {
        self.backend.name()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.tree
            .values()
            .flat_map(|values| values.values())
            .flat_map(|footprints| footprints.values())
            .map(|records| records.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tree(&self) -> &CacheTree {
        &self.tree
    }

    fn records(&self, library_reference: &str, value: &str, footprint: &str) -> Option<&HashedRecords> {
        self.tree
            .get(library_reference)?
            .get(value)?
            .get(footprint)
    }

    /// Cached records for a triple, by hash. Empty if the triple is unknown.
    pub fn lookup(
        &self,
        library_reference: &str,
        value: &str,
        footprint: &str,
    ) -> Vec<(&str, &SupplierData)> {
        self.records(library_reference, value, footprint)
            .map(|records| records.iter().map(|(h, r)| (h.as_str(), r)).collect())
            .unwrap_or_default()
    }

    /// Register a callback for [`CacheEvent`]s.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&CacheEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Store `data` for a selection of components.
    ///
    /// All components must share one `(library reference, value, footprint)`
    /// triple; otherwise nothing is stored and
    /// [`CacheError::AmbiguousSelection`] is returned. Storing a record that
    /// is already cached is not an error.
    pub fn store(
        &mut self,
        components: &[&ComponentRecord],
        data: &SupplierData,
    ) -> Result<StoreOutcome, CacheError> {
        let first = components.first().ok_or(CacheError::EmptySelection)?;
        let key = CacheKey::of(first);
        if components.iter().any(|c| CacheKey::of(c) != key) {
            let mut triples: Vec<String> = components.iter().map(|c| CacheKey::of(c).to_string()).collect();
            triples.sort();
            triples.dedup();
            tracing::warn!("Refusing to cache data for an ambiguous selection");
            return Err(CacheError::AmbiguousSelection { triples });
        }
        self.store_for(&key, data)
    }

    /// Store `data` under `key`.
    pub fn store_for(&mut self, key: &CacheKey, data: &SupplierData) -> Result<StoreOutcome, CacheError> {
        if data.is_empty() {
            return Err(CacheError::EmptyRecord);
        }
        let hash = data.content_hash();

        if let Some(records) = self.records(&key.library_reference, &key.value, &key.footprint) {
            if records.contains_key(&hash) {
                return Ok(StoreOutcome::AlreadyPresent { hash });
            }
            // Older cache files hash records differently.
            if let Some((legacy, _)) = records.iter().find(|(_, r)| *r == data) {
                return Ok(StoreOutcome::AlreadyPresent {
                    hash: legacy.clone(),
                });
            }
        }

        let previous = self.tree.clone();
        self.insert_record(key, hash.clone(), data.clone());
        self.persist_or_restore(previous)?;
        tracing::info!("Cached new record {} for {}", hash, key);

        let event = CacheEvent::Inserted {
            key: key.clone(),
            hash: hash.clone(),
            record: data.clone(),
        };
        for listener in &mut self.listeners {
            listener(&event);
        }
        Ok(StoreOutcome::Inserted { hash })
    }

    fn insert_record(&mut self, key: &CacheKey, hash: String, record: SupplierData) {
        self.tree
            .entry(key.library_reference.clone())
            .or_default()
            .entry(key.value.clone())
            .or_default()
            .entry(key.footprint.clone())
            .or_default()
            .insert(hash, record);
    }

    /// Every cached record, sorted by key then hash.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries = Vec::new();
        for (library_reference, values) in &self.tree {
            for (value, footprints) in values {
                for (footprint, records) in footprints {
                    for (hash, record) in records {
                        entries.push(CacheEntry {
                            key: CacheKey::new(library_reference, value, footprint),
                            hash: hash.clone(),
                            record: record.clone(),
                        });
                    }
                }
            }
        }
        entries
    }

    /// Delete one record. Levels left empty are removed too.
    pub fn remove(&mut self, key: &CacheKey, hash: &str) -> Result<Option<SupplierData>, CacheError> {
        let cached = self
            .records(&key.library_reference, &key.value, &key.footprint)
            .is_some_and(|records| records.contains_key(hash));
        if !cached {
            return Ok(None);
        }
        let previous = self.tree.clone();

        let Some(values) = self.tree.get_mut(&key.library_reference) else {
            return Ok(None);
        };
        let Some(footprints) = values.get_mut(&key.value) else {
            return Ok(None);
        };
        let Some(records) = footprints.get_mut(&key.footprint) else {
            return Ok(None);
        };
        let Some(removed) = records.remove(hash) else {
            return Ok(None);
        };

        if records.is_empty() {
            footprints.remove(&key.footprint);
        }
        if footprints.is_empty() {
            values.remove(&key.value);
        }
        if values.is_empty() {
            self.tree.remove(&key.library_reference);
        }

        self.persist_or_restore(previous)?;
        tracing::info!("Removed cached record {} for {}", hash, key);
        Ok(Some(removed))
    }

    /// Save the whole tree through the backend.
    pub fn persist(&self) -> Result<(), CacheError> {
        self.backend.save(&self.tree)
    }

    /// Persist the current tree, going back to `previous` if the backend
    /// refuses it so memory never runs ahead of the store.
    fn persist_or_restore(&mut self, previous: CacheTree) -> Result<(), CacheError> {
        if let Err(e) = self.persist() {
            tracing::warn!("Cache {} not saved, change dropped: {}", self.backend.name(), e);
            self.tree = previous;
            return Err(e);
        }
        Ok(())
    }
}
