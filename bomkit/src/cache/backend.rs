//! Cache backing stores
//!
//! A backend loads and saves the whole cache tree at once. There is no
//! incremental persistence.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{CacheError, CacheTree};
use crate::atomic::write_atomically;

/// Trait for cache storage
pub trait CacheBackend: Send + Sync {
    /// Short human readable name, e.g. `file components_cache.json`
    fn name(&self) -> String;

    /// True when load and save can operate on this store
    fn validate(&self) -> bool;

    /// Load the complete cache tree; a store that does not exist yet is empty
    fn load(&self) -> Result<CacheTree, CacheError>;

    /// Replace the stored tree
    fn save(&self, tree: &CacheTree) -> Result<(), CacheError>;
}

/// JSON file backend
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheBackend for FileBackend {
    fn name(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn validate(&self) -> bool {
        self.path.is_file()
    }

    fn load(&self) -> Result<CacheTree, CacheError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No cache at {}, starting empty", self.path.display());
                return Ok(CacheTree::new());
            }
            Err(source) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&text).map_err(|source| CacheError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, tree: &CacheTree) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(tree).map_err(|source| CacheError::Json {
            path: self.path.clone(),
            source,
        })?;
        write_atomically(&self.path, json.as_bytes()).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-process backend. Clones share the same storage, so a test can keep a
/// handle and inspect what the cache saved.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    tree: Arc<Mutex<CacheTree>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(tree: CacheTree) -> Self {
        Self {
            tree: Arc::new(Mutex::new(tree)),
            saves: Arc::default(),
        }
    }

    /// Copy of the last saved tree.
    pub fn snapshot(&self) -> CacheTree {
        self.tree.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Number of times the tree was saved.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("saves", &self.save_count())
            .finish()
    }
}

impl CacheBackend for MemoryBackend {
    fn name(&self) -> String {
        "memory".to_string()
    }

    fn validate(&self) -> bool {
        true
    }

    fn load(&self) -> Result<CacheTree, CacheError> {
        self.tree
            .lock()
            .map(|t| t.clone())
            .map_err(|_| CacheError::Backend("memory store lock poisoned".to_string()))
    }

    fn save(&self, tree: &CacheTree) -> Result<(), CacheError> {
        let mut stored = self
            .tree
            .lock()
            .map_err(|_| CacheError::Backend("memory store lock poisoned".to_string()))?;
        *stored = tree.clone();
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}
