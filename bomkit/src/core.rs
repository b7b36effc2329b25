//! Project level operations shared by the CLI and embedders.
//! No terminal or UI dependencies.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::bom::Bom;
use crate::cache::{CacheError, ComponentCache, FileBackend, StoreOutcome};
use crate::designator::InvalidDesignator;
use crate::parser::{ParseError, RewriteError, SaveReport, SchematicParser, SchematicWriter};
use crate::rounding::RoundingError;
use crate::schematic::{DocumentError, SchematicDocument, SupplierData, UserField};
use crate::settings::{ProjectSettings, SettingsError};

#[derive(Debug, thiserror::Error)]
pub enum BomkitError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Designator(#[from] InvalidDesignator),
    #[error(transparent)]
    Rounding(#[from] RoundingError),
}

/// A parsed project with its settings.
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory holding the settings and, by default, the cache file.
    pub directory: PathBuf,
    pub settings: ProjectSettings,
    pub document: SchematicDocument,
}

impl Project {
    pub fn cache_path(&self) -> PathBuf {
        self.settings.cache_path(&self.directory)
    }

    pub fn bom(&self) -> Bom {
        Bom::from_document(&self.document, &self.settings)
    }
}

/// What happened to the cache during [`BomkitCore::assign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    Stored(StoreOutcome),
    /// The selection mixes parts; the data was assigned but not cached.
    Ambiguous(Vec<String>),
    /// The assigned data was empty.
    NothingToStore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignReport {
    pub updated: usize,
    pub cache: CacheOutcome,
}

/// Cached candidates for a component without supplier data.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub key: String,
    pub candidates: Vec<(String, SupplierData)>,
}

pub struct BomkitCore;

impl BomkitCore {
    /// Directory a project root resolves to.
    pub fn project_dir(root: &Path) -> PathBuf {
        if root.is_dir() {
            root.to_path_buf()
        } else {
            root.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }

    pub fn parse(root: &Path) -> Result<SchematicDocument, BomkitError> {
        Ok(SchematicParser::parse(root)?)
    }

    /// Parse a project and load its settings. Rows disabled in the settings
    /// are disabled in the document.
    pub fn open_project(root: &Path) -> Result<Project, BomkitError> {
        let directory = Self::project_dir(root);
        let settings = ProjectSettings::load_for_project(&directory)?;
        let mut document = SchematicParser::parse(root)?;
        for key in &settings.disabled {
            if document.set_enabled(key, false).is_err() {
                tracing::warn!("Disabled component {} is not in the schematic", key);
            }
        }
        Ok(Project {
            directory,
            settings,
            document,
        })
    }

    pub fn save(document: &SchematicDocument) -> Result<SaveReport, BomkitError> {
        Ok(SchematicWriter::save(document)?)
    }

    pub fn open_cache(project: &Project) -> Result<ComponentCache, BomkitError> {
        Ok(ComponentCache::open(FileBackend::new(project.cache_path()))?)
    }

    /// Assign `data` to the given components and remember it in the cache.
    ///
    /// Every user field is replaced; fields absent from `data` are cleared.
    /// A selection whose components differ in library reference, value or
    /// footprint is assigned but not cached.
    pub fn assign<S: AsRef<str>>(
        document: &mut SchematicDocument,
        cache: &mut ComponentCache,
        keys: &[S],
        data: &SupplierData,
    ) -> Result<AssignReport, BomkitError> {
        let updates: Vec<(UserField, String)> = UserField::ALL
            .iter()
            .map(|f| (*f, data.get(*f).unwrap_or("").to_string()))
            .collect();
        let updated = document.update_component(keys, &updates)?;

        let records: Vec<_> = keys
            .iter()
            .filter_map(|k| document.get_component(k.as_ref()))
            .collect();
        let cache_outcome = match cache.store(&records, data) {
            Ok(outcome) => CacheOutcome::Stored(outcome),
            Err(CacheError::AmbiguousSelection { triples }) => CacheOutcome::Ambiguous(triples),
            Err(CacheError::EmptyRecord) => CacheOutcome::NothingToStore,
            Err(e) => return Err(e.into()),
        };
        Ok(AssignReport {
            updated,
            cache: cache_outcome,
        })
    }

    /// Cached supplier data for enabled components that have none yet.
    pub fn suggest(document: &SchematicDocument, cache: &ComponentCache) -> Vec<Suggestion> {
        document
            .components()
            .filter(|r| document.is_enabled(&r.key()) && r.supplier_data().is_empty())
            .filter_map(|r| {
                let (library_reference, value, footprint) = r.triple();
                let candidates: Vec<(String, SupplierData)> = cache
                    .lookup(library_reference, value, footprint)
                    .into_iter()
                    .map(|(hash, data)| (hash.to_string(), data.clone()))
                    .collect();
                if candidates.is_empty() {
                    None
                } else {
                    Some(Suggestion {
                        key: r.key(),
                        candidates,
                    })
                }
            })
            .collect()
    }

    /// Row keys of enabled components without a supplier order number.
    pub fn unassigned(document: &SchematicDocument) -> Vec<String> {
        document
            .components()
            .filter(|r| document.is_enabled(&r.key()) && r.supplier_number.is_none())
            .map(|r| r.key())
            .collect()
    }
}
