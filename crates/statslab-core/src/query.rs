// Query Facade: read-only lookups against a persisted catalog snapshot.
//
// The artifact is loaded at most once per facade and never triggers a
// fetch. A missing key is an ordinary `Lookup::NotFound`; only a failure to
// load the artifact itself is an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::info;

use crate::catalog::{Catalog, CatalogDocument, CatalogMetadata};
use crate::model::{League, Season, SelectionKey};
use crate::table::StatTable;

/// Shown when a selection has no table in the catalog.
pub const NO_DATA_MESSAGE: &str =
    "No data available for this selection. Try a different league, season or data type.";

/// Shown when the catalog itself could not be loaded.
pub const LOAD_FAILURE_MESSAGE: &str = "Failed to load data. Please try again later.";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl LoadError {
    /// Generic text for the presentation layer; details belong in logs.
    pub fn user_message(&self) -> &'static str {
        LOAD_FAILURE_MESSAGE
    }
}

// ---------------------------------------------------------------------------
// Pure lookup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Found(&'a StatTable),
    NotFound,
}

impl<'a> Lookup<'a> {
    pub fn table(&self) -> Option<&'a StatTable> {
        match *self {
            Lookup::Found(t) => Some(t),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// User-facing message, if the result needs one.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Lookup::Found(_) => None,
            Lookup::NotFound => Some(NO_DATA_MESSAGE),
        }
    }
}

/// Direct key lookup against a catalog snapshot.
pub fn lookup<'a>(catalog: &'a Catalog, key: &SelectionKey) -> Lookup<'a> {
    match catalog.get(key) {
        Some(table) => Lookup::Found(table),
        None => Lookup::NotFound,
    }
}

pub fn load_document(path: &Path) -> Result<CatalogDocument, LoadError> {
    let bytes = fs::read(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

/// Lazily loaded, process-lifetime view of one catalog artifact.
#[derive(Debug)]
pub struct QueryFacade {
    path: PathBuf,
    snapshot: OnceLock<CatalogDocument>,
}

impl QueryFacade {
    /// Point the facade at an artifact. Nothing is read until first use.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: OnceLock::new(),
        }
    }

    /// Facade over an already-loaded document.
    pub fn from_document(document: CatalogDocument) -> Self {
        let snapshot = OnceLock::new();
        let _ = snapshot.set(document);
        Self {
            path: PathBuf::new(),
            snapshot,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The loaded document. A failed load is not remembered, so the next
    /// call tries again.
    pub fn snapshot(&self) -> Result<&CatalogDocument, LoadError> {
        if let Some(doc) = self.snapshot.get() {
            return Ok(doc);
        }
        let doc = load_document(&self.path)?;
        info!(
            "Loaded catalog from {} ({} tables)",
            self.path.display(),
            doc.catalog.len()
        );
        Ok(self.snapshot.get_or_init(|| doc))
    }

    pub fn lookup(&self, key: &SelectionKey) -> Result<Lookup<'_>, LoadError> {
        Ok(lookup(&self.snapshot()?.catalog, key))
    }

    /// Concatenate every selection that exists. `None` when none do.
    pub fn lookup_many(&self, keys: &[SelectionKey]) -> Result<Option<StatTable>, LoadError> {
        let catalog = &self.snapshot()?.catalog;
        let found: Vec<&StatTable> = keys
            .iter()
            .filter_map(|k| lookup(catalog, k).table())
            .collect();
        if found.is_empty() {
            Ok(None)
        } else {
            Ok(Some(StatTable::concat(found)))
        }
    }

    pub fn metadata(&self) -> Result<&CatalogMetadata, LoadError> {
        Ok(&self.snapshot()?.metadata)
    }

    pub fn teams(&self, league: League, season: &Season) -> Result<Vec<String>, LoadError> {
        Ok(self.snapshot()?.catalog.teams(league, season))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
