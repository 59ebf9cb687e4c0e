// Catalog persistence: atomic write-then-rename of the JSON artifact and its
// metadata sidecar, plus the lock file that keeps rebuilds single-flight.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogMetadata};

/// Suffix of the metadata sidecar written next to the artifact.
pub const METADATA_SUFFIX: &str = ".metadata.json";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WriteFailure {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize catalog: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another build holds {path}; remove it if no build is running")]
    Held { path: PathBuf },

    #[error("failed to create lock file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Persist
// ---------------------------------------------------------------------------

/// Borrowed view with the same layout as `CatalogDocument`.
#[derive(Serialize)]
struct DocumentRef<'a> {
    metadata: &'a CatalogMetadata,
    #[serde(flatten)]
    catalog: &'a Catalog,
}

/// What `persist` wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedArtifact {
    pub path: PathBuf,
    pub metadata_path: PathBuf,
    pub bytes: u64,
}

/// Write the catalog to `path` atomically, then refresh its metadata
/// sidecar (`<stem>.metadata.json`) in the same directory.
///
/// Readers of `path` see either the previous artifact or the complete new
/// one. On failure the previous artifact is left untouched.
pub fn persist(
    catalog: &Catalog,
    metadata: &CatalogMetadata,
    path: &Path,
) -> Result<PersistedArtifact, WriteFailure> {
    let payload = serde_json::to_vec(&DocumentRef { metadata, catalog })?;
    let sidecar = serde_json::to_vec_pretty(metadata)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| WriteFailure::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    write_atomic(path, &payload)?;

    let metadata_path = sidecar_path(path);
    write_atomic(&metadata_path, &sidecar)?;

    info!(
        "Catalog written to {} ({} tables, {} bytes)",
        path.display(),
        catalog.len(),
        payload.len()
    );

    Ok(PersistedArtifact {
        path: path.to_path_buf(),
        metadata_path,
        bytes: payload.len() as u64,
    })
}

/// Location of the metadata sidecar for an artifact path. Always differs
/// from `artifact`, so artifacts sharing a directory keep separate sidecars.
pub fn sidecar_path(artifact: &Path) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog".to_string());
    artifact.with_file_name(format!("{stem}{METADATA_SUFFIX}"))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

/// Write to a temporary sibling, flush to disk, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), WriteFailure> {
    let tmp = temp_path(path);
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)
    })();

    result.map_err(|e| {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove temporary file {}: {}", tmp.display(), cleanup);
            }
        }
        WriteFailure::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

// ---------------------------------------------------------------------------
// Build lock
// ---------------------------------------------------------------------------

/// Exclusive marker for an in-flight rebuild of one artifact. Released when
/// dropped.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    /// Create `<artifact>.lock`. Fails with `LockError::Held` if it exists.
    pub fn acquire(artifact: &Path) -> Result<Self, LockError> {
        let path = lock_path(artifact);
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| LockError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // Owner pid is informational only.
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(LockError::Held { path })
            }
            Err(e) => Err(LockError::Io { path, source: e }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to release build lock {}: {}", self.path.display(), e);
        }
    }
}

pub fn lock_path(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "catalog".into());
    name.push(".lock");
    artifact.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogDocument;
    use crate::model::{DataType, League, Season, SelectionKey, StatType};
    use crate::table::{Cell, Row, StatTable};
    use chrono::Utc;

    fn sample_catalog(rows: usize) -> Catalog {
        let mut catalog = Catalog::new();
        let key = SelectionKey::new(
            League::Epl,
            Season::parse("2324").unwrap(),
            DataType::Team,
            Some(StatType::Shooting),
        );
        let mut table = StatTable::new(vec!["team".into(), "Sh".into()]);
        for i in 0..rows {
            let mut row = Row::new();
            row.insert("team".into(), Cell::Text(format!("Team {i}")));
            row.insert("Sh".into(), Cell::Number(i as f64));
            table.rows.push(row);
        }
        catalog.insert(&key, table);
        catalog
    }

    #[test]
    fn persist_writes_document_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("football_data.json");
        let catalog = sample_catalog(3);
        let meta = CatalogMetadata::describe(&catalog, Utc::now());

        let written = persist(&catalog, &meta, &path).unwrap();
        assert_eq!(written.path, path);
        assert_eq!(written.metadata_path, dir.path().join("data/football_data.metadata.json"));

        let doc: CatalogDocument =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc.catalog, catalog);
        assert_eq!(doc.metadata, meta);

        let sidecar: CatalogMetadata =
            serde_json::from_slice(&fs::read(&written.metadata_path).unwrap()).unwrap();
        assert_eq!(sidecar, meta);
    }

    #[test]
    fn persist_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let catalog = sample_catalog(1);
        persist(&catalog, &CatalogMetadata::default(), &path).unwrap();
        persist(&catalog, &CatalogMetadata::default(), &path).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["catalog.json", "catalog.metadata.json"]);
    }

    #[test]
    fn artifact_named_like_a_sidecar_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let catalog = sample_catalog(1);
        let meta = CatalogMetadata::describe(&catalog, Utc::now());

        let written = persist(&catalog, &meta, &path).unwrap();
        assert_ne!(written.metadata_path, path);

        let doc: CatalogDocument =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc.catalog, catalog);
    }

    #[test]
    fn artifacts_in_one_directory_keep_their_own_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let small = sample_catalog(1);
        let large = sample_catalog(4);
        let small_meta = CatalogMetadata::describe(&small, Utc::now());
        let large_meta = CatalogMetadata::default();

        let a = persist(&small, &small_meta, &dir.path().join("epl.json")).unwrap();
        let b = persist(&large, &large_meta, &dir.path().join("laliga.json")).unwrap();
        assert_ne!(a.metadata_path, b.metadata_path);

        let sidecar: CatalogMetadata =
            serde_json::from_slice(&fs::read(&a.metadata_path).unwrap()).unwrap();
        assert_eq!(sidecar, small_meta);
    }

    #[test]
    fn failed_write_keeps_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let first = sample_catalog(2);
        persist(&first, &CatalogMetadata::default(), &path).unwrap();
        let before = fs::read(&path).unwrap();

        // A directory squatting on the temp path makes the artifact write fail.
        let blocker = temp_path(&path);
        fs::create_dir_all(blocker.join("x")).unwrap();

        let err = persist(&sample_catalog(9), &CatalogMetadata::default(), &path).unwrap_err();
        assert!(matches!(err, WriteFailure::Io { .. }));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("catalog.json");

        let lock = BuildLock::acquire(&artifact).unwrap();
        assert_eq!(lock.path(), dir.path().join("catalog.json.lock"));
        assert!(matches!(
            BuildLock::acquire(&artifact),
            Err(LockError::Held { .. })
        ));

        drop(lock);
        assert!(!dir.path().join("catalog.json.lock").exists());
        assert!(BuildLock::acquire(&artifact).is_ok());
    }

    #[test]
    fn readers_never_see_a_torn_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let seed = sample_catalog(1);
        persist(&seed, &CatalogMetadata::describe(&seed, Utc::now()), &path).unwrap();

        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            for n in 1..40 {
                let catalog = sample_catalog(n * 25);
                let meta = CatalogMetadata::describe(&catalog, Utc::now());
                persist(&catalog, &meta, &writer_path).unwrap();
            }
        });

        let mut reads = 0;
        while !writer.is_finished() || reads == 0 {
            let bytes = fs::read(&path).unwrap();
            let doc: CatalogDocument = serde_json::from_slice(&bytes)
                .expect("reader observed a partially written artifact");
            // Metadata always describes the content it ships with.
            assert!(doc.metadata.last_updated.is_some());
            assert_eq!(
                doc.metadata.leagues.iter().cloned().collect::<Vec<_>>(),
                vec!["epl".to_string()]
            );
            assert!(doc.catalog.tables["epl_2324"]["team:shooting"].is_consistent());
            reads += 1;
        }
        writer.join().unwrap();
        assert!(reads > 0);
    }
}
