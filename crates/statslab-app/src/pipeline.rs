// Build pipeline: lock the artifact, assemble the catalog, persist it, and
// summarize the run for the operator.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use statslab_core::assemble::{
    Assembler, AssemblerOptions, BuildError, BuildOutcome, BuildRequest, CancelToken,
};
use statslab_core::catalog::Catalog;
use statslab_core::query::{load_document, LoadError};
use statslab_core::source::StatsSource;
use statslab_core::writer::{persist, BuildLock, LockError, PersistedArtifact, WriteFailure};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("failed to load the existing catalog for merging: {0}")]
    Previous(#[source] LoadError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("failed to write the catalog: {0}")]
    Write(#[from] WriteFailure),

    #[error(
        "all {} tuples failed; kept the existing catalog at {}",
        outcome.attempted,
        path.display()
    )]
    NothingFetched {
        path: PathBuf,
        outcome: Box<BuildOutcome>,
    },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineSettings<'a> {
    pub request: &'a BuildRequest,
    pub assembler: AssemblerOptions,
    pub catalog_path: &'a Path,
    /// Start from the existing artifact instead of an empty catalog.
    pub merge_existing: bool,
    /// Overwrite an existing artifact even when no tuple succeeded.
    pub replace_on_total_failure: bool,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub outcome: BuildOutcome,
    pub artifact: PersistedArtifact,
    /// Whether the build started from a previous artifact.
    pub merged: bool,
}

/// Existing catalog to merge onto, if there is one.
fn previous_catalog(path: &Path) -> Result<Option<Catalog>, PipelineError> {
    if !path.exists() {
        info!("No existing catalog at {}; building from scratch", path.display());
        return Ok(None);
    }
    let document = load_document(path).map_err(PipelineError::Previous)?;
    info!(
        "Merging onto existing catalog at {} ({} tables)",
        path.display(),
        document.catalog.len()
    );
    Ok(Some(document.catalog))
}

/// Run one full build. A cancelled or failed build leaves the previous
/// artifact untouched.
pub async fn run_build<S: StatsSource>(
    source: S,
    settings: PipelineSettings<'_>,
    cancel: &CancelToken,
) -> Result<PipelineReport, PipelineError> {
    let lock = BuildLock::acquire(settings.catalog_path)?;

    let previous = if settings.merge_existing {
        previous_catalog(settings.catalog_path)?
    } else {
        None
    };
    let merged = previous.is_some();

    let assembler = Assembler::new(source, settings.assembler);
    let outcome = match &previous {
        Some(catalog) => assembler.rebuild(catalog, settings.request, cancel).await?,
        None => assembler.build(settings.request, cancel).await?,
    };

    if outcome.succeeded == 0 && outcome.attempted > 0 {
        warn!(attempted = outcome.attempted, "No tuple was fetched successfully");
        // A wholesale rebuild would replace the last good artifact with nothing.
        if !merged && !settings.replace_on_total_failure && settings.catalog_path.exists() {
            return Err(PipelineError::NothingFetched {
                path: settings.catalog_path.to_path_buf(),
                outcome: Box::new(outcome),
            });
        }
    }

    let artifact = persist(&outcome.catalog, &outcome.metadata(), settings.catalog_path)?;
    drop(lock);

    Ok(PipelineReport {
        outcome,
        artifact,
        merged,
    })
}

// ---------------------------------------------------------------------------
// Operator report
// ---------------------------------------------------------------------------

/// Plain-text summary listing every failed tuple.
pub fn render_report(report: &PipelineReport) -> String {
    let outcome = &report.outcome;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Catalog written to {} ({} bytes{})",
        report.artifact.path.display(),
        report.artifact.bytes,
        if report.merged { ", merged onto previous" } else { "" }
    );
    let _ = writeln!(
        out,
        "Tuples: {} attempted, {} succeeded, {} failed",
        outcome.attempted,
        outcome.succeeded,
        outcome.failures.len()
    );
    let _ = writeln!(
        out,
        "Catalog holds {} tables; completed at {}",
        outcome.catalog.len(),
        outcome.completed_at.to_rfc3339()
    );

    out.push_str(&render_failures(outcome));
    out
}

/// The `Failures:` block of the report; empty when nothing failed.
pub fn render_failures(outcome: &BuildOutcome) -> String {
    let mut out = String::new();
    if !outcome.failures.is_empty() {
        let _ = writeln!(out, "Failures:");
        for failure in &outcome.failures {
            let _ = writeln!(
                out,
                "  {} [{}] after {} attempt(s): {}",
                failure.key, failure.reason, failure.attempts, failure.detail
            );
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
