// Catalog Assembler: walks the requested cross product, fetches and
// normalizes each tuple through a StatsSource with bounded concurrency, and
// merges successes into a fresh catalog while recording every failure.

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogMetadata};
use crate::model::{DataType, League, Season, SelectionKey, StatType};
use crate::source::{fetch_table, FetchFailure, RetryPolicy, StatsSource};
use crate::table::StatTable;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("build cancelled after {completed} of {total} tuples")]
    Cancelled { completed: usize, total: usize },

    #[error("a build is already running")]
    AlreadyRunning,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Dimensions to fetch. Stat types default to each data type's full family
/// unless overridden.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildRequest {
    pub leagues: BTreeSet<League>,
    pub seasons: BTreeSet<Season>,
    pub data_types: BTreeSet<DataType>,
    pub stat_overrides: BTreeMap<DataType, Vec<StatType>>,
}

impl BuildRequest {
    pub fn new(
        leagues: impl IntoIterator<Item = League>,
        seasons: impl IntoIterator<Item = Season>,
        data_types: impl IntoIterator<Item = DataType>,
    ) -> Self {
        Self {
            leagues: leagues.into_iter().collect(),
            seasons: seasons.into_iter().collect(),
            data_types: data_types.into_iter().collect(),
            stat_overrides: BTreeMap::new(),
        }
    }

    /// Restrict one data type to the given stat types. Ignored for schedules.
    pub fn with_stat_types(
        mut self,
        data_type: DataType,
        stats: impl IntoIterator<Item = StatType>,
    ) -> Self {
        if data_type.takes_stat() {
            let mut list: Vec<StatType> = Vec::new();
            for stat in stats {
                if !list.contains(&stat) {
                    list.push(stat);
                }
            }
            self.stat_overrides.insert(data_type, list);
        }
        self
    }

    /// Stat dimension enumerated for one data type.
    fn stat_dimension(&self, data_type: DataType) -> Vec<Option<StatType>> {
        if !data_type.takes_stat() {
            return vec![None];
        }
        match self.stat_overrides.get(&data_type) {
            Some(list) => list.iter().copied().map(Some).collect(),
            None => data_type.stat_types().iter().copied().map(Some).collect(),
        }
    }

    /// Every tuple to fetch: league, then season, then data type, then stat
    /// type in family order.
    pub fn keys(&self) -> Vec<SelectionKey> {
        let mut keys = Vec::new();
        for &league in &self.leagues {
            for season in &self.seasons {
                for &data_type in &self.data_types {
                    for stat in self.stat_dimension(data_type) {
                        keys.push(SelectionKey::new(league, season.clone(), data_type, stat));
                    }
                }
            }
        }
        keys
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared flag checked by the assembler between tuples.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerOptions {
    /// Maximum tuples in flight at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            concurrency: 2,
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of a completed (not cancelled) build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub catalog: Catalog,
    pub failures: Vec<FetchFailure>,
    pub attempted: usize,
    pub succeeded: usize,
    pub completed_at: DateTime<Utc>,
}

impl BuildOutcome {
    pub fn metadata(&self) -> CatalogMetadata {
        CatalogMetadata::describe(&self.catalog, self.completed_at)
    }
}

pub struct Assembler<S> {
    source: S,
    options: AssemblerOptions,
    running: Mutex<()>,
}

impl<S: StatsSource> Assembler<S> {
    pub fn new(source: S, options: AssemblerOptions) -> Self {
        Self {
            source,
            options,
            running: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    /// Build a new catalog from scratch.
    pub async fn build(
        &self,
        request: &BuildRequest,
        cancel: &CancelToken,
    ) -> Result<BuildOutcome, BuildError> {
        self.assemble(Catalog::new(), request, cancel).await
    }

    /// Build on top of a copy of `previous`. Fetched keys replace existing
    /// entries; everything else is carried over.
    pub async fn rebuild(
        &self,
        previous: &Catalog,
        request: &BuildRequest,
        cancel: &CancelToken,
    ) -> Result<BuildOutcome, BuildError> {
        self.assemble(previous.clone(), request, cancel).await
    }

    async fn assemble(
        &self,
        mut catalog: Catalog,
        request: &BuildRequest,
        cancel: &CancelToken,
    ) -> Result<BuildOutcome, BuildError> {
        let _running = self
            .running
            .try_lock()
            .map_err(|_| BuildError::AlreadyRunning)?;

        let keys = request.keys();
        let total = keys.len();
        let concurrency = self.options.concurrency.max(1);
        info!(
            source = self.source.name(),
            tuples = total,
            concurrency,
            "Starting catalog build"
        );

        let mut results = stream::iter(keys.into_iter().map(move |key| async move {
            if cancel.is_cancelled() {
                return None;
            }
            let result = self.fetch_one(&key, cancel).await;
            Some((key, result))
        }))
        .buffered(concurrency);

        let mut completed = 0;
        let mut succeeded = 0;
        let mut failures = Vec::new();

        // Single writer: results arrive here in request order.
        while let Some(item) = results.next().await {
            let Some((key, result)) = item else {
                break;
            };
            match result {
                Ok(table) => {
                    debug!(%key, rows = table.num_rows(), "merged table");
                    catalog.insert(&key, table);
                    succeeded += 1;
                }
                Err(failure) => {
                    warn!("{}", failure);
                    failures.push(failure);
                }
            }
            completed += 1;
            if cancel.is_cancelled() && completed < total {
                break;
            }
        }

        if completed < total {
            warn!(completed, total, "Catalog build cancelled");
            return Err(BuildError::Cancelled { completed, total });
        }

        info!(
            attempted = total,
            succeeded,
            failed = failures.len(),
            "Catalog build finished"
        );

        Ok(BuildOutcome {
            catalog,
            failures,
            attempted: total,
            succeeded,
            completed_at: Utc::now(),
        })
    }

    /// Fetch one tuple, retrying rate-limited attempts with backoff.
    async fn fetch_one(
        &self,
        key: &SelectionKey,
        cancel: &CancelToken,
    ) -> Result<StatTable, FetchFailure> {
        let retry = self.options.retry;
        let mut attempt = 1;
        loop {
            match fetch_table(&self.source, key).await {
                Ok(table) => return Ok(table),
                Err(mut failure) => {
                    failure.attempts = attempt;
                    if !retry.should_retry(&failure, attempt) || cancel.is_cancelled() {
                        return Err(failure);
                    }
                    let delay = retry.backoff(attempt);
                    warn!(
                        %key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
