// Source adapter seam: the raw pre-normalization table shape, typed fetch
// failures, and the throttling/retry primitives every adapter shares.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::model::SelectionKey;
use crate::normalize::{normalize, ColumnMap};
use crate::table::StatTable;

// ---------------------------------------------------------------------------
// Raw tables
// ---------------------------------------------------------------------------

/// How the provider typed a column before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

/// One provider column: its header levels (outermost group first), an
/// optional provider-specific identifier, and the provider's type hint.
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub levels: Vec<String>,
    pub source_id: Option<String>,
    pub kind: ColumnKind,
}

impl RawColumn {
    pub fn new(levels: &[&str], kind: ColumnKind) -> Self {
        Self {
            levels: levels.iter().map(|s| s.to_string()).collect(),
            source_id: None,
            kind,
        }
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }
}

/// Provider output before normalization. Each row holds cell text aligned
/// positionally with `columns`; short rows are treated as padded with empty
/// cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(columns: Vec<RawColumn>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Insert constant-valued text columns ahead of the provider columns.
    pub fn prepend_constant(&mut self, name: &str, value: &str) {
        self.columns
            .insert(0, RawColumn::new(&[name], ColumnKind::Text).with_source_id(name));
        for row in &mut self.rows {
            row.insert(0, value.to_string());
        }
    }

    /// Append `other`'s rows, aligning columns by provider id (or header
    /// levels when there is none). Columns only `other` has are added at the
    /// end; cells missing on either side are left empty. A column typed
    /// differently by the two tables becomes text.
    pub fn append(&mut self, other: RawTable) {
        let same = |a: &RawColumn, b: &RawColumn| match (&a.source_id, &b.source_id) {
            (Some(x), Some(y)) => x == y,
            _ => a.levels == b.levels,
        };

        let mut positions = Vec::with_capacity(other.columns.len());
        for col in other.columns {
            match self.columns.iter().position(|c| same(c, &col)) {
                Some(idx) => {
                    if self.columns[idx].kind != col.kind {
                        self.columns[idx].kind = ColumnKind::Text;
                    }
                    positions.push(idx);
                }
                None => {
                    self.columns.push(col);
                    positions.push(self.columns.len() - 1);
                }
            }
        }

        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        for row in other.rows {
            let mut aligned = vec![String::new(); width];
            for (cell, &idx) in row.into_iter().zip(&positions) {
                aligned[idx] = cell;
            }
            self.rows.push(aligned);
        }
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Network,
    Parse,
    RateLimited,
    UnsupportedStat,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureReason::Network => "network",
            FailureReason::Parse => "parse",
            FailureReason::RateLimited => "rate_limited",
            FailureReason::UnsupportedStat => "unsupported_stat",
        })
    }
}

/// A tuple that could not be fetched. Recorded by the assembler, never
/// written into the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{key}: {reason} after {attempts} attempt(s): {detail}")]
pub struct FetchFailure {
    pub key: SelectionKey,
    pub reason: FailureReason,
    pub detail: String,
    pub attempts: u32,
}

impl FetchFailure {
    pub fn new(key: SelectionKey, reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            key,
            reason,
            detail: detail.into(),
            attempts: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// The adapter trait
// ---------------------------------------------------------------------------

/// A provider of raw statistics tables.
///
/// Implementations must report every provider problem as a `FetchFailure`
/// instead of panicking, so a build can move past a single bad tuple.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Provider column ids/names mapped to canonical column names.
    fn column_map(&self) -> &ColumnMap;

    /// Fetch the raw table for one supported selection.
    async fn fetch_raw(&self, key: &SelectionKey) -> Result<RawTable, FetchFailure>;
}

/// Validate, fetch and normalize one selection.
pub async fn fetch_table<S>(source: &S, key: &SelectionKey) -> Result<StatTable, FetchFailure>
where
    S: StatsSource + ?Sized,
{
    if !key.is_supported() {
        return Err(FetchFailure::new(
            key.clone(),
            FailureReason::UnsupportedStat,
            format!(
                "stat type {} is not available for {}",
                key.stat_type.map(|s| s.key()).unwrap_or("<none>"),
                key.data_type
            ),
        ));
    }
    let raw = source.fetch_raw(key).await?;
    debug!(
        source = source.name(),
        %key,
        rows = raw.rows.len(),
        columns = raw.columns.len(),
        "fetched raw table"
    );
    Ok(normalize(raw, source.column_map()))
}

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

/// Enforces a minimum delay between consecutive calls to one provider,
/// across all tasks sharing the throttle.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until this caller may issue its request. The lock is held while
    /// sleeping so waiters are released one interval apart.
    pub async fn wait(&self) {
        let mut next = self.next_slot.lock().await;
        if let Some(at) = *next {
            if at > Instant::now() {
                tokio::time::sleep_until(at).await;
            }
        }
        *next = Some(Instant::now() + self.min_interval);
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Bounded retries for rate-limited fetches with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exp)
    }

    pub fn should_retry(&self, failure: &FetchFailure, attempt: u32) -> bool {
        failure.reason == FailureReason::RateLimited && attempt < self.max_attempts
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
