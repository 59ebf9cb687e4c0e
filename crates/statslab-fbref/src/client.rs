// FBref source adapter: throttled HTTP fetches with an optional page cache,
// turned into raw tables for the catalog assembler.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info, warn};

use statslab_core::model::{DataType, SelectionKey, StatType};
use statslab_core::normalize::ColumnMap;
use statslab_core::source::{FailureReason, FetchFailure, RawTable, StatsSource, Throttle};

use crate::cache::PageCache;
use crate::extract;
use crate::html::{self, HtmlError};
use crate::mapping::fbref_column_map;
use crate::urls;

pub const DEFAULT_USER_AGENT: &str = concat!("statslab/", env!("CARGO_PKG_VERSION"));

/// FBref asks scrapers to stay under ten requests a minute.
pub const DEFAULT_MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(7);

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    pub dir: PathBuf,
    pub max_age: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FbrefOptions {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub min_request_interval: Duration,
    /// Cap on match reports fetched per player-match selection.
    pub max_matches: Option<usize>,
    pub cache: Option<CacheOptions>,
}

impl Default for FbrefOptions {
    fn default() -> Self {
        Self {
            base_url: urls::DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            min_request_interval: DEFAULT_MIN_REQUEST_INTERVAL,
            max_matches: None,
            cache: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FbrefError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

/// `None` for success; 429 is a rate limit, every other status a network
/// failure.
pub fn classify_status(status: StatusCode) -> Option<FailureReason> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Some(FailureReason::RateLimited)
    } else {
        Some(FailureReason::Network)
    }
}

fn request_failure(key: &SelectionKey, url: &str, err: &reqwest::Error) -> FetchFailure {
    let detail = if err.is_timeout() {
        format!("timed out fetching {url}")
    } else if err.is_connect() {
        format!("could not connect to {url}: {err}")
    } else {
        format!("request to {url} failed: {err}")
    };
    FetchFailure::new(key.clone(), FailureReason::Network, detail)
}

fn parse_failure(key: &SelectionKey, url: &str, err: HtmlError) -> FetchFailure {
    FetchFailure::new(key.clone(), FailureReason::Parse, format!("{err} ({url})"))
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

pub struct FbrefSource {
    http: reqwest::Client,
    options: FbrefOptions,
    throttle: Throttle,
    cache: Option<PageCache>,
    map: ColumnMap,
}

impl FbrefSource {
    pub fn new(options: FbrefOptions) -> Result<Self, FbrefError> {
        let http = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .build()?;
        let cache = options
            .cache
            .as_ref()
            .map(|c| PageCache::new(c.dir.clone(), c.max_age));
        Ok(Self {
            http,
            throttle: Throttle::new(options.min_request_interval),
            cache,
            map: fbref_column_map(),
            options,
        })
    }

    pub fn options(&self) -> &FbrefOptions {
        &self.options
    }

    /// Page body with comment markers removed. Cache hits skip the throttle.
    async fn page(&self, key: &SelectionKey, url: &str) -> Result<String, FetchFailure> {
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.get(url).await {
                debug!(url, "page cache hit");
                return Ok(html::uncomment(&body));
            }
        }

        self.throttle.wait().await;
        debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| request_failure(key, url, &e))?;

        let status = response.status();
        if let Some(reason) = classify_status(status) {
            return Err(FetchFailure::new(
                key.clone(),
                reason,
                format!("HTTP {} from {url}", status.as_u16()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| request_failure(key, url, &e))?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(url, &body).await {
                warn!("failed to cache {}: {}", url, e);
            }
        }
        Ok(html::uncomment(&body))
    }

    fn stat(key: &SelectionKey) -> Result<StatType, FetchFailure> {
        key.stat_type.ok_or_else(|| {
            FetchFailure::new(
                key.clone(),
                FailureReason::UnsupportedStat,
                format!("{} requires a stat type", key.data_type),
            )
        })
    }

    async fn season_table(&self, key: &SelectionKey) -> Result<RawTable, FetchFailure> {
        let stat = Self::stat(key)?;
        let url = urls::season_stats_url(&self.options.base_url, key.league, &key.season, stat);
        let page = self.page(key, &url).await?;
        extract::season_table(&page, key.data_type, stat).map_err(|e| parse_failure(key, &url, e))
    }

    async fn schedule(&self, key: &SelectionKey) -> Result<html::HtmlTable, FetchFailure> {
        let url = urls::schedule_url(&self.options.base_url, key.league, &key.season);
        let page = self.page(key, &url).await?;
        extract::schedule_table(&page).map_err(|e| parse_failure(key, &url, e))
    }

    async fn schedule_table(&self, key: &SelectionKey) -> Result<RawTable, FetchFailure> {
        let table = self.schedule(key).await?;
        Ok(extract::schedule_raw(&table, &self.options.base_url))
    }

    /// Per-player rows from every played match report, in schedule order.
    async fn player_match_table(&self, key: &SelectionKey) -> Result<RawTable, FetchFailure> {
        let stat = Self::stat(key)?;
        let schedule = self.schedule(key).await?;
        let mut matches = extract::played_matches(&schedule, &self.options.base_url);
        if let Some(cap) = self.options.max_matches {
            matches.truncate(cap);
        }
        info!(%key, matches = matches.len(), "Fetching match reports");

        let mut combined = RawTable::default();
        for (i, m) in matches.iter().enumerate() {
            let page = self.page(key, &m.report_url).await?;
            let raw = extract::match_stat_tables(&page, stat, &m.game)
                .map_err(|e| parse_failure(key, &m.report_url, e))?;
            if i == 0 {
                combined = raw;
            } else {
                combined.append(raw);
            }
        }
        Ok(combined)
    }
}

#[async_trait]
impl StatsSource for FbrefSource {
    fn name(&self) -> &str {
        "fbref"
    }

    fn column_map(&self) -> &ColumnMap {
        &self.map
    }

    async fn fetch_raw(&self, key: &SelectionKey) -> Result<RawTable, FetchFailure> {
        let mut raw = match key.data_type {
            DataType::Team | DataType::Player => self.season_table(key).await?,
            DataType::Schedule => self.schedule_table(key).await?,
            DataType::PlayerMatch => self.player_match_table(key).await?,
        };
        raw.prepend_constant("season", key.season.as_str());
        raw.prepend_constant("league", key.league.provider_id());
        Ok(raw)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(FailureReason::RateLimited)
        );
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE),
            Some(FailureReason::Network)
        );
        assert_eq!(classify_status(StatusCode::NOT_FOUND), Some(FailureReason::Network));
    }

    #[test]
    fn defaults_respect_site_rate_limit() {
        let opts = FbrefOptions::default();
        assert_eq!(opts.base_url, "https://fbref.com");
        assert!(opts.min_request_interval >= Duration::from_secs(6));
        assert!(opts.user_agent.starts_with("statslab/"));
        assert!(opts.cache.is_none());
    }
}
