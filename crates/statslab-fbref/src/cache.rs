// On-disk page cache so repeated builds do not re-download unchanged pages.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::debug;

/// Platform cache directory for FBref pages, e.g. `~/.cache/statslab/fbref`.
pub fn default_cache_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "statslab").map(|dirs| dirs.cache_dir().join("fbref"))
}

#[derive(Debug, Clone)]
pub struct PageCache {
    dir: PathBuf,
    max_age: Duration,
}

impl PageCache {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the page for `url`.
    pub fn path_for(&self, url: &str) -> PathBuf {
        let trimmed = url
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let name: String = trimmed
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.html"))
    }

    /// Cached body of `url` if present and younger than the maximum age.
    pub async fn get(&self, url: &str) -> Option<String> {
        let path = self.path_for(url);
        let modified = tokio::fs::metadata(&path).await.ok()?.modified().ok()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age >= self.max_age {
            debug!(url, age_secs = age.as_secs(), "cached page is stale");
            return None;
        }
        tokio::fs::read_to_string(&path).await.ok()
    }

    pub async fn put(&self, url: &str, body: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(url);
        let tmp = path.with_extension("html.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_flat() {
        let cache = PageCache::new("/tmp/c", Duration::from_secs(60));
        assert_eq!(
            cache.path_for("https://fbref.com/en/comps/9/2023-2024/stats/2023-2024-Premier-League-Stats"),
            PathBuf::from(
                "/tmp/c/fbref_com_en_comps_9_2023-2024_stats_2023-2024-Premier-League-Stats.html"
            )
        );
    }

    #[tokio::test]
    async fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path().join("pages"), Duration::from_secs(3600));
        assert_eq!(cache.get("https://fbref.com/a").await, None);

        cache.put("https://fbref.com/a", "<html>a</html>").await.unwrap();
        assert_eq!(
            cache.get("https://fbref.com/a").await.as_deref(),
            Some("<html>a</html>")
        );
    }

    #[tokio::test]
    async fn zero_max_age_never_hits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PageCache::new(dir.path(), Duration::ZERO);
        cache.put("https://fbref.com/a", "x").await.unwrap();
        assert_eq!(cache.get("https://fbref.com/a").await, None);
    }
}
