// Configuration loading and parsing (statslab.toml).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use statslab_core::assemble::{AssemblerOptions, BuildRequest};
use statslab_core::model::{DataType, League, Season, StatType};
use statslab_core::source::RetryPolicy;
use statslab_fbref::cache::default_cache_dir;
use statslab_fbref::{CacheOptions, FbrefOptions};

pub const CONFIG_FILE_NAME: &str = "statslab.toml";

/// Copy of `defaults/statslab.toml` built into the binary.
pub const EMBEDDED_DEFAULT_CONFIG: &str = include_str!("../defaults/statslab.toml");

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub build: BuildConfig,
    pub source: SourceConfig,
    pub retry: RetryPolicy,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub leagues: Vec<League>,
    pub seasons: Vec<Season>,
    pub data_types: Vec<DataType>,
    pub concurrency: usize,
    pub stat_types: BTreeMap<DataType, Vec<StatType>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub base_url: String,
    pub user_agent: Option<String>,
    pub timeout: Duration,
    pub min_request_interval: Duration,
    pub max_matches: Option<usize>,
    pub cache: Option<CacheOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub catalog_path: PathBuf,
    pub merge_existing: bool,
    pub replace_on_total_failure: bool,
}

impl Config {
    pub fn build_request(&self) -> BuildRequest {
        self.build.stat_types.iter().fold(
            BuildRequest::new(
                self.build.leagues.iter().copied(),
                self.build.seasons.iter().cloned(),
                self.build.data_types.iter().copied(),
            ),
            |request, (data_type, stats)| request.with_stat_types(*data_type, stats.iter().copied()),
        )
    }

    pub fn assembler_options(&self) -> AssemblerOptions {
        AssemblerOptions {
            concurrency: self.build.concurrency,
            retry: self.retry,
        }
    }

    pub fn fbref_options(&self) -> FbrefOptions {
        let defaults = FbrefOptions::default();
        FbrefOptions {
            base_url: self.source.base_url.clone(),
            user_agent: self
                .source
                .user_agent
                .clone()
                .unwrap_or(defaults.user_agent),
            timeout: self.source.timeout,
            min_request_interval: self.source.min_request_interval,
            max_matches: self.source.max_matches,
            cache: self.source.cache.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// statslab.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire statslab.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    build: BuildSection,
    source: SourceSection,
    #[serde(default)]
    retry: RetrySection,
    output: OutputSection,
}

#[derive(Debug, Clone, Deserialize)]
struct BuildSection {
    leagues: Vec<String>,
    seasons: Vec<String>,
    data_types: Vec<String>,
    concurrency: usize,
    /// Per data type stat list, e.g. `player = ["standard", "shooting"]`.
    #[serde(default)]
    stat_types: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
struct SourceSection {
    base_url: String,
    #[serde(default)]
    user_agent: Option<String>,
    timeout_secs: u64,
    min_request_interval_ms: u64,
    #[serde(default)]
    max_matches: Option<usize>,
    #[serde(default)]
    use_cache: bool,
    #[serde(default)]
    cache_dir: Option<String>,
    #[serde(default = "default_cache_max_age_hours")]
    cache_max_age_hours: u64,
}

fn default_cache_max_age_hours() -> u64 {
    24
}

#[derive(Debug, Clone, Deserialize)]
struct RetrySection {
    max_attempts: u32,
    initial_backoff_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OutputSection {
    catalog_path: String,
    #[serde(default)]
    merge_existing: bool,
    #[serde(default)]
    replace_on_total_failure: bool,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/statslab.toml` relative to `base_dir`.
///
/// Relative paths in the file (catalog, cache) are resolved against
/// `base_dir`. Does not seed a missing file; see `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE_NAME);
    let text = read_file(&path)?;
    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let config = Config {
        build: parse_build(&file.build)?,
        source: parse_source(&file.source, base_dir)?,
        retry: RetryPolicy {
            max_attempts: file.retry.max_attempts,
            initial_backoff: Duration::from_millis(file.retry.initial_backoff_ms),
        },
        output: OutputConfig {
            catalog_path: resolve(base_dir, &file.output.catalog_path),
            merge_existing: file.output.merge_existing,
            replace_on_total_failure: file.output.replace_on_total_failure,
        },
    };

    validate(&config, &file.output)?;

    Ok(config)
}

/// Where `config/statslab.toml` came from after `seed_config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSeed {
    /// The file was already there and was left alone.
    Existing,
    /// Copied from `defaults/statslab.toml`.
    Defaults(PathBuf),
    /// Written from the copy built into the binary.
    Embedded,
}

/// Create `config/statslab.toml` under `base_dir` unless it exists. The seed
/// is `defaults/statslab.toml` when present, else `EMBEDDED_DEFAULT_CONFIG`.
/// An existing file is never overwritten.
pub fn seed_config(base_dir: &Path) -> Result<ConfigSeed, ConfigError> {
    let config_dir = base_dir.join("config");
    let target = config_dir.join(CONFIG_FILE_NAME);
    if target.exists() {
        return Ok(ConfigSeed::Existing);
    }

    let defaults = base_dir.join("defaults").join(CONFIG_FILE_NAME);
    let (text, seed) = if defaults.is_file() {
        let text = std::fs::read_to_string(&defaults).map_err(|e| {
            ConfigError::DefaultsCopyError {
                message: format!("failed to read {}: {e}", defaults.display()),
            }
        })?;
        (text, ConfigSeed::Defaults(defaults))
    } else {
        (EMBEDDED_DEFAULT_CONFIG.to_string(), ConfigSeed::Embedded)
    };

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;
    let copy_failed = |e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("failed to write {}: {e}", target.display()),
    };
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(mut dest) => {
            std::io::Write::write_all(&mut dest, text.as_bytes()).map_err(copy_failed)?;
            Ok(seed)
        }
        // Lost a race with another process seeding the same directory.
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(ConfigSeed::Existing),
        Err(e) => Err(copy_failed(e)),
    }
}

/// Convenience wrapper: seeds and loads config relative to the current
/// working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    match seed_config(&cwd)? {
        ConfigSeed::Existing => {}
        ConfigSeed::Defaults(from) => info!("Created config from {}", from.display()),
        ConfigSeed::Embedded => info!("Created config from built-in defaults"),
    }
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn parse_list<T>(
    field: &str,
    values: &[String],
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>, ConfigError> {
    values
        .iter()
        .map(|v| parse(v.trim()).ok_or_else(|| invalid(field, format!("unknown value `{v}`"))))
        .collect()
}

fn parse_build(section: &BuildSection) -> Result<BuildConfig, ConfigError> {
    let leagues = parse_list("build.leagues", &section.leagues, League::from_key)?;
    let seasons = section
        .seasons
        .iter()
        .map(|s| Season::parse(s.trim()).map_err(|e| invalid("build.seasons", e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    let data_types = parse_list("build.data_types", &section.data_types, DataType::from_key)?;

    let mut stat_types = BTreeMap::new();
    for (data_type, stats) in &section.stat_types {
        let field = format!("build.stat_types.{data_type}");
        let dt = DataType::from_key(data_type)
            .ok_or_else(|| invalid(&field, format!("unknown data type `{data_type}`")))?;
        if !dt.takes_stat() {
            return Err(invalid(&field, "schedules have no stat types"));
        }
        // Stats outside the family are kept so the build reports them.
        let stats = parse_list(&field, stats, StatType::from_key)?;
        stat_types.insert(dt, stats);
    }

    Ok(BuildConfig {
        leagues,
        seasons,
        data_types,
        concurrency: section.concurrency,
        stat_types,
    })
}

fn parse_source(section: &SourceSection, base_dir: &Path) -> Result<SourceConfig, ConfigError> {
    let cache = if section.use_cache {
        let dir = match &section.cache_dir {
            Some(dir) => resolve(base_dir, dir),
            None => default_cache_dir().ok_or_else(|| {
                invalid(
                    "source.cache_dir",
                    "no platform cache directory; set cache_dir explicitly",
                )
            })?,
        };
        Some(CacheOptions {
            dir,
            max_age: Duration::from_secs(section.cache_max_age_hours * 3600),
        })
    } else {
        None
    };

    Ok(SourceConfig {
        base_url: section.base_url.trim().to_string(),
        user_agent: section
            .user_agent
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        timeout: Duration::from_secs(section.timeout_secs),
        min_request_interval: Duration::from_millis(section.min_request_interval_ms),
        max_matches: section.max_matches,
        cache,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config, output: &OutputSection) -> Result<(), ConfigError> {
    let build = &config.build;
    if build.leagues.is_empty() {
        return Err(invalid("build.leagues", "must list at least one league"));
    }
    if build.seasons.is_empty() {
        return Err(invalid("build.seasons", "must list at least one season"));
    }
    if build.data_types.is_empty() {
        return Err(invalid("build.data_types", "must list at least one data type"));
    }
    if build.concurrency == 0 {
        return Err(invalid("build.concurrency", "must be > 0"));
    }

    let source = &config.source;
    if !(source.base_url.starts_with("http://") || source.base_url.starts_with("https://")) {
        return Err(invalid(
            "source.base_url",
            format!("must be an http(s) URL, got `{}`", source.base_url),
        ));
    }
    if source.timeout.is_zero() {
        return Err(invalid("source.timeout_secs", "must be > 0"));
    }
    if source.max_matches == Some(0) {
        return Err(invalid("source.max_matches", "must be > 0 when set"));
    }
    if source.cache.as_ref().is_some_and(|c| c.max_age.is_zero()) {
        return Err(invalid("source.cache_max_age_hours", "must be > 0"));
    }

    if config.retry.max_attempts == 0 {
        return Err(invalid("retry.max_attempts", "must be >= 1"));
    }

    if output.catalog_path.trim().is_empty() {
        return Err(invalid("output.catalog_path", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Path of the crate's `defaults/` directory.
    fn defaults_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("defaults")
    }

    /// Fresh base directory holding `config/statslab.toml` with `text`.
    fn base_with(text: &str) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let config_dir = tmp.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join(CONFIG_FILE_NAME), text).unwrap();
        tmp
    }

    fn default_text() -> String {
        fs::read_to_string(defaults_dir().join(CONFIG_FILE_NAME)).unwrap()
    }

    fn validation_field(result: Result<Config, ConfigError>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    const MINIMAL: &str = r#"
[build]
leagues = ["epl", "laliga"]
seasons = ["2324"]
data_types = ["team", "schedule"]
concurrency = 3

[source]
base_url = "https://fbref.com"
timeout_secs = 10
min_request_interval_ms = 7000

[output]
catalog_path = "data/catalog.json"
"#;

    #[test]
    fn load_valid_config_from_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("defaults")).unwrap();
        fs::copy(
            defaults_dir().join(CONFIG_FILE_NAME),
            tmp.path().join("defaults").join(CONFIG_FILE_NAME),
        )
        .unwrap();

        assert!(matches!(
            seed_config(tmp.path()).unwrap(),
            ConfigSeed::Defaults(_)
        ));
        let config = load_config_from(tmp.path()).expect("should load valid config");

        assert_eq!(config.build.leagues, League::ALL.to_vec());
        assert_eq!(config.build.seasons.len(), 5);
        assert_eq!(
            config.build.data_types,
            vec![DataType::Team, DataType::Player, DataType::Schedule]
        );
        assert_eq!(config.source.base_url, "https://fbref.com");
        assert_eq!(config.source.min_request_interval, Duration::from_secs(7));
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.output.catalog_path.ends_with("data/catalog.json"));
        assert!(config.output.catalog_path.starts_with(tmp.path()));
        assert!(!config.output.merge_existing);
        assert!(!config.output.replace_on_total_failure);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let tmp = base_with(MINIMAL);
        let config = load_config_from(tmp.path()).unwrap();

        assert_eq!(config.build.leagues, vec![League::Epl, League::Laliga]);
        assert_eq!(config.build.concurrency, 3);
        assert!(config.build.stat_types.is_empty());
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.source.cache, None);
        assert_eq!(config.source.user_agent, None);
        assert_eq!(config.source.max_matches, None);

        let opts = config.fbref_options();
        assert!(opts.user_agent.starts_with("statslab/"));
        assert_eq!(opts.timeout, Duration::from_secs(10));
    }

    #[test]
    fn build_request_applies_stat_overrides() {
        let text = MINIMAL.replace(
            "concurrency = 3",
            "concurrency = 3\n\n[build.stat_types]\nteam = [\"standard\", \"shooting\"]",
        );
        let tmp = base_with(&text);
        let config = load_config_from(tmp.path()).unwrap();

        let keys = config.build_request().keys();
        // 2 leagues x 1 season x (2 team stats + schedule)
        assert_eq!(keys.len(), 6);
        assert_eq!(keys[0].stat_type, Some(StatType::Standard));
        assert_eq!(keys[1].stat_type, Some(StatType::Shooting));
        assert_eq!(keys[2].data_type, DataType::Schedule);
        assert_eq!(config.assembler_options().concurrency, 3);
    }

    #[test]
    fn cache_dir_is_resolved_against_base() {
        let text = MINIMAL.replace(
            "min_request_interval_ms = 7000",
            "min_request_interval_ms = 7000\nuse_cache = true\ncache_dir = \"cache\"\ncache_max_age_hours = 2",
        );
        let tmp = base_with(&text);
        let config = load_config_from(tmp.path()).unwrap();

        let cache = config.source.cache.unwrap();
        assert_eq!(cache.dir, tmp.path().join("cache"));
        assert_eq!(cache.max_age, Duration::from_secs(7200));
    }

    #[test]
    fn rejects_unknown_league() {
        let tmp = base_with(&MINIMAL.replace("\"laliga\"", "\"mls\""));
        assert_eq!(validation_field(load_config_from(tmp.path())), "build.leagues");
    }

    #[test]
    fn rejects_malformed_season() {
        let tmp = base_with(&MINIMAL.replace("\"2324\"", "\"2023-24\""));
        assert_eq!(validation_field(load_config_from(tmp.path())), "build.seasons");
    }

    #[test]
    fn rejects_zero_concurrency() {
        let tmp = base_with(&MINIMAL.replace("concurrency = 3", "concurrency = 0"));
        assert_eq!(validation_field(load_config_from(tmp.path())), "build.concurrency");
    }

    #[test]
    fn rejects_empty_data_types() {
        let tmp = base_with(&MINIMAL.replace("[\"team\", \"schedule\"]", "[]"));
        assert_eq!(validation_field(load_config_from(tmp.path())), "build.data_types");
    }

    #[test]
    fn rejects_schedule_stat_override() {
        let text = MINIMAL.replace(
            "concurrency = 3",
            "concurrency = 3\n\n[build.stat_types]\nschedule = [\"standard\"]",
        );
        let tmp = base_with(&text);
        assert_eq!(
            validation_field(load_config_from(tmp.path())),
            "build.stat_types.schedule"
        );
    }

    #[test]
    fn rejects_zero_retry_attempts() {
        let text = format!("{MINIMAL}\n[retry]\nmax_attempts = 0\ninitial_backoff_ms = 500\n");
        let tmp = base_with(&text);
        assert_eq!(validation_field(load_config_from(tmp.path())), "retry.max_attempts");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let tmp = base_with(&MINIMAL.replace("https://fbref.com", "fbref.com"));
        assert_eq!(validation_field(load_config_from(tmp.path())), "source.base_url");
    }

    #[test]
    fn file_not_found_for_missing_config() {
        let tmp = tempfile::tempdir().unwrap();
        match load_config_from(tmp.path()) {
            Err(ConfigError::FileNotFound { path }) => {
                assert!(path.ends_with("config/statslab.toml"));
            }
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = base_with("[build\nleagues = ");
        assert!(matches!(
            load_config_from(tmp.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn seed_config_keeps_existing_file() {
        let tmp = base_with(MINIMAL);
        fs::create_dir_all(tmp.path().join("defaults")).unwrap();
        fs::write(tmp.path().join("defaults").join(CONFIG_FILE_NAME), default_text()).unwrap();

        assert_eq!(seed_config(tmp.path()).unwrap(), ConfigSeed::Existing);
        let kept = fs::read_to_string(tmp.path().join("config").join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(kept, MINIMAL);
    }

    #[test]
    fn seed_config_prefers_defaults_dir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("defaults")).unwrap();
        fs::write(tmp.path().join("defaults").join(CONFIG_FILE_NAME), MINIMAL).unwrap();

        assert!(matches!(
            seed_config(tmp.path()).unwrap(),
            ConfigSeed::Defaults(_)
        ));
        let written = fs::read_to_string(tmp.path().join("config").join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(written, MINIMAL);
    }

    #[test]
    fn seed_config_falls_back_to_embedded_default() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(seed_config(tmp.path()).unwrap(), ConfigSeed::Embedded);
        assert_eq!(seed_config(tmp.path()).unwrap(), ConfigSeed::Existing);

        let written = fs::read_to_string(tmp.path().join("config").join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(written, default_text());
        assert!(load_config_from(tmp.path()).is_ok());
    }
}
