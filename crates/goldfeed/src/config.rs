//! Configuration loading and resolution.
//!
//! Every field resolves in the same order: an explicit value from the caller,
//! then an environment variable, then the built-in default.

use crate::error::{FeedError, FeedResult};
use crate::types::SeriesKind;
use chrono::NaiveTime;
use std::path::PathBuf;
use std::time::Duration;

/// Tanaka Precious Metals' daily gold retail price page.
pub const DEFAULT_SOURCE_URL: &str = "https://gold.tanaka.co.jp/commodity/souba/d-gold.php";

pub const DEFAULT_SOURCE_NAME: &str = "Tanaka Precious Metals";
pub const DEFAULT_CURRENCY: &str = "JPY";
pub const DEFAULT_UNIT: &str = "per gram";

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(24 * 3600);

/// Wall-clock refresh times (local): market open and evening.
pub const DEFAULT_SCHEDULE: [(u32, u32); 2] = [(9, 0), (18, 0)];

const ENV_DATA_DIR: &str = "GOLDFEED_DATA_DIR";
const ENV_SOURCE_URL: &str = "GOLDFEED_SOURCE_URL";
const ENV_STALENESS_HOURS: &str = "GOLDFEED_STALENESS_HOURS";
const ENV_FETCH_TIMEOUT_SECS: &str = "GOLDFEED_FETCH_TIMEOUT_SECS";

/// Where the upstream data comes from and how it is labelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub name: String,
    /// Page fetched for the daily series.
    pub daily_url: String,
    /// Page fetched for the yearly series. The upstream publishes both on
    /// one page today.
    pub yearly_url: String,
    pub currency: String,
    pub unit: String,
}

impl SourceInfo {
    /// Source info with both kinds pointing at one page.
    pub fn for_url(url: &str) -> Self {
        Self {
            name: DEFAULT_SOURCE_NAME.to_string(),
            daily_url: url.to_string(),
            yearly_url: url.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            unit: DEFAULT_UNIT.to_string(),
        }
    }

    pub fn url_for(&self, kind: SeriesKind) -> &str {
        match kind {
            SeriesKind::Daily => &self.daily_url,
            SeriesKind::Yearly => &self.yearly_url,
        }
    }
}

impl Default for SourceInfo {
    fn default() -> Self {
        Self::for_url(DEFAULT_SOURCE_URL)
    }
}

/// Resolved settings for the feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub source: SourceInfo,
    pub data_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub staleness: Duration,
    pub schedule: Vec<NaiveTime>,
}

/// Explicit overrides, typically from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub source_url: Option<String>,
    pub staleness_hours: Option<u64>,
    pub fetch_timeout_secs: Option<u64>,
    pub schedule: Option<Vec<NaiveTime>>,
}

impl FeedConfig {
    /// Resolve the configuration from overrides, the environment, and defaults.
    pub fn resolve(overrides: ConfigOverrides) -> FeedResult<Self> {
        let source_url = overrides
            .source_url
            .or_else(|| read_env(ENV_SOURCE_URL))
            .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string());
        validate_url(&source_url)?;

        let staleness = match overrides.staleness_hours {
            Some(h) => hours(h)?,
            None => match read_env(ENV_STALENESS_HOURS) {
                Some(raw) => hours(parse_u64(ENV_STALENESS_HOURS, &raw)?)?,
                None => DEFAULT_STALENESS,
            },
        };

        let fetch_timeout = match overrides.fetch_timeout_secs {
            Some(s) => Duration::from_secs(s),
            None => match read_env(ENV_FETCH_TIMEOUT_SECS) {
                Some(raw) => Duration::from_secs(parse_u64(ENV_FETCH_TIMEOUT_SECS, &raw)?),
                None => DEFAULT_FETCH_TIMEOUT,
            },
        };

        let schedule = overrides.schedule.unwrap_or_else(default_schedule);

        Ok(Self {
            source: SourceInfo::for_url(&source_url),
            data_dir: resolve_data_dir(overrides.data_dir),
            fetch_timeout,
            staleness,
            schedule,
        })
    }

    /// Defaults rooted at the given data directory, ignoring the environment.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: SourceInfo::default(),
            data_dir: data_dir.into(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            staleness: DEFAULT_STALENESS,
            schedule: default_schedule(),
        }
    }
}

/// The default wall-clock refresh times.
pub fn default_schedule() -> Vec<NaiveTime> {
    DEFAULT_SCHEDULE
        .iter()
        .filter_map(|&(h, m)| NaiveTime::from_hms_opt(h, m, 0))
        .collect()
}

/// Parse an `HH:MM` time of day.
pub fn parse_time_of_day(raw: &str) -> FeedResult<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| FeedError::Config(format!("invalid time of day '{raw}': {e}")))
}

/// Resolve the data directory.
///
/// Explicit path, then `GOLDFEED_DATA_DIR`, then `./data` when it already
/// exists, then `~/.goldfeed/data`.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }

    if let Some(env_path) = read_env(ENV_DATA_DIR) {
        return PathBuf::from(env_path);
    }

    let cwd_data = PathBuf::from("data");
    if cwd_data.is_dir() {
        return cwd_data;
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".goldfeed")
        .join("data")
}

fn validate_url(raw: &str) -> FeedResult<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| FeedError::Config(format!("invalid source URL '{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(FeedError::Config(format!(
            "unsupported URL scheme '{other}' in '{raw}'"
        ))),
    }
}

fn parse_u64(name: &str, raw: &str) -> FeedResult<u64> {
    raw.trim()
        .parse()
        .map_err(|_| FeedError::Config(format!("{name} must be a whole number, got '{raw}'")))
}

fn hours(h: u64) -> FeedResult<Duration> {
    h.checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| FeedError::Config(format!("staleness of {h} hours is out of range")))
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
