//! Persistence of series documents and freshness records.
//!
//! ## Write discipline
//!
//! Every file is written to a uniquely named temporary file in the data
//! directory and renamed over the target, so readers only ever see a
//! complete previous or complete new document, and concurrent writers never
//! share a temporary file.

use crate::error::{FeedError, FeedResult};
use crate::types::{FreshnessRecord, Series, SeriesKind};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::fs;
use std::io::{ErrorKind, Write};
use tempfile::NamedTempFile;
use std::path::{Path, PathBuf};

/// Read/write access to the per-kind cache artifacts.
pub trait SeriesStore: Send + Sync {
    /// The persisted series, or `None` if never written.
    fn load_series(&self, kind: SeriesKind) -> FeedResult<Option<Series>>;

    /// Replace the persisted series for `series.metadata.kind`.
    fn save_series(&self, series: &Series) -> FeedResult<()>;

    /// The persisted freshness record, or `None` if never written.
    fn load_record(&self, kind: SeriesKind) -> FeedResult<Option<FreshnessRecord>>;

    /// Replace the persisted freshness record for `record.kind`.
    fn save_record(&self, record: &FreshnessRecord) -> FeedResult<()>;

    /// Whether a series artifact exists for `kind`.
    fn has_series(&self, kind: SeriesKind) -> bool {
        matches!(self.load_series(kind), Ok(Some(_)))
    }
}

/// Filesystem store, one JSON document and one timestamp file per kind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> FeedResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!("FileStore opened at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn series_path(&self, kind: SeriesKind) -> PathBuf {
        self.dir.join(match kind {
            SeriesKind::Daily => "gold_prices.json",
            SeriesKind::Yearly => "gold_prices_yearly.json",
        })
    }

    pub fn record_path(&self, kind: SeriesKind) -> PathBuf {
        self.dir.join(match kind {
            SeriesKind::Daily => "last_update.txt",
            SeriesKind::Yearly => "last_yearly_update.txt",
        })
    }
}

impl SeriesStore for FileStore {
    fn load_series(&self, kind: SeriesKind) -> FeedResult<Option<Series>> {
        let Some(bytes) = read_optional(&self.series_path(kind))? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save_series(&self, series: &Series) -> FeedResult<()> {
        let bytes = serde_json::to_vec_pretty(series)?;
        write_atomic(&self.dir, &self.series_path(series.metadata.kind), &bytes)
    }

    fn load_record(&self, kind: SeriesKind) -> FeedResult<Option<FreshnessRecord>> {
        let Some(bytes) = read_optional(&self.record_path(kind))? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        let last_refreshed_at = parse_timestamp(text.trim()).ok_or_else(|| FeedError::InvalidRecord {
            kind,
            reason: format!("unreadable timestamp '{}'", text.trim()),
        })?;
        Ok(Some(FreshnessRecord {
            kind,
            last_refreshed_at,
        }))
    }

    fn save_record(&self, record: &FreshnessRecord) -> FeedResult<()> {
        write_atomic(
            &self.dir,
            &self.record_path(record.kind),
            record.last_refreshed_at.to_rfc3339().as_bytes(),
        )
    }

    fn has_series(&self, kind: SeriesKind) -> bool {
        self.series_path(kind).is_file()
    }
}

/// Accept RFC 3339, or a naive ISO timestamp in host local time.
///
/// Naive values come from older deployments that stamped local wall-clock
/// time; an ambiguous local time (DST fold) takes the earlier instant.
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

fn read_optional(path: &Path) -> FeedResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> FeedResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    // A failed persist drops the temp file, which removes it.
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
