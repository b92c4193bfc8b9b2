//! Cache freshness controller.
//!
//! Decides per [`SeriesKind`] whether the persisted series is usable and
//! drives fetch → extract → normalize → persist when it is not.

use crate::config::{FeedConfig, SourceInfo};
use crate::error::{FeedError, FeedResult};
use crate::extract::extract;
use crate::fetch::PageFetcher;
use crate::normalize::normalize;
use crate::store::SeriesStore;
use crate::types::{FreshnessRecord, FreshnessState, Series, SeriesKind, SeriesMetadata};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Snapshot of one kind's cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindStatus {
    pub kind: SeriesKind,
    pub state: FreshnessState,
    pub available: bool,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub entry_count: usize,
    pub latest_date: Option<NaiveDate>,
}

/// Snapshot of the whole feed, one entry per kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedStatus {
    pub source: String,
    pub url: String,
    pub staleness_hours: u64,
    pub checked_at: DateTime<Utc>,
    pub kinds: Vec<KindStatus>,
}

/// Owns the decision to replace a persisted series.
pub struct FreshnessController<F, S> {
    fetcher: F,
    store: S,
    source: SourceInfo,
    staleness: Duration,
    in_flight: [AtomicUsize; 2],
}

/// Decrements a kind's in-flight counter when the refresh ends, however it ends.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<F: PageFetcher, S: SeriesStore> FreshnessController<F, S> {
    pub fn new(fetcher: F, store: S, config: &FeedConfig) -> Self {
        Self {
            fetcher,
            store,
            source: config.source.clone(),
            staleness: config.staleness,
            in_flight: [AtomicUsize::new(0), AtomicUsize::new(0)],
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn source(&self) -> &SourceInfo {
        &self.source
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    /// Whether a refresh of `kind` is running right now.
    pub fn is_refreshing(&self, kind: SeriesKind) -> bool {
        self.in_flight[kind.index()].load(Ordering::SeqCst) > 0
    }

    /// Current state of `kind`.
    pub fn state(&self, kind: SeriesKind) -> FreshnessState {
        if self.is_refreshing(kind) {
            FreshnessState::Refreshing
        } else if self.is_stale_at(kind, Utc::now()) {
            FreshnessState::Stale
        } else {
            FreshnessState::Fresh
        }
    }

    /// Stale when the record is absent or unreadable, the series is absent,
    /// or the record is older than the staleness window at `now`.
    pub fn is_stale_at(&self, kind: SeriesKind, now: DateTime<Utc>) -> bool {
        let record = match self.store.load_record(kind) {
            Ok(Some(record)) => record,
            Ok(None) => return true,
            Err(e) => {
                tracing::warn!(%kind, "treating unreadable freshness record as stale: {e}");
                return true;
            }
        };
        if !self.store.has_series(kind) {
            return true;
        }
        match (now - record.last_refreshed_at).to_std() {
            Ok(age) => age > self.staleness,
            // Record from the future: clock moved backwards, not stale.
            Err(_) => false,
        }
    }

    /// Return a usable series for `kind`, refreshing first if it is stale.
    ///
    /// When the refresh fails but an earlier series exists, the earlier
    /// series is returned and the failure is only logged.
    pub async fn ensure_fresh(&self, kind: SeriesKind) -> FeedResult<Series> {
        if !self.is_stale_at(kind, Utc::now()) {
            match self.store.load_series(kind) {
                Ok(Some(series)) => return Ok(series),
                Ok(None) => {}
                Err(e) => tracing::warn!(%kind, "cached series unreadable, refreshing: {e}"),
            }
        }

        match self.refresh(kind).await {
            Ok(series) => Ok(series),
            Err(err) => match self.store.load_series(kind) {
                Ok(Some(prior)) => {
                    tracing::warn!(
                        %kind,
                        generated_at = %prior.metadata.generated_at,
                        "refresh failed, serving previous series: {err}"
                    );
                    Ok(prior)
                }
                _ => Err(err),
            },
        }
    }

    /// Refresh `kind` unconditionally; `true` on success.
    pub async fn force_refresh(&self, kind: SeriesKind) -> bool {
        match self.refresh(kind).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(%kind, "refresh failed: {e}");
                false
            }
        }
    }

    /// Run one full refresh of `kind` and persist the result.
    ///
    /// The series is written before the freshness record; on any error
    /// nothing is written and the previous artifact stays in place.
    pub async fn refresh(&self, kind: SeriesKind) -> FeedResult<Series> {
        let _guard = InFlight::enter(&self.in_flight[kind.index()]);
        let url = self.source.url_for(kind).to_string();
        tracing::info!(%kind, %url, "refreshing series");

        let markup = self.fetcher.fetch(&url).await?;

        let extraction = extract(&markup, kind.extract_mode());
        if extraction.is_empty() {
            return Err(FeedError::ExtractionEmpty(kind));
        }

        let normalized = normalize(&extraction.observations);
        if normalized.observations.is_empty() {
            return Err(FeedError::NormalizationEmpty(kind));
        }

        let now = Utc::now();
        let series = Series {
            metadata: SeriesMetadata {
                source: self.source.name.clone(),
                url,
                currency: self.source.currency.clone(),
                unit: self.source.unit.clone(),
                generated_at: now,
                entry_count: normalized.observations.len(),
                kind,
            },
            observations: normalized.observations,
        };

        self.store.save_series(&series)?;
        self.store.save_record(&FreshnessRecord {
            kind,
            last_refreshed_at: now,
        })?;

        tracing::info!(
            %kind,
            entries = series.len(),
            warnings = normalized.warnings.len(),
            latest = ?series.latest().map(|o| o.date),
            "series refreshed"
        );
        Ok(series)
    }

    /// Summarize both kinds.
    pub fn status(&self) -> FeedStatus {
        let kinds = SeriesKind::ALL
            .iter()
            .map(|&kind| {
                let series = self.store.load_series(kind).ok().flatten();
                let record = self.store.load_record(kind).ok().flatten();
                KindStatus {
                    kind,
                    state: self.state(kind),
                    available: series.is_some(),
                    last_refreshed_at: record.map(|r| r.last_refreshed_at),
                    entry_count: series.as_ref().map_or(0, Series::len),
                    latest_date: series.as_ref().and_then(|s| s.latest()).map(|o| o.date),
                }
            })
            .collect();

        FeedStatus {
            source: self.source.name.clone(),
            url: self.source.daily_url.clone(),
            staleness_hours: self.staleness.as_secs() / 3600,
            checked_at: Utc::now(),
            kinds,
        }
    }
}
