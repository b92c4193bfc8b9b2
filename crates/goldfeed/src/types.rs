//! Core data types for price series and their cache bookkeeping.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which of the two independently cached products a series is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    /// Recent window published as the page's headline chart.
    Daily,
    /// Full one-year window.
    Yearly,
}

impl SeriesKind {
    /// Both kinds, in refresh order.
    pub const ALL: [SeriesKind; 2] = [SeriesKind::Daily, SeriesKind::Yearly];

    /// The extraction request shape used for this kind.
    pub fn extract_mode(self) -> ExtractMode {
        match self {
            Self::Daily => ExtractMode::Recent,
            Self::Yearly => ExtractMode::FullYear,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Yearly => "yearly",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Daily => 0,
            Self::Yearly => 1,
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeriesKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "yearly" => Ok(Self::Yearly),
            other => Err(format!("unknown series kind '{other}' (expected daily or yearly)")),
        }
    }
}

/// Shape of an extraction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// First non-empty strategy wins.
    Recent,
    /// Script data unioned with the best tabular source.
    FullYear,
}

/// A (date, price) pair exactly as found in the markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObservation {
    pub date_token: String,
    pub price_token: String,
}

impl RawObservation {
    pub fn new(date_token: impl Into<String>, price_token: impl Into<String>) -> Self {
        Self {
            date_token: date_token.into(),
            price_token: price_token.into(),
        }
    }
}

/// One resolved price point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedObservation {
    /// Calendar date; unique within a series.
    pub date: NaiveDate,
    /// Always a concrete value, never a placeholder.
    pub price: f64,
    /// The token the price was resolved from (e.g. `"-"` for carried values).
    pub original_price_token: String,
}

/// Descriptive block persisted with every series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub source: String,
    pub url: String,
    pub currency: String,
    pub unit: String,
    pub generated_at: DateTime<Utc>,
    pub entry_count: usize,
    pub kind: SeriesKind,
}

/// An immutable, newest-first price series.
///
/// A new `Series` is built on every successful refresh and replaces the
/// previous artifact wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub metadata: SeriesMetadata,
    pub observations: Vec<NormalizedObservation>,
}

impl Series {
    /// Newest observation, if any.
    pub fn latest(&self) -> Option<&NormalizedObservation> {
        self.observations.first()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// When a kind was last refreshed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessRecord {
    pub kind: SeriesKind,
    pub last_refreshed_at: DateTime<Utc>,
}

/// Cache state of one series kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessState {
    Fresh,
    Stale,
    Refreshing,
}
