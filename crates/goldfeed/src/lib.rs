// Copyright 2026 Goldfeed Contributors
// SPDX-License-Identifier: MIT

//! Goldfeed: scrapes a retail gold price page into a normalized, cached series.
//!
//! The page is fetched, run through a chain of extraction strategies,
//! normalized (dedup, carry-forward of "unchanged" placeholders, newest
//! first) and persisted per [`SeriesKind`]. The [`FreshnessController`]
//! decides when the persisted series is too old and refreshes it.

pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod freshness;
pub mod normalize;
pub mod store;
pub mod types;

pub use config::{ConfigOverrides, FeedConfig, SourceInfo};
pub use error::{FeedError, FeedResult, FetchError};
pub use extract::{extract, extract_with_year, Extraction, Strategy};
pub use fetch::{HttpFetcher, PageFetcher};
pub use freshness::{FeedStatus, FreshnessController, KindStatus};
pub use normalize::{normalize, Normalized, ParseWarning};
pub use store::{FileStore, SeriesStore};
pub use types::*;
