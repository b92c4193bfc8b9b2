//! Multi-strategy extraction of raw observations from the upstream page.
//!
//! The page has carried its prices in several shapes over time, so each
//! shape is a [`Strategy`] and every request mode has a fixed fallback chain.
//! Strategies are pure functions over the parsed document.

pub mod dates;
pub mod script;
pub mod table;
pub mod text;

use crate::types::{ExtractMode, RawObservation};
use chrono::{Datelike, Local};
use scraper::Html;
use std::collections::HashSet;
use std::fmt;

/// One way of locating observations in the markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Parallel label/price arrays in an inline chart script.
    EmbeddedSeries,
    /// A date/price table.
    FlatTable,
    /// A month-by-day grid table.
    MonthlyGrid,
    /// Date/price pairs in free-form text.
    FreeText,
}

impl Strategy {
    fn run(self, document: &Html, reference_year: i32) -> Vec<RawObservation> {
        match self {
            Self::EmbeddedSeries => script::extract_embedded_series(document, reference_year),
            Self::FlatTable => table::extract_flat_table(document, reference_year),
            Self::MonthlyGrid => table::extract_monthly_grid(document),
            Self::FreeText => text::extract_free_text(document, reference_year),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmbeddedSeries => "embedded_series",
            Self::FlatTable => "flat_table",
            Self::MonthlyGrid => "monthly_grid",
            Self::FreeText => "free_text",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fallback chain for the recent (daily) shape.
pub const RECENT_CHAIN: [Strategy; 3] = [
    Strategy::EmbeddedSeries,
    Strategy::FlatTable,
    Strategy::FreeText,
];

/// Tabular fallbacks tried after the script data in full-year mode.
pub const FULL_YEAR_TABULAR_CHAIN: [Strategy; 2] = [Strategy::MonthlyGrid, Strategy::FreeText];

/// Result of an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Observations with unique date tokens, in discovery order.
    pub observations: Vec<RawObservation>,
    /// Strategies that contributed, in order.
    pub strategies: Vec<Strategy>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Append observations whose dates are not already present.
    fn union(&mut self, strategy: Strategy, found: Vec<RawObservation>) {
        let mut seen: HashSet<String> = self
            .observations
            .iter()
            .map(|o| o.date_token.clone())
            .collect();
        let before = self.observations.len();
        for obs in found {
            if seen.insert(obs.date_token.clone()) {
                self.observations.push(obs);
            }
        }
        if self.observations.len() > before {
            self.strategies.push(strategy);
        }
    }
}

/// Extract observations using the current local year for yearless dates.
pub fn extract(markup: &str, mode: ExtractMode) -> Extraction {
    extract_with_year(markup, mode, Local::now().year())
}

/// Extract observations; yearless dates take `reference_year`.
///
/// - `Recent`: the first strategy of [`RECENT_CHAIN`] with a non-empty result
///   wins.
/// - `FullYear`: the embedded series is unioned with the first non-empty
///   result of [`FULL_YEAR_TABULAR_CHAIN`]; for a date found by both, the
///   embedded series wins.
pub fn extract_with_year(markup: &str, mode: ExtractMode, reference_year: i32) -> Extraction {
    let document = Html::parse_document(markup);
    let mut extraction = Extraction::default();

    match mode {
        ExtractMode::Recent => {
            if let Some((strategy, found)) = first_non_empty(&RECENT_CHAIN, &document, reference_year) {
                extraction.union(strategy, found);
            }
        }
        ExtractMode::FullYear => {
            let embedded = Strategy::EmbeddedSeries.run(&document, reference_year);
            log_attempt(Strategy::EmbeddedSeries, embedded.len());
            extraction.union(Strategy::EmbeddedSeries, embedded);

            if let Some((strategy, found)) =
                first_non_empty(&FULL_YEAR_TABULAR_CHAIN, &document, reference_year)
            {
                extraction.union(strategy, found);
            }
        }
    }

    if extraction.is_empty() {
        tracing::warn!(?mode, "no extraction strategy produced data");
    } else {
        tracing::info!(
            ?mode,
            entries = extraction.observations.len(),
            strategies = ?extraction.strategies,
            "extracted raw observations"
        );
    }

    extraction
}

fn first_non_empty(
    chain: &[Strategy],
    document: &Html,
    reference_year: i32,
) -> Option<(Strategy, Vec<RawObservation>)> {
    chain.iter().find_map(|&strategy| {
        let found = strategy.run(document, reference_year);
        log_attempt(strategy, found.len());
        (!found.is_empty()).then_some((strategy, found))
    })
}

fn log_attempt(strategy: Strategy, found: usize) {
    tracing::debug!(strategy = strategy.as_str(), found, "extraction strategy attempted");
}
