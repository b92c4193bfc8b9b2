//! Free-text strategy: date/price pairs in prose or preformatted blocks.

use super::dates::{iso, parse_date_token, to_ascii_digits};
use crate::types::RawObservation;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Blocks whose own text is scanned.
const TEXT_BLOCKS: &str = "p, pre, li, div";

/// A date in one of the supported shapes, then a number after a short run of
/// non-digits. Alternatives are tried leftmost-first, so a full `YYYY年M月D日`
/// is never re-read as its yearless tail.
fn date_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            (?P<date>
                \d{4}[-/]\d{1,2}[-/]\d{1,2}
              | \d{1,2}[-/]\d{1,2}[-/]\d{4}
              | (?:\d{4}\s*年\s*)?\d{1,2}\s*月\s*\d{1,2}\s*日
            )
            [^\d]{0,40}?
            (?P<price>\d[\d,]*(?:\.\d+)?)
            ",
        )
        .expect("date-price regex is valid")
    })
}

/// Scan a text fragment for date/price pairs.
pub fn scan_text(text: &str, reference_year: i32) -> Vec<RawObservation> {
    let text = to_ascii_digits(text);
    date_price_re()
        .captures_iter(&text)
        .filter_map(|c| {
            let date = parse_date_token(&c["date"], reference_year)?;
            Some(RawObservation::new(iso(date), c["price"].to_string()))
        })
        .collect()
}

/// Scan the direct text of prose blocks for date/price pairs.
///
/// Only text nodes that are immediate children of a block are read, so a
/// nested block is never scanned twice through its ancestors.
pub fn extract_free_text(document: &Html, reference_year: i32) -> Vec<RawObservation> {
    let sel = Selector::parse(TEXT_BLOCKS).expect("text block selector is valid");

    let mut out = Vec::new();
    for block in document.select(&sel) {
        let own_text: String = block
            .children()
            .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
            .collect();
        if own_text.trim().is_empty() {
            continue;
        }
        out.extend(scan_text(&own_text, reference_year));
    }
    out
}
