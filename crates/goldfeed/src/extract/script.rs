//! Embedded-series strategy: chart arrays declared in inline scripts.
//!
//! The upstream page feeds its chart from two parallel literals:
//!
//! ```text
//! const labels_in = ["2025-08-13-09:30", "2025-08-14-09:30", ...];
//! const data1 = ["9000", "-", ...];
//! ```

use super::dates::{iso, parse_date_token, ymd};
use crate::types::RawObservation;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Variable holding the date labels.
pub const LABELS_VAR: &str = "labels_in";
/// Variable holding the price tokens.
pub const PRICES_VAR: &str = "data1";

fn array_re(var: &str) -> Regex {
    let pattern = format!(
        r"(?s)(?:const|let|var)\s+{}\s*=\s*\[(.*?)\]",
        regex::escape(var)
    );
    Regex::new(&pattern).expect("array literal regex is valid")
}

fn labels_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| array_re(LABELS_VAR))
}

fn prices_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| array_re(PRICES_VAR))
}

fn leading_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})").expect("label date regex is valid")
    })
}

/// Extract positionally paired observations from inline script arrays.
///
/// Returns an empty list when either array is missing or their lengths
/// differ.
pub fn extract_embedded_series(document: &Html, reference_year: i32) -> Vec<RawObservation> {
    let sel = Selector::parse("script").expect("script selector is valid");

    let mut labels: Option<Vec<String>> = None;
    let mut prices: Option<Vec<String>> = None;

    for script in document.select(&sel) {
        let text: String = script.text().collect();
        if text.trim().is_empty() {
            continue;
        }
        if labels.is_none() {
            labels = labels_re()
                .captures(&text)
                .map(|c| split_array_literal(&c[1]));
        }
        if prices.is_none() {
            prices = prices_re()
                .captures(&text)
                .map(|c| split_array_literal(&c[1]));
        }
        if labels.is_some() && prices.is_some() {
            break;
        }
    }

    let (labels, prices) = match (labels, prices) {
        (Some(l), Some(p)) if !l.is_empty() && !p.is_empty() => (l, p),
        _ => {
            tracing::debug!("no embedded chart arrays found");
            return Vec::new();
        }
    };

    if labels.len() != prices.len() {
        tracing::warn!(
            labels = labels.len(),
            prices = prices.len(),
            "embedded chart arrays differ in length, discarding"
        );
        return Vec::new();
    }

    labels
        .iter()
        .zip(prices)
        .map(|(label, price)| RawObservation::new(label_date(label, reference_year), price))
        .collect()
}

/// Split the inside of an array literal into element tokens.
///
/// Quoted elements keep their inner text verbatim; bare elements are trimmed.
fn split_array_literal(body: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '"' | '\'' => {
                chars.next();
                let mut token = String::new();
                for ch in chars.by_ref() {
                    if ch == c {
                        break;
                    }
                    token.push(ch);
                }
                out.push(token);
                // Skip to the next separator.
                for ch in chars.by_ref() {
                    if ch == ',' {
                        break;
                    }
                }
            }
            ',' => {
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut token = String::new();
                for ch in chars.by_ref() {
                    if ch == ',' {
                        break;
                    }
                    token.push(ch);
                }
                let token = token.trim();
                if !token.is_empty() {
                    out.push(token.to_string());
                }
            }
        }
    }

    out
}

/// Reduce a chart label to its date-significant leading segment.
///
/// `"2025-08-13-09:30"` becomes `"2025-08-13"`. Labels that cannot be read
/// as a date are passed through for the normalizer to reject.
fn label_date(label: &str, reference_year: i32) -> String {
    if let Some(c) = leading_date_re().captures(label) {
        if let Some(date) = ymd(&c[1], &c[2], &c[3]) {
            return iso(date);
        }
    }
    match parse_date_token(label, reference_year) {
        Some(date) => iso(date),
        None => label.trim().to_string(),
    }
}
