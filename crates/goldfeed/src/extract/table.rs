//! Table strategies: a flat date/price table and the month-by-day grid.

use super::dates::{iso, parse_date_token, to_ascii_digits};
use crate::normalize::is_placeholder;
use crate::types::RawObservation;
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Words that mark a table as carrying prices.
const PRICE_KEYWORDS: &[&str] = &["価格", "price", "円", "yen"];

/// Class the upstream puts on its twelve-month grid.
const GRID_CLASS_SELECTOR: &str = "table.price_12months";

/// Header row plus at least 28 day rows.
const MIN_GRID_ROWS: usize = 29;

/// Data rows inspected for day labels when judging a grid.
const DAY_LABEL_SCAN_ROWS: usize = 5;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("table selector is valid")
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    let cells = selector("td, th");
    row.select(&cells).map(cell_text).collect()
}

fn table_rows(table: ElementRef<'_>) -> Vec<Vec<String>> {
    let tr = selector("tr");
    table.select(&tr).map(row_cells).collect()
}

// ── Flat table ──────────────────────────────────────────────────────────────

fn is_price_table(table: ElementRef<'_>) -> bool {
    let text = table.text().collect::<String>().to_lowercase();
    PRICE_KEYWORDS.iter().any(|k| text.contains(k))
}

/// Read (date, price) pairs from the first price table with dated rows.
///
/// The first row is a header. In each later row the first two cells are the
/// date and the price; rows with fewer cells or an unreadable date are
/// skipped.
pub fn extract_flat_table(document: &Html, reference_year: i32) -> Vec<RawObservation> {
    let table_sel = selector("table");

    for table in document.select(&table_sel).filter(|t| is_price_table(*t)) {
        let rows = table_rows(table);
        let observations: Vec<RawObservation> = rows
            .iter()
            .skip(1)
            .filter(|cells| cells.len() >= 2)
            .filter_map(|cells| {
                parse_date_token(&cells[0], reference_year)
                    .map(|date| RawObservation::new(iso(date), cells[1].clone()))
            })
            .collect();

        if !observations.is_empty() {
            tracing::debug!(rows = observations.len(), "flat price table matched");
            return observations;
        }
    }

    Vec::new()
}

// ── Monthly grid ────────────────────────────────────────────────────────────

fn year_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4})\s*(?:年|[-/.])\s*(\d{1,2})\s*月?$").expect("year-month regex is valid")
    })
}

fn day_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})\s*日?$").expect("day label regex is valid"))
}

fn grid_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[¥￥]?\s*\d[\d,]*(?:\.\d+)?\s*円?$").expect("grid price regex is valid"))
}

/// A month column of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MonthColumn {
    year: i32,
    month: u32,
    col: usize,
}

impl MonthColumn {
    fn ordinal(self) -> i32 {
        self.year * 12 + self.month as i32 - 1
    }
}

fn parse_year_month(text: &str) -> Option<(i32, u32)> {
    let text = to_ascii_digits(text);
    let c = year_month_re().captures(text.trim())?;
    let year: i32 = c[1].parse().ok()?;
    let month: u32 = c[2].parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

fn parse_day_label(text: &str) -> Option<u32> {
    let text = to_ascii_digits(text);
    let day: u32 = day_label_re().captures(text.trim())?[1].parse().ok()?;
    (1..=31).contains(&day).then_some(day)
}

fn month_columns(header: &[String]) -> Vec<MonthColumn> {
    header
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(col, text)| {
            parse_year_month(text).map(|(year, month)| MonthColumn { year, month, col })
        })
        .collect()
}

/// Whether the header months form a gap-free run spanning two or more years.
///
/// The run may be listed in either direction; no particular years are
/// assumed, so the check keeps working as the page rolls its window forward.
fn is_consecutive_multi_year(months: &[MonthColumn]) -> bool {
    if months.len() < 2 {
        return false;
    }
    let years: BTreeSet<i32> = months.iter().map(|m| m.year).collect();
    if years.len() < 2 {
        return false;
    }
    let ordinals: Vec<i32> = months.iter().map(|m| m.ordinal()).collect();
    let ascending = ordinals.windows(2).all(|w| w[1] == w[0] + 1);
    let descending = ordinals.windows(2).all(|w| w[1] == w[0] - 1);
    ascending || descending
}

fn is_grid_table(rows: &[Vec<String>]) -> bool {
    if rows.len() < MIN_GRID_ROWS {
        return false;
    }
    let Some(header) = rows.first() else {
        return false;
    };
    if !is_consecutive_multi_year(&month_columns(header)) {
        return false;
    }
    rows.iter()
        .skip(1)
        .take(DAY_LABEL_SCAN_ROWS)
        .any(|cells| cells.first().and_then(|c| parse_day_label(c)).is_some())
}

fn parse_grid(rows: &[Vec<String>]) -> Vec<RawObservation> {
    let Some(header) = rows.first() else {
        return Vec::new();
    };
    let months = month_columns(header);
    tracing::debug!(months = months.len(), "parsing monthly grid");

    let mut out = Vec::new();
    for cells in rows.iter().skip(1) {
        let Some(day) = cells.first().and_then(|c| parse_day_label(c)) else {
            continue;
        };
        for m in &months {
            let Some(value) = cells.get(m.col) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            if !is_placeholder(value) && !grid_price_re().is_match(&to_ascii_digits(value)) {
                continue;
            }
            // Day 30 under February and the like do not exist.
            let Some(date) = NaiveDate::from_ymd_opt(m.year, m.month, day) else {
                continue;
            };
            out.push(RawObservation::new(iso(date), value.clone()));
        }
    }
    out
}

/// Read observations from a month-by-day price grid.
///
/// A table carrying the upstream's grid class is used when present;
/// otherwise the first table passing the shape test is used.
pub fn extract_monthly_grid(document: &Html) -> Vec<RawObservation> {
    if let Some(table) = document.select(&selector(GRID_CLASS_SELECTOR)).next() {
        let observations = parse_grid(&table_rows(table));
        if !observations.is_empty() {
            return observations;
        }
    }

    for table in document.select(&selector("table")) {
        let rows = table_rows(table);
        if is_grid_table(&rows) {
            return parse_grid(&rows);
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a grid with the given month headers; every cell holds `base + day`
    /// unless `cell` overrides it.
    fn grid_html(
        class: &str,
        headers: &[&str],
        cell: impl Fn(usize, u32) -> Option<String>,
    ) -> String {
        let mut html = format!("<table class=\"{class}\"><tr><th></th>");
        for h in headers {
            html.push_str(&format!("<th>{h}</th>"));
        }
        html.push_str("</tr>");
        for day in 1..=31u32 {
            html.push_str(&format!("<tr><td>{day}日</td>"));
            for col in 0..headers.len() {
                let v = cell(col, day).unwrap_or_else(|| format!("{}", 15000 + day));
                html.push_str(&format!("<td>{v}</td>"));
            }
            html.push_str("</tr>");
        }
        html.push_str("</table>");
        format!("<html><body>{html}</body></html>")
    }

    #[test]
    fn test_grid_drops_invalid_dates() {
        let html = grid_html("", &["2024年12月", "2025年1月", "2025年2月"], |_, _| None);
        let obs = extract_monthly_grid(&Html::parse_document(&html));
        // 31 + 31 + 28 valid days.
        assert_eq!(obs.len(), 90);
        assert!(obs.iter().all(|o| o.date_token != "2025-02-30"));
        assert!(obs.iter().all(|o| o.date_token != "2025-02-29"));
        assert!(obs.iter().any(|o| o.date_token == "2025-02-28"));
    }

    #[test]
    fn test_grid_keeps_placeholders_and_skips_blanks() {
        let html = grid_html("", &["2024年12月", "2025年1月"], |col, day| match (col, day) {
            (1, 2) => Some("-".to_string()),
            (1, 3) => Some(String::new()),
            (1, 4) => Some("休".to_string()),
            _ => None,
        });
        let obs = extract_monthly_grid(&Html::parse_document(&html));
        let find = |d: &str| obs.iter().find(|o| o.date_token == d);
        assert_eq!(find("2025-01-02").unwrap().price_token, "-");
        assert!(find("2025-01-03").is_none());
        assert!(find("2025-01-04").is_none());
        assert_eq!(find("2024-12-05").unwrap().price_token, "15005");
    }

    #[test]
    fn test_grid_requires_two_years() {
        let html = grid_html("", &["2025年1月", "2025年2月", "2025年3月"], |_, _| None);
        assert!(extract_monthly_grid(&Html::parse_document(&html)).is_empty());
    }

    #[test]
    fn test_grid_requires_consecutive_months() {
        let html = grid_html("", &["2024年11月", "2025年1月"], |_, _| None);
        assert!(extract_monthly_grid(&Html::parse_document(&html)).is_empty());
    }

    #[test]
    fn test_grid_accepts_descending_headers() {
        let html = grid_html("", &["2025年1月", "2024年12月"], |_, _| None);
        let obs = extract_monthly_grid(&Html::parse_document(&html));
        assert_eq!(obs.len(), 62);
    }

    #[test]
    fn test_grid_class_bypasses_shape_test() {
        // Single year: only accepted because of the upstream class.
        let html = grid_html("price_12months", &["2025年1月", "2025年2月"], |_, _| None);
        let obs = extract_monthly_grid(&Html::parse_document(&html));
        assert_eq!(obs.len(), 31 + 28);
    }

    #[test]
    fn test_grid_rejects_short_table() {
        let html = "<table><tr><th></th><th>2024年12月</th><th>2025年1月</th></tr>\
                    <tr><td>1日</td><td>1</td><td>2</td></tr></table>";
        assert!(extract_monthly_grid(&Html::parse_document(html)).is_empty());
    }

    #[test]
    fn test_flat_table() {
        let html = r#"<html><body>
            <table><tr><th>menu</th></tr><tr><td>home</td><td>about</td></tr></table>
            <table>
              <tr><th>日付</th><th>価格(円)</th></tr>
              <tr><td>2025/08/13</td><td>17,203円</td></tr>
              <tr><td>8月14日</td><td>-</td></tr>
              <tr><td>only one cell</td></tr>
              <tr><td>not a date</td><td>1</td></tr>
            </table></body></html>"#;
        let obs = extract_flat_table(&Html::parse_document(html), 2025);
        assert_eq!(
            obs,
            vec![
                RawObservation::new("2025-08-13", "17,203円"),
                RawObservation::new("2025-08-14", "-"),
            ]
        );
    }

    #[test]
    fn test_flat_table_skips_price_tables_without_dates() {
        let html = r#"<table><tr><th>price</th></tr><tr><td>1日</td><td>100</td></tr></table>
            <table><tr><th>Yen</th></tr><tr><td>2025-01-06</td><td>14500</td></tr></table>"#;
        let obs = extract_flat_table(&Html::parse_document(html), 2025);
        assert_eq!(obs, vec![RawObservation::new("2025-01-06", "14500")]);
    }

    #[test]
    fn test_parse_year_month_forms() {
        assert_eq!(parse_year_month("2024年9月"), Some((2024, 9)));
        assert_eq!(parse_year_month("2024-09"), Some((2024, 9)));
        assert_eq!(parse_year_month("2024/9"), Some((2024, 9)));
        assert_eq!(parse_year_month("2024年13月"), None);
        assert_eq!(parse_year_month("9月"), None);
    }
}
