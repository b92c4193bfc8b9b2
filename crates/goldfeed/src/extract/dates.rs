//! Date token parsing shared by the extraction strategies.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

fn ymd_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4})\s*[-/.年]\s*(\d{1,2})\s*[-/.月]\s*(\d{1,2})")
            .expect("ymd regex is valid")
    })
}

fn mdy_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})[-/](\d{1,2})[-/](\d{4})").expect("mdy regex is valid")
    })
}

fn md_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})\s*[-/月]\s*(\d{1,2})(?:\s*日)?(?:\D|$)").expect("md regex is valid")
    })
}

/// Replace full-width digits and separators with their ASCII forms.
pub(crate) fn to_ascii_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            '／' => '/',
            '－' => '-',
            '．' => '.',
            _ => c,
        })
        .collect()
}

/// Parse a date-like token into a calendar date.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY年M月D日`, `MM/DD/YYYY` and the
/// yearless `M/D`, `M-D`, `M月D日`. Only the leading date is read; trailing
/// weekday or time-of-day text is ignored. Yearless tokens take
/// `reference_year`. Returns `None` for non-existent dates.
pub fn parse_date_token(token: &str, reference_year: i32) -> Option<NaiveDate> {
    let text = to_ascii_digits(token.trim());

    if let Some(c) = ymd_re().captures(&text) {
        return ymd(&c[1], &c[2], &c[3]);
    }

    if let Some(c) = mdy_re().captures(&text) {
        let (a, b): (u32, u32) = (c[1].parse().ok()?, c[2].parse().ok()?);
        let year: i32 = c[3].parse().ok()?;
        // Month first unless that cannot be a month.
        return NaiveDate::from_ymd_opt(year, a, b).or_else(|| NaiveDate::from_ymd_opt(year, b, a));
    }

    if let Some(c) = md_re().captures(&text) {
        let month: u32 = c[1].parse().ok()?;
        let day: u32 = c[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(reference_year, month, day);
    }

    None
}

pub(crate) fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Canonical token for a date: `YYYY-MM-DD`.
pub(crate) fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
