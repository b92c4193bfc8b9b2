//! Price normalization: dedup, chronological carry-forward, newest-first.

use crate::extract::dates::to_ascii_digits;
use crate::types::{NormalizedObservation, RawObservation};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;

/// Tokens the upstream uses for "unchanged from the previous day".
const PLACEHOLDERS: &[&str] = &["-", "－", "—", "―", "‐", "–"];

/// Whether a price token is the carry-forward placeholder.
pub fn is_placeholder(token: &str) -> bool {
    let t = token.trim();
    PLACEHOLDERS.contains(&t)
}

/// A non-fatal problem met while normalizing.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseWarning {
    /// The date token is not a calendar date; the entry was dropped.
    InvalidDate { token: String },
    /// A placeholder with no earlier price; the entry was dropped.
    UnresolvedPlaceholder { date: NaiveDate },
    /// The price token did not parse; `substituted` was used instead.
    UnparseablePrice {
        date: NaiveDate,
        token: String,
        substituted: f64,
    },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDate { token } => write!(f, "unreadable date '{token}', dropped"),
            Self::UnresolvedPlaceholder { date } => {
                write!(f, "placeholder on {date} has no earlier price, dropped")
            }
            Self::UnparseablePrice {
                date,
                token,
                substituted,
            } => write!(f, "could not parse price '{token}' on {date}, used {substituted}"),
        }
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Newest first, unique dates, concrete prices.
    pub observations: Vec<NormalizedObservation>,
    pub warnings: Vec<ParseWarning>,
}

/// Turn raw observations into a resolved, newest-first series.
///
/// The first raw observation seen for a date wins. Prices are resolved in
/// ascending date order with a running `previous` value: a placeholder takes
/// `previous` (or is dropped when there is none), a token that fails to
/// parse takes `previous` or zero.
pub fn normalize(raw: &[RawObservation]) -> Normalized {
    let mut warnings = Vec::new();

    let mut seen: HashSet<NaiveDate> = HashSet::new();
    let mut dated: Vec<(NaiveDate, &str)> = Vec::with_capacity(raw.len());
    for obs in raw {
        let Ok(date) = NaiveDate::parse_from_str(obs.date_token.trim(), "%Y-%m-%d") else {
            warnings.push(ParseWarning::InvalidDate {
                token: obs.date_token.clone(),
            });
            continue;
        };
        if seen.insert(date) {
            dated.push((date, obs.price_token.trim()));
        }
    }

    dated.sort_by_key(|(date, _)| *date);

    let mut previous: Option<f64> = None;
    let mut observations = Vec::with_capacity(dated.len());

    for (date, token) in dated {
        let price = if is_placeholder(token) {
            match previous {
                Some(p) => p,
                None => {
                    warnings.push(ParseWarning::UnresolvedPlaceholder { date });
                    continue;
                }
            }
        } else {
            match parse_price(token) {
                Some(p) => p,
                None => {
                    let substituted = previous.unwrap_or(0.0);
                    warnings.push(ParseWarning::UnparseablePrice {
                        date,
                        token: token.to_string(),
                        substituted,
                    });
                    substituted
                }
            }
        };

        observations.push(NormalizedObservation {
            date,
            price,
            original_price_token: token.to_string(),
        });
        previous = Some(price);
    }

    observations.reverse();

    for w in &warnings {
        tracing::warn!("{w}");
    }

    Normalized {
        observations,
        warnings,
    }
}

/// Parse a price after discarding everything but digits and the decimal point.
pub fn parse_price(token: &str) -> Option<f64> {
    let cleaned: String = to_ascii_digits(token)
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|p| p.is_finite() && *p >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> Vec<RawObservation> {
        pairs.iter().map(|(d, p)| RawObservation::new(*d, *p)).collect()
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dates(n: &Normalized) -> Vec<String> {
        n.observations.iter().map(|o| o.date.to_string()).collect()
    }

    #[test]
    fn test_carry_forward() {
        let n = normalize(&raw(&[("2025-01-01", "1000"), ("2025-01-02", "-")]));
        assert_eq!(dates(&n), vec!["2025-01-02", "2025-01-01"]);
        assert_eq!(n.observations[0].price, 1000.0);
        assert_eq!(n.observations[0].original_price_token, "-");
        assert_eq!(n.observations[1].price, 1000.0);
        assert!(n.warnings.is_empty());
    }

    #[test]
    fn test_leading_placeholder_dropped() {
        let n = normalize(&raw(&[("2025-01-01", "-"), ("2025-01-02", "1200")]));
        assert_eq!(dates(&n), vec!["2025-01-02"]);
        assert_eq!(n.observations[0].price, 1200.0);
        assert_eq!(
            n.warnings,
            vec![ParseWarning::UnresolvedPlaceholder { date: d("2025-01-01") }]
        );
    }

    #[test]
    fn test_carry_forward_follows_date_order_not_input_order() {
        let n = normalize(&raw(&[
            ("2025-01-03", "-"),
            ("2025-01-01", "900"),
            ("2025-01-02", "950"),
        ]));
        assert_eq!(dates(&n), vec!["2025-01-03", "2025-01-02", "2025-01-01"]);
        assert_eq!(n.observations[0].price, 950.0);
    }

    #[test]
    fn test_chained_placeholders() {
        let n = normalize(&raw(&[
            ("2025-01-01", "1,000円"),
            ("2025-01-02", "－"),
            ("2025-01-03", "-"),
        ]));
        assert!(n.observations.iter().all(|o| o.price == 1000.0));
    }

    #[test]
    fn test_first_seen_wins_on_duplicate_dates() {
        let n = normalize(&raw(&[("2025-01-01", "1000"), ("2025-01-01", "2000")]));
        assert_eq!(n.observations.len(), 1);
        assert_eq!(n.observations[0].price, 1000.0);
    }

    #[test]
    fn test_unparseable_price_substitution() {
        let n = normalize(&raw(&[
            ("2025-01-01", "n/a"),
            ("2025-01-02", "1200"),
            ("2025-01-03", "1.2.3"),
        ]));
        let by_date = |s: &str| n.observations.iter().find(|o| o.date == d(s)).unwrap().price;
        assert_eq!(by_date("2025-01-01"), 0.0);
        assert_eq!(by_date("2025-01-03"), 1200.0);
        assert_eq!(n.warnings.len(), 2);
    }

    #[test]
    fn test_invalid_dates_dropped() {
        let n = normalize(&raw(&[("2025-02-30", "1"), ("garbage", "2"), ("2025-03-01", "3")]));
        assert_eq!(dates(&n), vec!["2025-03-01"]);
        assert_eq!(n.warnings.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let n = normalize(&[]);
        assert!(n.observations.is_empty());
        assert!(n.warnings.is_empty());
    }

    #[test]
    fn test_output_strictly_descending_unique() {
        let n = normalize(&raw(&[
            ("2025-03-01", "3"),
            ("2025-01-01", "1"),
            ("2025-02-01", "-"),
            ("2025-01-01", "9"),
            ("2024-12-31", "0.5"),
        ]));
        assert!(n.observations.windows(2).all(|w| w[0].date > w[1].date));
    }

    #[test]
    fn test_idempotent_on_normalized_output() {
        let first = normalize(&raw(&[
            ("2025-01-01", "1000"),
            ("2025-01-02", "-"),
            ("2025-01-03", "1,050"),
            ("2025-01-04", "-"),
        ]));
        let mut again: Vec<RawObservation> = first
            .observations
            .iter()
            .map(|o| RawObservation::new(o.date.to_string(), o.price.to_string()))
            .collect();
        again.reverse();
        let second = normalize(&again);
        let pairs = |n: &Normalized| -> Vec<(NaiveDate, f64)> {
            n.observations.iter().map(|o| (o.date, o.price)).collect()
        };
        assert_eq!(pairs(&first), pairs(&second));
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("17,203円"), Some(17203.0));
        assert_eq!(parse_price("¥ 9,000.50"), Some(9000.5));
        assert_eq!(parse_price("１７，２０３"), Some(17203.0));
        assert_eq!(parse_price("-5"), Some(5.0));
        assert_eq!(parse_price("円"), None);
        assert_eq!(parse_price("1.2.3"), None);
    }

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder(" - "));
        assert!(is_placeholder("－"));
        assert!(!is_placeholder("--"));
        assert!(!is_placeholder("100"));
    }
}
