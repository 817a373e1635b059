//! Lenient publication-date parsing.
//!
//! Providers disagree on date shapes: PubMed uses `2024/01/15` or `2024 Jan 15`,
//! bioRxiv `2024-01-15`, Semantic Scholar sometimes only a year. Everything is
//! normalized to a calendar date; partial dates snap to the first day of the
//! missing unit, except query end bounds, which cover the whole period.

use chrono::{DateTime, Datelike, Months, NaiveDate};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parse a date in any of the strict query formats:
/// `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY-MM`, `YYYY/MM` or `YYYY`.
pub fn parse_query_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    let parts: Vec<&str> = input.split(['-', '/']).collect();

    // Mixed separators such as "2024-01/05" are rejected
    if input.contains('-') && input.contains('/') {
        return None;
    }

    match parts.as_slice() {
        [y] if y.len() == 4 => ymd(y, "1", "1"),
        [y, m] if y.len() == 4 && m.len() <= 2 => ymd(y, m, "1"),
        [y, m, d] if y.len() == 4 && m.len() <= 2 && d.len() <= 2 => ymd(y, m, d),
        _ => None,
    }
}

/// Parse the end bound of a query range: `YYYY` is the last day of that year
/// and `YYYY-MM` the last day of that month.
pub fn parse_query_end_date(input: &str) -> Option<NaiveDate> {
    let first = parse_query_date(input)?;
    let next = match input.trim().split(['-', '/']).count() {
        1 => NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?,
        2 => first.checked_add_months(Months::new(1))?,
        _ => return Some(first),
    };
    next.pred_opt()
}

/// Parse whatever a provider hands back, falling back to `None` when nothing fits.
pub fn parse_flexible_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Some(date) = parse_query_date(input) {
        return Some(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }

    // "2024-01-15T10:00:00" and similar timestamp prefixes
    if input.len() > 10 && input.is_char_boundary(10) {
        if let Some(date) = parse_query_date(&input[..10]) {
            return Some(date);
        }
    }

    // "2024 Jan 15", "2024 Jan", "2023 Dec-2024 Jan"
    let tokens: Vec<&str> = input.split_whitespace().collect();
    match tokens.as_slice() {
        [y, m, d, ..] => {
            let month = month_number(m)?;
            let day = d.trim_end_matches(|c: char| !c.is_ascii_digit());
            ymd(y, &month.to_string(), day).or_else(|| ymd(y, &month.to_string(), "1"))
        }
        [y, m] => ymd(y, &month_number(m)?.to_string(), "1"),
        _ => None,
    }
}

/// Format a date the way PubMed's E-utilities expect it.
pub fn pubmed_format(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

/// Format a date as ISO `YYYY-MM-DD`.
pub fn iso_format(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn month_number(token: &str) -> Option<u32> {
    let lower = token.to_lowercase();
    let prefix = lower.get(..3)?;
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|idx| idx as u32 + 1)
        .or_else(|| lower.parse::<u32>().ok().filter(|m| (1..=12).contains(m)))
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    let day: u32 = d.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_query_formats() {
        assert_eq!(parse_query_date("2024/01/15"), Some(date(2024, 1, 15)));
        assert_eq!(parse_query_date("2024-01-15"), Some(date(2024, 1, 15)));
        assert_eq!(parse_query_date("2024-03"), Some(date(2024, 3, 1)));
        assert_eq!(parse_query_date("2024"), Some(date(2024, 1, 1)));
    }

    #[test]
    fn test_end_bound_covers_whole_period() {
        assert_eq!(parse_query_end_date("2024"), Some(date(2024, 12, 31)));
        assert_eq!(parse_query_end_date("2024-02"), Some(date(2024, 2, 29)));
        assert_eq!(parse_query_end_date("2023/12"), Some(date(2023, 12, 31)));
        assert_eq!(parse_query_end_date("2024-03-10"), Some(date(2024, 3, 10)));
        assert_eq!(parse_query_end_date("2024-13"), None);
    }

    #[test]
    fn test_query_rejects_garbage() {
        assert_eq!(parse_query_date("yesterday"), None);
        assert_eq!(parse_query_date("2024-13-01"), None);
        assert_eq!(parse_query_date("2024-01/05"), None);
        assert_eq!(parse_query_date("24/01/05"), None);
    }

    #[test]
    fn test_flexible_provider_dates() {
        assert_eq!(parse_flexible_date("2024 Jan 15"), Some(date(2024, 1, 15)));
        assert_eq!(parse_flexible_date("2023 Dec"), Some(date(2023, 12, 1)));
        assert_eq!(
            parse_flexible_date("2023-05-02T17:59:59Z"),
            Some(date(2023, 5, 2))
        );
        assert_eq!(
            parse_flexible_date("2021-07-09T00:00:00"),
            Some(date(2021, 7, 9))
        );
        assert_eq!(parse_flexible_date(""), None);
        assert_eq!(parse_flexible_date("Spring"), None);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(pubmed_format(date(2024, 1, 5)), "2024/01/05");
        assert_eq!(iso_format(date(2024, 1, 5)), "2024-01-05");
    }
}
