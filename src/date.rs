//! Partial ISO dates (`2024`, `2024-02`, `2024-02-05`) and date ranges
//! (`2024-02-06/2024-02-08`) as used by BibLaTeX `date` fields.

use chrono::{Datelike, Month, NaiveDate};

/// A date with optional month and day.
///
/// Ordering compares year, then month, then day; a missing component orders
/// before any present one, so `2024 < 2024-01 < 2024-01-01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartialDate {
    pub year: u16,
    pub month: Option<u8>,
    pub day: Option<u8>,
}

impl PartialDate {
    /// Parses `YYYY`, `YYYY-MM` or `YYYY-MM-DD`. For a range, only the
    /// start is parsed. A full date must exist in the calendar.
    ///
    /// ```
    /// use bib_pages::date::PartialDate;
    ///
    /// let d = PartialDate::parse("2024-02-06/2024-02-08").unwrap();
    /// assert_eq!((d.year, d.month, d.day), (2024, Some(2), Some(6)));
    /// ```
    pub fn parse(input: &str) -> Option<Self> {
        let start = input.split('/').next()?.trim();
        let mut parts = start.split('-');

        let year = parts.next().filter(|y| y.len() == 4)?;
        let year = parse_number(year, 4)?;
        let month = match parts.next() {
            Some(m) => Some(parse_number(m, 2).filter(|m| (1..=12).contains(m))? as u8),
            None => None,
        };
        let day = match parts.next() {
            Some(d) => Some(parse_number(d, 2).filter(|d| (1..=31).contains(d))? as u8),
            None => None,
        };
        if parts.next().is_some() {
            return None;
        }

        let date = PartialDate { year, month, day };
        if day.is_some() {
            date.to_naive()?;
        }
        Some(date)
    }

    /// The calendar date, when all three components are present and valid.
    pub fn to_naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year),
            u32::from(self.month?),
            u32::from(self.day?),
        )
    }

    /// Reads the leading year out of a free-form `year` field (`2021`, `2021a`).
    pub fn from_year(input: &str) -> Option<Self> {
        let digits: String = input
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.len() != 4 {
            return None;
        }
        Some(PartialDate {
            year: digits.parse().ok()?,
            month: None,
            day: None,
        })
    }
}

fn parse_number(s: &str, max_len: usize) -> Option<u16> {
    if s.is_empty() || s.len() > max_len || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn month_name(month: u8) -> &'static str {
    Month::try_from(month).map_or("", |m| m.name())
}

/// Formats a `date` field for display.
///
/// Unrecognised input is returned unchanged.
///
/// ```
/// use bib_pages::date::format_date;
///
/// assert_eq!(format_date("2024-02-05"), "5 February 2024");
/// assert_eq!(format_date("2024-02-06/2024-02-08"), "6–8 February 2024");
/// ```
pub fn format_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Some((start, end)) = raw.split_once('/') {
        return match (PartialDate::parse(start), PartialDate::parse(end)) {
            (Some(s), Some(e)) => format_range(s, e).unwrap_or_else(|| raw.to_string()),
            _ => raw.to_string(),
        };
    }

    match PartialDate::parse(raw) {
        Some(date) => match (date.to_naive(), date.month) {
            (Some(day), _) => day.format("%-d %B %Y").to_string(),
            (None, Some(m)) => format!("{} {}", month_name(m), date.year),
            (None, None) => date.year.to_string(),
        },
        None => raw.to_string(),
    }
}

fn format_range(start: PartialDate, end: PartialDate) -> Option<String> {
    let (start, end) = (start.to_naive()?, end.to_naive()?);

    let formatted = if start.year() != end.year() {
        format!("{} – {}", start.format("%-d %B %Y"), end.format("%-d %B %Y"))
    } else if start.month() == end.month() {
        format!("{}–{}", start.format("%-d"), end.format("%-d %B %Y"))
    } else {
        format!("{} – {}", start.format("%-d %B"), end.format("%-d %B %Y"))
    };
    Some(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_dates() {
        assert_eq!(
            PartialDate::parse("2024"),
            Some(PartialDate { year: 2024, month: None, day: None })
        );
        assert_eq!(
            PartialDate::parse("2024-02"),
            Some(PartialDate { year: 2024, month: Some(2), day: None })
        );
        assert_eq!(
            PartialDate::parse("2024-02-05"),
            Some(PartialDate { year: 2024, month: Some(2), day: Some(5) })
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(PartialDate::parse(""), None);
        assert_eq!(PartialDate::parse("spring 2024"), None);
        assert_eq!(PartialDate::parse("2024-13"), None);
        assert_eq!(PartialDate::parse("2024-02-05-01"), None);
        assert_eq!(PartialDate::parse("24-02-05"), None);
    }

    #[test]
    fn test_ordering_is_chronological() {
        let a = PartialDate::parse("2023-12-31").unwrap();
        let b = PartialDate::parse("2024").unwrap();
        let c = PartialDate::parse("2024-01").unwrap();
        let d = PartialDate::parse("2024-01-15").unwrap();
        assert!(a < b && b < c && c < d);
    }

    #[test]
    fn test_from_year() {
        assert_eq!(PartialDate::from_year("2021").map(|d| d.year), Some(2021));
        assert_eq!(PartialDate::from_year(" 2021a ").map(|d| d.year), Some(2021));
        assert_eq!(PartialDate::from_year("in press"), None);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-02-05"), "5 February 2024");
        assert_eq!(format_date("2024-11"), "November 2024");
        assert_eq!(format_date("2024"), "2024");
        assert_eq!(format_date("sometime"), "sometime");
    }

    #[test]
    fn test_format_date_ranges() {
        assert_eq!(format_date("2024-02-06/2024-02-08"), "6–8 February 2024");
        assert_eq!(
            format_date("2024-02-28/2024-03-02"),
            "28 February – 2 March 2024"
        );
        assert_eq!(
            format_date("2023-12-30/2024-01-02"),
            "30 December 2023 – 2 January 2024"
        );
        assert_eq!(format_date("2024/2025"), "2024/2025");
    }

    #[test]
    fn test_impossible_dates_are_rejected() {
        assert_eq!(PartialDate::parse("2024-02-31"), None);
        assert_eq!(PartialDate::parse("2023-02-29"), None);
        assert!(PartialDate::parse("2024-02-29").is_some());

        assert_eq!(format_date("2024-02-31"), "2024-02-31");
        assert_eq!(format_date("2024-04-31/2024-05-02"), "2024-04-31/2024-05-02");
    }
}
