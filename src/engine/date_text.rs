//! Pulls a calendar date out of loosely written remark text such as
//! "Fee due 25th Oct 2025" or "due 25/10/25".

use chrono::{DateTime, Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:st|nd|rd|th)\b").expect("valid ordinal regex"));

// "5 march", "5 of march", "05 mar., 2025"
static TEXTUAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})\s*(?:of\s+)?([a-z]{3,})\.?(?:,?\s*(\d{4})\b)?")
        .expect("valid textual date regex")
});

static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})\b")
        .expect("valid numeric date regex")
});

const MONTHS: &[&str] = &[
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Resolve a month token: a full name, or any prefix of at least three letters
/// ("oct", "sept", "octob").
fn month_from_name(token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|full| full.starts_with(token))
        .map(|i| i as u32 + 1)
}

#[derive(Debug, Clone, Copy)]
pub struct DateTextParser {
    reference: NaiveDate,
}

impl DateTextParser {
    /// `reference` supplies the year for dates written without one.
    pub fn new(reference: NaiveDate) -> Self {
        Self { reference }
    }

    pub fn parse(&self, text: &str) -> Option<NaiveDate> {
        let lowered = text.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        let normalized = ORDINAL_RE.replace_all(&lowered, "$1");

        self.parse_textual(&normalized)
            .or_else(|| parse_numeric(&normalized))
            .or_else(|| parse_fallback(text.trim()))
    }

    fn parse_textual(&self, text: &str) -> Option<NaiveDate> {
        for caps in TEXTUAL_RE.captures_iter(text) {
            let Some(month) = month_from_name(&caps[2]) else {
                continue;
            };
            let Ok(day) = caps[1].parse::<u32>() else {
                continue;
            };
            let year = match caps.get(3).map(|y| y.as_str().parse::<i32>()) {
                Some(Ok(y)) => y,
                Some(Err(_)) => continue,
                None => self.reference.year(),
            };
            // "30 feb" is not a date; a later mention may still be.
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date);
            }
        }
        None
    }
}

fn parse_numeric(text: &str) -> Option<NaiveDate> {
    let caps = NUMERIC_RE.captures(text)?;
    let p1: u32 = caps[1].parse().ok()?;
    let p2: u32 = caps[2].parse().ok()?;
    let year_str = &caps[3];
    let mut year: i32 = year_str.parse().ok()?;
    if year_str.len() == 2 {
        year += 2000;
    }

    // Day-first unless only the second field can be a day.
    let (day, month) = if p2 > 12 && p1 <= 12 { (p2, p1) } else { (p1, p2) };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_fallback(raw: &str) -> Option<NaiveDate> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc().date());
    }
    FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}
