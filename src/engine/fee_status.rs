use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::engine::date_text::DateTextParser;
use crate::models::FeeStatus;

static FULLY_PAID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfull(y)?\s*paid\b").expect("valid fully-paid regex"));

/// Classify a remark as of `today`.
///
/// A remark whose due date is today or earlier is pending; a future due date
/// is not yet due and stays unknown, as does any remark without a readable date.
pub fn classify(remark: &str, today: NaiveDate) -> FeeStatus {
    let remark = remark.trim();
    if remark.is_empty() {
        return FeeStatus::Unknown;
    }
    if FULLY_PAID_RE.is_match(remark) {
        return FeeStatus::Paid;
    }
    match DateTextParser::new(today).parse(remark) {
        Some(due) if due <= today => FeeStatus::Pending,
        _ => FeeStatus::Unknown,
    }
}

/// Same as [`classify`] for an optional remark column.
pub fn classify_opt(remark: Option<&str>, today: NaiveDate) -> FeeStatus {
    remark.map_or(FeeStatus::Unknown, |r| classify(r, today))
}
