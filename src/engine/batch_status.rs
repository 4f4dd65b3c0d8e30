use chrono::{Datelike, NaiveDate};

use crate::models::{Batch, BatchStatus};

/// Status of a date range as seen on `today`. Both ends are inclusive; a batch
/// missing either date is treated as upcoming.
pub fn derive(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> BatchStatus {
    let (Some(start), Some(end)) = (start, end) else {
        return BatchStatus::Upcoming;
    };
    if today < start {
        BatchStatus::Upcoming
    } else if today > end {
        BatchStatus::Completed
    } else {
        BatchStatus::Active
    }
}

/// [`derive`] over `YYYY-MM-DD` payload strings. Unparsable text counts as missing.
pub fn derive_text(start: Option<&str>, end: Option<&str>, today: NaiveDate) -> BatchStatus {
    let parse =
        |s: Option<&str>| s.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok());
    derive(parse(start), parse(end), today)
}

pub fn batch_status(batch: &Batch, today: NaiveDate) -> BatchStatus {
    derive(batch.start_date, batch.end_date, today)
}

/// Active batches with a session on `today`'s weekday, ordered by start time.
pub fn sessions_on<'a>(batches: &'a [Batch], today: NaiveDate) -> Vec<&'a Batch> {
    let weekday = today.weekday();
    let mut sessions: Vec<&Batch> = batches
        .iter()
        .filter(|b| batch_status(b, today) == BatchStatus::Active && b.meets_on(weekday))
        .collect();
    sessions.sort_by_key(|b| b.start_time);
    sessions
}
