use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub days_of_week: Vec<Weekday>,
    pub faculty_id: Option<i64>,
    pub max_students: Option<u32>,
}

impl Batch {
    pub fn meets_on(&self, day: Weekday) -> bool {
        self.days_of_week.contains(&day)
    }

    pub fn timing(&self) -> String {
        match (self.start_time, self.end_time) {
            (Some(s), Some(e)) => format!("{}-{}", s.format("%H:%M"), e.format("%H:%M")),
            (Some(s), None) => s.format("%H:%M").to_string(),
            _ => "--".to_string(),
        }
    }
}

/// Parse "mon,wed,fri" (or full names) into weekdays, keeping Monday-first order.
pub fn parse_days(s: &str) -> Result<Vec<Weekday>> {
    let mut days = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let day: Weekday = part
            .parse()
            .map_err(|_| anyhow!("Unknown weekday '{}'. Use mon, tue, wed, thu, fri, sat, sun", part))?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    days.sort_by_key(|d| d.num_days_from_monday());
    Ok(days)
}

pub fn format_days(days: &[Weekday]) -> String {
    days.iter()
        .map(|d| d.to_string().to_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_day_names() {
        let days = parse_days("fri, Monday,wed,mon").unwrap();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        assert_eq!(format_days(&days), "mon,wed,fri");
    }

    #[test]
    fn rejects_unknown_day() {
        assert!(parse_days("mon,funday").is_err());
    }

    #[test]
    fn empty_day_list_is_allowed() {
        assert!(parse_days("").unwrap().is_empty());
    }
}
