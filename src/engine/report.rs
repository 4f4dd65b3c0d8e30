use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::models::{AttendanceRecord, DayStatus, Student};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAttendance {
    pub student_id: i64,
    pub name: String,
    pub admission_number: String,
    /// One status per report date, same order as [`AttendanceReport::dates`].
    pub days: Vec<DayStatus>,
    pub present_count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performer {
    pub student_id: i64,
    pub name: String,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub overall_percentage: u32,
    pub top_performer: Option<Performer>,
    pub low_performer: Option<Performer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceReport {
    pub dates: Vec<NaiveDate>,
    pub students: Vec<StudentAttendance>,
    pub summary: ReportSummary,
}

/// `numerator / denominator` as a whole percentage, rounding halves up.
pub fn percent(numerator: usize, denominator: usize) -> u32 {
    if denominator == 0 {
        return 0;
    }
    ((200 * numerator + denominator) / (2 * denominator)) as u32
}

/// Build the report for `students` over every date in `attendance_by_date`.
///
/// Returns `None` when there are no dates. Every date is part of each
/// student's denominator, so a date with no record for a student counts the
/// same as an absence.
pub fn aggregate(
    students: &[Student],
    attendance_by_date: &BTreeMap<NaiveDate, Vec<AttendanceRecord>>,
) -> Option<AttendanceReport> {
    if attendance_by_date.is_empty() {
        return None;
    }
    let dates: Vec<NaiveDate> = attendance_by_date.keys().copied().collect();

    let lookup: Vec<HashMap<i64, bool>> = attendance_by_date
        .values()
        .map(|records| {
            let mut day = HashMap::with_capacity(records.len());
            for r in records {
                day.entry(r.student_id).or_insert(r.is_present);
            }
            day
        })
        .collect();

    let rows: Vec<StudentAttendance> = students
        .iter()
        .map(|s| {
            let days: Vec<DayStatus> = lookup
                .iter()
                .map(|day| match day.get(&s.id) {
                    Some(true) => DayStatus::Present,
                    Some(false) => DayStatus::Absent,
                    None => DayStatus::NoClass,
                })
                .collect();
            let present_count = days.iter().filter(|d| **d == DayStatus::Present).count();
            StudentAttendance {
                student_id: s.id,
                name: s.name.clone(),
                admission_number: s.admission_number.clone(),
                percentage: percent(present_count, dates.len()),
                days,
                present_count,
            }
        })
        .collect();

    let total_present: usize = rows.iter().map(|r| r.present_count).sum();
    let overall_percentage = percent(total_present, rows.len() * dates.len());

    let mut ranked: Vec<&StudentAttendance> = rows.iter().collect();
    ranked.sort_by(|a, b| b.percentage.cmp(&a.percentage));
    let performer = |r: &&StudentAttendance| Performer {
        student_id: r.student_id,
        name: r.name.clone(),
        percentage: r.percentage,
    };

    let summary = ReportSummary {
        overall_percentage,
        top_performer: ranked.first().map(performer),
        low_performer: ranked.last().map(performer),
    };

    Some(AttendanceReport {
        dates,
        students: rows,
        summary,
    })
}
