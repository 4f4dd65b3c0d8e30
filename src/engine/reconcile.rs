//! Matches a batch roster against the attendance saved for one date.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use thiserror::Error;

use crate::models::{AttendanceEntry, AttendanceRecord, Student};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkSource {
    /// A record exists for this student on this date.
    Recorded,
    /// Nobody has been marked for the date yet.
    DefaultPresent,
    /// Others were marked for the date, this student was not.
    DefaultAbsent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetEntry {
    pub student_id: i64,
    pub name: String,
    pub admission_number: String,
    pub is_present: bool,
    pub source: MarkSource,
}

/// Present/absent for every roster student, in roster order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttendanceSheet {
    pub entries: Vec<SheetEntry>,
}

impl AttendanceSheet {
    pub fn as_map(&self) -> HashMap<i64, bool> {
        self.entries.iter().map(|e| (e.student_id, e.is_present)).collect()
    }

    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_present).count()
    }

    /// True when nothing on the sheet came from a saved record.
    pub fn is_untaken(&self) -> bool {
        self.entries.iter().all(|e| e.source != MarkSource::Recorded)
    }

    pub fn set(&mut self, student_id: i64, is_present: bool) -> bool {
        match self.entries.iter_mut().find(|e| e.student_id == student_id) {
            Some(entry) => {
                entry.is_present = is_present;
                true
            }
            None => false,
        }
    }

    pub fn to_entries(&self) -> Vec<AttendanceEntry> {
        self.entries
            .iter()
            .map(|e| AttendanceEntry {
                student_id: e.student_id,
                is_present: e.is_present,
            })
            .collect()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttendanceError {
    #[error("roster has {expected} students but {submitted} entries were submitted; reload and try again")]
    RosterMismatch { expected: usize, submitted: usize },
    #[error("student {0} is not enrolled in this batch")]
    UnknownStudent(i64),
    #[error("student {0} appears more than once")]
    DuplicateStudent(i64),
}

/// `records` must all belong to one batch and one date. Records for students
/// not on the roster are ignored.
pub fn reconcile(roster: &[Student], records: &[AttendanceRecord]) -> AttendanceSheet {
    let mut by_student: HashMap<i64, bool> = HashMap::with_capacity(records.len());
    for r in records {
        by_student.entry(r.student_id).or_insert(r.is_present);
    }
    let taken = !records.is_empty();

    let entries = roster
        .iter()
        .map(|s| {
            let (is_present, source) = match by_student.get(&s.id) {
                Some(&present) => (present, MarkSource::Recorded),
                None if taken => (false, MarkSource::DefaultAbsent),
                None => (true, MarkSource::DefaultPresent),
            };
            SheetEntry {
                student_id: s.id,
                name: s.name.clone(),
                admission_number: s.admission_number.clone(),
                is_present,
                source,
            }
        })
        .collect();

    AttendanceSheet { entries }
}

/// A failed daily lookup means the date has not been attended yet.
pub fn records_or_default<E: Display>(
    lookup: Result<Vec<AttendanceRecord>, E>,
) -> Vec<AttendanceRecord> {
    match lookup {
        Ok(records) => records,
        Err(e) => {
            log::warn!("attendance lookup failed, treating date as not yet taken: {}", e);
            Vec::new()
        }
    }
}

/// Check a submission against the roster as it is now. Nothing may be saved
/// unless every roster student appears exactly once.
pub fn validate_submission(
    roster: &[Student],
    entries: &[AttendanceEntry],
) -> Result<(), AttendanceError> {
    if entries.len() != roster.len() {
        return Err(AttendanceError::RosterMismatch {
            expected: roster.len(),
            submitted: entries.len(),
        });
    }
    let enrolled: HashSet<i64> = roster.iter().map(|s| s.id).collect();
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !enrolled.contains(&entry.student_id) {
            return Err(AttendanceError::UnknownStudent(entry.student_id));
        }
        if !seen.insert(entry.student_id) {
            return Err(AttendanceError::DuplicateStudent(entry.student_id));
        }
    }
    Ok(())
}
