use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Persisted attendance; unique per (batch_id, student_id, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub batch_id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub is_present: bool,
}

/// One line of a save submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub student_id: i64,
    pub is_present: bool,
}
