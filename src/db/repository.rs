use anyhow::{anyhow, bail, Result};
use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

use crate::engine::reconcile::validate_submission;
use crate::models::batch::{format_days, parse_days};
use crate::models::{AttendanceEntry, AttendanceRecord, Batch, Faculty, Student};

pub const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e| anyhow!("Bad date '{}': {}", s, e))
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FMT).map_err(|e| anyhow!("Bad time '{}': {}", s, e))
}

fn opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
    s.as_deref().map(parse_date).transpose()
}

fn opt_time(s: Option<String>) -> Result<Option<NaiveTime>> {
    s.as_deref().map(parse_time).transpose()
}

// ─── Faculty repo ────────────────────────────────────────────────────────────

pub struct FacultyRepo;

impl FacultyRepo {
    pub fn add(
        conn: &Connection,
        name: &str,
        phone_number: Option<&str>,
        skill: Option<&str>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO faculty (name, phone_number, skill) VALUES (?1, ?2, ?3)",
            params![name, phone_number, skill],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list(conn: &Connection) -> Result<Vec<Faculty>> {
        let mut stmt =
            conn.prepare("SELECT id, name, phone_number, skill FROM faculty ORDER BY name, id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Faculty {
                id: row.get(0)?,
                name: row.get(1)?,
                phone_number: row.get(2)?,
                skill: row.get(3)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn exists(conn: &Connection, id: i64) -> Result<bool> {
        let found = conn
            .query_row("SELECT 1 FROM faculty WHERE id = ?1", params![id], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?;
        Ok(found.is_some())
    }
}

// ─── Batch repo ──────────────────────────────────────────────────────────────

pub struct NewBatch<'a> {
    pub name: &'a str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub days_of_week: &'a [chrono::Weekday],
    pub faculty_id: Option<i64>,
    pub max_students: Option<u32>,
}

/// id, name, start/end date, start/end time, days, faculty, max students
type BatchRow = (
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    Option<i64>,
    Option<u32>,
);

pub struct BatchRepo;

impl BatchRepo {
    pub fn add(conn: &Connection, batch: &NewBatch<'_>) -> Result<i64> {
        if batch.start_date > batch.end_date {
            bail!(
                "Batch start date {} is after end date {}",
                batch.start_date,
                batch.end_date
            );
        }
        conn.execute(
            "INSERT INTO batches
                (name, start_date, end_date, start_time, end_time, days_of_week, faculty_id, max_students)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                batch.name,
                batch.start_date.format(DATE_FMT).to_string(),
                batch.end_date.format(DATE_FMT).to_string(),
                batch.start_time.map(|t| t.format(TIME_FMT).to_string()),
                batch.end_time.map(|t| t.format(TIME_FMT).to_string()),
                format_days(batch.days_of_week),
                batch.faculty_id,
                batch.max_students,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    const SELECT: &'static str = "SELECT id, name, start_date, end_date, start_time, end_time,
                days_of_week, faculty_id, max_students
         FROM batches";

    pub fn list(conn: &Connection) -> Result<Vec<Batch>> {
        let mut stmt = conn.prepare(&format!("{} ORDER BY start_date, id", Self::SELECT))?;
        let rows = stmt.query_map([], Self::raw_row)?;

        let mut result = Vec::new();
        for r in rows {
            result.push(Self::from_raw(r?)?);
        }
        Ok(result)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Batch>> {
        let raw = conn
            .query_row(&format!("{} WHERE id = ?1", Self::SELECT), params![id], Self::raw_row)
            .optional()?;
        raw.map(Self::from_raw).transpose()
    }

    fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BatchRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ))
    }

    fn from_raw(raw: BatchRow) -> Result<Batch> {
        let (id, name, start_date, end_date, start_time, end_time, days, faculty_id, max_students) =
            raw;
        Ok(Batch {
            id,
            name,
            start_date: opt_date(start_date)?,
            end_date: opt_date(end_date)?,
            start_time: opt_time(start_time)?,
            end_time: opt_time(end_time)?,
            days_of_week: parse_days(&days)?,
            faculty_id,
            max_students,
        })
    }
}

// ─── Student repo ────────────────────────────────────────────────────────────

pub struct StudentRepo;

impl StudentRepo {
    pub fn add(
        conn: &Connection,
        name: &str,
        admission_number: &str,
        phone_number: Option<&str>,
        remarks: Option<&str>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO students (name, admission_number, phone_number, remarks)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, admission_number, phone_number, remarks],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list(conn: &Connection) -> Result<Vec<Student>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, admission_number, phone_number, remarks
             FROM students ORDER BY name, id",
        )?;
        let rows = stmt.query_map([], Self::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Student>> {
        conn.query_row(
            "SELECT id, name, admission_number, phone_number, remarks FROM students WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    /// Replace the remarks text. Returns false when the student does not exist.
    pub fn update_remarks(conn: &Connection, id: i64, remarks: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE students SET remarks = ?1 WHERE id = ?2",
            params![remarks, id],
        )?;
        Ok(changed > 0)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
        Ok(Student {
            id: row.get(0)?,
            name: row.get(1)?,
            admission_number: row.get(2)?,
            phone_number: row.get(3)?,
            remarks: row.get(4)?,
        })
    }
}

// ─── Enrollment repo ─────────────────────────────────────────────────────────

pub struct EnrollmentRepo;

impl EnrollmentRepo {
    /// Students enrolled in the batch right now, by name.
    pub fn roster(conn: &Connection, batch_id: i64) -> Result<Vec<Student>> {
        let mut stmt = conn.prepare(
            "SELECT s.id, s.name, s.admission_number, s.phone_number, s.remarks
             FROM batch_students bs JOIN students s ON s.id = bs.student_id
             WHERE bs.batch_id = ?1
             ORDER BY s.name, s.id",
        )?;
        let rows = stmt.query_map(params![batch_id], StudentRepo::from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(anyhow::Error::from)
    }

    pub fn count(conn: &Connection, batch_id: i64) -> Result<u32> {
        conn.query_row(
            "SELECT COUNT(*) FROM batch_students WHERE batch_id = ?1",
            params![batch_id],
            |row| row.get(0),
        )
        .map_err(anyhow::Error::from)
    }

    /// Enroll a student, respecting the batch's `max_students`. Returns false
    /// when the student was already enrolled.
    pub fn enroll(conn: &Connection, batch: &Batch, student_id: i64) -> Result<bool> {
        if Self::is_enrolled(conn, batch.id, student_id)? {
            return Ok(false);
        }
        if let Some(max) = batch.max_students {
            let current = Self::count(conn, batch.id)?;
            if current >= max {
                bail!("Batch '{}' is full ({} of {} seats taken)", batch.name, current, max);
            }
        }
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO batch_students (batch_id, student_id) VALUES (?1, ?2)",
            params![batch.id, student_id],
        )?;
        Ok(inserted > 0)
    }

    pub fn is_enrolled(conn: &Connection, batch_id: i64, student_id: i64) -> Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM batch_students WHERE batch_id = ?1 AND student_id = ?2)",
            params![batch_id, student_id],
            |row| row.get(0),
        )
        .map_err(anyhow::Error::from)
    }

    /// Past attendance rows are kept; the student simply leaves the roster.
    pub fn unenroll(conn: &Connection, batch_id: i64, student_id: i64) -> Result<bool> {
        let removed = conn.execute(
            "DELETE FROM batch_students WHERE batch_id = ?1 AND student_id = ?2",
            params![batch_id, student_id],
        )?;
        Ok(removed > 0)
    }
}

// ─── Attendance repo ─────────────────────────────────────────────────────────

pub struct AttendanceRepo;

impl AttendanceRepo {
    pub fn get_daily(
        conn: &Connection,
        batch_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>> {
        let mut stmt = conn.prepare(
            "SELECT batch_id, student_id, date, is_present
             FROM attendance WHERE batch_id = ?1 AND date = ?2
             ORDER BY student_id",
        )?;
        let day = date.format(DATE_FMT).to_string();
        let rows = stmt.query_map(params![batch_id, day], Self::raw_row)?;

        let mut result = Vec::new();
        for r in rows {
            result.push(Self::from_raw(r?)?);
        }
        Ok(result)
    }

    /// Upsert one entry per roster student for `date`.
    ///
    /// The submission is checked against the roster read inside the same
    /// transaction; a mismatch writes nothing.
    pub fn save(
        conn: &mut Connection,
        batch_id: i64,
        date: NaiveDate,
        entries: &[AttendanceEntry],
    ) -> Result<usize> {
        let tx = conn.transaction()?;
        let roster = EnrollmentRepo::roster(&tx, batch_id)?;
        validate_submission(&roster, entries)?;

        let date_str = date.format(DATE_FMT).to_string();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO attendance (batch_id, student_id, date, is_present)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(batch_id, student_id, date)
                 DO UPDATE SET is_present = ?4, updated_at = datetime('now')",
            )?;
            for e in entries {
                stmt.execute(params![batch_id, e.student_id, date_str, e.is_present as i32])?;
            }
        }
        tx.commit()?;
        log::info!(
            "saved {} attendance entries for batch {} on {}",
            entries.len(),
            batch_id,
            date_str
        );
        Ok(entries.len())
    }

    /// Records between `start` and `end` inclusive, grouped by date.
    pub fn by_date_range(
        conn: &Connection,
        batch_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, Vec<AttendanceRecord>>> {
        let mut stmt = conn.prepare(
            "SELECT batch_id, student_id, date, is_present
             FROM attendance WHERE batch_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, student_id",
        )?;
        let rows = stmt.query_map(
            params![
                batch_id,
                start.format(DATE_FMT).to_string(),
                end.format(DATE_FMT).to_string()
            ],
            Self::raw_row,
        )?;

        let mut by_date: BTreeMap<NaiveDate, Vec<AttendanceRecord>> = BTreeMap::new();
        for r in rows {
            let record = Self::from_raw(r?)?;
            by_date.entry(record.date).or_default().push(record);
        }
        Ok(by_date)
    }

    fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, i64, String, i32)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    }

    fn from_raw(raw: (i64, i64, String, i32)) -> Result<AttendanceRecord> {
        let (batch_id, student_id, date, is_present) = raw;
        Ok(AttendanceRecord {
            batch_id,
            student_id,
            date: parse_date(&date)?,
            is_present: is_present != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::engine::AttendanceError;
    use chrono::Weekday;

    fn ymd(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FMT).unwrap()
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn add_batch(conn: &Connection, max: Option<u32>) -> Batch {
        let days = [Weekday::Mon, Weekday::Thu];
        let id = BatchRepo::add(
            conn,
            &NewBatch {
                name: "Morning Maths",
                start_date: ymd("2025-01-01"),
                end_date: ymd("2025-03-31"),
                start_time: NaiveTime::from_hms_opt(7, 30, 0),
                end_time: NaiveTime::from_hms_opt(9, 0, 0),
                days_of_week: &days,
                faculty_id: None,
                max_students: max,
            },
        )
        .unwrap();
        BatchRepo::get(conn, id).unwrap().unwrap()
    }

    fn add_student(conn: &Connection, name: &str, adm: &str) -> i64 {
        StudentRepo::add(conn, name, adm, None, None).unwrap()
    }

    #[test]
    fn batch_round_trips_through_the_table() {
        let conn = setup();
        let batch = add_batch(&conn, Some(30));
        assert_eq!(batch.name, "Morning Maths");
        assert_eq!(batch.days_of_week, vec![Weekday::Mon, Weekday::Thu]);
        assert_eq!(batch.timing(), "07:30-09:00");
        assert_eq!(batch.max_students, Some(30));
        assert_eq!(BatchRepo::list(&conn).unwrap().len(), 1);
    }

    #[test]
    fn batch_with_reversed_dates_is_rejected() {
        let conn = setup();
        let res = BatchRepo::add(
            &conn,
            &NewBatch {
                name: "Bad",
                start_date: ymd("2025-02-01"),
                end_date: ymd("2025-01-01"),
                start_time: None,
                end_time: None,
                days_of_week: &[],
                faculty_id: None,
                max_students: None,
            },
        );
        assert!(res.is_err());
    }

    #[test]
    fn full_batch_rejects_enrollment() {
        let conn = setup();
        let batch = add_batch(&conn, Some(1));
        let a = add_student(&conn, "Asha", "A1");
        let b = add_student(&conn, "Bilal", "B1");
        assert!(EnrollmentRepo::enroll(&conn, &batch, a).unwrap());
        assert!(EnrollmentRepo::enroll(&conn, &batch, b).is_err());
        assert_eq!(EnrollmentRepo::count(&conn, batch.id).unwrap(), 1);
    }

    #[test]
    fn re_enrolling_into_a_full_batch_is_a_no_op() {
        let conn = setup();
        let batch = add_batch(&conn, Some(1));
        let a = add_student(&conn, "Asha", "A1");
        assert!(EnrollmentRepo::enroll(&conn, &batch, a).unwrap());
        assert!(!EnrollmentRepo::enroll(&conn, &batch, a).unwrap());
        assert!(EnrollmentRepo::is_enrolled(&conn, batch.id, a).unwrap());
    }

    #[test]
    fn unreadable_daily_row_is_an_error() {
        let mut conn = setup();
        let batch = add_batch(&conn, None);
        let a = add_student(&conn, "Asha", "A1");
        EnrollmentRepo::enroll(&conn, &batch, a).unwrap();
        let day = ymd("2025-01-06");
        let entries = [AttendanceEntry { student_id: a, is_present: false }];
        AttendanceRepo::save(&mut conn, batch.id, day, &entries).unwrap();
        conn.execute("UPDATE attendance SET is_present = 'x'", []).unwrap();

        assert!(AttendanceRepo::get_daily(&conn, batch.id, day).is_err());
    }

    #[test]
    fn enrolling_twice_is_a_no_op() {
        let conn = setup();
        let batch = add_batch(&conn, None);
        let a = add_student(&conn, "Asha", "A1");
        assert!(EnrollmentRepo::enroll(&conn, &batch, a).unwrap());
        assert!(!EnrollmentRepo::enroll(&conn, &batch, a).unwrap());
    }

    #[test]
    fn save_upserts_one_row_per_student_and_date() {
        let mut conn = setup();
        let batch = add_batch(&conn, None);
        let a = add_student(&conn, "Asha", "A1");
        let b = add_student(&conn, "Bilal", "B1");
        EnrollmentRepo::enroll(&conn, &batch, a).unwrap();
        EnrollmentRepo::enroll(&conn, &batch, b).unwrap();
        let day = ymd("2025-01-06");

        let first = [
            AttendanceEntry { student_id: a, is_present: true },
            AttendanceEntry { student_id: b, is_present: true },
        ];
        AttendanceRepo::save(&mut conn, batch.id, day, &first).unwrap();
        let second = [
            AttendanceEntry { student_id: a, is_present: true },
            AttendanceEntry { student_id: b, is_present: false },
        ];
        AttendanceRepo::save(&mut conn, batch.id, day, &second).unwrap();

        let records = AttendanceRepo::get_daily(&conn, batch.id, day).unwrap();
        assert_eq!(records.len(), 2);
        let bilal = records.iter().find(|r| r.student_id == b).unwrap();
        assert!(!bilal.is_present);
    }

    #[test]
    fn stale_submission_writes_nothing() {
        let mut conn = setup();
        let batch = add_batch(&conn, None);
        let a = add_student(&conn, "Asha", "A1");
        let b = add_student(&conn, "Bilal", "B1");
        EnrollmentRepo::enroll(&conn, &batch, a).unwrap();
        let day = ymd("2025-01-06");

        // Form was built for one student, then a second joined.
        let entries = [AttendanceEntry { student_id: a, is_present: true }];
        EnrollmentRepo::enroll(&conn, &batch, b).unwrap();

        let err = AttendanceRepo::save(&mut conn, batch.id, day, &entries).unwrap_err();
        assert_eq!(
            err.downcast_ref::<AttendanceError>(),
            Some(&AttendanceError::RosterMismatch { expected: 2, submitted: 1 })
        );
        assert!(AttendanceRepo::get_daily(&conn, batch.id, day).unwrap().is_empty());
    }

    #[test]
    fn range_groups_records_by_date() {
        let mut conn = setup();
        let batch = add_batch(&conn, None);
        let a = add_student(&conn, "Asha", "A1");
        EnrollmentRepo::enroll(&conn, &batch, a).unwrap();
        for (d, present) in [("2025-01-09", false), ("2025-01-06", true), ("2025-02-03", true)] {
            let entries = [AttendanceEntry { student_id: a, is_present: present }];
            AttendanceRepo::save(&mut conn, batch.id, ymd(d), &entries).unwrap();
        }

        let (start, end) = (ymd("2025-01-01"), ymd("2025-01-31"));
        let by_date = AttendanceRepo::by_date_range(&conn, batch.id, start, end).unwrap();
        let dates: Vec<NaiveDate> = by_date.keys().copied().collect();
        assert_eq!(dates, vec![ymd("2025-01-06"), ymd("2025-01-09")]);
    }

    #[test]
    fn unenrolled_student_leaves_roster_but_keeps_history() {
        let mut conn = setup();
        let batch = add_batch(&conn, None);
        let a = add_student(&conn, "Asha", "A1");
        EnrollmentRepo::enroll(&conn, &batch, a).unwrap();
        let day = ymd("2025-01-06");
        let entries = [AttendanceEntry { student_id: a, is_present: true }];
        AttendanceRepo::save(&mut conn, batch.id, day, &entries).unwrap();

        assert!(EnrollmentRepo::unenroll(&conn, batch.id, a).unwrap());
        assert!(EnrollmentRepo::roster(&conn, batch.id).unwrap().is_empty());
        assert_eq!(AttendanceRepo::get_daily(&conn, batch.id, day).unwrap().len(), 1);
    }

    #[test]
    fn remarks_update() {
        let conn = setup();
        let a = add_student(&conn, "Asha", "A1");
        assert!(StudentRepo::update_remarks(&conn, a, "Fully paid").unwrap());
        assert!(!StudentRepo::update_remarks(&conn, 999, "x").unwrap());
        let s = StudentRepo::get(&conn, a).unwrap().unwrap();
        assert_eq!(s.remarks_str(), "Fully paid");
    }
}
