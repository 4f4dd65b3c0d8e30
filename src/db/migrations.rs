use anyhow::Result;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS faculty (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            name          TEXT NOT NULL,
            phone_number  TEXT,
            skill         TEXT,
            created_at    TEXT DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS batches (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            name          TEXT NOT NULL,
            start_date    TEXT,
            end_date      TEXT,
            start_time    TEXT,
            end_time      TEXT,
            days_of_week  TEXT NOT NULL DEFAULT '',
            faculty_id    INTEGER REFERENCES faculty(id),
            max_students  INTEGER,
            created_at    TEXT DEFAULT (datetime('now')),
            CHECK(start_date IS NULL OR end_date IS NULL OR start_date <= end_date)
        );

        CREATE TABLE IF NOT EXISTS students (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            name              TEXT NOT NULL,
            admission_number  TEXT NOT NULL UNIQUE,
            phone_number      TEXT,
            remarks           TEXT,
            created_at        TEXT DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS batch_students (
            batch_id    INTEGER NOT NULL REFERENCES batches(id),
            student_id  INTEGER NOT NULL REFERENCES students(id),
            enrolled_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY (batch_id, student_id)
        );

        CREATE TABLE IF NOT EXISTS attendance (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id    INTEGER NOT NULL REFERENCES batches(id),
            student_id  INTEGER NOT NULL REFERENCES students(id),
            date        TEXT NOT NULL,
            is_present  INTEGER NOT NULL,
            updated_at  TEXT DEFAULT (datetime('now')),
            UNIQUE(batch_id, student_id, date)
        );

        CREATE INDEX IF NOT EXISTS idx_attendance_batch_date ON attendance(batch_id, date);
    ")?;
    Ok(())
}
