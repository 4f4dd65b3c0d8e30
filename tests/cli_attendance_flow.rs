use std::path::Path;
use std::process::{Command, Output};

struct Workspace {
    dir: tempfile::TempDir,
}

const BASE_CONFIG: &str = "[institute]\nname = \"Test Academy\"\n\n[display]\ncolor = false\n";

impl Workspace {
    fn new() -> Self {
        Self::with_config("")
    }

    fn with_config(extra: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("config.toml"), format!("{}{}", BASE_CONFIG, extra))
            .expect("write config");
        Self { dir }
    }

    fn db(&self) -> rusqlite::Connection {
        rusqlite::Connection::open(self.path().join("data").join("rollbook.db")).expect("open db")
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_rollbook"))
            .args(args)
            .env("ROLLBOOK_CONFIG", self.path().join("config.toml"))
            .env("ROLLBOOK_DATA_DIR", self.path().join("data"))
            .env_remove("RUST_LOG")
            .output()
            .expect("spawn rollbook")
    }

    fn ok(&self, args: &[&str]) -> String {
        let out = self.run(args);
        assert!(
            out.status.success(),
            "{:?} failed: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8(out.stdout).expect("utf8 stdout")
    }

    fn fails(&self, args: &[&str]) -> String {
        let out = self.run(args);
        assert!(!out.status.success(), "{:?} unexpectedly succeeded", args);
        String::from_utf8_lossy(&out.stderr).into_owned()
    }
}

fn seeded() -> Workspace {
    seed(Workspace::new())
}

fn seed(ws: Workspace) -> Workspace {
    ws.ok(&[
        "batch", "add", "Evening Physics", "--start", "2025-01-01", "--end", "2025-03-31",
        "--from", "17:00", "--to", "18:30", "--days", "mon,thu", "--max", "2",
    ]);
    ws.ok(&["student", "add", "Asha", "--admission", "A1"]);
    ws.ok(&["student", "add", "Bilal", "--admission", "B1", "--remarks", "Fee due 01/01/2025"]);
    ws.ok(&["student", "add", "Chen", "--admission", "C1", "--remarks", "Fully paid"]);
    ws.ok(&["student", "enroll", "1", "--batch", "1"]);
    ws.ok(&["student", "enroll", "2", "--batch", "1"]);
    ws
}

#[test]
fn untaken_day_shows_everyone_present() {
    let ws = seeded();
    let out = ws.ok(&["attendance", "show", "1", "--date", "2025-01-06", "--today", "2025-01-06"]);
    assert!(out.contains("Not taken yet"), "{}", out);
    assert!(out.contains("2 of 2 present"), "{}", out);
}

#[test]
fn marking_then_reporting() {
    let ws = seeded();
    let out = ws.ok(&["attendance", "mark", "1", "--date", "2025-01-06", "--absent", "2"]);
    assert!(out.contains("Saved 2 entries"), "{}", out);
    ws.ok(&["attendance", "mark", "1", "--date", "2025-01-09"]);

    let show = ws.ok(&["attendance", "show", "1", "--date", "2025-01-06"]);
    assert!(show.contains("1 of 2 present"), "{}", show);

    let json = ws.ok(&[
        "attendance", "report", "1", "--from", "2025-01-01", "--to", "2025-01-31", "--json",
    ]);
    let report: serde_json::Value = serde_json::from_str(&json).expect("report json");
    assert_eq!(report["dates"], serde_json::json!(["2025-01-06", "2025-01-09"]));
    assert_eq!(report["students"][0]["name"], "Asha");
    assert_eq!(report["students"][0]["percentage"], 100);
    assert_eq!(report["students"][1]["percentage"], 50);
    assert_eq!(report["students"][1]["days"], serde_json::json!(["absent", "present"]));
    assert_eq!(report["summary"]["overall_percentage"], 75);
    assert_eq!(report["summary"]["low_performer"]["name"], "Bilal");
}

#[test]
fn report_without_records_is_empty_state() {
    let ws = seeded();
    let out = ws.ok(&["attendance", "report", "1", "--from", "2025-01-01", "--to", "2025-01-31"]);
    assert!(out.contains("No attendance recorded"), "{}", out);
}

#[test]
fn marking_a_student_outside_the_roster_fails() {
    let ws = seeded();
    let err = ws.fails(&["attendance", "mark", "1", "--date", "2025-01-06", "--absent", "3"]);
    assert!(err.contains("not enrolled"), "{}", err);
    let show = ws.ok(&["attendance", "show", "1", "--date", "2025-01-06"]);
    assert!(show.contains("Not taken yet"), "{}", show);
}

#[test]
fn full_batch_refuses_enrollment() {
    let ws = seeded();
    let err = ws.fails(&["student", "enroll", "3", "--batch", "1"]);
    assert!(err.contains("full"), "{}", err);
}

#[test]
fn fee_status_follows_today() {
    let ws = seeded();
    let pending = ws.ok(&["fee", "pending", "--today", "2025-02-01"]);
    assert!(pending.contains("Bilal"), "{}", pending);
    assert!(!pending.contains("Chen"), "{}", pending);

    let before_due = ws.ok(&["fee", "pending", "--today", "2024-12-01"]);
    assert!(!before_due.contains("Bilal"), "{}", before_due);

    let check = ws.ok(&["fee", "check", "FULLY PAID in cash"]);
    assert!(check.contains("paid"), "{}", check);
}

#[test]
fn batch_status_and_sessions_use_injected_today() {
    let ws = seeded();
    let upcoming = ws.ok(&["batch", "list", "--status", "upcoming", "--today", "2024-12-01"]);
    assert!(upcoming.contains("Evening Physics"), "{}", upcoming);
    let completed = ws.ok(&["batch", "list", "--status", "completed", "--today", "2024-12-01"]);
    assert!(!completed.contains("Evening Physics"), "{}", completed);

    // 2025-01-09 is a Thursday, 2025-01-10 a Friday.
    let thursday = ws.ok(&["batch", "today", "--today", "2025-01-09"]);
    assert!(thursday.contains("17:00-18:30"), "{}", thursday);
    let friday = ws.ok(&["batch", "today", "--today", "2025-01-10"]);
    assert!(friday.contains("No classes today"), "{}", friday);
}

#[test]
fn unreadable_saved_marks_block_marking_but_not_viewing() {
    let ws = seeded();
    ws.ok(&["attendance", "mark", "1", "--date", "2025-01-06", "--absent", "1,2"]);
    ws.db()
        .execute("UPDATE attendance SET is_present = 'x' WHERE student_id = 1", [])
        .expect("corrupt one row");

    let err = ws.fails(&["attendance", "mark", "1", "--date", "2025-01-06"]);
    assert!(err.contains("Reading saved attendance"), "{}", err);

    let bilal: i64 = ws
        .db()
        .query_row(
            "SELECT is_present FROM attendance WHERE student_id = 2 AND date = '2025-01-06'",
            [],
            |row| row.get(0),
        )
        .expect("bilal row");
    assert_eq!(bilal, 0);

    let show = ws.ok(&["attendance", "show", "1", "--date", "2025-01-06"]);
    assert!(show.contains("Not taken yet"), "{}", show);
}

#[test]
fn oversized_report_window_is_an_error() {
    let ws = seed(Workspace::with_config("\n[attendance]\nreport_window_days = 4294967295\n"));
    let err = ws.fails(&["attendance", "report", "1", "--to", "2025-01-31"]);
    assert!(err.contains("report_window_days"), "{}", err);
}

#[test]
fn re_enrolling_into_a_full_batch_is_reported_as_already_enrolled() {
    let ws = seeded();
    let out = ws.ok(&["student", "enroll", "2", "--batch", "1"]);
    assert!(out.contains("already in"), "{}", out);
}
