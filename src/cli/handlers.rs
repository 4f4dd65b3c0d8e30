use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use rusqlite::Connection;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use crate::cli::args::{
    AttendanceCommands, BatchCommands, FacultyCommands, FeeCommands, StudentCommands,
};
use crate::config::AppConfig;
use crate::db::repository::{
    AttendanceRepo, BatchRepo, EnrollmentRepo, FacultyRepo, NewBatch, StudentRepo, DATE_FMT,
};
use crate::engine::batch_status::{batch_status, sessions_on};
use crate::engine::fee_status::{classify, classify_opt};
use crate::engine::reconcile::{reconcile, records_or_default};
use crate::engine::report::aggregate;
use crate::engine::{AttendanceSheet, DateTextParser, MarkSource};
use crate::models::batch::{format_days, parse_days};
use crate::models::{AttendanceRecord, Batch, BatchStatus, FeeStatus, Student};
use crate::session::MarkingSession;
use crate::utils::format::{column_width, pad, progress_bar, short_date};

// ─── ANSI helpers ────────────────────────────────────────────────────────────

macro_rules! println_colored {
    ($color:expr, $($arg:tt)*) => {{
        let color: &str = $color;
        print!("{}", color);
        print!($($arg)*);
        if color.is_empty() {
            println!();
        } else {
            println!("\x1b[0m");
        }
    }};
}

const RESET: &str = "\x1b[0m";

/// Escape codes, or empty strings when colour is switched off.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub green: &'static str,
    pub amber: &'static str,
    pub red: &'static str,
    pub dim: &'static str,
    pub bold: &'static str,
    pub accent: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        if enabled {
            Self {
                green: "\x1b[32m",
                amber: "\x1b[33m",
                red: "\x1b[31m",
                dim: "\x1b[2m",
                bold: "\x1b[1m",
                accent: "\x1b[38;2;86;156;214m",
                reset: RESET,
            }
        } else {
            Self {
                green: "",
                amber: "",
                red: "",
                dim: "",
                bold: "",
                accent: "",
                reset: "",
            }
        }
    }

    fn batch_status(&self, status: BatchStatus) -> &'static str {
        match status {
            BatchStatus::Upcoming => self.amber,
            BatchStatus::Active => self.green,
            BatchStatus::Completed => self.dim,
        }
    }
}

/// Per-invocation state shared by every handler.
pub struct Ctx {
    pub config: AppConfig,
    pub today: NaiveDate,
    pub palette: Palette,
}

impl Ctx {
    pub fn new(config: AppConfig, today: NaiveDate) -> Self {
        let palette = Palette::new(config.display.color);
        Self {
            config,
            today,
            palette,
        }
    }

    fn date_or_today(&self, date: Option<&str>) -> Result<NaiveDate> {
        date.map(parse_date_arg).transpose().map(|d| d.unwrap_or(self.today))
    }
}

pub fn parse_date_arg(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FMT)
        .map_err(|_| anyhow!("Invalid date '{}'. Use YYYY-MM-DD", s))
}

fn parse_time_arg(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| anyhow!("Invalid time '{}'. Use HH:MM", s))
}

fn require_batch(conn: &Connection, id: i64) -> Result<Batch> {
    BatchRepo::get(conn, id)?.ok_or_else(|| anyhow!("Batch {} not found", id))
}

fn require_student(conn: &Connection, id: i64) -> Result<Student> {
    StudentRepo::get(conn, id)?.ok_or_else(|| anyhow!("Student {} not found", id))
}

// ─── Init ────────────────────────────────────────────────────────────────────

pub fn handle_init() -> Result<()> {
    let path = AppConfig::init_default()?;
    println!("  Config: {}", path.display());
    println!("  Data:   {}", AppConfig::db_path()?.display());
    Ok(())
}

// ─── Faculty ─────────────────────────────────────────────────────────────────

pub fn handle_faculty(conn: &Connection, ctx: &Ctx, action: &FacultyCommands) -> Result<()> {
    let p = ctx.palette;
    match action {
        FacultyCommands::Add { name, phone, skill } => {
            let id = FacultyRepo::add(conn, name, phone.as_deref(), skill.as_deref())?;
            println_colored!(p.green, "  ✓ Added faculty #{} {}", id, name);
        }
        FacultyCommands::List => {
            let faculty = FacultyRepo::list(conn)?;
            println!();
            if faculty.is_empty() {
                println_colored!(p.dim, "  No faculty yet. Add one with `rollbook faculty add <name>`");
            }
            let width = column_width(faculty.iter().map(|f| f.name.as_str()), 10);
            for f in &faculty {
                println!(
                    "  {:>4}  {}  {:<14}  {}",
                    f.id,
                    pad(&f.name, width),
                    f.phone_number.as_deref().unwrap_or("--"),
                    f.skill.as_deref().unwrap_or("")
                );
            }
            println!();
        }
    }
    Ok(())
}

// ─── Batches ─────────────────────────────────────────────────────────────────

pub fn handle_batch(conn: &Connection, ctx: &Ctx, action: &BatchCommands) -> Result<()> {
    let p = ctx.palette;
    match action {
        BatchCommands::Add {
            name,
            start,
            end,
            from,
            to,
            days,
            faculty,
            max,
        } => {
            let days = parse_days(days)?;
            if let Some(fid) = faculty {
                if !FacultyRepo::exists(conn, *fid)? {
                    bail!("Faculty {} not found", fid);
                }
            }
            let new = NewBatch {
                name: name.as_str(),
                start_date: parse_date_arg(start)?,
                end_date: parse_date_arg(end)?,
                start_time: from.as_deref().map(parse_time_arg).transpose()?,
                end_time: to.as_deref().map(parse_time_arg).transpose()?,
                days_of_week: &days,
                faculty_id: *faculty,
                max_students: *max,
            };
            let id = BatchRepo::add(conn, &new)?;
            let status = crate::engine::batch_status::derive(
                Some(new.start_date),
                Some(new.end_date),
                ctx.today,
            );
            println_colored!(p.green, "  ✓ Created batch #{} {} ({})", id, name, status);
        }
        BatchCommands::List { status } => {
            let wanted = status.as_deref().map(BatchStatus::from_str).transpose()?;
            let batches: Vec<(Batch, BatchStatus)> = BatchRepo::list(conn)?
                .into_iter()
                .map(|b| {
                    let s = batch_status(&b, ctx.today);
                    (b, s)
                })
                .filter(|(_, s)| wanted.is_none_or(|w| w == *s))
                .collect();

            println!();
            if batches.is_empty() {
                println_colored!(p.dim, "  No batches");
                println!();
                return Ok(());
            }
            let faculty: HashMap<i64, String> = FacultyRepo::list(conn)?
                .into_iter()
                .map(|f| (f.id, f.name))
                .collect();
            let width = column_width(batches.iter().map(|(b, _)| b.name.as_str()), 10);
            for (b, s) in &batches {
                let teacher = b
                    .faculty_id
                    .and_then(|id| faculty.get(&id))
                    .map_or("--", String::as_str);
                let seats = EnrollmentRepo::count(conn, b.id)?;
                let cap = b
                    .max_students
                    .map(|m| format!("{}/{}", seats, m))
                    .unwrap_or_else(|| seats.to_string());
                println!(
                    "  {:>4}  {}  {} → {}  {:<11}  {:<20}  {:<14}  {:>7}  {}{:<9}{}",
                    b.id,
                    pad(&b.name, width),
                    fmt_opt_date(b.start_date),
                    fmt_opt_date(b.end_date),
                    b.timing(),
                    format_days(&b.days_of_week),
                    teacher,
                    cap,
                    p.batch_status(*s),
                    s,
                    p.reset
                );
            }
            println!();
        }
        BatchCommands::Today => {
            let batches = BatchRepo::list(conn)?;
            let sessions = sessions_on(&batches, ctx.today);
            println!();
            println_colored!(
                p.accent,
                "  {} · sessions on {}",
                ctx.config.institute.name,
                short_date(ctx.today)
            );
            println!();
            if sessions.is_empty() {
                println_colored!(p.dim, "  No classes today");
            }
            for b in sessions {
                let seats = EnrollmentRepo::count(conn, b.id)?;
                println!("  {:<11}  #{:<4} {}  ({} students)", b.timing(), b.id, b.name, seats);
            }
            println!();
        }
    }
    Ok(())
}

fn fmt_opt_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.format(DATE_FMT).to_string())
        .unwrap_or_else(|| "----------".to_string())
}

// ─── Students ────────────────────────────────────────────────────────────────

pub fn handle_student(conn: &Connection, ctx: &Ctx, action: &StudentCommands) -> Result<()> {
    let p = ctx.palette;
    match action {
        StudentCommands::Add {
            name,
            admission,
            phone,
            remarks,
        } => {
            let id = StudentRepo::add(conn, name, admission, phone.as_deref(), remarks.as_deref())
                .with_context(|| format!("Adding student with admission number {}", admission))?;
            println_colored!(p.green, "  ✓ Added student #{} {}", id, name);
        }
        StudentCommands::List { batch, pending } => {
            let students = match batch {
                Some(id) => {
                    require_batch(conn, *id)?;
                    EnrollmentRepo::roster(conn, *id)?
                }
                None => StudentRepo::list(conn)?,
            };
            print_students(ctx, &students, *pending);
        }
        StudentCommands::Remark { student, text } => {
            if !StudentRepo::update_remarks(conn, *student, text)? {
                bail!("Student {} not found", student);
            }
            let status = classify(text, ctx.today);
            println_colored!(p.green, "  ✓ Remarks updated (fee: {})", status);
        }
        StudentCommands::Enroll { student, batch } => {
            let s = require_student(conn, *student)?;
            let b = require_batch(conn, *batch)?;
            if !EnrollmentRepo::enroll(conn, &b, s.id)? {
                println_colored!(p.amber, "  {} is already in {}", s.name, b.name);
                return Ok(());
            }
            log::info!("enrolled student {} in batch {}", s.id, b.id);
            // Read back rather than counting locally.
            let roster = EnrollmentRepo::roster(conn, b.id)?;
            println_colored!(
                p.green,
                "  ✓ {} joined {} ({} students)",
                s.name,
                b.name,
                roster.len()
            );
        }
        StudentCommands::Unenroll { student, batch } => {
            let s = require_student(conn, *student)?;
            let b = require_batch(conn, *batch)?;
            if EnrollmentRepo::unenroll(conn, b.id, s.id)? {
                println_colored!(p.green, "  ✓ {} left {}", s.name, b.name);
            } else {
                println_colored!(p.amber, "  {} was not in {}", s.name, b.name);
            }
        }
    }
    Ok(())
}

fn print_students(ctx: &Ctx, students: &[Student], pending_only: bool) {
    let p = ctx.palette;
    let rows: Vec<(&Student, FeeStatus)> = students
        .iter()
        .map(|s| (s, classify_opt(s.remarks.as_deref(), ctx.today)))
        .filter(|(_, fee)| !pending_only || *fee == FeeStatus::Pending)
        .collect();

    println!();
    if rows.is_empty() {
        println_colored!(p.dim, "  No students");
        println!();
        return;
    }
    let width = column_width(rows.iter().map(|(s, _)| s.name.as_str()), 10);
    for (s, fee) in &rows {
        println!(
            "  {:>4}  {}  {:<10}  {:<14}  {}  {}{}{}",
            s.id,
            pad(&s.name, width),
            s.admission_number,
            s.phone_number.as_deref().unwrap_or("--"),
            fee_marker(p, *fee),
            p.dim,
            s.remarks_str(),
            p.reset
        );
    }
    println!();
}

const FEE_MARKER_WIDTH: usize = 16;

/// Fee column padded on its visible text so escape codes don't shift the row.
fn fee_marker(p: Palette, fee: FeeStatus) -> String {
    let (color, text) = match fee {
        FeeStatus::Pending => (p.red, "● fee pending"),
        FeeStatus::Paid => (p.green, "✓ paid"),
        FeeStatus::Unknown => ("", ""),
    };
    let reset = if color.is_empty() { "" } else { p.reset };
    format!("{}{}{}", color, pad(text, FEE_MARKER_WIDTH), reset)
}

// ─── Attendance ──────────────────────────────────────────────────────────────

/// Read-only view of the sheet. A failed lookup shows the date as not taken.
fn view_sheet(conn: &Connection, batch_id: i64, date: NaiveDate) -> Result<AttendanceSheet> {
    let roster = EnrollmentRepo::roster(conn, batch_id)?;
    let records = records_or_default(AttendanceRepo::get_daily(conn, batch_id, date));
    Ok(build_sheet(batch_id, date, &roster, &records))
}

/// Sheet that will be saved back, so the saved marks must be readable.
fn load_sheet(conn: &Connection, batch_id: i64, date: NaiveDate) -> Result<AttendanceSheet> {
    let roster = EnrollmentRepo::roster(conn, batch_id)?;
    let records = AttendanceRepo::get_daily(conn, batch_id, date)
        .with_context(|| format!("Reading saved attendance for batch {} on {}", batch_id, date))?;
    Ok(build_sheet(batch_id, date, &roster, &records))
}

fn build_sheet(
    batch_id: i64,
    date: NaiveDate,
    roster: &[Student],
    records: &[AttendanceRecord],
) -> AttendanceSheet {
    log::debug!(
        "batch {} on {}: {} enrolled, {} records",
        batch_id,
        date,
        roster.len(),
        records.len()
    );
    reconcile(roster, records)
}

fn warn_off_schedule(ctx: &Ctx, batch: &Batch, date: NaiveDate) {
    let p = ctx.palette;
    if batch_status(batch, date) != BatchStatus::Active {
        println_colored!(p.amber, "  Note: {} is outside the batch's date range", date);
    } else if !batch.days_of_week.is_empty() && !batch.meets_on(date.weekday()) {
        println_colored!(p.amber, "  Note: {} does not meet on {}", batch.name, date.weekday());
    }
}

fn print_sheet(ctx: &Ctx, batch: &Batch, date: NaiveDate, sheet: &AttendanceSheet) {
    let p = ctx.palette;
    println!();
    println_colored!(
        p.accent,
        "  {} · {}  [{}]",
        batch.name,
        short_date(date),
        batch_status(batch, ctx.today)
    );
    if sheet.entries.is_empty() {
        println!();
        println_colored!(p.dim, "  Nobody is enrolled in this batch");
        println!();
        return;
    }
    if sheet.is_untaken() {
        println_colored!(p.dim, "  Not taken yet; everyone defaults to present");
    }
    println!();
    let width = column_width(sheet.entries.iter().map(|e| e.name.as_str()), 10);
    for e in &sheet.entries {
        let mark = if e.is_present {
            format!("{}P{}", p.green, p.reset)
        } else {
            format!("{}A{}", p.red, p.reset)
        };
        let note = match e.source {
            MarkSource::Recorded => "",
            MarkSource::DefaultPresent => "(default)",
            MarkSource::DefaultAbsent => "(not marked)",
        };
        println!(
            "  {:>4}  {}  {:<10}  {}  {}{}{}",
            e.student_id,
            pad(&e.name, width),
            e.admission_number,
            mark,
            p.dim,
            note,
            p.reset
        );
    }
    println!();
    println_colored!(
        p.bold,
        "  {} of {} present",
        sheet.present_count(),
        sheet.entries.len()
    );
    println!();
}

pub fn handle_attendance(
    conn: &mut Connection,
    ctx: &Ctx,
    action: &AttendanceCommands,
) -> Result<()> {
    match action {
        AttendanceCommands::Show { batch, date } => {
            let b = require_batch(conn, *batch)?;
            let date = ctx.date_or_today(date.as_deref())?;
            let sheet = view_sheet(conn, b.id, date)?;
            print_sheet(ctx, &b, date, &sheet);
        }
        AttendanceCommands::Mark {
            batch,
            date,
            absent,
            present,
        } => {
            let b = require_batch(conn, *batch)?;
            let date = ctx.date_or_today(date.as_deref())?;
            if let Some(id) = absent.iter().find(|id| present.contains(*id)) {
                bail!("Student {} is listed as both absent and present", id);
            }
            warn_off_schedule(ctx, &b, date);

            let mut sheet = load_sheet(conn, b.id, date)?;
            for (ids, is_present) in [(absent, false), (present, true)] {
                for id in ids {
                    if !sheet.set(*id, is_present) {
                        bail!("Student {} is not enrolled in {}", id, b.name);
                    }
                }
            }
            save_sheet(conn, ctx, &b, date, &sheet)?;
        }
        AttendanceCommands::Take { batch, date } => {
            let b = require_batch(conn, *batch)?;
            let date = ctx.date_or_today(date.as_deref())?;
            take_attendance(conn, ctx, &b, date)?;
        }
        AttendanceCommands::Report {
            batch,
            from,
            to,
            json,
        } => {
            let b = require_batch(conn, *batch)?;
            let end = ctx.date_or_today(to.as_deref())?;
            let start = match from {
                Some(s) => parse_date_arg(s)?,
                None => {
                    let window = ctx.config.attendance.report_window_days.max(1) as i64;
                    end.checked_sub_signed(Duration::days(window - 1))
                        .ok_or_else(|| {
                            anyhow!(
                                "report_window_days = {} reaches before the earliest supported date",
                                window
                            )
                        })?
                }
            };
            if start > end {
                bail!("--from {} is after --to {}", start, end);
            }
            report(conn, ctx, &b, start, end, *json)?;
        }
    }
    Ok(())
}

fn save_sheet(
    conn: &mut Connection,
    ctx: &Ctx,
    batch: &Batch,
    date: NaiveDate,
    sheet: &AttendanceSheet,
) -> Result<()> {
    let p = ctx.palette;
    if sheet.entries.is_empty() {
        bail!("Nobody is enrolled in {}", batch.name);
    }
    let saved = AttendanceRepo::save(conn, batch.id, date, &sheet.to_entries())
        .with_context(|| format!("Saving attendance for {} on {}", batch.name, date))?;
    println_colored!(
        p.green,
        "  ✓ Saved {} entries for {} ({} present, {} absent)",
        saved,
        date,
        sheet.present_count(),
        saved - sheet.present_count()
    );
    Ok(())
}

fn take_attendance(conn: &mut Connection, ctx: &Ctx, batch: &Batch, date: NaiveDate) -> Result<()> {
    let p = ctx.palette;
    let mut session = MarkingSession::new();
    let mut ticket = session.select(batch.id, date);
    let loaded = load_sheet(conn, batch.id, date)?;
    session.apply(&ticket, loaded);

    'sheet: loop {
        let Some((_, current_date)) = session.selection() else {
            bail!("No attendance sheet loaded");
        };
        warn_off_schedule(ctx, batch, current_date);
        println!();
        println_colored!(
            p.dim,
            "  Enter = keep, p = present, a = absent, d YYYY-MM-DD = switch date, q = quit"
        );

        let count = session.sheet().map_or(0, |s| s.entries.len());
        let mut i = 0;
        while i < count {
            let Some(entry) = session.sheet().and_then(|s| s.entries.get(i)).cloned() else {
                break;
            };
            let default = if entry.is_present { "P" } else { "A" };
            let answer = prompt(&format!(
                "  {} ({}) [{}]: ",
                entry.name, entry.admission_number, default
            ))?;
            let answer = answer.trim().to_lowercase();
            match answer.as_str() {
                "" => {}
                "p" | "present" | "a" | "absent" => {
                    if let Some(sheet) = session.sheet_mut() {
                        sheet.set(entry.student_id, answer.starts_with('p'));
                    }
                }
                "q" | "quit" => {
                    println_colored!(p.amber, "  Nothing saved");
                    return Ok(());
                }
                other if other.starts_with("d ") => {
                    let new_date = match parse_date_arg(&other[2..]) {
                        Ok(d) => d,
                        Err(e) => {
                            println_colored!(p.red, "  {}", e);
                            continue;
                        }
                    };
                    ticket = session.select(batch.id, new_date);
                    let loaded = load_sheet(conn, batch.id, new_date)?;
                    session.apply(&ticket, loaded);
                    continue 'sheet;
                }
                _ => {
                    println_colored!(p.red, "  Answer p, a, d YYYY-MM-DD or q");
                    continue;
                }
            }
            i += 1;
        }
        break;
    }

    let Some(sheet) = session.sheet() else {
        bail!("No attendance sheet loaded");
    };
    let Some((_, date)) = session.selection() else {
        bail!("No attendance sheet loaded");
    };
    print_sheet(ctx, batch, date, sheet);
    let confirm = prompt("  Save? [Y/n]: ")?;
    if confirm.trim().eq_ignore_ascii_case("n") {
        println_colored!(p.amber, "  Nothing saved");
        return Ok(());
    }
    save_sheet(conn, ctx, batch, date, sheet)
}

fn report(
    conn: &Connection,
    ctx: &Ctx,
    batch: &Batch,
    start: NaiveDate,
    end: NaiveDate,
    json: bool,
) -> Result<()> {
    let p = ctx.palette;
    let students = EnrollmentRepo::roster(conn, batch.id)?;
    let by_date = AttendanceRepo::by_date_range(conn, batch.id, start, end)?;

    let Some(report) = aggregate(&students, &by_date) else {
        if json {
            println!("null");
        } else {
            println!();
            println_colored!(
                p.dim,
                "  No attendance recorded for {} between {} and {}",
                batch.name,
                start,
                end
            );
            println!();
        }
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println_colored!(p.accent, "  {} · attendance {} to {}", batch.name, start, end);
    println!();

    let width = column_width(report.students.iter().map(|s| s.name.as_str()), 10);
    let header: String = report
        .dates
        .iter()
        .map(|d| format!("{:>2}", d.day()))
        .collect::<Vec<_>>()
        .join(" ");
    println_colored!(p.dim, "  {}  {}", pad("", width), header);

    for row in &report.students {
        let cells: String = row
            .days
            .iter()
            .map(|d| format!("{:>2}", d.glyph()))
            .collect::<Vec<_>>()
            .join(" ");
        let color = if row.percentage >= 75 {
            p.green
        } else if row.percentage >= 50 {
            p.amber
        } else {
            p.red
        };
        println!(
            "  {}  {}  {}{:>3}%{} {}",
            pad(&row.name, width),
            cells,
            color,
            row.percentage,
            p.reset,
            progress_bar(
                row.present_count as u32,
                report.dates.len() as u32,
                ctx.config.display.bar_width
            )
        );
    }

    println!();
    let summary = &report.summary;
    println_colored!(
        p.bold,
        "  Overall:  {}% over {} class days",
        summary.overall_percentage,
        report.dates.len()
    );
    if let Some(top) = &summary.top_performer {
        println_colored!(p.green, "  Top:      {} ({}%)", top.name, top.percentage);
    }
    if let Some(low) = &summary.low_performer {
        println_colored!(p.red, "  Lowest:   {} ({}%)", low.name, low.percentage);
    }
    println!();
    Ok(())
}

// ─── Fees ────────────────────────────────────────────────────────────────────

pub fn handle_fee(conn: &Connection, ctx: &Ctx, action: &FeeCommands) -> Result<()> {
    let p = ctx.palette;
    match action {
        FeeCommands::Check { text } => {
            let status = classify(text, ctx.today);
            let due = DateTextParser::new(ctx.today).parse(text);
            let color = match status {
                FeeStatus::Pending => p.red,
                FeeStatus::Paid => p.green,
                FeeStatus::Unknown => "",
            };
            println_colored!(color, "  {}", status);
            if let Some(due) = due {
                if status != FeeStatus::Paid {
                    println_colored!(p.dim, "  due date read as {}", due);
                }
            }
        }
        FeeCommands::Pending => {
            let students = StudentRepo::list(conn)?;
            print_students(ctx, &students, true);
        }
    }
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut buf = String::new();
    if io::stdin().lock().read_line(&mut buf)? == 0 {
        bail!("Input closed");
    }
    Ok(buf.trim_end_matches('\n').trim_end_matches('\r').to_string())
}
