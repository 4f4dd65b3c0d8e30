use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "rollbook",
    version,
    author,
    about = "Attendance and fee tracking for coaching institutes"
)]
pub struct Cli {
    /// Treat this date (YYYY-MM-DD) as today instead of the current UTC date
    #[arg(long, global = true)]
    pub today: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default config.toml if none exists and print its path
    Init,
    /// Faculty members
    Faculty {
        #[command(subcommand)]
        action: FacultyCommands,
    },
    /// Batches and their schedule
    Batch {
        #[command(subcommand)]
        action: BatchCommands,
    },
    /// Students, remarks and enrollment
    Student {
        #[command(subcommand)]
        action: StudentCommands,
    },
    /// Daily attendance and reports
    Attendance {
        #[command(subcommand)]
        action: AttendanceCommands,
    },
    /// Fee remarks
    Fee {
        #[command(subcommand)]
        action: FeeCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum FacultyCommands {
    /// Add a faculty member
    Add {
        name: String,
        #[arg(long)]
        phone: Option<String>,
        /// Subject or skill taught
        #[arg(long)]
        skill: Option<String>,
    },
    /// List faculty
    List,
}

#[derive(Subcommand, Debug)]
pub enum BatchCommands {
    /// Create a batch
    Add {
        name: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: String,
        /// Class start time (HH:MM)
        #[arg(long)]
        from: Option<String>,
        /// Class end time (HH:MM)
        #[arg(long)]
        to: Option<String>,
        /// Meeting days, e.g. mon,wed,fri
        #[arg(long, default_value = "")]
        days: String,
        /// Faculty id
        #[arg(long)]
        faculty: Option<i64>,
        /// Seat limit
        #[arg(long)]
        max: Option<u32>,
    },
    /// List batches with their derived status
    List {
        /// Only show batches in this status (upcoming, active, completed)
        #[arg(long)]
        status: Option<String>,
    },
    /// Batches with a session today
    Today,
}

#[derive(Subcommand, Debug)]
pub enum StudentCommands {
    /// Register a student
    Add {
        name: String,
        #[arg(long)]
        admission: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        remarks: Option<String>,
    },
    /// List students with fee status
    List {
        /// Only students enrolled in this batch
        #[arg(long)]
        batch: Option<i64>,
        /// Only students whose fee is pending
        #[arg(long)]
        pending: bool,
    },
    /// Replace a student's remarks
    Remark {
        student: i64,
        text: String,
    },
    /// Add a student to a batch
    Enroll {
        student: i64,
        #[arg(long)]
        batch: i64,
    },
    /// Remove a student from a batch (attendance history is kept)
    Unenroll {
        student: i64,
        #[arg(long)]
        batch: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum AttendanceCommands {
    /// Show the attendance sheet for one date
    Show {
        batch: i64,
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Save attendance: everyone starts from the sheet, then overrides apply
    Mark {
        batch: i64,
        #[arg(long)]
        date: Option<String>,
        /// Student ids to mark absent, comma separated
        #[arg(long, value_delimiter = ',')]
        absent: Vec<i64>,
        /// Student ids to mark present, comma separated
        #[arg(long, value_delimiter = ',')]
        present: Vec<i64>,
    },
    /// Go through the roster one student at a time
    Take {
        batch: i64,
        #[arg(long)]
        date: Option<String>,
    },
    /// Attendance percentages over a date range
    Report {
        batch: i64,
        /// First date (defaults to the configured window before --to)
        #[arg(long)]
        from: Option<String>,
        /// Last date (defaults to today)
        #[arg(long)]
        to: Option<String>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum FeeCommands {
    /// Classify a remark as pending, paid or unknown
    Check {
        text: String,
    },
    /// Students whose fee is pending
    Pending,
}
