pub mod batch_status;
pub mod date_text;
pub mod fee_status;
pub mod reconcile;
pub mod report;

pub use date_text::DateTextParser;
pub use reconcile::{AttendanceError, AttendanceSheet, MarkSource};
pub use report::AttendanceReport;
