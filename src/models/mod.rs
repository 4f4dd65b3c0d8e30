pub mod attendance;
pub mod batch;
pub mod faculty;
pub mod status;
pub mod student;

pub use attendance::{AttendanceEntry, AttendanceRecord};
pub use batch::Batch;
pub use faculty::Faculty;
pub use status::{BatchStatus, DayStatus, FeeStatus};
pub use student::Student;
