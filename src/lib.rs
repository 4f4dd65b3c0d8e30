//! Attendance and fee tracking for coaching institutes.
//!
//! The `engine` module holds the date-derived rules (fee status, batch
//! status, roster reconciliation, attendance reports) as pure functions over
//! the `models` types; `db` persists those types in SQLite and `cli` renders
//! them in the terminal.

pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod session;
pub mod utils;
