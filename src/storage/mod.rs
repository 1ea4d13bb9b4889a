//! Storage is organized through [day_log::DayLogStorageImpl].
//! The basic idea is:
//!   - There is a directory with one text file per calendar day.
//!   - Each line of a day file is a tab separated [entities::LogLine].
//!   - Weekly reports are written as CSV files into a `reports` subdirectory.

pub mod day_log;
pub mod entities;
pub mod report_file;
