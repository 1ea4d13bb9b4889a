//! Time logging against projects and tasks, kept as one plain text file per day.
//! Days are summed up per week into per task, per project and overall totals, which can be
//! displayed in a terminal or written out as CSV reports.
//!

pub mod cli;
pub mod config;
pub mod fs;
pub mod report;
pub mod storage;
pub mod timer;
pub mod utils;
pub mod watch;
