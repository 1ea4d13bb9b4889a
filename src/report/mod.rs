//! Turns day files into weekly totals ([weekly::collate_week]) and weekly totals into CSV
//! ([csv::render_csv]).

pub mod csv;
pub mod weekly;
