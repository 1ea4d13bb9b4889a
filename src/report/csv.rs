use std::borrow::Cow;

use crate::utils::time::{format_date, format_duration};

use super::weekly::{WeekTotals, WeeklyData};

pub const PROJECT_TOTALS_HEADER: &str = "PROJECT TOTALS,,,,,,,,";
pub const TOTAL_LABEL: &str = "TOTAL";

/// Renders a week as CSV. Output is byte for byte the same for equal data: rows are ordered by
/// key and numbers never depend on the locale.
///
/// ```text
/// ,2024-03-11,...,2024-03-17,TOTAL
/// Proj1 - Dev,1,0,...,1
///
/// PROJECT TOTALS,,,,,,,,
/// Proj1,1,0,...,1
///
/// TOTAL,1,0,...,1
/// ```
pub fn render_csv(data: &WeeklyData) -> String {
    let mut lines = Vec::with_capacity(data.totals.len() + data.project_totals.len() + 5);

    let days = data.days().map(format_date).collect::<Vec<_>>();
    lines.push(format!(",{},{TOTAL_LABEL}", days.join(",")));

    for (key, totals) in &data.totals {
        lines.push(row(&key.to_string(), totals));
    }

    lines.push(String::new());
    lines.push(PROJECT_TOTALS_HEADER.to_string());
    for (project, totals) in &data.project_totals {
        lines.push(row(project, totals));
    }

    lines.push(String::new());
    lines.push(row(TOTAL_LABEL, &data.grand_totals));

    lines.join("\n")
}

fn row(label: &str, totals: &WeekTotals) -> String {
    let mut row = escape(label).into_owned();
    for minutes in totals.values() {
        row.push(',');
        row.push_str(&format_duration(*minutes, false));
    }
    row
}

/// Quotes a cell when it would otherwise break the row apart.
fn escape(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}
