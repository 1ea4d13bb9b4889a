use ansi_term::{Colour, Style};
use chrono::Datelike;

use crate::{
    report::weekly::{WeekTotals, WeeklyData, DAYS_IN_WEEK},
    storage::entities::LogLine,
    utils::time::format_duration,
};

const LABEL_WIDTH: usize = 28;
const CELL_WIDTH: usize = 7;

struct Styles {
    header: Style,
    current: Style,
    open: Style,
    total: Style,
}

impl Styles {
    fn new(colored: bool) -> Self {
        if colored {
            Self {
                header: Style::new().bold(),
                current: Colour::Cyan.bold(),
                open: Colour::Yellow.normal(),
                total: Colour::Green.bold(),
            }
        } else {
            Self {
                header: Style::new(),
                current: Style::new(),
                open: Style::new(),
                total: Style::new(),
            }
        }
    }
}

/// Hours per task and day as a terminal table. Zero cells are left blank to keep it readable.
pub fn format_week_summary(data: &WeeklyData, colored: bool) -> String {
    let styles = Styles::new(colored);
    let mut lines = vec![styles
        .header
        .paint(format!("Week of {} - {}", data.week_start, data.week_end()))
        .to_string()];

    let mut header = format!("{:<LABEL_WIDTH$}", "");
    for (index, day) in data.days().enumerate() {
        let cell = format!("{:>CELL_WIDTH$}", format!("{} {}", day.weekday(), day.day()));
        let style = if index == data.current_day_index {
            styles.current
        } else {
            styles.header
        };
        header.push_str(&style.paint(cell).to_string());
    }
    header.push_str(&styles.header.paint(format!("{:>CELL_WIDTH$}", "Total")).to_string());
    lines.push(header);

    lines.extend(
        data.totals
            .iter()
            .map(|(key, totals)| row(&key.to_string(), totals, Style::new())),
    );
    if data.totals.is_empty() {
        lines.push("Nothing logged this week".to_string());
    }

    lines.push(String::new());
    lines.extend(
        data.project_totals
            .iter()
            .map(|(project, totals)| row(project, totals, styles.header)),
    );
    lines.push(row("TOTAL", &data.grand_totals, styles.total));

    for (day, start) in data.days().zip(&data.open_days) {
        if let Some(start) = start {
            lines.push(
                styles
                    .open
                    .paint(format!("{day} has an open entry since {start}"))
                    .to_string(),
            );
        }
    }

    let mut summary = lines.join("\n");
    summary.push('\n');
    summary
}

fn row(label: &str, totals: &WeekTotals, style: Style) -> String {
    let mut label = label.to_string();
    if label.chars().count() > LABEL_WIDTH - 1 {
        label = label.chars().take(LABEL_WIDTH - 2).collect::<String>() + "…";
    }
    let mut row = format!("{label:<LABEL_WIDTH$}");
    for day in 0..DAYS_IN_WEEK {
        row.push_str(&format!("{:>CELL_WIDTH$}", format_duration(totals.day(day), true)));
    }
    row.push_str(&format!("{:>CELL_WIDTH$}", format_duration(totals.total(), false)));
    style.paint(row).to_string()
}

pub fn format_current_entry(entry: Option<&LogLine>) -> String {
    match entry {
        Some(line) => format!(
            "Running: {} - {} since {}",
            line.project, line.task, line.interval.start
        ),
        None => "No task is running".to_string(),
    }
}
