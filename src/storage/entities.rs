use std::fmt::Display;

use serde::Serialize;

/// Separates the start and end of an interval in a day file.
pub const INTERVAL_SEPARATOR: &str = " - ";

/// Start and optional end of a logged entry, as written in the day file. A missing end means the
/// entry is still open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeInterval {
    pub start: String,
    pub end: Option<String>,
}

impl TimeInterval {
    /// Only ` - ` separates the times. `09:00-10:00` has no separator and therefore no end.
    fn parse(field: &str) -> Self {
        let field = field.trim();
        let (start, end) = match field.split_once(INTERVAL_SEPARATOR) {
            Some((start, end)) => (start, end.trim()),
            // Trailing whitespace of an open entry may have been trimmed away.
            None => (
                field
                    .strip_suffix(INTERVAL_SEPARATOR.trim_end())
                    .unwrap_or(field),
                "",
            ),
        };
        Self {
            start: start.trim().to_string(),
            end: Some(end).filter(|v| !v.is_empty()).map(str::to_string),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

impl Display for TimeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{INTERVAL_SEPARATOR}{}",
            self.start,
            self.end.as_deref().unwrap_or_default()
        )
    }
}

/// One row of a day file: `project<TAB>task[ (note)]<TAB>HH:MM - [HH:MM]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub project: String,
    /// Task as written, possibly followed by a `(note)`.
    pub task: String,
    pub interval: TimeInterval,
}

impl LogLine {
    /// Returns [None] for lines with less than 3 tab separated fields. Those are ignored
    /// everywhere.
    pub fn parse(line: &str) -> Option<Self> {
        let fields = line.split('\t').collect::<Vec<_>>();
        let [project, task, interval, ..] = fields.as_slice() else {
            return None;
        };
        Some(Self {
            project: project.to_string(),
            task: task.to_string(),
            interval: TimeInterval::parse(interval),
        })
    }

    /// Builds a new line, attaching `note` to the task when it isn't empty.
    pub fn new(project: &str, task: &str, note: Option<&str>, interval: TimeInterval) -> Self {
        let task = match note.map(str::trim).filter(|v| !v.is_empty()) {
            Some(note) => format!("{task} ({note})"),
            None => task.to_string(),
        };
        Self {
            project: project.to_string(),
            task,
            interval,
        }
    }

    /// Task with any parenthetical note removed. This is what totals are grouped by.
    pub fn canonical_task(&self) -> String {
        strip_note(&self.task)
    }

    pub fn key(&self) -> TaskKey {
        TaskKey {
            project: self.project.clone(),
            task: self.canonical_task(),
        }
    }
}

impl Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}\t{}", self.project, self.task, self.interval)
    }
}

/// Removes the `(...)` note from a task name, from the first `(` to the last `)`.
pub fn strip_note(task: &str) -> String {
    match (task.find('('), task.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            let mut stripped = String::with_capacity(task.len());
            stripped.push_str(&task[..open]);
            stripped.push_str(&task[close + 1..]);
            stripped.trim().to_string()
        }
        _ => task.trim().to_string(),
    }
}

/// Groups durations by project and note-less task. Ordering is by project, then task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TaskKey {
    pub project: String,
    pub task: String,
}

impl Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.project, self.task)
    }
}
