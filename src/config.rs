//! User settings. They are loaded once per command and handed explicitly to every operation that
//! depends on them.

use std::{collections::BTreeMap, io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "config.json";

const DEFAULT_INTERVAL: u32 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Minutes per interval of time that is allowed in time logs.
    #[serde(rename = "TimeInterval")]
    pub time_interval: u32,
    /// Projects mapped to a comma separated list of their tasks.
    #[serde(rename = "ProjectTasks")]
    pub project_tasks: BTreeMap<String, String>,
    /// Whether notes can be attached to tasks. Notes are not used when producing reports.
    #[serde(rename = "AddNotes")]
    pub add_notes: bool,
    #[serde(rename = "WeekStart")]
    pub week_start: Weekday,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_interval: DEFAULT_INTERVAL,
            project_tasks: BTreeMap::new(),
            add_notes: true,
            week_start: Weekday::Mon,
        }
    }
}

impl Settings {
    /// Reads settings from `path`. A missing file is not an error and gives default settings.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!("Loading settings from {path:?}");
                serde_json::from_str(&text).with_context(|| format!("Invalid settings in {path:?}"))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Can't read settings from {path:?}")),
        }
    }

    /// Loads settings from the application directory, writing a sample configuration on first run.
    pub fn load_or_init(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(CONFIG_FILE);
        if path.exists() {
            return Self::load(&path);
        }
        let settings = Self::sample();
        info!("Creating sample settings in {path:?}");
        std::fs::write(&path, serde_json::to_string_pretty(&settings)?)?;
        Ok(settings)
    }

    fn sample() -> Self {
        let project_tasks = [
            ("01. Sample Project", "Development, Tests, Unit Tests, Meetings"),
            ("02. HR", "Interviews, Timesheets"),
            ("03. QA", "Training"),
        ]
        .into_iter()
        .map(|(project, tasks)| (project.to_string(), tasks.to_string()))
        .collect();
        Self {
            project_tasks,
            ..Self::default()
        }
    }

    /// Known projects in lexicographic order.
    pub fn project_options(&self) -> Vec<String> {
        self.project_tasks.keys().cloned().collect()
    }

    pub fn task_options(&self, project: &str) -> Vec<String> {
        self.project_tasks
            .get(project)
            .map(|tasks| {
                tasks
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::Weekday;
    use tempfile::tempdir;

    use super::{Settings, CONFIG_FILE};

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let dir = tempdir()?;
        let settings = Settings::load(&dir.path().join(CONFIG_FILE))?;
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.time_interval, 15);
        assert!(settings.add_notes);
        assert_eq!(settings.week_start, Weekday::Mon);
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{ "TimeInterval": 30, "ProjectTasks": { "Proj1": "Dev, Review ,," } }"#,
        )?;
        let settings = Settings::load(&path)?;
        assert_eq!(settings.time_interval, 30);
        assert!(settings.add_notes);
        assert_eq!(settings.task_options("Proj1"), vec!["Dev", "Review"]);
        assert!(settings.task_options("Other").is_empty());
        Ok(())
    }

    #[test]
    fn test_init_writes_sample() -> Result<()> {
        let dir = tempdir()?;
        let created = Settings::load_or_init(dir.path())?;
        assert!(dir.path().join(CONFIG_FILE).exists());
        assert_eq!(created.project_options()[0], "01. Sample Project");
        assert_eq!(Settings::load_or_init(dir.path())?, created);
        Ok(())
    }

    #[test]
    fn test_invalid_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json")?;
        assert!(Settings::load(&path).is_err());
        Ok(())
    }
}
