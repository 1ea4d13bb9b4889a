use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use tracing::info;

use crate::{fs::operations::overwrite, utils::time::format_date};

pub const REPORT_DIR: &str = "reports";

/// Location of weekly CSV reports. A report is always regenerated as a whole, never updated.
pub struct ReportStorage {
    report_dir: PathBuf,
}

impl ReportStorage {
    pub fn new(report_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&report_dir)?;

        Ok(Self { report_dir })
    }

    /// `{weekStart} - {weekEnd}.csv`
    pub fn path_for(&self, week_start: NaiveDate) -> PathBuf {
        let week_end = week_start + Duration::days(6);
        self.report_dir.join(format!(
            "{} - {}.csv",
            format_date(week_start),
            format_date(week_end)
        ))
    }

    pub async fn write(&self, week_start: NaiveDate, csv: &str) -> Result<PathBuf> {
        let path = self.path_for(week_start);
        overwrite(&path, csv).await?;
        info!("Report written to {path:?}");
        Ok(path)
    }
}
