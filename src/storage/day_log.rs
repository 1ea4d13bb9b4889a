use std::{
    collections::BTreeSet,
    future::Future,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use tokio::fs::File;
use tracing::{debug, trace, warn};

use crate::{
    fs::operations::{overwrite, read_last_line, read_optional},
    utils::time::{format_date, parse_iso_date},
};

use super::entities::{LogLine, INTERVAL_SEPARATOR};

/// Directory under the application directory holding the day files.
pub const TIMESHEET_DIR: &str = "timesheets";
pub const DAY_FILE_EXTENSION: &str = "txt";

/// Interface for abstracting storage of day files. Each calendar day owns exactly one text blob.
pub trait DayLogStorage {
    /// Raw text of the day, or [None] when nothing was logged that day.
    fn read(&self, date: NaiveDate) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Replaces the whole text of the day. Callers build the complete new text first.
    fn write(&self, date: NaiveDate, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Last non-blank line of the day.
    fn last_line(&self, date: NaiveDate) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Every date that has a day file.
    fn list_all_dates(&self) -> impl Future<Output = Result<BTreeSet<NaiveDate>>> + Send;
}

impl<T: Deref> DayLogStorage for T
where
    T::Target: DayLogStorage,
{
    fn read(&self, date: NaiveDate) -> impl Future<Output = Result<Option<String>>> + Send {
        self.deref().read(date)
    }

    fn write(&self, date: NaiveDate, text: &str) -> impl Future<Output = Result<()>> + Send {
        self.deref().write(date, text)
    }

    fn last_line(&self, date: NaiveDate) -> impl Future<Output = Result<Option<String>>> + Send {
        self.deref().last_line(date)
    }

    fn list_all_dates(&self) -> impl Future<Output = Result<BTreeSet<NaiveDate>>> + Send {
        self.deref().list_all_dates()
    }
}

/// True when the last entry of a day has a start time but no end time.
pub fn is_open(text: &str) -> bool {
    open_start_time(text).is_some()
}

/// Start time of the open entry that ends the day, if there is one. The text has to end with the
/// interval separator and its last line has to be a well formed entry.
pub fn open_start_time(text: &str) -> Option<String> {
    let trimmed = text.trim_end();
    if !trimmed.ends_with(INTERVAL_SEPARATOR.trim_end()) {
        return None;
    }
    let last = trimmed.lines().last()?;
    LogLine::parse(last)
        .filter(|line| line.interval.is_open())
        .map(|line| line.interval.start)
}

/// Canonical day file name, zero padded: `2024-03-05.txt`.
pub fn day_file_name(date: NaiveDate) -> String {
    format!("{}.{DAY_FILE_EXTENSION}", format_date(date))
}

/// Name used by older versions, without padding: `2024-3-5.txt`.
pub fn legacy_day_file_name(date: NaiveDate) -> String {
    format!(
        "{}-{}-{}.{DAY_FILE_EXTENSION}",
        date.year(),
        date.month(),
        date.day()
    )
}

/// Extracts the date out of a day file name. Only the padded and the legacy names are day files,
/// anything else gives [None].
pub fn date_from_file_name(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    let date = parse_iso_date(name.strip_suffix(DAY_FILE_EXTENSION)?.strip_suffix('.')?).ok()?;
    (name == day_file_name(date) || name == legacy_day_file_name(date)).then_some(date)
}

/// The main realization of [DayLogStorage]. Day files are kept flat in a single directory.
pub struct DayLogStorageImpl {
    log_dir: PathBuf,
}

impl DayLogStorageImpl {
    pub fn new(log_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&log_dir)?;

        Ok(Self { log_dir })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.log_dir.join(day_file_name(date))
    }

    /// Existing file for the date. The padded name wins over the legacy one.
    async fn existing_path_for(&self, date: NaiveDate) -> Result<Option<PathBuf>> {
        let padded = self.path_for(date);
        if tokio::fs::try_exists(&padded).await? {
            return Ok(Some(padded));
        }
        let legacy = self.log_dir.join(legacy_day_file_name(date));
        if legacy != padded && tokio::fs::try_exists(&legacy).await? {
            trace!("Using legacy day file {legacy:?}");
            return Ok(Some(legacy));
        }
        Ok(None)
    }

    /// Renames legacy day files to their padded name. Files whose padded counterpart already exists
    /// are left untouched. Returns the dates that were migrated.
    pub async fn migrate_legacy_names(&self) -> Result<Vec<NaiveDate>> {
        let mut migrated = vec![];
        let mut entries = tokio::fs::read_dir(&self.log_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(date) = date_from_file_name(&path) else {
                continue;
            };
            let padded = self.path_for(date);
            if path == padded {
                continue;
            }
            if tokio::fs::try_exists(&padded).await? {
                warn!("Both {path:?} and {padded:?} exist, keeping both");
                continue;
            }
            debug!("Renaming {path:?} to {padded:?}");
            tokio::fs::rename(&path, &padded).await?;
            migrated.push(date);
        }
        migrated.sort();
        Ok(migrated)
    }
}

impl DayLogStorage for DayLogStorageImpl {
    async fn read(&self, date: NaiveDate) -> Result<Option<String>> {
        let Some(path) = self.existing_path_for(date).await? else {
            return Ok(None);
        };
        debug!("Reading {path:?}");
        Ok(read_optional(&path).await?)
    }

    async fn write(&self, date: NaiveDate, text: &str) -> Result<()> {
        let path = self.path_for(date);
        debug!("Writing {path:?}");
        overwrite(&path, text).await?;

        // Only the padded file holds the day from now on.
        let legacy = self.log_dir.join(legacy_day_file_name(date));
        if legacy != path && tokio::fs::try_exists(&legacy).await? {
            debug!("Removing superseded legacy file {legacy:?}");
            tokio::fs::remove_file(&legacy).await?;
        }
        Ok(())
    }

    async fn last_line(&self, date: NaiveDate) -> Result<Option<String>> {
        let Some(path) = self.existing_path_for(date).await? else {
            return Ok(None);
        };
        let mut file = File::open(path).await?;
        Ok(read_last_line(&mut file, &mut vec![0; 1024]).await?)
    }

    async fn list_all_dates(&self) -> Result<BTreeSet<NaiveDate>> {
        let mut dates = BTreeSet::new();
        let mut entries = tokio::fs::read_dir(&self.log_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                continue;
            }
            match date_from_file_name(&entry.path()) {
                Some(date) => {
                    dates.insert(date);
                }
                None => trace!("Skipping {:?}, not a day file", entry.path()),
            }
        }
        Ok(dates)
    }
}
