//! Starting and stopping tasks. Every change rewrites the whole day file through [DayLogStorage].

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    storage::{
        day_log::{open_start_time, DayLogStorage},
        entities::{LogLine, TimeInterval},
    },
    utils::{
        clock::Clock,
        time::{
            closest_interval_to, parse_iso_date, parse_minutes_of_day, END_OF_DAY, MINUTES_PER_DAY,
        },
    },
};

/// Start time of an entry continued from the previous day.
const START_OF_DAY: &str = "00:00";

#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub project: String,
    pub task: String,
    pub note: Option<String>,
    /// Defaults to the interval closest to now.
    pub start: Option<String>,
    /// [None] leaves the entry open.
    pub end: Option<String>,
}

pub struct TaskTimer<S: DayLogStorage> {
    storage: S,
    clock: Box<dyn Clock>,
    settings: Settings,
}

impl<S: DayLogStorage> TaskTimer<S> {
    pub fn new(storage: S, clock: Box<dyn Clock>, settings: Settings) -> Self {
        Self {
            storage,
            clock,
            settings,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date()
    }

    fn closest_interval_to_now(&self) -> Result<String> {
        Ok(closest_interval_to(
            self.clock.now().time(),
            self.settings.time_interval,
        )?)
    }

    /// Appends a new entry to today's file. Any task still running is stopped first.
    pub async fn start_task(&self, entry: NewEntry) -> Result<LogLine> {
        for value in [&entry.project, &entry.task] {
            if value.trim().is_empty() || value.contains(['\t', '\n', '\r']) {
                bail!("{value:?} can't be used as a project or task name");
            }
        }
        if let Some(note) = &entry.note {
            if note.contains(['\t', '\n', '\r']) {
                bail!("{note:?} can't be used as a note, it has to fit on one line without tabs");
            }
        }
        if !self.settings.project_tasks.is_empty()
            && !self.settings.project_tasks.contains_key(&entry.project)
        {
            warn!("Project {:?} is not configured", entry.project);
        }

        let start = match entry.start {
            Some(start) => start,
            None => self.closest_interval_to_now()?,
        };
        let start_minutes = minutes_within_day(&start)?;
        let end = entry.end.filter(|v| !v.trim().is_empty());
        if let Some(end) = &end {
            if minutes_within_day(end)? < start_minutes {
                bail!("End time {end} is before start time {start}");
            }
        }

        self.stop_task(None).await?;

        let note = match entry.note {
            Some(note) if !self.settings.add_notes => {
                warn!("Notes are disabled, ignoring {note:?}");
                None
            }
            note => note,
        };

        let line = LogLine::new(
            &entry.project,
            &entry.task,
            note.as_deref(),
            TimeInterval { start, end },
        );

        let today = self.today();
        let contents = match self.storage.read(today).await? {
            Some(before) if !before.trim().is_empty() => {
                format!("{}\n{line}", before.trim_end_matches(['\n', '\r']))
            }
            _ => line.to_string(),
        };
        self.storage.write(today, &contents).await?;
        info!("Task started: {line}");
        Ok(line)
    }

    /// Closes the running task, either at `end` or at the interval closest to now.
    ///
    /// When today has no file yet, yesterday is checked. A task left open yesterday is closed at
    /// `24:00` and continued in today's file from `00:00`.
    pub async fn stop_task(&self, end: Option<String>) -> Result<Option<LogLine>> {
        if let Some(end) = &end {
            minutes_within_day(end)?;
        }

        let today = self.today();
        let (mut date, mut text) = match self.storage.read(today).await? {
            Some(text) => (today, text),
            None => {
                let yesterday = today - Duration::days(1);
                match self.storage.read(yesterday).await? {
                    Some(text) => (yesterday, text),
                    None => return Ok(None),
                }
            }
        };

        let Some(mut start) = open_start_time(&text) else {
            debug!("Nothing to stop on {date}");
            return Ok(None);
        };

        if date != today {
            let closed = close_last_entry(&text, END_OF_DAY);
            self.storage.write(date, &closed).await?;

            let Some(previous) = closed.lines().last().and_then(LogLine::parse) else {
                bail!("Open entry of {date} can't be continued");
            };
            let continued = LogLine {
                interval: TimeInterval {
                    start: START_OF_DAY.to_string(),
                    end: None,
                },
                ..previous
            };
            info!("Continuing {date} into {today}: {continued}");
            date = today;
            text = continued.to_string();
            start = START_OF_DAY.to_string();
            self.storage.write(date, &text).await?;
        }

        let start_minutes = parse_minutes_of_day(&start)?;
        let end = match end {
            Some(end) => {
                if parse_minutes_of_day(&end)? < start_minutes {
                    bail!("End time {end} is before start time {start}");
                }
                end
            }
            None => {
                let now = self.closest_interval_to_now()?;
                if parse_minutes_of_day(&now)? < start_minutes {
                    start
                } else {
                    now
                }
            }
        };

        let closed = close_last_entry(&text, &end);
        self.storage.write(date, &closed).await?;
        let stopped = closed.lines().last().and_then(LogLine::parse);
        if let Some(stopped) = &stopped {
            info!("Task stopped: {stopped}");
        }
        Ok(stopped)
    }

    /// The entry currently running today, if any.
    pub async fn current_entry(&self) -> Result<Option<LogLine>> {
        let line = self.storage.last_line(self.today()).await?;
        Ok(line
            .as_deref()
            .and_then(LogLine::parse)
            .filter(|v| v.interval.is_open()))
    }

    /// Raw text of the day given as `YYYY-MM-DD`. A day without a file reads as empty.
    pub async fn day_contents(&self, date: &str) -> Result<String> {
        let date = parse_iso_date(date)?;
        Ok(self.storage.read(date).await?.unwrap_or_default())
    }

    /// Dates with a day file, most recent first.
    pub async fn dates_newest_first(&self) -> Result<Vec<NaiveDate>> {
        let dates = self.storage.list_all_dates().await?;
        Ok(dates.into_iter().rev().collect())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

/// Minutes since midnight of a time entered by the user, which can't go past `24:00`.
fn minutes_within_day(time: &str) -> Result<i64> {
    let minutes = parse_minutes_of_day(time)?;
    if minutes > MINUTES_PER_DAY {
        bail!("{time} is past {END_OF_DAY}");
    }
    Ok(minutes)
}

fn close_last_entry(text: &str, end: &str) -> String {
    format!("{} {end}", text.trim_end())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use tempfile::{tempdir, TempDir};

    use crate::{
        config::Settings,
        storage::day_log::{DayLogStorage, DayLogStorageImpl},
        utils::clock::MockClock,
    };

    use super::{NewEntry, TaskTimer};

    const TODAY: NaiveDate = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
    const YESTERDAY: NaiveDate = NaiveDate::from_ymd_opt(2024, 3, 12).unwrap();

    fn timer_at(
        hour: u32,
        minute: u32,
        settings: Settings,
    ) -> Result<(TempDir, TaskTimer<DayLogStorageImpl>)> {
        let dir = tempdir()?;
        let storage = DayLogStorageImpl::new(dir.path().to_owned())?;
        let mut clock = MockClock::new();
        clock.expect_now().return_const(NaiveDateTime::new(
            TODAY,
            NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        ));
        Ok((dir, TaskTimer::new(storage, Box::new(clock), settings)))
    }

    fn entry(start: Option<&str>, end: Option<&str>) -> NewEntry {
        NewEntry {
            project: "Proj1".into(),
            task: "Dev".into(),
            note: None,
            start: start.map(Into::into),
            end: end.map(Into::into),
        }
    }

    #[tokio::test]
    async fn test_day_contents() -> Result<()> {
        let (_dir, timer) = timer_at(10, 0, Settings::default())?;
        timer
            .storage()
            .write(YESTERDAY, "Proj1\tDev\t09:00 - 10:00")
            .await?;

        assert_eq!(
            timer.day_contents("2024-03-12").await?,
            "Proj1\tDev\t09:00 - 10:00"
        );
        assert_eq!(timer.day_contents("2024-3-12").await?, "Proj1\tDev\t09:00 - 10:00");
        assert_eq!(timer.day_contents("2024-03-13").await?, "");
        assert!(timer.day_contents("12.03.2024").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_start_then_stop() -> Result<()> {
        let (_dir, timer) = timer_at(10, 7, Settings::default())?;

        timer.start_task(entry(Some("09:00"), None)).await?;
        assert_eq!(
            timer.storage().read(TODAY).await?.as_deref(),
            Some("Proj1\tDev\t09:00 - ")
        );
        assert!(timer.current_entry().await?.is_some());

        let stopped = timer.stop_task(None).await?.unwrap();
        assert_eq!(stopped.interval.end.as_deref(), Some("10:00"));
        assert_eq!(
            timer.storage().read(TODAY).await?.as_deref(),
            Some("Proj1\tDev\t09:00 - 10:00")
        );
        assert!(timer.current_entry().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_start_stops_running_task() -> Result<()> {
        let (_dir, timer) = timer_at(11, 31, Settings::default())?;

        timer.start_task(entry(Some("09:00"), None)).await?;
        let mut next = entry(None, None);
        next.task = "Review".into();
        next.note = Some("PR 12".into());
        timer.start_task(next).await?;

        assert_eq!(
            timer.storage().read(TODAY).await?.as_deref(),
            Some("Proj1\tDev\t09:00 - 11:30\nProj1\tReview (PR 12)\t11:30 - ")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_notes_disabled() -> Result<()> {
        let settings = Settings {
            add_notes: false,
            ..Settings::default()
        };
        let (_dir, timer) = timer_at(9, 0, settings)?;
        let mut closed = entry(Some("08:00"), Some("09:00"));
        closed.note = Some("ignored".into());

        let line = timer.start_task(closed).await?;

        assert_eq!(line.to_string(), "Proj1\tDev\t08:00 - 09:00");
        Ok(())
    }

    #[tokio::test]
    async fn test_yesterday_is_continued() -> Result<()> {
        let (_dir, timer) = timer_at(1, 14, Settings::default())?;
        timer
            .storage()
            .write(YESTERDAY, "Proj1\tDev (late)\t22:00 - ")
            .await?;

        let stopped = timer.stop_task(None).await?.unwrap();

        assert_eq!(
            timer.storage().read(YESTERDAY).await?.as_deref(),
            Some("Proj1\tDev (late)\t22:00 - 24:00")
        );
        assert_eq!(stopped.to_string(), "Proj1\tDev (late)\t00:00 - 01:15");
        assert_eq!(
            timer.storage().read(TODAY).await?.as_deref(),
            Some("Proj1\tDev (late)\t00:00 - 01:15")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_nothing_to_stop() -> Result<()> {
        let (_dir, timer) = timer_at(12, 0, Settings::default())?;
        assert!(timer.stop_task(None).await?.is_none());

        timer.storage().write(TODAY, "Proj1\tDev\t09:00 - 10:00").await?;
        assert!(timer.stop_task(None).await?.is_none());
        assert_eq!(
            timer.storage().read(TODAY).await?.as_deref(),
            Some("Proj1\tDev\t09:00 - 10:00")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_explicit_end_before_start_is_rejected() -> Result<()> {
        let (_dir, timer) = timer_at(12, 0, Settings::default())?;
        timer.storage().write(TODAY, "Proj1\tDev\t09:00 - ").await?;

        assert!(timer.stop_task(Some("08:00".into())).await.is_err());
        assert!(timer.start_task(entry(Some("10:00"), Some("09:45"))).await.is_err());

        let stopped = timer.stop_task(Some("09:30".into())).await?.unwrap();
        assert_eq!(stopped.interval.end.as_deref(), Some("09:30"));
        Ok(())
    }

    #[tokio::test]
    async fn test_automatic_end_never_precedes_start() -> Result<()> {
        let (_dir, timer) = timer_at(8, 0, Settings::default())?;
        timer.storage().write(TODAY, "Proj1\tDev\t09:00 - ").await?;

        let stopped = timer.stop_task(None).await?.unwrap();

        assert_eq!(stopped.interval.end.as_deref(), Some("09:00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() -> Result<()> {
        let (_dir, timer) = timer_at(8, 0, Settings::default())?;
        let mut bad = entry(None, None);
        bad.task = "Dev\tQA".into();
        assert!(timer.start_task(bad).await.is_err());
        assert!(timer.storage().read(TODAY).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_notes_with_line_breaks_are_rejected() -> Result<()> {
        let (_dir, timer) = timer_at(8, 0, Settings::default())?;
        timer.start_task(entry(Some("07:00"), None)).await?;

        for note in ["a\tb", "a\nb", "a\r\nb"] {
            let mut bad = entry(Some("07:30"), None);
            bad.note = Some(note.into());
            assert!(timer.start_task(bad).await.is_err(), "{note:?}");
        }

        // The running task is untouched and can still be stopped.
        assert_eq!(
            timer.storage().read(TODAY).await?.as_deref(),
            Some("Proj1\tDev\t07:00 - ")
        );
        let stopped = timer.stop_task(None).await?.unwrap();
        assert_eq!(stopped.interval.end.as_deref(), Some("08:00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_times_past_end_of_day_are_rejected() -> Result<()> {
        let (_dir, timer) = timer_at(8, 0, Settings::default())?;

        assert!(timer.start_task(entry(Some("30:00"), None)).await.is_err());
        assert!(timer
            .start_task(entry(Some("23:00"), Some("24:15")))
            .await
            .is_err());
        assert!(timer.storage().read(TODAY).await?.is_none());

        timer.start_task(entry(Some("07:00"), None)).await?;
        assert!(timer.stop_task(Some("25:00".into())).await.is_err());
        let stopped = timer.stop_task(Some("24:00".into())).await?.unwrap();
        assert_eq!(stopped.interval.end.as_deref(), Some("24:00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_dates_newest_first() -> Result<()> {
        let (_dir, timer) = timer_at(8, 0, Settings::default())?;
        timer.storage().write(YESTERDAY, "").await?;
        timer.storage().write(TODAY, "").await?;

        assert_eq!(timer.dates_newest_first().await?, vec![TODAY, YESTERDAY]);
        Ok(())
    }
}
