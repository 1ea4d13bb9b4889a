use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Weekday};
use futures::{stream, StreamExt};
use serde::{Serialize, Serializer};
use tracing::{debug, instrument, trace, warn};

use crate::{
    storage::{
        day_log::DayLogStorage,
        entities::{LogLine, TaskKey},
    },
    utils::time::{date_range, day_index_in_week, parse_minutes_of_day, week_start},
};

pub const DAYS_IN_WEEK: usize = 7;

/// Minutes per day of the week, followed by the weekly total at [WeekTotals::TOTAL].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeekTotals([i64; DAYS_IN_WEEK + 1]);

impl WeekTotals {
    pub const TOTAL: usize = DAYS_IN_WEEK;

    fn add(&mut self, day: usize, minutes: i64) {
        self.0[day] += minutes;
        self.0[Self::TOTAL] += minutes;
    }

    pub fn day(&self, day: usize) -> i64 {
        self.0[day]
    }

    pub fn total(&self) -> i64 {
        self.0[Self::TOTAL]
    }

    pub fn values(&self) -> &[i64; DAYS_IN_WEEK + 1] {
        &self.0
    }
}

impl From<[i64; DAYS_IN_WEEK + 1]> for WeekTotals {
    fn from(value: [i64; DAYS_IN_WEEK + 1]) -> Self {
        Self(value)
    }
}

/// Everything logged during one week, recomputed from the day files on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyData {
    pub week_start: NaiveDate,
    #[serde(serialize_with = "serialize_task_totals")]
    pub totals: BTreeMap<TaskKey, WeekTotals>,
    pub project_totals: BTreeMap<String, WeekTotals>,
    pub grand_totals: WeekTotals,
    /// Raw text of every day file, empty for days without one.
    pub date_contents: Vec<String>,
    /// Start time of the entry left open at the end of each day.
    pub open_days: Vec<Option<String>>,
    /// Position of the queried date inside the week.
    pub current_day_index: usize,
}

/// Task totals go out as a list of `{project, task, minutes}` records. Names may contain any
/// separator, so they can't be joined into a single object key.
fn serialize_task_totals<S: Serializer>(
    totals: &BTreeMap<TaskKey, WeekTotals>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct TaskTotals<'a> {
        project: &'a str,
        task: &'a str,
        minutes: &'a WeekTotals,
    }

    serializer.collect_seq(totals.iter().map(|(key, minutes)| TaskTotals {
        project: &key.project,
        task: &key.task,
        minutes,
    }))
}

impl WeeklyData {
    fn empty(week_start: NaiveDate, current_day_index: usize) -> Self {
        Self {
            week_start,
            totals: BTreeMap::new(),
            project_totals: BTreeMap::new(),
            grand_totals: WeekTotals::default(),
            date_contents: vec![String::new(); DAYS_IN_WEEK],
            open_days: vec![None; DAYS_IN_WEEK],
            current_day_index,
        }
    }

    pub fn week_end(&self) -> NaiveDate {
        self.week_start + Duration::days(DAYS_IN_WEEK as i64 - 1)
    }

    /// Dates of the week in chronological order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        date_range(self.week_start, self.week_end())
    }

    pub fn is_open(&self, day: usize) -> bool {
        self.open_days[day].is_some()
    }

    fn add(&mut self, key: TaskKey, day: usize, minutes: i64) {
        self.project_totals
            .entry(key.project.clone())
            .or_default()
            .add(day, minutes);
        self.totals.entry(key).or_default().add(day, minutes);
        self.grand_totals.add(day, minutes);
    }

    /// Adds every closed entry of a day file. Lines that can't be understood are skipped one by
    /// one, the rest of the day still counts.
    fn collate_day(&mut self, day: usize, text: &str) {
        for (number, raw) in text.lines().enumerate() {
            let Some(line) = LogLine::parse(raw) else {
                if !raw.trim().is_empty() {
                    trace!("Ignoring malformed line {number} {raw:?}");
                }
                continue;
            };

            let Some(end) = line.interval.end.as_deref() else {
                self.open_days[day] = Some(line.interval.start.clone());
                continue;
            };

            let minutes = match (
                parse_minutes_of_day(&line.interval.start),
                parse_minutes_of_day(end),
            ) {
                (Ok(start), Ok(end)) => end - start,
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Ignoring line {number} {raw:?}: {e}");
                    continue;
                }
            };

            if minutes < 0 {
                warn!("Ignoring line {number} {raw:?}: ends before it starts");
                continue;
            }

            self.add(line.key(), day, minutes);
        }
    }
}

/// Collects every day file of the week containing `date` into [WeeklyData].
/// Missing days count as days without activity.
#[instrument(skip(storage))]
pub async fn collate_week(
    storage: &impl DayLogStorage,
    date: NaiveDate,
    first_day: Weekday,
) -> Result<WeeklyData> {
    let start = week_start(date, first_day);
    let mut data = WeeklyData::empty(start, day_index_in_week(date, first_day));

    // Reads may run ahead, results still arrive in chronological order.
    let days = stream::iter(data.days())
        .map(|day| async move { (day, storage.read(day).await) })
        .buffered(4)
        .enumerate();
    let mut days = std::pin::pin!(days);

    while let Some((index, (day, text))) = days.next().await {
        match text.with_context(|| format!("Failed to read day {day}"))? {
            Some(text) => {
                data.collate_day(index, &text);
                data.date_contents[index] = text;
            }
            None => trace!("No day file for {day}"),
        }
    }

    debug!(
        "Collated week of {start}: {} tasks, {} minutes",
        data.totals.len(),
        data.grand_totals.total()
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{NaiveDate, Weekday};
    use tempfile::{tempdir, TempDir};

    use crate::{
        storage::{
            day_log::{DayLogStorage, DayLogStorageImpl},
            entities::TaskKey,
        },
        utils::logging::TEST_LOGGING,
    };

    use super::{collate_week, WeekTotals, WeeklyData};

    const MONDAY: NaiveDate = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
    const WEDNESDAY: NaiveDate = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();

    fn key(project: &str, task: &str) -> TaskKey {
        TaskKey {
            project: project.into(),
            task: task.into(),
        }
    }

    async fn storage_with(days: &[(NaiveDate, &str)]) -> Result<(TempDir, DayLogStorageImpl)> {
        let dir = tempdir()?;
        let storage = DayLogStorageImpl::new(dir.path().to_owned())?;
        for (date, text) in days {
            storage.write(*date, text).await?;
        }
        Ok((dir, storage))
    }

    fn assert_sums(data: &WeeklyData) {
        for totals in data.totals.values().chain(data.project_totals.values()) {
            assert_eq!(totals.total(), (0..7).map(|i| totals.day(i)).sum::<i64>());
        }
        for day in 0..7 {
            assert_eq!(
                data.grand_totals.day(day),
                data.totals.values().map(|v| v.day(day)).sum::<i64>()
            );
        }
        assert_eq!(
            data.grand_totals.total(),
            (0..7).map(|i| data.grand_totals.day(i)).sum::<i64>()
        );
        assert_eq!(
            data.grand_totals.total(),
            data.project_totals.values().map(WeekTotals::total).sum::<i64>()
        );
    }

    #[tokio::test]
    async fn test_single_entry() -> Result<()> {
        *TEST_LOGGING;
        let (_dir, storage) = storage_with(&[(MONDAY, "Proj1\tDev\t09:00 - 10:00")]).await?;

        let data = collate_week(&storage, WEDNESDAY, Weekday::Mon).await?;

        assert_eq!(data.week_start, MONDAY);
        assert_eq!(data.current_day_index, 2);
        assert_eq!(
            data.totals[&key("Proj1", "Dev")],
            WeekTotals::from([60, 0, 0, 0, 0, 0, 0, 60])
        );
        assert_eq!(data.date_contents[0], "Proj1\tDev\t09:00 - 10:00");
        assert!(data.date_contents[1..].iter().all(String::is_empty));
        assert_sums(&data);
        Ok(())
    }

    #[tokio::test]
    async fn test_open_entry_counts_nothing() -> Result<()> {
        let (_dir, storage) = storage_with(&[(
            WEDNESDAY,
            "Proj1\tDev\t08:00 - 09:00\nProj1\tDev\t09:00 - ",
        )])
        .await?;

        let data = collate_week(&storage, WEDNESDAY, Weekday::Mon).await?;

        assert_eq!(data.open_days[2].as_deref(), Some("09:00"));
        assert!(data.is_open(2));
        assert!(!data.is_open(0));
        assert_eq!(
            data.totals[&key("Proj1", "Dev")],
            WeekTotals::from([0, 0, 60, 0, 0, 0, 0, 60])
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unspaced_interval_has_no_end() -> Result<()> {
        let (_dir, storage) = storage_with(&[(MONDAY, "P\tT\t09:00-10:00")]).await?;

        let data = collate_week(&storage, MONDAY, Weekday::Mon).await?;

        assert_eq!(data.grand_totals, WeekTotals::default());
        assert_eq!(data.open_days[0].as_deref(), Some("09:00-10:00"));
        Ok(())
    }

    #[tokio::test]
    async fn test_notes_are_grouped_with_task() -> Result<()> {
        let (_dir, storage) = storage_with(&[
            (MONDAY, "Proj1\tDev (fixed bug)\t09:00 - 10:30\nProj1\tDev\t11:00 - 11:15"),
            (WEDNESDAY, "Proj1\tDev (review)\t13:00 - 14:00"),
        ])
        .await?;

        let data = collate_week(&storage, MONDAY, Weekday::Mon).await?;

        assert_eq!(data.totals.len(), 1);
        assert_eq!(
            data.totals[&key("Proj1", "Dev")],
            WeekTotals::from([105, 0, 60, 0, 0, 0, 0, 165])
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_projects_and_grand_totals() -> Result<()> {
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        let (_dir, storage) = storage_with(&[
            (MONDAY, "A\tDev\t09:00 - 10:00\nA\tQA\t10:00 - 10:30\nB\tOps\t10:30 - 12:00"),
            (sunday, "B\tOps\t08:00 - 08:45\nA\tDev\t08:45 - 24:00"),
            // Previous and next weeks must not leak in.
            (NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(), "A\tDev\t09:00 - 17:00"),
            (NaiveDate::from_ymd_opt(2024, 3, 18).unwrap(), "A\tDev\t09:00 - 17:00"),
        ])
        .await?;

        let data = collate_week(&storage, sunday, Weekday::Mon).await?;

        assert_eq!(data.current_day_index, 6);
        assert_eq!(
            data.project_totals["A"],
            WeekTotals::from([90, 0, 0, 0, 0, 0, 915, 1005])
        );
        assert_eq!(
            data.project_totals["B"],
            WeekTotals::from([90, 0, 0, 0, 0, 0, 45, 135])
        );
        assert_eq!(
            data.grand_totals,
            WeekTotals::from([180, 0, 0, 0, 0, 0, 960, 1140])
        );
        assert_sums(&data);
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_lines_are_skipped() -> Result<()> {
        let text = "garbage\n\
                    \n\
                    Proj1\tDev\n\
                    Proj1\tDev\tlunch - 13:00\n\
                    Proj1\tDev\t15:00 - 14:00\n\
                    Proj1\tDev\t09:00 - 09:45";
        let (_dir, storage) = storage_with(&[(MONDAY, text)]).await?;

        let data = collate_week(&storage, MONDAY, Weekday::Mon).await?;

        assert_eq!(
            data.totals[&key("Proj1", "Dev")],
            WeekTotals::from([45, 0, 0, 0, 0, 0, 0, 45])
        );
        assert!(!data.is_open(0));
        assert_sums(&data);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_week() -> Result<()> {
        let (_dir, storage) = storage_with(&[]).await?;

        let data = collate_week(&storage, WEDNESDAY, Weekday::Mon).await?;

        assert!(data.totals.is_empty());
        assert!(data.project_totals.is_empty());
        assert_eq!(data.grand_totals, WeekTotals::default());
        assert_eq!(data.open_days, vec![None; 7]);
        Ok(())
    }

    #[tokio::test]
    async fn test_sunday_start_of_week() -> Result<()> {
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let (_dir, storage) = storage_with(&[(sunday, "A\tDev\t09:00 - 10:00")]).await?;

        let data = collate_week(&storage, WEDNESDAY, Weekday::Sun).await?;

        assert_eq!(data.week_start, sunday);
        assert_eq!(data.current_day_index, 3);
        assert_eq!(data.grand_totals.day(0), 60);
        Ok(())
    }

    #[tokio::test]
    async fn test_collating_is_idempotent() -> Result<()> {
        let (_dir, storage) = storage_with(&[
            (MONDAY, "A\tDev\t09:00 - 10:00"),
            (WEDNESDAY, "B\tOps\t09:00 - 10:00\nA\tDev\t10:00 - "),
        ])
        .await?;

        let first = collate_week(&storage, WEDNESDAY, Weekday::Mon).await?;
        let second = collate_week(&storage, WEDNESDAY, Weekday::Mon).await?;

        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn test_json_shape() -> Result<()> {
        let (_dir, storage) = storage_with(&[(MONDAY, "P\tT\t09:00 - 10:00")]).await?;

        let data = collate_week(&storage, MONDAY, Weekday::Mon).await?;
        let json = serde_json::to_value(&data)?;

        assert_eq!(json["weekStart"], "2024-03-11");
        assert_eq!(json["totals"][0]["project"], "P");
        assert_eq!(json["totals"][0]["task"], "T");
        assert_eq!(json["totals"][0]["minutes"][0], 60);
        assert_eq!(json["grandTotals"][7], 60);
        assert_eq!(json["currentDayIndex"], 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_json_keeps_tasks_with_tilde_apart() -> Result<()> {
        let (_dir, storage) = storage_with(&[(
            MONDAY,
            "a~b\tc\t09:00 - 11:00\na\tb~c\t11:00 - 12:00",
        )])
        .await?;

        let data = collate_week(&storage, MONDAY, Weekday::Mon).await?;
        let json = serde_json::to_value(&data)?;

        let totals = json["totals"].as_array().unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0]["project"], "a");
        assert_eq!(totals[0]["task"], "b~c");
        assert_eq!(totals[0]["minutes"][7], 60);
        assert_eq!(totals[1]["project"], "a~b");
        assert_eq!(totals[1]["task"], "c");
        assert_eq!(totals[1]["minutes"][7], 120);
        Ok(())
    }
}
