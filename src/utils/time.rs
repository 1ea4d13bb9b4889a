//! Date and time-of-day helpers shared by the storage, aggregation and report layers.
//!
//! All dates are local calendar dates ([NaiveDate]); no timezone conversion happens here.
//! Times of day are whole minutes since midnight, where `24:00` (1440) is a valid end sentinel.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Weekday};
use thiserror::Error;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Sentinel used as the last selectable time of a day.
pub const END_OF_DAY: &str = "24:00";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeError {
    #[error("can't parse {input:?} as a YYYY-MM-DD date")]
    Parse { input: String },
    #[error("can't parse {input:?} as a HH:MM time")]
    InvalidTime { input: String },
    #[error("interval of {0} minutes is not usable")]
    InvalidInterval(u32),
    #[error("no interval of {interval} minutes found close to {now}")]
    InvariantViolation { interval: u32, now: NaiveTime },
}

/// This is the standard way of converting a date to a string in time-keeper.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Inverse of [format_date]. Components don't have to be zero padded, so `2024-3-5` is accepted
/// as well.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, TimeError> {
    let error = || TimeError::Parse {
        input: value.to_string(),
    };
    let parts = value.trim().split('-').collect::<Vec<_>>();
    let [year, month, day] = parts.as_slice() else {
        return Err(error());
    };
    let year = year.parse::<i32>().map_err(|_| error())?;
    let month = month.parse::<u32>().map_err(|_| error())?;
    let day = day.parse::<u32>().map_err(|_| error())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(error)
}

/// Checks that a string names an existing calendar date.
pub fn is_valid_date(value: &str) -> bool {
    parse_iso_date(value).is_ok()
}

/// Returns the first day of the week containing `date`, where weeks begin on `week_start`.
/// A Sunday with weeks starting on Monday belongs to the week of the previous Monday.
pub fn week_start(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    date - Duration::days(day_index_in_week(date, week_start) as i64)
}

pub fn week_end(date: NaiveDate, start: Weekday) -> NaiveDate {
    week_start(date, start) + Duration::days(6)
}

/// Position of `date` inside its week, always in `0..7`.
pub fn day_index_in_week(date: NaiveDate, week_start: Weekday) -> usize {
    let day = date.weekday().num_days_from_sunday();
    let offset = week_start.num_days_from_sunday();
    ((day + 7 - offset) % 7) as usize
}

/// Formats minutes as hours with at most 2 decimal places, `90` becomes `1.5`.
pub fn format_duration(minutes: i64, blank_if_zero: bool) -> String {
    if minutes == 0 && blank_if_zero {
        return String::new();
    }
    // round(minutes * 100 / 60) with halves going up, kept in integers to stay locale and float
    // independent.
    let hundredths = (minutes * 200 + 60).div_euclid(120);
    let sign = if hundredths < 0 { "-" } else { "" };
    let hundredths = hundredths.abs();
    let (whole, fraction) = (hundredths / 100, hundredths % 100);
    match fraction {
        0 => format!("{sign}{whole}"),
        f if f % 10 == 0 => format!("{sign}{whole}.{}", f / 10),
        f => format!("{sign}{whole}.{f:02}"),
    }
}

/// Minutes since midnight for `HH:MM`. A missing minute part counts as 0.
pub fn parse_minutes_of_day(time: &str) -> Result<i64, TimeError> {
    let error = || TimeError::InvalidTime {
        input: time.to_string(),
    };
    let mut parts = time.trim().splitn(2, ':');
    let hours = parts
        .next()
        .filter(|v| !v.is_empty())
        .ok_or_else(error)?
        .parse::<i64>()
        .map_err(|_| error())?;
    let minutes = match parts.next() {
        Some(v) => v.parse::<i64>().map_err(|_| error())?,
        None => 0,
    };
    if hours < 0 || !(0..60).contains(&minutes) {
        return Err(error());
    }
    Ok(hours * 60 + minutes)
}

/// Zero padded `HH:MM`. Values past midnight are not wrapped, so 1440 gives `24:00`.
pub fn format_time_of_day(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimeOptions {
    /// Rotate the list so that the interval closest to now comes first.
    pub current_time_first: bool,
    /// Put an empty entry in front, meaning the task is still ongoing.
    pub include_empty: bool,
    /// Keep `min_time` itself in the list instead of only later times.
    pub include_start_time: bool,
}

/// Lists selectable times in steps of `interval` minutes, for time pickers.
///
/// Only times after `min_time` are kept (or equal to it with
/// [TimeOptions::include_start_time]). `24:00` always closes the list.
pub fn enumerate_time_options(
    min_time: &str,
    interval: u32,
    options: TimeOptions,
    now: NaiveTime,
) -> Result<Vec<String>, TimeError> {
    if interval == 0 {
        return Err(TimeError::InvalidInterval(interval));
    }
    let min = parse_minutes_of_day(min_time)?;
    let keep = |minutes: i64| {
        if options.include_start_time {
            minutes >= min
        } else {
            minutes > min
        }
    };

    let mut times = (0..MINUTES_PER_DAY)
        .step_by(interval as usize)
        .filter(|v| keep(*v))
        .map(format_time_of_day)
        .collect::<Vec<_>>();
    times.push(END_OF_DAY.to_string());

    if options.current_time_first {
        let current = closest_interval_to(now, interval)?;
        if let Some(position) = times.iter().position(|v| *v == current) {
            times.rotate_left(position);
        }
    }

    if options.include_empty {
        times.insert(0, String::new());
    }
    Ok(times)
}

/// Returns the interval boundary closest to `now`, preferring the earlier one on ties.
/// For 15 minute intervals 09:07 gives `09:00` and 09:08 gives `09:15`.
pub fn closest_interval_to(now: NaiveTime, interval: u32) -> Result<String, TimeError> {
    if interval == 0 {
        return Err(TimeError::InvalidInterval(interval));
    }
    let step = interval as i64;
    let current = (now.hour() * 60 + now.minute()) as i64;
    let hour_start = (now.hour() * 60) as i64;

    // Scan forward from the last boundary at or before the current hour. Differences shrink until
    // the closest candidate is passed.
    let mut candidate = hour_start - hour_start % step;
    let mut previous: Option<(i64, i64)> = None;
    while candidate <= MINUTES_PER_DAY + step {
        let difference = (current - candidate).abs();
        if let Some((previous_candidate, previous_difference)) = previous {
            if previous_difference <= difference {
                let closest = previous_candidate.clamp(0, MINUTES_PER_DAY);
                return Ok(format_time_of_day(closest));
            }
        }
        previous = Some((candidate, difference));
        candidate += step;
    }

    Err(TimeError::InvariantViolation { interval, now })
}

/// Returns dates from `start` to `end`, both inclusive.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |v| *v <= end)
}
