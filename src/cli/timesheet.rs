use anyhow::Result;
use chrono::Local;

use crate::{
    storage::day_log::{is_open, DayLogStorage},
    timer::NewEntry,
    utils::time::{
        enumerate_time_options, format_date, format_duration, parse_minutes_of_day, TimeOptions,
    },
};

use super::{dates::DateArgs, output::format_current_entry, AppContext};

#[derive(Debug, Clone, clap::Args)]
pub struct StartCommand {
    #[arg(long, short)]
    project: String,
    #[arg(long, short)]
    task: String,
    #[arg(long, short, help = "Note attached to the task. Ignored when AddNotes is disabled")]
    note: Option<String>,
    #[arg(long, help = "Start time as HH:MM. By default the interval closest to now")]
    start: Option<String>,
    #[arg(long, help = "End time as HH:MM. Without it the task keeps running")]
    end: Option<String>,
}

pub async fn process_start_command(context: &AppContext, command: StartCommand) -> Result<()> {
    let timer = context.timer()?;
    let line = timer
        .start_task(NewEntry {
            project: command.project,
            task: command.task,
            note: command.note,
            start: command.start,
            end: command.end,
        })
        .await?;
    println!("Started {line}");
    Ok(())
}

pub async fn process_stop_command(context: &AppContext, end: Option<String>) -> Result<()> {
    let timer = context.timer()?;
    match timer.stop_task(end).await? {
        Some(line) => {
            let minutes = match &line.interval.end {
                Some(end) => parse_minutes_of_day(end)? - parse_minutes_of_day(&line.interval.start)?,
                None => 0,
            };
            println!("Stopped {line} ({}h)", format_duration(minutes, false));
        }
        None => println!("No task is running"),
    }
    Ok(())
}

pub async fn process_status_command(context: &AppContext) -> Result<()> {
    let timer = context.timer()?;
    let entry = timer.current_entry().await?;
    println!("{}", format_current_entry(entry.as_ref()));
    Ok(())
}

pub async fn process_show_command(context: &AppContext, date: DateArgs) -> Result<()> {
    let timer = context.timer()?;
    let date = date.resolve(timer.today())?;
    let text = timer.day_contents(&format_date(date)).await?;
    if text.trim().is_empty() {
        println!("Nothing logged on {date}");
    } else {
        println!("{}", text.trim_end());
    }
    Ok(())
}

pub async fn process_list_command(context: &AppContext) -> Result<()> {
    let timer = context.timer()?;
    for date in timer.dates_newest_first().await? {
        let open = timer
            .storage()
            .read(date)
            .await?
            .is_some_and(|text| is_open(&text));
        if open {
            println!("{date} (open)");
        } else {
            println!("{date}");
        }
    }
    Ok(())
}

#[derive(Debug, Clone, clap::Args)]
pub struct TimesCommand {
    #[arg(long, default_value = "00:00", help = "Only list times after this one")]
    after: String,
    #[arg(long, help = "Also list the time passed with --after")]
    include_start: bool,
    #[arg(long, help = "Add an empty entry in front, standing for a task that is still running")]
    empty: bool,
    #[arg(long, help = "Start the list at the interval closest to now")]
    now_first: bool,
}

pub fn process_times_command(context: &AppContext, command: TimesCommand) -> Result<()> {
    let options = TimeOptions {
        current_time_first: command.now_first,
        include_empty: command.empty,
        include_start_time: command.include_start,
    };
    let times = enumerate_time_options(
        &command.after,
        context.settings.time_interval,
        options,
        Local::now().time(),
    )?;
    for time in times {
        if time.is_empty() {
            println!("(running)");
        } else {
            println!("{time}");
        }
    }
    Ok(())
}

pub fn process_projects_command(context: &AppContext) -> Result<()> {
    let projects = context.settings.project_options();
    if projects.is_empty() {
        println!("No projects configured");
    }
    for project in projects {
        println!("{project}: {}", context.settings.task_options(&project).join(", "));
    }
    Ok(())
}

pub async fn process_migrate_command(context: &AppContext) -> Result<()> {
    let storage = context.storage()?;
    let migrated = storage.migrate_legacy_names().await?;
    for date in &migrated {
        println!("Renamed {date}");
    }
    println!("{} day files migrated", migrated.len());
    Ok(())
}
