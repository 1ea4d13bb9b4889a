pub mod dates;
pub mod output;
pub mod report;
pub mod timesheet;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use report::{process_report_command, process_watch_command, process_week_command};
use timesheet::{
    process_list_command, process_migrate_command, process_projects_command,
    process_show_command, process_start_command, process_status_command, process_stop_command,
    process_times_command, StartCommand, TimesCommand,
};
use tracing::{debug, level_filters::LevelFilter};

use crate::{
    config::Settings,
    storage::day_log::{DayLogStorageImpl, TIMESHEET_DIR},
    timer::TaskTimer,
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, create_dir},
        logging::{enable_logging, CLI_PREFIX},
    },
};

use dates::DateArgs;

#[derive(Parser, Debug)]
#[command(name = "time-keeper", version, long_about = None)]
#[command(about = "Log time spent on projects and tasks, and sum it up per week", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print logs to the console")]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start a task. A task that is still running gets stopped first")]
    Start {
        #[command(flatten)]
        command: StartCommand,
    },
    #[command(about = "Stop the running task")]
    Stop {
        #[arg(long, help = "End time as HH:MM. By default the interval closest to now")]
        end: Option<String>,
    },
    #[command(about = "Show the running task")]
    Status {},
    #[command(about = "Write the CSV report of a week")]
    Report {
        #[command(flatten)]
        date: DateArgs,
    },
    #[command(about = "Display hours per task for a week")]
    Week {
        #[command(flatten)]
        date: DateArgs,
        #[arg(long, help = "Print the week as json")]
        json: bool,
    },
    #[command(about = "Print the time log of a day")]
    Show {
        #[command(flatten)]
        date: DateArgs,
    },
    #[command(about = "List days that have a time log, most recent first")]
    List {},
    #[command(about = "List selectable times for the configured interval")]
    Times {
        #[command(flatten)]
        command: TimesCommand,
    },
    #[command(about = "List configured projects and their tasks")]
    Projects {},
    #[command(about = "Display a week and update it whenever its time logs change")]
    Watch {
        #[command(flatten)]
        date: DateArgs,
    },
    #[command(about = "Rename day files from YYYY-M-D.txt to YYYY-MM-DD.txt")]
    Migrate {},
}

/// Everything a command needs: where the data lives and how it should be interpreted.
pub struct AppContext {
    pub app_dir: PathBuf,
    pub settings: Settings,
}

impl AppContext {
    pub fn timesheet_dir(&self) -> PathBuf {
        self.app_dir.join(TIMESHEET_DIR)
    }

    pub fn storage(&self) -> Result<DayLogStorageImpl> {
        Ok(DayLogStorageImpl::new(self.timesheet_dir())?)
    }

    pub fn timer(&self) -> Result<TaskTimer<DayLogStorageImpl>> {
        Ok(TaskTimer::new(
            self.storage()?,
            Box::new(DefaultClock),
            self.settings.clone(),
        ))
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match args.dir {
        Some(dir) => create_dir(dir)?,
        None => create_application_default_path()?,
    };

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;
    debug!("Using application directory {app_dir:?}");

    let settings = Settings::load_or_init(&app_dir)?;
    let context = AppContext { app_dir, settings };

    match args.commands {
        Commands::Start { command } => process_start_command(&context, command).await,
        Commands::Stop { end } => process_stop_command(&context, end).await,
        Commands::Status {} => process_status_command(&context).await,
        Commands::Report { date } => process_report_command(&context, date).await,
        Commands::Week { date, json } => process_week_command(&context, date, json).await,
        Commands::Show { date } => process_show_command(&context, date).await,
        Commands::List {} => process_list_command(&context).await,
        Commands::Times { command } => process_times_command(&context, command),
        Commands::Projects {} => process_projects_command(&context),
        Commands::Watch { date } => process_watch_command(&context, date).await,
        Commands::Migrate {} => process_migrate_command(&context).await,
    }
}
