use std::{
    io::{stdout, IsTerminal},
    sync::Arc,
};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    report::{
        csv::render_csv,
        weekly::{collate_week, WeeklyData},
    },
    storage::report_file::{ReportStorage, REPORT_DIR},
    utils::clock::DefaultClock,
    watch::{watch_day_files, WeekRecomputeModule},
};

use super::{dates::DateArgs, output::format_week_summary, AppContext};

const CHANGE_BUFFER: usize = 64;

pub async fn process_report_command(context: &AppContext, date: DateArgs) -> Result<()> {
    let timer = context.timer()?;
    let date = date.resolve(timer.today())?;
    let data = collate_week(timer.storage(), date, context.settings.week_start).await?;

    let reports = ReportStorage::new(context.timesheet_dir().join(REPORT_DIR))?;
    let path = reports.write(data.week_start, &render_csv(&data)).await?;
    println!("{}", path.display());
    Ok(())
}

pub async fn process_week_command(context: &AppContext, date: DateArgs, json: bool) -> Result<()> {
    let timer = context.timer()?;
    let date = date.resolve(timer.today())?;
    let data = collate_week(timer.storage(), date, context.settings.week_start).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        print!("{}", format_week_summary(&data, stdout().is_terminal()));
    }
    Ok(())
}

pub async fn process_watch_command(context: &AppContext, date: DateArgs) -> Result<()> {
    let storage = Arc::new(context.storage()?);
    let date = date.resolve(chrono::Local::now().date_naive())?;

    let (sender, receiver) = mpsc::channel(CHANGE_BUFFER);
    // Dropping the watcher stops the events, keep it for the whole run.
    let _watcher = watch_day_files(storage.log_dir(), sender)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    let colored = stdout().is_terminal();
    let module = WeekRecomputeModule::new(
        receiver,
        storage,
        date,
        context.settings.week_start,
        move |data: &WeeklyData| {
            print!("{}", format_week_summary(data, colored));
            println!();
            Ok(())
        },
        shutdown,
        Box::new(DefaultClock),
    );
    module.run().await?;
    info!("Stopped watching");
    Ok(())
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => shutdown.cancel(),
        Err(e) => warn!("Unable to listen for Ctrl-C: {e}"),
    }
}
