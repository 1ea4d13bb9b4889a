//! Keeps a week up to date while its day files change.
//!
//! [watch_day_files] turns file system events into [DayFileChange] messages,
//! [WeekRecomputeModule] consumes them, recollates the watched week and hands the result to a
//! [WeekSubscriber]. Nothing inside the aggregation engine knows about watching.

use std::{path::Path, time::Duration};

use anyhow::Result;
use chrono::{NaiveDate, Weekday};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{
    report::weekly::{collate_week, WeeklyData},
    storage::day_log::{date_from_file_name, DayLogStorage},
    utils::{
        clock::Clock,
        time::{week_end, week_start},
    },
};

/// Editors tend to write a file in several steps. Changes arriving within this window are handled
/// together.
const SETTLE_DURATION: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayFileChange {
    pub date: NaiveDate,
}

/// Receives every recomputed week.
pub trait WeekSubscriber {
    fn on_update(&mut self, data: &WeeklyData) -> Result<()>;
}

impl<F: FnMut(&WeeklyData) -> Result<()>> WeekSubscriber for F {
    fn on_update(&mut self, data: &WeeklyData) -> Result<()> {
        self(data)
    }
}

/// Starts watching `log_dir` for day file changes. Events stop once the returned watcher is
/// dropped.
pub fn watch_day_files(
    log_dir: &Path,
    sender: mpsc::Sender<DayFileChange>,
) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!("Watcher error: {e}");
                return;
            }
        };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        for date in event.paths.iter().filter_map(|v| date_from_file_name(v)) {
            trace!("Day file event {:?} for {date}", event.kind);
            if sender.blocking_send(DayFileChange { date }).is_err() {
                debug!("Change receiver is gone");
                return;
            }
        }
    })?;
    watcher.watch(log_dir, RecursiveMode::NonRecursive)?;
    info!("Watching {}", log_dir.display());
    Ok(watcher)
}

/// Recomputes the week containing `date` whenever one of its days changes.
pub struct WeekRecomputeModule<S, W> {
    receiver: mpsc::Receiver<DayFileChange>,
    storage: S,
    date: NaiveDate,
    first_day: Weekday,
    subscriber: W,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
}

impl<S: DayLogStorage, W: WeekSubscriber> WeekRecomputeModule<S, W> {
    pub fn new(
        receiver: mpsc::Receiver<DayFileChange>,
        storage: S,
        date: NaiveDate,
        first_day: Weekday,
        subscriber: W,
        shutdown: CancellationToken,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            receiver,
            storage,
            date,
            first_day,
            subscriber,
            shutdown,
            clock,
        }
    }

    fn in_week(&self, date: NaiveDate) -> bool {
        week_start(self.date, self.first_day) <= date && date <= week_end(self.date, self.first_day)
    }

    async fn publish(&mut self) -> Result<()> {
        let data = collate_week(&self.storage, self.date, self.first_day).await?;
        if let Err(e) = self.subscriber.on_update(&data) {
            error!("Subscriber failed to handle week of {}: {e:?}", data.week_start);
        }
        Ok(())
    }

    /// Publishes the week once, then again after every relevant change until shutdown or until
    /// all senders are gone.
    pub async fn run(mut self) -> Result<()> {
        self.publish().await?;
        loop {
            let change = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                change = self.receiver.recv() => change,
            };
            let Some(change) = change else {
                return Ok(());
            };

            let mut relevant = self.in_week(change.date);
            self.clock.sleep(SETTLE_DURATION).await;
            while let Ok(change) = self.receiver.try_recv() {
                relevant |= self.in_week(change.date);
            }

            if relevant {
                debug!("Day files changed, recomputing week of {}", self.date);
                self.publish().await?;
            } else {
                trace!("Ignoring changes outside of the watched week");
            }
        }
    }
}
