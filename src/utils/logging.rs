use std::{path::Path, sync::LazyLock};

use anyhow::{anyhow, Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{fmt::writer::MakeWriterExt, EnvFilter};

pub const CLI_PREFIX: &str = "cli";

const LOG_DIR: &str = "logs";
const KEPT_LOG_FILES: usize = 7;
const DEFAULT_LEVEL: &str = "info";

/// Directs the logs of time-keeper into `{app_dir}/logs`, one file per day.
///
/// With `console` everything is mirrored to stderr. Stdout stays reserved for command output such
/// as report paths and week tables. Without an explicit `level`, `RUST_LOG` decides.
pub fn enable_logging(
    prefix: &str,
    app_dir: &Path,
    level: Option<LevelFilter>,
    console: bool,
) -> Result<()> {
    let log_dir = app_dir.join(LOG_DIR);
    let files = Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(&log_dir)
        .with_context(|| format!("Can't write logs into {log_dir:?}"))?;
    let console = std::io::stderr.with_filter(move |_| console);

    let level = match level {
        Some(level) => level.to_string(),
        None => std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LEVEL.into()),
    };
    let filter = EnvFilter::try_new(format!("{}={level}", env!("CARGO_CRATE_NAME")))
        .with_context(|| format!("Invalid log level {level:?}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(console.and(files))
        .try_init()
        .map_err(|e| anyhow!("Logging is already set up: {e}"))?;
    Ok(())
}

/// Routes trace output of tests through the test harness.
pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("{}=trace", env!("CARGO_CRATE_NAME"))))
        .with_test_writer()
        .try_init();
});
