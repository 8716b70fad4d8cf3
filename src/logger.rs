use std::{fs::OpenOptions, path::Path};

use anyhow::Context;
use time::{
    format_description::{self, parse},
    OffsetDateTime,
};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Install a global subscriber appending to `path`.
///
/// Nothing is ever written to stdout: the native host uses it for framed messages.
pub fn init_logger(path: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("could not open log file {}", path.display()))?;
    let writer = BoxMakeWriter::new(file);
    let local_offset =
        time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        local_offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")
            .context("invalid log time format")?,
    );

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber)
        .context("could not set global default tracing subscriber")?;
    Ok(())
}

/// Timestamped file name for a CLI session log, e.g. `2026-10-19_12:00:00_atm_log.txt`.
pub fn log_file_name() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    parse("[year]-[month]-[day]_[hour]:[minute]:[second]_atm_log.txt")
        .ok()
        .and_then(|format| now.format(&format).ok())
        .unwrap_or_else(|| "atm_log.txt".to_owned())
}
