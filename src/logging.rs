//! Append-only log file sink.
//!
//! Lines are `YYYY-MM-DD HH:MM:SS.mmm [level] <message>`. Console output is
//! handled separately by the output module; this subscriber writes only to
//! the file, and failing to open it degrades to a warning, never an abort.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

pub fn default_log_file() -> PathBuf {
    PathBuf::from("video-benchmark.log")
}

struct FileLogFormat;

impl<S, N> FormatEvent<S, N> for FileLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let level = match *event.metadata().level() {
            Level::ERROR => "error",
            Level::WARN => "warning",
            Level::INFO => "info",
            Level::DEBUG => "debug",
            Level::TRACE => "trace",
        };
        write!(writer, "{timestamp} [{level}] ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs the global file subscriber. Call once at startup, before any
/// console output worth mirroring.
pub fn init(path: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .event_format(FileLogFormat)
        .with_writer(Arc::new(file))
        .with_max_level(Level::INFO)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install log subscriber: {e}"))
}
