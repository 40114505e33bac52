use anyhow::{Context, Result};
use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter, Layer,
};

/// Install the two-layer subscriber: a rotating file for everything at
/// INFO and above, a colored console honoring `RUST_LOG`.
///
/// The returned guard must be kept alive by the caller or buffered file
/// output is lost on exit.
pub fn setup_logger() -> Option<WorkerGuard> {
    std::fs::create_dir_all("logs").ok();

    let file_appender = tracing_appender::rolling::daily("logs", "sweep");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(tracing_subscriber::filter::LevelFilter::INFO);

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(ConsoleFormatter)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    Some(guard)
}

/// Log to a single fixed file instead; used by the debug binaries.
pub fn setup_logger_with_file(log_path: &str) -> Result<WorkerGuard> {
    let file = File::create(log_path).context("Failed to create log file")?;
    let (non_blocking, guard) = tracing_appender::non_blocking(BufWriter::new(file));

    let subscriber = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .event_format(FileFormatter),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global subscriber")?;

    Ok(guard)
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

pub struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);
        let msg = visitor.message;

        // Colorize terminal pipeline statuses so a scan of the run output
        // picks them out.
        let colored = if msg.contains("Succeeded") {
            let green = Style::new().fg(Color::LightGreen).bold();
            msg.replace("Succeeded", &format!("{}", green.paint("Succeeded")))
        } else if msg.contains("Failed") {
            let red = Style::new().fg(Color::LightRed).bold();
            msg.replace("Failed", &format!("{}", red.paint("Failed")))
        } else if msg.contains("Skipped") {
            let yellow = Style::new().fg(Color::Yellow);
            msg.replace("Skipped", &format!("{}", yellow.paint("Skipped")))
        } else {
            msg
        };

        write!(writer, "{}", colored)?;
        writeln!(writer)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        write!(writer, "{} [{}] ", timestamp, level)?;

        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);
        writeln!(writer, "{}", visitor.message)
    }
}
