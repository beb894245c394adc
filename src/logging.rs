//! Logging collaborator for the CLI and the web form.
//!
//! The prober itself never logs; it streams `PortReport`s and these helpers turn
//! them into records.

use crate::report;
use crate::types::PortReport;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{info, Event, Level, Subscriber};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Target of the per-open-port records; the log file receives nothing else.
pub const OPEN_PORT_TARGET: &str = "portprobe::open_ports";

/// Map a `-v` count to a level: 0 warn, 1 info, 2 debug, more trace.
pub fn level_for(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber: stderr at the chosen verbosity (overridable via
/// `RUST_LOG`), plus an optional append-only file of open-port records.
pub fn init(verbose: u8, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbose).into())
        .from_env()
        .context("invalid RUST_LOG filter")?;

    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(filter);

    let file_layer = log_file.map(open_port_file_layer).transpose()?;

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .context("logging already initialized")?;
    Ok(())
}

/// A layer appending `<local time> - LEVEL - message` lines to `path`, one per open port.
pub fn open_port_file_layer<S>(path: &Path) -> Result<impl Layer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file: {}", path.display()))?;
    Ok(fmt::layer()
        .event_format(PlainRecordFormat)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_filter(filter_fn(|meta| meta.target() == OPEN_PORT_TARGET)))
}

/// `timestamp - LEVEL - message`, without structured fields.
pub struct PlainRecordFormat;

impl<S, N> FormatEvent<S, N> for PlainRecordFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut message = MessageField::default();
        event.record(&mut message);
        writeln!(
            writer,
            "{} - {} - {}",
            report::timestamp_now(),
            event.metadata().level(),
            message.0
        )
    }
}

#[derive(Default)]
struct MessageField(String);

impl Visit for MessageField {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

/// Drain a report stream, emitting one info record per open port. Closed ports are not logged.
///
/// Returns how many open ports were logged once the sender side is dropped.
pub async fn log_open_ports(mut rx: mpsc::UnboundedReceiver<PortReport>) -> u64 {
    let mut logged = 0;
    while let Some(report) = rx.recv().await {
        if report.outcome.is_open() {
            info!(target: OPEN_PORT_TARGET, "{}", report::open_line(report.port));
            logged += 1;
        }
    }
    logged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortOutcome;

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(0), Level::WARN);
        assert_eq!(level_for(1), Level::INFO);
        assert_eq!(level_for(2), Level::DEBUG);
        assert_eq!(level_for(9), Level::TRACE);
    }

    #[tokio::test]
    async fn log_file_holds_only_open_port_lines() {
        let path = std::env::temp_dir().join(format!("portprobe-log-{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let layer = open_port_file_layer(&path).unwrap();
        let _guard = tracing_subscriber::registry().with(layer).set_default();

        info!("starting scan");
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(PortReport { port: 80, outcome: PortOutcome::Open }).unwrap();
        tx.send(PortReport { port: 81, outcome: PortOutcome::Closed }).unwrap();
        drop(tx);
        assert_eq!(log_open_ports(rx).await, 1);

        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1, "{text}");
        assert!(lines[0].ends_with(" - INFO - Port 80 is open."), "{text}");
        // `YYYY-MM-DD HH:MM:SS` prefix.
        assert_eq!(lines[0].find(" - INFO - "), Some(19));
    }

    #[tokio::test]
    async fn only_open_ports_are_logged() {
        let (tx, rx) = mpsc::unbounded_channel();
        for (port, outcome) in [
            (80, PortOutcome::Open),
            (81, PortOutcome::Closed),
            (443, PortOutcome::Open),
        ] {
            tx.send(PortReport { port, outcome }).unwrap();
        }
        drop(tx);
        assert_eq!(log_open_ports(rx).await, 2);
    }
}
