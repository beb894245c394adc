use std::fs::File;
use std::path::{Path, PathBuf};

use portprobe::report::{self, ScanReport};
use portprobe::{logging, ports, server, ProbeConfig, Prober, SharedProgress};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// portprobe: probe which TCP ports on one host accept connections.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "portprobe",
    version,
    about = "Probe which TCP ports on one host accept connections, within a per-port time budget.",
    long_about = None
)]
struct Cli {
    /// Host name or IP address to probe.
    #[arg(long, required_unless_present = "serve_ui")]
    host: Option<String>,

    /// First port of the inclusive range (0-65535).
    #[arg(long = "start-port", required_unless_present = "serve_ui")]
    start_port: Option<String>,

    /// Last port of the inclusive range (0-65535, not below the start port).
    #[arg(long = "end-port", required_unless_present = "serve_ui")]
    end_port: Option<String>,

    /// Per-port connect timeout in milliseconds.
    #[arg(long = "timeout", value_name = "MS", default_value_t = 1000)]
    timeout_ms: u64,

    /// Ports probed in parallel. 1 probes strictly one after another.
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Write the report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print results without colors.
    #[arg(long = "no-color", default_value_t = false)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Append open-port records to this log file.
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Serve the embedded web form instead of running a single scan.
    #[arg(long = "serve-ui", default_value_t = false)]
    serve_ui: bool,

    /// Address for the web form when `--serve-ui` is set.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_file.as_deref())?;

    if cli.serve_ui {
        println!("Form available at http://{} (Ctrl+C to stop)", cli.bind);
        tokio::select! {
            res = server::spawn_server(&cli.bind) => res?,
            _ = tokio::signal::ctrl_c() => info!("shutting down"),
        }
        return Ok(());
    }

    run_scan(&cli).await
}

async fn run_scan(cli: &Cli) -> Result<()> {
    let (Some(host), Some(start), Some(end)) = (&cli.host, &cli.start_port, &cli.end_port) else {
        bail!("--host, --start-port and --end-port are required");
    };
    // Validate before any network activity.
    let target = ports::parse_target(host, start, end)
        .map_err(|e| anyhow!(report::input_error_message(&e)))?;
    let config = ProbeConfig::from_millis(cli.timeout_ms, cli.concurrency);

    info!(
        host = %target.address,
        start = target.start_port,
        end = target.end_port,
        timeout_ms = config.per_attempt_timeout.as_millis() as u64,
        concurrency = config.effective_concurrency(),
        "starting scan"
    );

    // Ctrl-C cancels the scan.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let sink = tokio::spawn(logging::log_open_ports(rx));

    let res = Prober::new(config)
        .probe_with_shared(&target, cancel, SharedProgress::with_reports(tx))
        .await;
    let logged = sink.await.unwrap_or_default();
    debug!(logged, "open-port records written");

    let result = match res {
        Ok(result) => result,
        Err(e) => {
            let msg = report::error_message(&e);
            return Err(anyhow::Error::new(e).context(msg));
        }
    };

    let report = ScanReport::completed_now(&target, result);
    println!("{}", report.render(!cli.no_color));

    if let Some(path) = cli.output.as_deref() {
        write_report_json(path, &report)?;
        println!("Wrote JSON report to {}", path.display());
    }
    Ok(())
}

fn write_report_json(path: &Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
