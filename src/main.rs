use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use port_checker::config::{default_pool_size, DEFAULT_SOCKET_TIMEOUT_MS};
use port_checker::ports::PortSpan;
use port_checker::types::{now_rfc3339, RangeResult, ScanMode, ScanReport};
use port_checker::{PortScanner, ScanError, ScannerConfig};

/// port-checker — check which TCP ports of a host accept connections.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "port-checker",
    version,
    about = "Check which TCP ports of a host accept connections.",
    long_about = None
)]
struct Cli {
    /// Hostname, IPv4 or IPv6 literal to check.
    #[arg(long)]
    host: String,

    /// Port or inclusive range, e.g. `443` or `1-1024`.
    #[arg(long, default_value = "1-1024")]
    ports: PortSpan,

    /// Connect timeout per port in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = DEFAULT_SOCKET_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Max concurrent connect attempts (defaults to available parallelism).
    #[arg(long)]
    threads: Option<usize>,

    /// Probe ports one at a time instead of on the worker pool.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// List closed ports as well as open ones.
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Write the report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ScannerConfig::new(cli.timeout_ms, cli.threads.unwrap_or_else(default_pool_size))?;
    let scanner = PortScanner::new(config)?;
    let mode = if cli.sequential {
        ScanMode::Sequential
    } else {
        ScanMode::Concurrent
    };

    info!(
        host = %cli.host,
        ports = %cli.ports,
        timeout_ms = cli.timeout_ms,
        threads = scanner.pool_size(),
        ?mode,
        "starting scan"
    );

    let started_at = now_rfc3339();
    let scan = async {
        match mode {
            ScanMode::Sequential => scanner.scan_range(&cli.host, cli.ports.start, cli.ports.end).await,
            ScanMode::Concurrent => {
                scanner
                    .scan_range_concurrent(&cli.host, cli.ports.start, cli.ports.end)
                    .await
            }
        }
    };

    let result = tokio::select! {
        res = scan => res,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, abandoning in-flight probes");
            scanner.shutdown_now().await;
            Err(ScanError::Cancelled)
        }
    };
    let result = match result {
        Ok(r) => r,
        Err(ScanError::Cancelled) => bail!("scan abandoned before completion"),
        Err(e) => return Err(e).context("scan rejected"),
    };

    print_results_table(&result, cli.all);

    if let Some(path) = cli.output.as_deref() {
        let (start, end) = cli.ports.bounds()?;
        let report = ScanReport::new(result, start, end, mode, started_at);
        write_report_json(path, &report)
            .with_context(|| format!("failed to write JSON to {}", path.display()))?;
        println!("Wrote JSON report to {}", path.display());
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_results_table(result: &RangeResult, all: bool) {
    let open = result.open_ports();
    println!(
        "\n{}: {} open of {} scanned",
        result.host,
        open.len(),
        result.len()
    );

    let port_w = 5usize;
    println!("{:>port_w$}  {:<6}", "port", "state", port_w = port_w);
    println!("{:->port_w$}  {:-<6}", "", "", port_w = port_w);
    for probe in result.iter().filter(|p| all || p.is_open) {
        let state = if probe.is_open { "open" } else { "closed" };
        println!("{:>port_w$}  {:<6}", probe.port, state, port_w = port_w);
    }
}

fn write_report_json(path: &Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
