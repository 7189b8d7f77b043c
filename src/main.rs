use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use seclog_eventlog::{LogProvider, SnapshotProvider};
use seclog_logs::{
    ExportError, FetchReport, Fetcher, FilterCriteria, Monitor, MonitorError, export_csv,
};

mod config;
mod render;

use config::SeclogConfig;

/// Seclog - fetch, filter, monitor and export Windows event logs
#[derive(Parser, Debug)]
#[command(name = "seclog")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ./seclog.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Read channels from a snapshot directory of <Channel>.json files
    #[arg(long, global = true, value_name = "DIR")]
    snapshot: Option<PathBuf>,

    /// Records requested per native read
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and filter records once
    Fetch {
        /// Channel to read (repeatable; defaults to the configured channels)
        #[arg(short, long = "channel", value_name = "NAME")]
        channels: Vec<String>,

        /// Earliest day to include (YYYY-MM-DD)
        #[arg(long, default_value = "")]
        start: String,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long, default_value = "")]
        end: String,

        /// Case-insensitive text to look for in any field
        #[arg(short, long, default_value = "")]
        keyword: String,

        /// Write the matching records to this CSV file
        #[arg(long, value_name = "PATH")]
        export: Option<PathBuf>,

        /// Only print the counts
        #[arg(long)]
        summary: bool,
    },

    /// Re-fetch every channel periodically until interrupted
    Monitor {
        /// Seconds between polls
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many updates
        #[arg(long)]
        iterations: Option<u64>,

        /// Records to print per update
        #[arg(long, default_value = "10")]
        show: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = SeclogConfig::load(args.config.as_deref())?;

    let default_directive: tracing_subscriber::filter::Directive = config
        .log_level
        .as_deref()
        .and_then(|level| level.parse().ok())
        .unwrap_or_else(|| tracing::Level::WARN.into());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_directive),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args, config).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run(args: Args, config: SeclogConfig) -> Result<()> {
    let provider = open_provider(args.snapshot.or_else(|| config.snapshot_dir.clone()))?;
    let fetcher =
        Fetcher::new(provider).with_batch_size(args.batch_size.unwrap_or(config.batch_size));

    match args.command {
        Command::Fetch {
            channels,
            start,
            end,
            keyword,
            export,
            summary,
        } => {
            let channels = if channels.is_empty() {
                config.channels.clone()
            } else {
                channels
            };
            // Dates are validated here, before any channel is opened
            let criteria = FilterCriteria::parse(channels, &start, &end, &keyword)?;
            let report = fetch_in_background(&fetcher, criteria).await?;
            print_report(&report, !summary);

            if let Some(path) = export {
                match export_csv(&report.records, &path) {
                    Ok(count) => println!("Exported {} records to {}", count, path.display()),
                    Err(ExportError::NoData) => eprintln!("No filtered log data to save."),
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(())
        }

        Command::Monitor {
            interval,
            iterations,
            show,
        } => {
            let poll_interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.poll_interval());
            run_monitor(fetcher, poll_interval, iterations, show).await
        }
    }
}

fn open_provider(snapshot: Option<PathBuf>) -> Result<Arc<dyn LogProvider>> {
    if let Some(dir) = snapshot {
        tracing::info!(dir = %dir.display(), "reading snapshot");
        return Ok(Arc::new(SnapshotProvider::new(dir)));
    }
    seclog_eventlog::native_provider()
        .context("No native event log on this platform; pass --snapshot <DIR>")
}

/// Run the fetch on a blocking worker so the runtime stays responsive
async fn fetch_in_background(fetcher: &Fetcher, criteria: FilterCriteria) -> Result<FetchReport> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    fetcher.spawn_fetch(criteria, tx);
    rx.recv()
        .await
        .context("Fetch worker exited without a result")
}

fn print_report(report: &FetchReport, with_records: bool) {
    if with_records {
        for record in &report.records {
            println!("{}", render::record_line(record));
        }
    }
    println!("{} records  {}", report.records.len(), render::counts_line(&report.counts));
    for problem in render::channel_problems(report) {
        eprintln!("warning: {}", problem);
    }
}

async fn run_monitor(
    fetcher: Fetcher,
    poll_interval: Duration,
    iterations: Option<u64>,
    show: usize,
) -> Result<()> {
    let monitor = Monitor::new(fetcher).with_poll_interval(poll_interval);
    let (update_tx, mut update_rx) = mpsc::unbounded_channel();

    match monitor.start(update_tx) {
        Ok(()) => {}
        Err(MonitorError::AlreadyMonitoring) => eprintln!("Already monitoring."),
    }
    eprintln!(
        "Monitoring every {}s, press Ctrl-C to stop",
        poll_interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            update = update_rx.recv() => {
                let Some(update) = update else { break };
                println!(
                    "-- update {} ({} records)  {}",
                    update.iteration,
                    update.report.records.len(),
                    render::counts_line(&update.report.counts)
                );
                for record in update.report.records.iter().take(show) {
                    println!("{}", render::record_line(record));
                }
                for problem in render::channel_problems(&update.report) {
                    eprintln!("warning: {}", problem);
                }
                if iterations.is_some_and(|limit| update.iteration >= limit) {
                    break;
                }
            }
        }
    }

    monitor.stop();
    Ok(())
}
