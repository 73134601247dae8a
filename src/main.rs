mod api;
mod export;
mod format;
mod models;
mod render;
mod scheduler;
mod sync;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info, Level};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::api::{ApiClient, DataSource};
use crate::export::{write_export, ExportBundle, ExportFormat};
use crate::format::{DeviceSort, SortOrder};
use crate::models::NotifyLevel;
use crate::render::{AsciiCharts, ChartSink, ConsoleRenderer, Renderer};
use crate::scheduler::RefreshScheduler;
use crate::sync::{CycleOutcome, SyncCoordinator};

#[derive(Parser)]
#[command(name = "netwatch-dash")]
#[command(about = "Terminal dashboard for a network device monitoring API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the dashboard with auto-refresh
    Watch {
        /// Base URL of the monitoring API
        #[arg(short, long, default_value = "http://127.0.0.1:5000")]
        url: String,

        /// Auto-refresh interval in seconds
        #[arg(short, long, default_value = "30")]
        interval: u64,

        /// Recent-device window in hours
        #[arg(long, default_value = "24")]
        hours: u32,

        /// Device table sort key
        #[arg(long, value_enum, default_value = "last-seen")]
        sort: DeviceSort,

        /// Sort order
        #[arg(long, value_enum, default_value = "desc")]
        order: SortOrder,

        /// Path to store log files
        #[arg(short, long, default_value = "logs")]
        log_dir: PathBuf,

        /// Start with auto-refresh switched off
        #[arg(long, default_value = "false")]
        no_auto_refresh: bool,

        /// Card-style recent-device view instead of the full table
        #[arg(long, default_value = "false")]
        compact: bool,

        /// Render device-mix and activity bar charts each cycle
        #[arg(long, default_value = "false")]
        charts: bool,
    },
    /// Fetch and render the dashboard once, then exit
    Snapshot {
        /// Base URL of the monitoring API
        #[arg(short, long, default_value = "http://127.0.0.1:5000")]
        url: String,

        /// Recent-device window in hours
        #[arg(long, default_value = "24")]
        hours: u32,

        /// Device table sort key
        #[arg(long, value_enum, default_value = "last-seen")]
        sort: DeviceSort,

        /// Sort order
        #[arg(long, value_enum, default_value = "desc")]
        order: SortOrder,

        /// Render device-mix and activity bar charts
        #[arg(long, default_value = "false")]
        charts: bool,
    },
    /// Export the device inventory and statistics to a file
    Export {
        /// Base URL of the monitoring API
        #[arg(short, long, default_value = "http://127.0.0.1:5000")]
        url: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: ExportFormat,

        /// Output file path
        #[arg(short, long, default_value = "network_dashboard.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            url,
            interval,
            hours,
            sort,
            order,
            log_dir,
            no_auto_refresh,
            compact,
            charts,
        } => {
            // Keep the terminal usable: warnings and up on stderr, the full
            // JSON log stream in rolling files.
            std::fs::create_dir_all(&log_dir)?;
            let file_appender =
                RollingFileAppender::new(Rotation::HOURLY, &log_dir, "netwatch-dash.log");
            let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_filter(
                            EnvFilter::from_default_env().add_directive(Level::WARN.into()),
                        ),
                )
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_filter(LevelFilter::INFO),
                )
                .init();

            info!(%url, interval, hours, "starting dashboard watch");
            run_watch(WatchConfig {
                url,
                interval,
                hours,
                sort,
                order,
                enabled: !no_auto_refresh,
                compact,
                charts,
            })
            .await
        }
        Commands::Snapshot {
            url,
            hours,
            sort,
            order,
            charts,
        } => {
            init_plain_logging();
            let coordinator = build_coordinator(&url, hours, sort, order, false, charts)?;
            match coordinator.run_cycle().await {
                CycleOutcome::AllFailed => anyhow::bail!("all data sources failed"),
                outcome => {
                    debug!(?outcome, "snapshot complete");
                    Ok(())
                }
            }
        }
        Commands::Export {
            url,
            format,
            output,
        } => {
            init_plain_logging();
            let client = ApiClient::new(&url)?;
            let (stats, devices) = tokio::join!(client.fetch_statistics(), client.fetch_devices());

            let statistics = match stats {
                Ok(stats) => Some(stats),
                Err(e) => {
                    tracing::warn!(%e, "statistics unavailable, exporting devices only");
                    None
                }
            };
            let devices = devices?;

            let bundle = ExportBundle::new(statistics, devices);
            write_export(&bundle, format, &output)?;
            println!("Exported {} devices to {:?}", bundle.total_devices, output);
            Ok(())
        }
    }
}

fn init_plain_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

struct WatchConfig {
    url: String,
    interval: u64,
    hours: u32,
    sort: DeviceSort,
    order: SortOrder,
    enabled: bool,
    compact: bool,
    charts: bool,
}

fn build_coordinator(
    url: &str,
    hours: u32,
    sort: DeviceSort,
    order: SortOrder,
    compact: bool,
    charts: bool,
) -> anyhow::Result<Arc<SyncCoordinator<ApiClient, ConsoleRenderer>>> {
    let client = ApiClient::new(url)?;
    let renderer = ConsoleRenderer::new(sort, order, compact);
    let charts: Option<Box<dyn ChartSink + Send + Sync>> =
        charts.then(|| Box::new(AsciiCharts) as Box<dyn ChartSink + Send + Sync>);
    Ok(Arc::new(SyncCoordinator::new(
        client, renderer, charts, hours,
    )))
}

/// Watch-session event loop. Timer ticks, manual refreshes, toggles and
/// visibility changes all arrive as cycle triggers on one channel; each
/// trigger spawns a cycle, and the coordinator's sequence guard discards
/// whichever of two overlapping cycles is no longer the newest.
///
/// Controls: `r` refresh now, `a` toggle auto-refresh, `q` quit. SIGUSR1
/// pauses polling (session hidden), SIGUSR2 resumes it.
async fn run_watch(config: WatchConfig) -> anyhow::Result<()> {
    let coordinator = build_coordinator(
        &config.url,
        config.hours,
        config.sort,
        config.order,
        config.compact,
        config.charts,
    )?;

    let (trigger_tx, mut triggers) = mpsc::unbounded_channel();
    let mut scheduler = RefreshScheduler::new(
        Duration::from_secs(config.interval),
        config.enabled,
        trigger_tx,
    );

    // Initial load happens regardless of the auto-refresh toggle.
    scheduler.on_manual_refresh();
    scheduler.start();
    info!(auto_refresh = scheduler.is_enabled(), "watch loop ready");

    let (cmd_tx, mut commands) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if cmd_tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut hide = signal(SignalKind::user_defined1())?;
    let mut show = signal(SignalKind::user_defined2())?;

    loop {
        tokio::select! {
            Some(reason) = triggers.recv() => {
                debug!(?reason, "refresh cycle triggered");
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    coordinator.run_cycle().await;
                });
            }
            Some(line) = commands.recv() => match line.trim() {
                "r" => {
                    scheduler.on_manual_refresh();
                    coordinator
                        .renderer()
                        .notify("Dashboard refreshed", NotifyLevel::Info);
                }
                "a" => {
                    let message = if scheduler.toggle() {
                        ("Auto-refresh enabled", NotifyLevel::Success)
                    } else {
                        ("Auto-refresh disabled", NotifyLevel::Info)
                    };
                    coordinator.renderer().notify(message.0, message.1);
                }
                "q" => break,
                _ => {}
            },
            _ = hide.recv() => scheduler.on_visibility_change(false),
            _ = show.recv() => scheduler.on_visibility_change(true),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    scheduler.stop();
    info!("shutting down");
    Ok(())
}
