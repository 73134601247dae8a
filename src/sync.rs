use crate::api::{DataSource, FetchError};
use crate::format::{activity_by_hour, device_type_mix};
use crate::models::NotifyLevel;
use crate::render::{ChartSink, Renderer};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// How a refresh cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// At least one source succeeded and its data reached the renderer.
    Applied { sources_failed: usize },
    /// A newer cycle was initiated before this one settled; nothing was
    /// applied.
    Stale,
    /// Every source failed; one error notification was surfaced.
    AllFailed,
}

/// Fans out to the three data sources per cycle and applies the results to
/// the renderer.
///
/// Each cycle is tagged with a monotonically increasing sequence number at
/// initiation. After the fetches settle, results are applied only if no
/// newer cycle has been initiated since, so a slow response can never
/// overwrite fresher data. Sources fail independently; a failed source means
/// no update for that section this cycle, and only total failure is surfaced
/// to the user.
pub struct SyncCoordinator<S, R> {
    source: S,
    renderer: R,
    charts: Option<Box<dyn ChartSink + Send + Sync>>,
    window_hours: u32,
    seq: AtomicU64,
}

impl<S: DataSource, R: Renderer> SyncCoordinator<S, R> {
    pub fn new(
        source: S,
        renderer: R,
        charts: Option<Box<dyn ChartSink + Send + Sync>>,
        window_hours: u32,
    ) -> Self {
        Self {
            source,
            renderer,
            charts,
            window_hours,
            seq: AtomicU64::new(0),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Run one refresh cycle: fetch all three sources concurrently, then
    /// apply whatever succeeded, unless the cycle has gone stale.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let cycle = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(cycle, "refresh cycle started");

        let (stats, devices, scan) = tokio::join!(
            self.source.fetch_statistics(),
            self.source.fetch_recent_devices(self.window_hours),
            self.source.fetch_scan_status(),
        );

        if self.seq.load(Ordering::SeqCst) != cycle {
            debug!(cycle, "discarding stale cycle results");
            return CycleOutcome::Stale;
        }

        let mut sources_failed = 0;

        match stats {
            Ok(stats) => self.renderer.render_stats(&stats),
            Err(e) => {
                sources_failed += 1;
                log_source_failure("statistics", &e);
            }
        }

        match devices {
            Ok(devices) => {
                if let Some(charts) = &self.charts {
                    let now = Utc::now();
                    charts.update_device_mix(&device_type_mix(&devices));
                    charts.update_activity(&activity_by_hour(&devices, now));
                }
                self.renderer.render_device_list(&devices);
            }
            Err(e) => {
                sources_failed += 1;
                log_source_failure("recent devices", &e);
            }
        }

        match scan {
            Ok(status) => self.renderer.render_scan_status(&status),
            Err(e) => {
                sources_failed += 1;
                log_source_failure("scan status", &e);
            }
        }

        if sources_failed == 3 {
            self.renderer
                .notify("Error loading dashboard data", NotifyLevel::Error);
            CycleOutcome::AllFailed
        } else {
            debug!(cycle, sources_failed, "refresh cycle applied");
            CycleOutcome::Applied { sources_failed }
        }
    }
}

fn log_source_failure(source: &str, error: &FetchError) {
    warn!(source, %error, "data source failed, skipping update this cycle");
}
