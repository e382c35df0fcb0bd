use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Run-wide counters shared by the fetch pool, the report pipeline and the reporter.
#[derive(Default, Debug)]
pub struct Telemetry {
    listed: AtomicU64,
    dispatched: AtomicU64,
    progress_markers: AtomicU64,
    fetched: AtomicU64,
    not_found: AtomicU64,
    fetch_errors: AtomicU64,
    updated: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl Telemetry {
    pub fn record_listed(&self, count: usize) {
        self.listed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_progress_marker(&self) {
        self.progress_markers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_updated(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            listed: self.listed.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            progress_markers: self.progress_markers.load(Ordering::Relaxed),
            fetched: self.fetched.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub listed: u64,
    pub dispatched: u64,
    pub progress_markers: u64,
    pub fetched: u64,
    pub not_found: u64,
    pub fetch_errors: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl TelemetrySnapshot {
    /// Records that reached a terminal pipeline state.
    pub fn processed(&self) -> u64 {
        self.updated + self.skipped + self.failed
    }
}

/// Spawns a background task that periodically logs fetch throughput and pipeline outcomes.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        let mut last_snapshot = telemetry.snapshot();
        let mut last_tick = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(target: "fillreports::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current = telemetry.snapshot();
                    let fetched_delta = current.fetched.saturating_sub(last_snapshot.fetched);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let throughput = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        fetched_delta as f64 / elapsed
                    };

                    tracing::info!(
                        target: "fillreports::metrics",
                        throughput = format!("{throughput:.2}"),
                        listed = current.listed,
                        dispatched = current.dispatched,
                        fetched = current.fetched,
                        not_found = current.not_found,
                        fetch_errors = current.fetch_errors,
                        updated = current.updated,
                        skipped = current.skipped,
                        failed = current.failed,
                        "runtime metrics snapshot"
                    );

                    last_snapshot = current;
                    last_tick = Instant::now();
                }
            }
        }
    })
}
