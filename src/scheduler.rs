// Refresh scheduler: fetch -> parse -> aggregate -> publish, immediately and then on a
// fixed interval. Each tick spawns its own cycle task; delivery to the subscriber is
// serialized through one lock, which is also what `cancel()` takes to close the sink.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{oneshot, watch};
use tokio::time::{Duration, Instant, interval, interval_at};
use tracing::{Instrument, debug, info, warn};

use crate::aggregation::aggregate;
use crate::config::RefreshConfig;
use crate::error::TelemetryError;
use crate::models::{DashboardView, Snapshot, parse_readings};
use crate::source::TelemetrySource;

/// Receives the outcome of every cycle. Calls never overlap.
/// Calling `CancellationHandle::cancel` from inside a callback deadlocks.
pub trait SnapshotSink: Send + 'static {
    fn on_snapshot(&mut self, snapshot: Snapshot);
    fn on_error(&mut self, message: String);
}

/// Adapts a pair of closures to `SnapshotSink`.
pub struct CallbackSink<S, E> {
    on_snapshot: S,
    on_error: E,
}

impl<S, E> CallbackSink<S, E>
where
    S: FnMut(Snapshot) + Send + 'static,
    E: FnMut(String) + Send + 'static,
{
    pub fn new(on_snapshot: S, on_error: E) -> Self {
        Self {
            on_snapshot,
            on_error,
        }
    }
}

impl<S, E> SnapshotSink for CallbackSink<S, E>
where
    S: FnMut(Snapshot) + Send + 'static,
    E: FnMut(String) + Send + 'static,
{
    fn on_snapshot(&mut self, snapshot: Snapshot) {
        (self.on_snapshot)(snapshot)
    }

    fn on_error(&mut self, message: String) {
        (self.on_error)(message)
    }
}

/// Publishes each outcome as the current dashboard view.
impl SnapshotSink for watch::Sender<DashboardView> {
    fn on_snapshot(&mut self, snapshot: Snapshot) {
        self.send_replace(DashboardView::ready(snapshot));
    }

    fn on_error(&mut self, message: String) {
        self.send_replace(DashboardView::failed(message));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Fetching,
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// How often cycle counters are logged at INFO.
    pub stats_log_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            stats_log_interval: Duration::from_secs(3600),
        }
    }
}

impl From<&RefreshConfig> for SchedulerConfig {
    fn from(c: &RefreshConfig) -> Self {
        Self {
            interval: Duration::from_secs(c.interval_secs),
            stats_log_interval: Duration::from_secs(c.stats_log_interval_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleCounts {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Finished after cancellation or after a newer cycle was delivered.
    pub discarded: u64,
}

struct Delivery {
    /// `None` once cancelled.
    sink: Option<Box<dyn SnapshotSink>>,
    state: RefreshState,
    /// Highest cycle number whose outcome reached the sink.
    last_delivered: u64,
}

struct Shared {
    delivery: Mutex<Delivery>,
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Delivery> {
        // A panicking callback must not wedge cancellation.
        self.delivery.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn counts(&self) -> CycleCounts {
        CycleCounts {
            started: self.started.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    /// Counters only move for outcomes decided under the delivery lock.
    fn deliver(&self, cycle: u64, outcome: Result<Snapshot, TelemetryError>) {
        let mut delivery = self.lock();
        if cycle < delivery.last_delivered {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(cycle, "discarding outcome of a cycle overtaken by a newer one");
            return;
        }
        let delivery = &mut *delivery;
        let Some(sink) = delivery.sink.as_mut() else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            debug!(cycle, "scheduler cancelled; outcome dropped");
            return;
        };
        delivery.last_delivered = cycle;
        match outcome {
            Ok(snapshot) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                delivery.state = RefreshState::Ready;
                info!(
                    cycle,
                    total_stations = snapshot.total_stations,
                    active_stations = snapshot.active_stations,
                    chart_points = snapshot.chart_window.len(),
                    "dashboard snapshot published"
                );
                sink.on_snapshot(snapshot);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                delivery.state = RefreshState::Failed;
                warn!(
                    cycle,
                    error = %e,
                    kind = e.kind(),
                    operation = "refresh_cycle",
                    "refresh cycle failed"
                );
                sink.on_error(e.to_string());
            }
        }
    }
}

/// Returned by `start`; the only way to stop the scheduler.
/// Dropping the handle cancels it as well.
pub struct CancellationHandle {
    shared: Arc<Shared>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl CancellationHandle {
    /// Stops future ticks and closes the sink. Once this returns no callback runs again;
    /// a callback already running finishes first. Idempotent.
    pub fn cancel(&self) {
        if let Some(tx) = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            let _ = tx.send(());
        }
        let mut delivery = self.shared.lock();
        if delivery.sink.take().is_some() {
            debug!("refresh scheduler cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.lock().sink.is_none()
    }

    /// State of the most recently delivered cycle (or `Fetching` while one is running).
    pub fn state(&self) -> RefreshState {
        self.shared.lock().state
    }

    pub fn stats(&self) -> CycleCounts {
        self.shared.counts()
    }

    /// Cancels and waits for the timer task to exit. In-flight cycles are not awaited.
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for CancellationHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Starts the scheduler with a pair of callbacks. Must be called inside a Tokio runtime.
pub fn start<S, E>(
    source: Arc<dyn TelemetrySource>,
    config: SchedulerConfig,
    on_snapshot: S,
    on_error: E,
) -> CancellationHandle
where
    S: FnMut(Snapshot) + Send + 'static,
    E: FnMut(String) + Send + 'static,
{
    start_with_sink(source, config, CallbackSink::new(on_snapshot, on_error))
}

/// Starts the scheduler: first cycle now, then one per `config.interval`.
pub fn start_with_sink(
    source: Arc<dyn TelemetrySource>,
    config: SchedulerConfig,
    sink: impl SnapshotSink,
) -> CancellationHandle {
    let shared = Arc::new(Shared {
        delivery: Mutex::new(Delivery {
            sink: Some(Box::new(sink) as Box<dyn SnapshotSink>),
            state: RefreshState::Idle,
            last_delivered: 0,
        }),
        started: AtomicU64::new(0),
        succeeded: AtomicU64::new(0),
        failed: AtomicU64::new(0),
        discarded: AtomicU64::new(0),
    });
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let span = tracing::debug_span!(
        "refresh_scheduler",
        interval_secs = config.interval.as_secs()
    );
    let task = tokio::spawn(run(source, shared.clone(), config, shutdown_rx).instrument(span));
    CancellationHandle {
        shared,
        shutdown_tx: Mutex::new(Some(shutdown_tx)),
        task: Some(task),
    }
}

async fn run(
    source: Arc<dyn TelemetrySource>,
    shared: Arc<Shared>,
    config: SchedulerConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut tick = interval(config.interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut stats_log_tick = interval_at(
        Instant::now() + config.stats_log_interval,
        config.stats_log_interval,
    );
    stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                debug!("refresh scheduler shutting down");
                break;
            }
            _ = tick.tick() => {
                let cycle = shared.started.fetch_add(1, Ordering::Relaxed) + 1;
                shared.lock().state = RefreshState::Fetching;
                let source = source.clone();
                let shared = shared.clone();
                tokio::spawn(
                    async move {
                        let outcome = refresh_once(source.as_ref()).await;
                        shared.deliver(cycle, outcome);
                    }
                    .in_current_span(),
                );
            }
            _ = stats_log_tick.tick() => {
                let counts = shared.counts();
                info!(
                    cycles_started = counts.started,
                    cycles_succeeded = counts.succeeded,
                    cycles_failed = counts.failed,
                    cycles_discarded = counts.discarded,
                    "refresh stats"
                );
            }
        }
    }
}

/// One cycle without delivery: both fetches joined, parsed, then aggregated.
/// No snapshot is produced unless both fetches succeed.
pub async fn refresh_once(source: &dyn TelemetrySource) -> Result<Snapshot, TelemetryError> {
    let (historical, latest) = tokio::join!(source.fetch_history(), source.fetch_latest());
    let historical = parse_readings(historical?, "historical");
    let latest = parse_readings(latest?, "latest");
    aggregate(&historical, &latest)
}
