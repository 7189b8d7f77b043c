use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{FetchReport, Fetcher, FilterCriteria, MonitorError};

/// Reference wait between monitor iterations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
}

/// One delivery from the monitor loop
#[derive(Clone, Debug)]
pub struct MonitorUpdate {
    /// 1-based iteration of the current run
    pub iteration: u64,
    pub report: FetchReport,
}

struct Shared {
    state: MonitorState,
    /// Token of the current run; replaced on every start
    cancel: CancellationToken,
}

/// Periodically re-fetches every recognized channel and delivers the results
pub struct Monitor {
    fetcher: Fetcher,
    poll_interval: Duration,
    shared: Arc<Mutex<Shared>>,
}

impl Monitor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shared: Arc::new(Mutex::new(Shared {
                state: MonitorState::Idle,
                cancel: CancellationToken::new(),
            })),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn state(&self) -> MonitorState {
        self.shared.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    /// Start polling, delivering each result to `sink`.
    ///
    /// Must be called from within a Tokio runtime. If a loop is already
    /// running this does nothing and returns [`MonitorError::AlreadyMonitoring`].
    pub fn start(&self, sink: mpsc::UnboundedSender<MonitorUpdate>) -> Result<(), MonitorError> {
        let mut shared = self.shared.lock();
        if shared.state == MonitorState::Running {
            info!("already monitoring");
            return Err(MonitorError::AlreadyMonitoring);
        }

        let cancel = CancellationToken::new();
        shared.cancel = cancel.clone();
        shared.state = MonitorState::Running;

        tokio::spawn(run_loop(
            self.fetcher.clone(),
            self.poll_interval,
            Arc::clone(&self.shared),
            cancel,
            sink,
        ));
        info!(interval = ?self.poll_interval, "monitoring started");
        Ok(())
    }

    /// Stop polling.
    ///
    /// A fetch already in flight runs to completion, but its result is never
    /// delivered once this returns.
    pub fn stop(&self) {
        let mut shared = self.shared.lock();
        if shared.state == MonitorState::Running {
            shared.cancel.cancel();
            shared.state = MonitorState::Idle;
            info!("monitoring stopped");
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(
    fetcher: Fetcher,
    poll_interval: Duration,
    shared: Arc<Mutex<Shared>>,
    cancel: CancellationToken,
    sink: mpsc::UnboundedSender<MonitorUpdate>,
) {
    let criteria = FilterCriteria::all_channels();
    let mut iteration = 0u64;

    while !cancel.is_cancelled() {
        let worker = fetcher.clone();
        let request = criteria.clone();
        let report = match tokio::task::spawn_blocking(move || worker.fetch_with(&request)).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "monitor fetch failed");
                release(&shared, &cancel);
                return;
            }
        };

        iteration += 1;
        {
            // Checked under the lock so a concurrent stop() either precedes or follows the send
            let guard = shared.lock();
            if cancel.is_cancelled() {
                break;
            }
            if sink.send(MonitorUpdate { iteration, report }).is_err() {
                debug!("monitor consumer gone");
                drop(guard);
                release(&shared, &cancel);
                return;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    debug!(iterations = iteration, "monitor loop exited");
}

/// Return to Idle when the loop ends on its own, unless a newer run took over
fn release(shared: &Mutex<Shared>, cancel: &CancellationToken) {
    let mut shared = shared.lock();
    if !cancel.is_cancelled() {
        cancel.cancel();
        shared.state = MonitorState::Idle;
        info!("monitoring ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use seclog_eventlog::MemoryProvider;
    use seclog_types::{Channel, RawRecord};

    const INTERVAL: Duration = Duration::from_millis(20);

    fn records(count: u32) -> Vec<RawRecord> {
        (0..count)
            .map(|n| RawRecord {
                time_generated: NaiveDate::from_ymd_opt(2024, 2, 2)
                    .unwrap()
                    .and_hms_opt(10, 0, n)
                    .unwrap(),
                source_name: "Monitor".to_string(),
                event_code: n,
                event_type: 4,
                category: 0,
                string_inserts: Vec::new(),
            })
            .collect()
    }

    fn monitor() -> Monitor {
        let provider = MemoryProvider::new()
            .with_channel("Security", records(2))
            .with_channel("System", records(3))
            .with_unavailable("Application", "access denied");
        Monitor::new(Fetcher::new(Arc::new(provider))).with_poll_interval(INTERVAL)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<MonitorUpdate>) -> MonitorUpdate {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("monitor delivered nothing")
            .expect("monitor channel closed")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_delivers_full_fetch_each_iteration() {
        let monitor = monitor();
        let (tx, mut rx) = mpsc::unbounded_channel();
        monitor.start(tx).unwrap();

        let first = next(&mut rx).await;
        assert_eq!(first.iteration, 1);
        assert_eq!(first.report.records.len(), 5);
        assert_eq!(first.report.counts.get(Channel::Security), 2);
        assert_eq!(first.report.counts.get(Channel::System), 3);
        assert_eq!(first.report.counts.get(Channel::Application), 0);

        let second = next(&mut rx).await;
        assert_eq!(second.iteration, 2);
        monitor.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_start_is_rejected() {
        let monitor = monitor();
        let (tx, mut rx) = mpsc::unbounded_channel();
        monitor.start(tx.clone()).unwrap();
        assert_eq!(monitor.start(tx), Err(MonitorError::AlreadyMonitoring));
        assert!(monitor.is_running());

        // A second loop would repeat iteration numbers
        let iterations = [
            next(&mut rx).await.iteration,
            next(&mut rx).await.iteration,
            next(&mut rx).await.iteration,
        ];
        assert_eq!(iterations, [1, 2, 3]);
        monitor.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_ends_deliveries() {
        let monitor = monitor();
        let (tx, mut rx) = mpsc::unbounded_channel();
        monitor.start(tx).unwrap();
        next(&mut rx).await;

        monitor.stop();
        assert_eq!(monitor.state(), MonitorState::Idle);
        // Anything already queued was sent before stop() returned
        while rx.try_recv().is_ok() {}

        tokio::time::sleep(INTERVAL * 3).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_restart_after_stop() {
        let monitor = monitor();
        let (tx, mut rx) = mpsc::unbounded_channel();
        monitor.start(tx.clone()).unwrap();
        next(&mut rx).await;
        monitor.stop();

        monitor.start(tx).unwrap();
        while let Ok(update) = rx.try_recv() {
            assert!(update.iteration >= 1);
        }
        assert_eq!(next(&mut rx).await.report.records.len(), 5);
        monitor.stop();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_returns_to_idle_when_consumer_drops() {
        let monitor = monitor();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        monitor.start(tx).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while monitor.is_running() {
                tokio::time::sleep(INTERVAL).await;
            }
        })
        .await
        .expect("monitor kept running without a consumer");
    }
}
