//! Fixed-interval scheduler with jitter
//!
//! Fires the first run immediately, then sleeps `interval + uniform(0..=jitter)`
//! after each run finishes. Runs never overlap, and a panicking run is logged
//! and does not stop the loop.

use crate::cycle::IngestionCycle;
use async_trait::async_trait;
use moltwatch_common::config::SchedulerConfig;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Work driven by the [`Scheduler`]
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn run(&self);
}

#[async_trait]
impl ScheduledJob for IngestionCycle {
    fn name(&self) -> &str {
        "ingestion_cycle"
    }

    async fn run(&self) {
        IngestionCycle::run(self).await;
    }
}

/// Periodic runner for one job
pub struct Scheduler {
    job: Arc<dyn ScheduledJob>,
    interval: Duration,
    max_jitter: Duration,
}

impl Scheduler {
    pub fn new(job: Arc<dyn ScheduledJob>, interval: Duration, max_jitter: Duration) -> Self {
        Self {
            job,
            interval,
            max_jitter,
        }
    }

    pub fn from_config(job: Arc<dyn ScheduledJob>, config: &SchedulerConfig) -> Self {
        Self::new(job, config.interval(), config.max_jitter())
    }

    /// Spawn the scheduling loop
    pub fn start(self) -> SchedulerHandle {
        let token = CancellationToken::new();

        info!(
            job = self.job.name(),
            interval_secs = self.interval.as_secs(),
            max_jitter_secs = self.max_jitter.as_secs(),
            "Starting scheduler"
        );

        let task = tokio::spawn(self.run_loop(token.clone()));
        SchedulerHandle { token, task }
    }

    async fn run_loop(self, token: CancellationToken) {
        loop {
            let job = self.job.clone();
            let mut run = tokio::spawn(async move { job.run().await });

            tokio::select! {
                _ = token.cancelled() => {
                    // In-flight run finishes before the loop exits
                    if let Err(e) = run.await {
                        error!(
                            job = self.job.name(),
                            error = %e,
                            "Scheduled run panicked during shutdown"
                        );
                    }
                    break;
                }
                result = &mut run => {
                    if let Err(e) = result {
                        error!(job = self.job.name(), error = %e, "Scheduled run panicked");
                    }
                }
            }

            let delay = self.next_delay();
            debug!(
                job = self.job.name(),
                delay_ms = delay.as_millis() as u64,
                "Next run scheduled"
            );

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(job = self.job.name(), "Scheduler stopped");
    }

    fn next_delay(&self) -> Duration {
        self.interval + jitter(self.max_jitter)
    }
}

/// Uniform random delay in `0..=max`, millisecond resolution
pub fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Handle to a running scheduler
pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop scheduling and wait for the loop to exit
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Scheduler task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Job that counts runs, tracks overlap and can panic on chosen runs
    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        panic_on_first: bool,
        work: Duration,
    }

    #[async_trait]
    impl ScheduledJob for CountingJob {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self) {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            tokio::time::sleep(self.work).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            if self.panic_on_first && run == 0 {
                panic!("run failed");
            }
        }
    }

    #[test]
    fn test_jitter_bounds() {
        assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
        for _ in 0..100 {
            assert!(jitter(Duration::from_secs(5)) <= Duration::from_secs(5));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_is_immediate() {
        let job = Arc::new(CountingJob::default());
        let handle = Scheduler::new(job.clone(), Duration::from_secs(15), Duration::ZERO).start();

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_never_overlap() {
        // Each run takes longer than the interval
        let job = Arc::new(CountingJob {
            work: Duration::from_secs(20),
            ..CountingJob::default()
        });
        let handle =
            Scheduler::new(job.clone(), Duration::from_secs(5), Duration::from_secs(5)).start();

        tokio::time::sleep(Duration::from_secs(120)).await;
        handle.shutdown().await;

        assert!(job.runs.load(Ordering::SeqCst) >= 3);
        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_run_does_not_stop_the_loop() {
        let job = Arc::new(CountingJob {
            panic_on_first: true,
            ..CountingJob::default()
        });
        let handle = Scheduler::new(job.clone(), Duration::from_secs(1), Duration::ZERO).start();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(job.runs.load(Ordering::SeqCst) >= 3);
        assert!(!handle.is_finished());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_survives_a_run_panicking_in_flight() {
        let job = Arc::new(CountingJob {
            panic_on_first: true,
            work: Duration::from_secs(10),
            ..CountingJob::default()
        });
        let handle = Scheduler::new(job.clone(), Duration::from_secs(1), Duration::ZERO).start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.token.cancel();

        assert!(handle.task.await.is_ok());
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert_eq!(job.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_scheduling() {
        let job = Arc::new(CountingJob::default());
        let handle = Scheduler::new(job.clone(), Duration::from_secs(1), Duration::ZERO).start();

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.shutdown().await;
        let runs = job.runs.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), runs);
    }
}
