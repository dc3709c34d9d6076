use crate::pipeline::Pipeline;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::time::{self, MissedTickBehavior};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Sleeping,
    Stopped,
}

#[derive(Error, Debug)]
enum TickError {
    #[error("ingestion run panicked: {0}")]
    RunFailed(String),

    #[error("scheduler failed to drive run: {0}")]
    Scheduler(String),
}

/// Drives [`Pipeline::run_once`] immediately and then every `interval` until the shutdown
/// signal reads `true`. Runs never overlap; a failed run never ends the loop.
pub struct Scheduler {
    pipeline: Arc<Mutex<Pipeline>>,
    interval: Duration,
    backoff: Duration,
    run_timeout: Duration,
    shutdown: watch::Receiver<bool>,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, shutdown: watch::Receiver<bool>) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            interval: DEFAULT_INTERVAL,
            backoff: DEFAULT_BACKOFF,
            run_timeout: DEFAULT_RUN_TIMEOUT,
            shutdown,
            state,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// A run still in flight after `run_timeout` is aborted and treated as a scheduler error.
    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// Observe state transitions from outside the loop.
    pub fn state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub async fn run(mut self) {
        tracing::info!(interval = ?self.interval, "scheduler starting");
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately.
            tokio::select! {
                biased;
                _ = stop_requested(&mut self.shutdown) => break,
                _ = ticker.tick() => {}
            }

            self.transition(SchedulerState::Running);
            match self.tick().await {
                Ok(total) => tracing::debug!(total, "tick finished"),
                Err(e @ TickError::RunFailed(_)) => {
                    tracing::error!(error = %e, "ingestion run failed");
                }
                Err(e @ TickError::Scheduler(_)) => {
                    tracing::error!(error = %e, backoff = ?self.backoff, "scheduler error, backing off");
                    self.transition(SchedulerState::Sleeping);
                    tokio::select! {
                        biased;
                        _ = stop_requested(&mut self.shutdown) => break,
                        _ = time::sleep(self.backoff) => {}
                    }
                    ticker.reset_immediately();
                }
            }
            self.transition(SchedulerState::Sleeping);
        }

        self.transition(SchedulerState::Stopped);
        tracing::info!("scheduler stopped");
    }

    async fn tick(&self) -> Result<usize, TickError> {
        let pipeline = Arc::clone(&self.pipeline);
        let mut run = tokio::spawn(async move { pipeline.lock().await.run_once().await });

        let joined = match time::timeout(self.run_timeout, &mut run).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(timeout = ?self.run_timeout, "run exceeded its timeout, aborting");
                run.abort();
                run.await
            }
        };

        match joined {
            Ok(total) => Ok(total),
            Err(e) if e.is_panic() => Err(TickError::RunFailed(panic_message(e.into_panic()))),
            Err(e) => Err(TickError::Scheduler(e.to_string())),
        }
    }

    fn transition(&self, next: SchedulerState) {
        self.state.send_replace(next);
    }
}

/// Resolves once the flag reads `true`; never resolves if the sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let signalled = shutdown.wait_for(|stop| *stop).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
