use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::services::connectivity::NetworkState;

/// Precondition attached to a deferred job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Run only once a usable network transport is active.
    NetworkConnected,
}

/// Outcome a deferred job reports back to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Work is done; the job need not rerun.
    Success,
    /// Reschedule under the same constraint, with scheduler-managed backoff.
    Retry,
}

/// Entry point the scheduler invokes once a job's constraint holds.
#[async_trait]
pub trait DeferredJob: Send + Sync {
    async fn run(&self) -> JobOutcome;
}

/// Narrow scheduling seam: callers submit one-shot jobs with a constraint and
/// never see how or when they execute.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    async fn schedule(&self, constraint: Constraint) -> Result<Uuid, ScheduleError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("scheduler is not running")]
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// How often the constraint is re-checked while unsatisfied.
    pub poll_interval: Duration,
    /// First retry delay after a `Retry` outcome; doubles per retry.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(900),
        }
    }
}

struct ScheduledJob {
    id: Uuid,
    constraint: Constraint,
}

/// In-process deferred-job scheduler.
///
/// Scheduled jobs run strictly one at a time, in submission order, which is
/// the at-most-one-concurrent-execution guarantee the drain relies on. A
/// `Retry` outcome reruns the same job under the same constraint with
/// exponential backoff; duplicate submissions are harmless because the job
/// itself drains whatever it finds.
pub struct DeferredJobScheduler {
    tx: mpsc::UnboundedSender<ScheduledJob>,
}

impl DeferredJobScheduler {
    /// Spawn the scheduler loop on the current runtime.
    pub fn spawn(
        network: Arc<dyn NetworkState>,
        job: Arc<dyn DeferredJob>,
        options: SchedulerOptions,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_loop(rx, network, job, options));
        Self { tx }
    }
}

#[async_trait]
impl JobScheduler for DeferredJobScheduler {
    async fn schedule(&self, constraint: Constraint) -> Result<Uuid, ScheduleError> {
        let id = Uuid::new_v4();
        self.tx
            .send(ScheduledJob { id, constraint })
            .map_err(|_| ScheduleError::Stopped)?;
        tracing::debug!(job_id = %id, ?constraint, "deferred job submitted");
        Ok(id)
    }
}

async fn run_loop(
    mut rx: mpsc::UnboundedReceiver<ScheduledJob>,
    network: Arc<dyn NetworkState>,
    job: Arc<dyn DeferredJob>,
    options: SchedulerOptions,
) {
    while let Some(scheduled) = rx.recv().await {
        wait_for_constraint(network.as_ref(), scheduled.constraint, options.poll_interval).await;

        let mut backoff = options.initial_backoff;
        loop {
            match job.run().await {
                JobOutcome::Success => {
                    tracing::info!(job_id = %scheduled.id, "deferred job complete");
                    break;
                }
                JobOutcome::Retry => {
                    metrics::counter!("offline_drain_retries_total").increment(1);
                    tracing::warn!(
                        job_id = %scheduled.id,
                        backoff_ms = backoff.as_millis() as u64,
                        "deferred job requested retry"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(options.max_backoff);
                    wait_for_constraint(
                        network.as_ref(),
                        scheduled.constraint,
                        options.poll_interval,
                    )
                    .await;
                }
            }
        }
    }
}

async fn wait_for_constraint(network: &dyn NetworkState, constraint: Constraint, poll: Duration) {
    match constraint {
        Constraint::NetworkConnected => {
            while !network.is_network_available() {
                tokio::time::sleep(poll).await;
            }
        }
    }
}
