use crate::client::{ClientError, SharedClient};
use crate::config::DEFAULT_POLL_INTERVAL;
use crate::error::{LiveError, LiveErrorKind};
use crate::model::{Job, JobState, JobStatus};

use std::time::Duration;
use tokio::time::Instant;


/// How one job execution ended.
#[derive(Debug)]
pub enum JobOutcome {
    Completed { job: Job, row_count: u64 },
    /// The server failed the job, or a remote call failed while we were
    /// submitting or polling it.
    Failed(LiveError),
    /// The server cancelled the job.
    Cancelled { job: Job },
    /// No terminal state before the deadline. A cancellation was attempted.
    TimedOut { job: Job, timeout: Duration },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Completed jobs as `Ok`, everything else classified as a [`LiveError`].
    pub fn into_result(self) -> Result<(Job, u64), LiveError> {
        match self {
            Self::Completed { job, row_count } => Ok((job, row_count)),
            Self::Failed(error) => Err(error),
            Self::Cancelled { job } => Err(LiveError::new(LiveErrorKind::JobCancelled { job_id: job.id })),
            Self::TimedOut { job, timeout } => {
                Err(LiveError::new(LiveErrorKind::TimedOut { job_id: job.id, timeout }))
            }
        }
    }
}


/// Owns the execution of query jobs: submit, poll until terminal or
/// timed out, classify.
#[derive(Clone)]
pub struct JobLifecycle {
    client: SharedClient,
    poll_interval: Duration,
}

impl JobLifecycle {
    pub fn new(client: SharedClient) -> Self {
        Self { client, poll_interval: DEFAULT_POLL_INTERVAL }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn client(&self) -> &SharedClient {
        &self.client
    }

    /// Submit `sql` and wait for the job to finish. The timeout covers the
    /// submission too.
    pub async fn run(&self, sql: &str, timeout: Option<Duration>) -> JobOutcome {
        let started = Instant::now();
        match self.submit(sql).await {
            Ok(job) => self.wait(&job, timeout, started).await,
            Err(error) => JobOutcome::Failed(error),
        }
    }

    pub async fn submit(&self, sql: &str) -> Result<Job, LiveError> {
        let handle = self.client.submit_query(sql).await?;
        tracing::debug!("Submitted query job {}", handle.id);
        Ok(Job::new(handle.id))
    }

    /// Poll `job` until it reaches a terminal state or `timeout` has
    /// elapsed since `started`, the moment its submission began.
    pub async fn wait(&self, job: &Job, timeout: Option<Duration>, started: Instant) -> JobOutcome {
        let polled = match timeout {
            Some(timeout) => {
                let deadline = started + timeout;
                match tokio::time::timeout_at(deadline, self.poll_until_terminal(job)).await {
                    Ok(polled) => polled,
                    Err(_) => {
                        tracing::warn!("Query job {} timed out after {:?}, cancelling", job.id, timeout);
                        if let Err(error) = self.cancel(job).await {
                            tracing::warn!("{}", error);
                        }
                        return JobOutcome::TimedOut { job: job.clone(), timeout };
                    }
                }
            }
            None => self.poll_until_terminal(job).await,
        };

        match polled {
            Ok(status) => classify(job, status),
            Err(error) => JobOutcome::Failed(error.into()),
        }
    }

    /// Best-effort cancellation.
    pub async fn cancel(&self, job: &Job) -> Result<(), LiveError> {
        self.client.cancel_job(&job.id).await.map_err(|source| {
            LiveError::new(LiveErrorKind::CancellationFailed { job_id: job.id.clone(), source })
        })
    }

    /// One outstanding status request at a time.
    async fn poll_until_terminal(&self, job: &Job) -> Result<JobStatus, ClientError> {
        loop {
            let status = self.client.job_status(&job.id).await?;
            if status.state.is_terminal() {
                return Ok(status);
            }
            tracing::trace!("Query job {} is {}", job.id, status.state);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

fn classify(job: &Job, status: JobStatus) -> JobOutcome {
    match status.state {
        JobState::Completed => JobOutcome::Completed {
            job: job.clone(),
            row_count: status.row_count.unwrap_or(0),
        },
        JobState::Cancelled => JobOutcome::Cancelled { job: job.clone() },
        _ => JobOutcome::Failed(LiveError::new(LiveErrorKind::JobFailed(status.error_message))),
    }
}
