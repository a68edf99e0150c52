use crate::backoff::BackoffRepeater;
use crate::config::LiveConfig;
use crate::error::LiveError;
use crate::lifecycle::{JobLifecycle, JobOutcome};
use crate::client::SharedClient;
use crate::model::Job;

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval};


/// What a refresh cycle produced.
#[derive(Debug)]
pub enum RefreshEvent {
    Completed { job: Job, row_count: u64 },
    Failed { error: LiveError },
}

enum Cycle {
    Finished(JobOutcome),
    /// The query text changed while the job was being polled.
    /// `None` when the query source went away.
    Superseded(Option<String>),
    /// The refresh period ran out while the job was being polled.
    Due,
}


/// Re-runs the current query every refresh period, one job at a time.
///
/// The period counts from the start of each cycle. A cycle still polling
/// when the period runs out is abandoned, and each new job supersedes the
/// previous one, which is cancelled as soon as its successor exists. Failed
/// cycles push the next attempt out with a [`BackoffRepeater`] instead of
/// the refresh period.
pub struct RefreshScheduler {
    lifecycle: JobLifecycle,
    refresh_period: Duration,
    timeout: Option<Duration>,
    backoff: BackoffRepeater,
    current: Option<Job>,
}

impl RefreshScheduler {
    pub fn new(client: SharedClient, config: &LiveConfig) -> Self {
        Self {
            lifecycle: JobLifecycle::new(client).with_poll_interval(config.poll_interval),
            refresh_period: config.refresh_period,
            timeout: config.timeout,
            backoff: BackoffRepeater::new(config.backoff_initial, config.backoff_max),
            current: None,
        }
    }

    /// The job whose results are (or will be) current.
    pub fn current_job(&self) -> Option<&Job> {
        self.current.as_ref()
    }

    /// Drive refresh cycles until `queries` is closed or nobody listens on `events`.
    pub async fn run(
        mut self,
        mut queries: watch::Receiver<String>,
        events: mpsc::UnboundedSender<RefreshEvent>,
    ) {
        let Some(mut query) = initial_query(&mut queries).await else {
            return;
        };
        // interval panics on a zero period
        let mut ticks = tokio::time::interval(self.refresh_period.max(Duration::from_millis(1)));

        loop {
            ticks.reset();
            let outcome = match self.cycle(&query, &mut queries, &mut ticks).await {
                Cycle::Finished(outcome) => outcome,
                Cycle::Superseded(Some(next)) => {
                    tracing::debug!("Query changed, superseding the running cycle");
                    query = next;
                    continue;
                }
                Cycle::Superseded(None) => {
                    self.shutdown().await;
                    return;
                }
                Cycle::Due => {
                    tracing::debug!("Refresh period elapsed, superseding the running cycle");
                    continue;
                }
            };

            if let JobOutcome::TimedOut { .. } = outcome {
                // The lifecycle already cancelled it
                self.current = None;
            }

            let (event, backoff) = match outcome.into_result() {
                Ok((job, row_count)) => {
                    tracing::info!("Query job {} completed with {} rows", job.id, row_count);
                    self.backoff.reset();
                    (RefreshEvent::Completed { job, row_count }, None)
                }
                Err(error) => {
                    let delay = self.backoff.next_delay();
                    tracing::warn!("{}. Retrying in {:?}", error, delay);
                    (RefreshEvent::Failed { error }, Some(delay))
                }
            };
            if events.send(event).is_err() {
                return;
            }

            let next = match backoff {
                Some(delay) => tokio::select! {
                    _ = tokio::time::sleep(delay) => None,
                    next = next_query(&mut queries) => Some(next),
                },
                None => tokio::select! {
                    _ = ticks.tick() => None,
                    next = next_query(&mut queries) => Some(next),
                },
            };
            match next {
                None => {}
                Some(Some(next)) => query = next,
                Some(None) => return,
            }
        }
    }

    async fn cycle(
        &mut self,
        query: &str,
        queries: &mut watch::Receiver<String>,
        ticks: &mut Interval,
    ) -> Cycle {
        let started = Instant::now();
        // Job creation is never interrupted so that jobs are created in order
        let job = match self.lifecycle.submit(query).await {
            Ok(job) => job,
            Err(error) => return Cycle::Finished(JobOutcome::Failed(error)),
        };
        if let Some(previous) = self.current.replace(job.clone()) {
            self.cancel_in_background(previous);
        }

        tokio::select! {
            outcome = self.lifecycle.wait(&job, self.timeout, started) => Cycle::Finished(outcome),
            next = next_query(queries) => Cycle::Superseded(next),
            _ = ticks.tick() => Cycle::Due,
        }
    }

    fn cancel_in_background(&self, job: Job) {
        let lifecycle = self.lifecycle.clone();
        tokio::spawn(async move {
            // If we can't cancel the job it has probably finished already
            if let Err(error) = lifecycle.cancel(&job).await {
                tracing::debug!("{}", error);
            }
        });
    }

    /// Cancel the job that was still being polled when the query source went away.
    async fn shutdown(&mut self) {
        if let Some(job) = self.current.take() {
            tracing::debug!("Query source closed, cancelling job {}", job.id);
            if let Err(error) = self.lifecycle.cancel(&job).await {
                tracing::debug!("{}", error);
            }
        }
    }
}

async fn initial_query(queries: &mut watch::Receiver<String>) -> Option<String> {
    let query = queries.borrow_and_update().clone();
    if !query.trim().is_empty() {
        return Some(query);
    }
    next_query(queries).await
}

/// Wait for the next non-blank query text. Blank text is ignored.
async fn next_query(queries: &mut watch::Receiver<String>) -> Option<String> {
    loop {
        queries.changed().await.ok()?;
        let query = queries.borrow_and_update().clone();
        if !query.trim().is_empty() {
            return Some(query);
        }
    }
}
