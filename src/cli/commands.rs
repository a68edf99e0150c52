use crate::backoff::BackoffRepeater;
use crate::cache::Viewport;
use crate::cli::ux;
use crate::client::SharedClient;
use crate::config::LiveConfig;
use crate::lifecycle::JobLifecycle;
use crate::model::{Job, ResultPage};
use crate::scheduler::RefreshScheduler;
use crate::view::{LiveView, ViewEvent};

use anyhow::Context;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::{mpsc, watch as watch_channel};


pub async fn query(
    client: SharedClient,
    sql: &str,
    offset: usize,
    limit: usize,
    timeout: Option<Duration>,
    retries: u32,
) -> anyhow::Result<Value> {
    tracing::info!("Running query...");

    let lifecycle = JobLifecycle::new(client.clone());
    let lifecycle = &lifecycle;
    let (job, row_count) = BackoffRepeater::default()
        .retry(Some(retries.saturating_add(1)), || async move {
            lifecycle.run(sql, timeout).await.into_result()
        })
        .await
        .context("Failed to run query")?;

    tracing::info!("Query job {} completed with {} rows", job.id, row_count);

    let page = if (offset as u64) < row_count {
        let available = usize::try_from(row_count - offset as u64).unwrap_or(usize::MAX);
        client
            .fetch_results(&job.id, offset, limit.min(available))
            .await
            .with_context(|| format!("Failed to fetch results of job {}", job.id))?
    } else {
        ResultPage { row_count, schema: Vec::new(), rows: Vec::new() }
    };

    ux::show_page(&job.id, row_count, offset, &page.schema, &page.rows);

    Ok(json!({
        "job_id": job.id,
        "row_count": row_count,
        "offset": offset,
        "schema": page.schema,
        "rows": page.rows,
    }))
}


pub async fn status(client: SharedClient, job_id: &str) -> anyhow::Result<Value> {
    let status = client
        .job_status(job_id)
        .await
        .with_context(|| format!("Failed to get the status of job {job_id}"))?;

    match &status.error_message {
        Some(message) => tracing::info!("Job {} is {}: {}", job_id, status.state, message),
        None => tracing::info!("Job {} is {}", job_id, status.state),
    }

    Ok(serde_json::to_value(&status)?)
}


pub async fn cancel(client: SharedClient, job_id: &str) -> anyhow::Result<Value> {
    tracing::info!("Cancelling job {}...", job_id);

    JobLifecycle::new(client).cancel(&Job::new(job_id)).await?;

    tracing::info!("Cancellation requested for job {}", job_id);
    Ok(json!({ "job_id": job_id }))
}


#[derive(Debug, Default, PartialEq, Serialize)]
pub struct WatchSummary {
    pub refreshes: usize,
    pub failures: usize,
    pub job_id: Option<String>,
    pub row_count: usize,
    pub loaded_rows: usize,
}

/// Keep `config.query` live until interrupted, or until `refreshes` cycles
/// have ended and the window of the last one has loaded.
pub async fn watch(
    client: SharedClient,
    config: LiveConfig,
    offset: usize,
    refreshes: Option<usize>,
) -> anyhow::Result<Value> {
    config.validate()?;
    tracing::info!("Watching query, refreshing every {:?}...", config.refresh_period);

    let (query_tx, query_rx) = watch_channel::channel(config.query.clone());
    let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
    let (viewport_tx, viewport_rx) = mpsc::unbounded_channel();
    let (update_tx, mut updates) = mpsc::unbounded_channel();

    let scheduler = tokio::spawn(RefreshScheduler::new(client.clone(), &config).run(query_rx, refresh_tx));
    let view = tokio::spawn(LiveView::new(client).run(refresh_rx, viewport_rx, update_tx));
    viewport_tx
        .send(Viewport::new(offset, config.page_size))
        .context("Live view stopped before it started")?;

    let mut summary = WatchSummary::default();
    let mut window_pending = false;
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break };
                ux::show_view_event(&update);

                match update {
                    ViewEvent::Reset { job_id, row_count } => {
                        summary.refreshes += 1;
                        summary.job_id = Some(job_id);
                        summary.row_count = row_count;
                        summary.loaded_rows = 0;
                        window_pending = offset < row_count;
                    }
                    ViewEvent::Rows { rows, .. } => {
                        summary.loaded_rows += rows.len();
                        window_pending = false;
                    }
                    ViewEvent::Failed { .. } => {
                        summary.refreshes += 1;
                        summary.failures += 1;
                    }
                }

                if refreshes.is_some_and(|limit| summary.refreshes >= limit) && !window_pending {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                break;
            }
        }
    }

    // Closing the sources stops both tasks; a job still running is cancelled
    drop(query_tx);
    drop(viewport_tx);
    let (scheduled, viewed) = tokio::join!(scheduler, view);
    for result in [scheduled, viewed] {
        if let Err(error) = result {
            tracing::warn!("Live view task ended abnormally: {}", error);
        }
    }

    Ok(serde_json::to_value(&summary)?)
}
