use crate::cache::{FetchRequest, ResultApplication, VirtualRowCache, Viewport};
use crate::client::{ClientError, SharedClient};
use crate::error::{LiveError, LiveErrorKind};
use crate::model::{ResultPage, Row};
use crate::scheduler::RefreshEvent;

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;


type FetchResponse = (FetchRequest, Result<ResultPage, ClientError>);


/// What the consumer of a live view gets to see.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent {
    /// A new job completed; all previously delivered rows are gone.
    Reset { job_id: String, row_count: usize },
    Rows { start: usize, rows: Vec<Row> },
    /// A refresh cycle failed. The rows of the previous job stay valid.
    Failed { message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchCompletion {
    Applied { start: usize, count: usize },
    Stale,
    Failed,
}


/// Keeps a [`VirtualRowCache`] in step with refresh results and viewport
/// changes.
///
/// Fetches run concurrently, but their results are applied one at a time by
/// whoever drives the view, so the cache only ever has one writer.
pub struct LiveView {
    client: SharedClient,
    cache: VirtualRowCache,
    in_flight: FuturesUnordered<BoxFuture<'static, FetchResponse>>,
}

impl LiveView {
    pub fn new(client: SharedClient) -> Self {
        Self {
            client,
            cache: VirtualRowCache::new(),
            in_flight: FuturesUnordered::new(),
        }
    }

    pub fn cache(&self) -> &VirtualRowCache {
        &self.cache
    }

    /// Number of fetches not yet applied.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// React to a refresh cycle. A completed job replaces the cache and
    /// reloads the current viewport.
    pub fn apply_refresh(&mut self, event: RefreshEvent) -> ViewEvent {
        match event {
            RefreshEvent::Completed { job, row_count } => {
                // We're using virtual paging so need to know the total number of rows
                let Ok(row_count) = usize::try_from(row_count) else {
                    let error = LiveError::new(LiveErrorKind::RowCountOverflow { job_id: job.id, row_count });
                    tracing::warn!("{}", error);
                    return ViewEvent::Failed { message: error.to_string() };
                };
                self.cache.reset(&job, row_count);
                for request in self.cache.refresh_viewport() {
                    self.issue(request);
                }
                ViewEvent::Reset { job_id: job.id, row_count }
            }
            RefreshEvent::Failed { error } => ViewEvent::Failed { message: error.to_string() },
        }
    }

    /// Returns the number of fetches issued.
    pub fn set_viewport(&mut self, viewport: Viewport) -> usize {
        let requests = self.cache.set_viewport(viewport.offset, viewport.page_size);
        let issued = requests.len();
        for request in requests {
            self.issue(request);
        }
        issued
    }

    /// Wait for the next fetch and apply it. `None` when nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<FetchCompletion> {
        let (request, result) = self.in_flight.next().await?;
        Some(self.complete(request, result))
    }

    /// Serve refresh results and viewport changes until the viewport source
    /// closes or `updates` has no receiver.
    pub async fn run(
        mut self,
        mut refresh: mpsc::UnboundedReceiver<RefreshEvent>,
        mut viewports: mpsc::UnboundedReceiver<Viewport>,
        updates: mpsc::UnboundedSender<ViewEvent>,
    ) {
        let mut refresh_open = true;
        loop {
            tokio::select! {
                Some((request, result)) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    if let FetchCompletion::Applied { start, count } = self.complete(request, result) {
                        if count == 0 {
                            continue;
                        }
                        let rows = self.cache.rows(start..start + count);
                        if updates.send(ViewEvent::Rows { start, rows }).is_err() {
                            return;
                        }
                    }
                }
                event = refresh.recv(), if refresh_open => match event {
                    Some(event) => {
                        if updates.send(self.apply_refresh(event)).is_err() {
                            return;
                        }
                    }
                    None => refresh_open = false,
                },
                viewport = viewports.recv() => match viewport {
                    Some(viewport) => {
                        self.set_viewport(viewport);
                    }
                    None => return,
                },
            }
        }
    }

    fn issue(&mut self, request: FetchRequest) {
        let client = self.client.clone();
        self.in_flight.push(Box::pin(async move {
            let result = client.fetch_results(&request.job_id, request.start, request.count).await;
            (request, result)
        }));
    }

    fn complete(&mut self, request: FetchRequest, result: Result<ResultPage, ClientError>) -> FetchCompletion {
        match result {
            Ok(page) => match self.cache.on_result(&request, page.rows) {
                ResultApplication::Applied { start, count, backfill } => {
                    if let Some(backfill) = backfill {
                        self.issue(backfill);
                    }
                    FetchCompletion::Applied { start, count }
                }
                ResultApplication::Stale => FetchCompletion::Stale,
            },
            Err(error) => {
                if self.cache.on_error(&request, &error) {
                    FetchCompletion::Failed
                } else {
                    FetchCompletion::Stale
                }
            }
        }
    }
}
