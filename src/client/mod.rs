mod error;
pub mod http;

pub use self::error::{ClientError, ClientErrorKind};
pub use self::http::HttpJobClient;

use crate::model::{JobHandle, JobStatus, ResultPage};

use std::sync::Arc;


/// Shared handle the lifecycle, scheduler and view all talk through.
pub type SharedClient = Arc<dyn JobClient>;


/// The remote operations a query job service offers.
///
/// Every operation fails with a [`ClientError`] on any non-success response.
#[async_trait::async_trait]
pub trait JobClient: Send + Sync {
    /// Submit `sql` for asynchronous execution.
    async fn submit_query(&self, sql: &str) -> Result<JobHandle, ClientError>;

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, ClientError>;

    /// Request cancellation. Cancelling a job that already reached a
    /// terminal state is not an error.
    async fn cancel_job(&self, job_id: &str) -> Result<(), ClientError>;

    /// Fetch up to `limit` rows starting at `offset`.
    async fn fetch_results(
        &self,
        job_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<ResultPage, ClientError>;
}
