use crate::client::ClientError;

use std::error::Error;
use std::fmt;
use std::time::Duration;


#[derive(Debug)]
#[non_exhaustive]
pub struct LiveError {
    pub kind: LiveErrorKind
}

impl LiveError {
    pub fn new(kind: LiveErrorKind) -> Self {
        LiveError { kind }
    }
}

impl fmt::Display for LiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl Error for LiveError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		Some(&self.kind)
	}
}

#[derive(Debug)]
pub enum LiveErrorKind {
    /// A remote operation returned a non-success response.
    Transport(ClientError),
    /// The job ended in `FAILED`, with the server's reason if it gave one.
    JobFailed(Option<String>),
    /// The job ended in `CANCELED` without us asking.
    JobCancelled { job_id: String },
    TimedOut { job_id: String, timeout: Duration },
    /// Logged only.
    CancellationFailed { job_id: String, source: ClientError },
    /// A fetch returned no rows while more were expected. Logged only.
    PartialResult { job_id: String, start: usize, count: usize },
    /// The reported row count does not fit this platform's address space.
    RowCountOverflow { job_id: String, row_count: u64 },
    InvalidConfig(String),
}

impl fmt::Display for LiveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(error) => write!(f, "{}", error.message()),
            Self::JobFailed(Some(message)) => write!(f, "Query job failed: {message}"),
            Self::JobFailed(None) => write!(f, "Query job failed"),
            Self::JobCancelled { job_id } => write!(f, "Query job {job_id} was cancelled"),
            Self::TimedOut { job_id, timeout } => write!(f, "Query job {job_id} timed out after {timeout:?}"),
            Self::CancellationFailed { job_id, source } => {
                write!(f, "Query cancellation failed for job {job_id}: {}", source.message())
            }
            Self::PartialResult { job_id, start, count } => {
                write!(f, "Job {job_id} returned no rows for [{start}, {})", start + count)
            }
            Self::RowCountOverflow { job_id, row_count } => {
                write!(f, "Job {job_id} reported {row_count} rows, more than can be addressed")
            }
            Self::InvalidConfig(reason) => write!(f, "Invalid configuration: {reason}"),
        }
    }
}

impl Error for LiveErrorKind {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			Self::Transport(source) => Some(source),
			Self::CancellationFailed { source, .. } => Some(source),
			_ => None,
		}
	}
}

impl From<ClientError> for LiveError {
    fn from(error: ClientError) -> Self {
        LiveError { kind: LiveErrorKind::Transport(error) }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientErrorKind;

    #[test]
    fn live_error_display_formats_correctly() {
        let cases: Vec<(LiveErrorKind, &str)> = vec![
            (LiveErrorKind::Transport(ClientError::remote(502, r#"{"errorMessage":"bad gateway"}"#)), "bad gateway"),
            (LiveErrorKind::JobFailed(Some("Table 't' not found".into())), "Query job failed: Table 't' not found"),
            (LiveErrorKind::JobFailed(None), "Query job failed"),
            (LiveErrorKind::JobCancelled { job_id: "j1".into() }, "was cancelled"),
            (LiveErrorKind::TimedOut { job_id: "j1".into(), timeout: Duration::from_secs(5) }, "timed out after 5s"),
            (LiveErrorKind::PartialResult { job_id: "j1".into(), start: 54, count: 6 }, "no rows for [54, 60)"),
            (
                LiveErrorKind::CancellationFailed {
                    job_id: "j1".into(),
                    source: ClientError::remote(400, r#"{"errorMessage":"Job already finished"}"#),
                },
                "Query cancellation failed for job j1: Job already finished",
            ),
            (LiveErrorKind::RowCountOverflow { job_id: "j1".into(), row_count: u64::MAX }, "more than can be addressed"),
            (LiveErrorKind::InvalidConfig("page size must be positive".into()), "Invalid configuration"),
        ];

        for (kind, expect) in cases {
            let text = kind.to_string();
            assert!(
                text.contains(expect),
                "Expected `{}` in `{}`",
                expect,
                text
            );
        }
    }

    #[test]
    fn live_error_source_chain_works() {
        let kind = LiveErrorKind::CancellationFailed {
            job_id: "j1".into(),
            source: ClientError::remote(404, "Job not found"),
        };
        let source = kind.source().unwrap().to_string();
        assert!(source.contains("Job not found"));
    }

    #[test]
    fn live_error_from_client_error() {
        let error: LiveError = ClientError { kind: ClientErrorKind::Header("x".into()) }.into();
        assert!(matches!(error.kind, LiveErrorKind::Transport(_)));
    }
}
