// {
//   "command": "query",
//   "status": "success",
//   "data": {
//     "job_id": "1f6c3a2e-...",
//     "row_count": 57,
//     "offset": 0,
//     "schema": [{"name": "id", "type": {"name": "INTEGER"}}],
//     "rows": [{"id": 1}]
//   },
//   "error": null
// }
use crate::client::{ClientError, ClientErrorKind};
use crate::error::{LiveError, LiveErrorKind};
use serde::Serialize;


#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveErrorJson {
    Remote { status: u16, message: String },
    Transport { message: String },
    JobFailed { message: String },
    JobCancelled { message: String },
    TimedOut { message: String },
    CancellationFailed { message: String },
    InvalidConfig { message: String },
    Other { message: String },
}

impl From<&ClientError> for LiveErrorJson {
    fn from(e: &ClientError) -> Self {
        match &e.kind {
            ClientErrorKind::Remote { status, message } => {
                Self::Remote { status: *status, message: message.clone() }
            }
            _ => Self::Transport { message: e.message() },
        }
    }
}

impl From<&LiveError> for LiveErrorJson {
    fn from(e: &LiveError) -> Self {
        let message = format!("{e}");

        match &e.kind {
            LiveErrorKind::Transport(error) => Self::from(error),
            LiveErrorKind::JobFailed(_) => Self::JobFailed { message },
            LiveErrorKind::JobCancelled { .. } => Self::JobCancelled { message },
            LiveErrorKind::TimedOut { .. } => Self::TimedOut { message },
            LiveErrorKind::CancellationFailed { .. } => Self::CancellationFailed { message },
            LiveErrorKind::InvalidConfig(_) => Self::InvalidConfig { message },
            LiveErrorKind::PartialResult { .. } | LiveErrorKind::RowCountOverflow { .. } => {
                Self::Other { message }
            }
        }
    }
}

impl From<&anyhow::Error> for LiveErrorJson {
    fn from(e: &anyhow::Error) -> Self {
        if let Some(error) = e.downcast_ref::<LiveError>() {
            return Self::from(error);
        }
        if let Some(error) = e.downcast_ref::<ClientError>() {
            return Self::from(error);
        }
        Self::Other { message: format!("{e:#}") }
    }
}


#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveStatus {
    Success,
    Error,
}

#[derive(Debug, Serialize)]
pub struct LiveOutput<T: Serialize> {
    pub command: String,
    pub status: LiveStatus,
    pub data: Option<T>,
    pub error: Option<LiveErrorJson>,
}

impl<T: Serialize> LiveOutput<T> {
    pub fn from_result(command: String, result: anyhow::Result<T>) -> Self {
        match result {
            Ok(data) => Self { command, status: LiveStatus::Success, data: Some(data), error: None },
            Err(error) => Self {
                command,
                status: LiveStatus::Error,
                data: None,
                error: Some(LiveErrorJson::from(&error)),
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn serializes_to_expected_json() {
        let err = LiveError::new(LiveErrorKind::JobFailed(Some("Table 't' not found".into())));
        let json = LiveErrorJson::from(&err);
        let s = serde_json::to_string(&json).unwrap();
        assert_eq!(s, r#"{"type":"job_failed","message":"Query job failed: Table 't' not found"}"#);
    }

    #[test]
    fn remote_errors_keep_their_status() {
        let err: LiveError = ClientError::remote(404, r#"{"errorMessage":"Job not found"}"#).into();
        let json = serde_json::to_value(LiveErrorJson::from(&err)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "remote", "status": 404, "message": "Job not found"}));
    }

    #[test]
    fn error_output_has_no_data() {
        let result: anyhow::Result<u64> = Err::<u64, _>(LiveError::new(LiveErrorKind::JobFailed(None)))
            .context("Failed to run query");
        let output = LiveOutput::from_result("query".into(), result);

        assert_eq!(output.status, LiveStatus::Error);
        assert!(output.data.is_none());
        assert_eq!(output.error, Some(LiveErrorJson::JobFailed { message: "Query job failed".into() }));
    }

    #[test]
    fn success_output_serializes_data() {
        let output = LiveOutput::from_result("status".into(), Ok(serde_json::json!({"jobState": "RUNNING"})));
        let s = serde_json::to_string(&output).unwrap();
        assert_eq!(s, r#"{"command":"status","status":"success","data":{"jobState":"RUNNING"},"error":null}"#);
    }
}
