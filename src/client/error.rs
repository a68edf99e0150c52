use serde::Deserialize;
use std::error::Error;
use std::fmt;


#[derive(Debug)]
#[non_exhaustive]
pub struct ClientError {
    pub kind: ClientErrorKind
}

impl ClientError {
    /// Build the error for a non-success response.
    ///
    /// Bodies shaped like `{"errorMessage": "..."}` are unwrapped to the
    /// message, anything else is kept as raw text.
    pub fn remote(status: u16, body: &str) -> Self {
        ClientError { kind: ClientErrorKind::Remote { status, message: unwrap_error_message(body) } }
    }

    /// Human readable message, without the kind prefix.
    pub fn message(&self) -> String {
        match &self.kind {
            ClientErrorKind::Remote { message, .. } => message.clone(),
            kind => kind.to_string(),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientError: {}", self.kind)
    }
}

impl Error for ClientError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		Some(&self.kind)
	}
}

#[derive(Debug)]
pub enum ClientErrorKind {
    Decode(serde_json::Error),
    Header(String),
    Remote { status: u16, message: String },
    Request(reqwest::Error),
    Url(url::ParseError),
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "Failed to decode response: {e}"),
            Self::Header(header) => write!(f, "Invalid header: '{header}'"),
            Self::Remote { status, message } => write!(f, "Request failed with status {status}: {message}"),
            Self::Request(e) => write!(f, "Request failed: {e}"),
            Self::Url(e) => write!(f, "Invalid URL: {e}"),
        }
    }
}

impl Error for ClientErrorKind {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			Self::Decode(source) => Some(source),
			Self::Request(source) => Some(source),
			Self::Url(source) => Some(source),
			_ => None,
		}
	}
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        ClientError { kind: ClientErrorKind::Request(error) }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        ClientError { kind: ClientErrorKind::Decode(error) }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(error: url::ParseError) -> Self {
        ClientError { kind: ClientErrorKind::Url(error) }
    }
}


#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_message: String,
}

fn unwrap_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error_message }) => error_message,
        Err(_) => body.trim().to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_bodies_are_unwrapped() {
        let error = ClientError::remote(400, r#"{"errorMessage":"Job already finished","moreInfo":""}"#);

        assert_eq!(error.message(), "Job already finished");
        assert!(matches!(error.kind, ClientErrorKind::Remote { status: 400, .. }));
    }

    #[test]
    fn raw_bodies_are_kept() {
        let cases: Vec<(&str, &str)> = vec![
            ("Service Unavailable\n", "Service Unavailable"),
            (r#"{"message":"nope"}"#, r#"{"message":"nope"}"#),
            ("", ""),
        ];

        for (body, expect) in cases {
            assert_eq!(ClientError::remote(503, body).message(), expect);
        }
    }

    #[test]
    fn client_error_display_formats_correctly() {
        let error = ClientError::remote(500, r#"{"errorMessage":"boom"}"#);
        assert_eq!(error.to_string(), "ClientError: Request failed with status 500: boom");

        let error = ClientError { kind: ClientErrorKind::Header("no-equals".into()) };
        assert!(error.to_string().contains("Invalid header"));
    }

    #[test]
    fn client_error_source_chain_works() {
        let parse = url::Url::parse("not a url").unwrap_err();
        let error: ClientError = parse.into();

        let source = error.source().unwrap();
        assert!(source.source().is_some());
    }
}
