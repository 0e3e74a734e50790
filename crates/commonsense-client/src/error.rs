//! Error types for CommonSense client operations

use thiserror::Error;

/// Result type alias for CommonSense client operations
pub type Result<T> = std::result::Result<T, SenseClientError>;

/// Errors that can occur during CommonSense client operations
#[derive(Error, Debug)]
pub enum SenseClientError {
    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Server answered with a status other than 200 or 201
    #[error("Call failed: {status_line}, {body}")]
    StatusError {
        status: u16,
        status_line: String,
        body: String,
    },

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The `Location` header of a created sensor could not be parsed
    #[error("Invalid sensor location: {0}")]
    InvalidLocation(String),

    /// Login succeeded but the response carried no session header
    #[error("Login response is missing the {0} header")]
    MissingSessionHeader(&'static str),

    /// An authenticated call was attempted without a session
    #[error("Not logged in")]
    NotAuthenticated,

    /// Invalid header value supplied by the caller
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

impl SenseClientError {
    /// Create a status error from a status code and the response body
    pub fn status_error(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        let status_line = match status.canonical_reason() {
            Some(reason) => format!("{} {}", status.as_u16(), reason),
            None => status.as_u16().to_string(),
        };
        Self::StatusError {
            status: status.as_u16(),
            status_line,
            body: body.into(),
        }
    }

    /// HTTP status code, when the server answered with a rejected status
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::StatusError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
