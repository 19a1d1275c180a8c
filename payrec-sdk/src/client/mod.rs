//! HTTP clients for external APIs.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

mod payout;

pub use payout::PayoutClient;

use reqwest::StatusCode;

/// Errors produced by the SDK HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Whether the request may have reached the server and been acted on.
    ///
    /// A 4xx answer means the request was refused and a connect failure means
    /// nothing was sent. Timeouts, dropped connections, 5xx answers and
    /// undecodable 2xx bodies leave the outcome unknown.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            ClientError::Http(e) => !(e.is_builder() || e.is_connect()),
            ClientError::Api { status, .. } => status.is_server_error(),
            ClientError::Json(_) => true,
            ClientError::Url(_) => false,
        }
    }
}
