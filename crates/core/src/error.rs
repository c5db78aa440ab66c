//! Unified error types for mailcache.
//!
//! A cache miss is never an error; these cover the provider boundary,
//! invalid caller input and missing configuration.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Unified error types for the mailcache crates.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty search query).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A required setting (such as the Gmail access token) is absent.
    #[error("NOT_CONFIGURED: {0}")]
    NotConfigured(String),

    /// The mail provider rejected the credentials.
    #[error("UPSTREAM_AUTH: {0}")]
    UpstreamAuth(String),

    /// The mail provider kept rate limiting after retries.
    #[error("UPSTREAM_RATE_LIMITED: {0}")]
    UpstreamRateLimited(String),

    /// The requested message or label does not exist upstream.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Any other provider failure (network, HTTP status, decoding).
    #[error("UPSTREAM_ERROR: {0}")]
    Upstream(String),
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::NotConfigured(msg) => (-32001, msg.clone()),
            Error::UpstreamAuth(msg) => (-32002, msg.clone()),
            Error::UpstreamRateLimited(msg) => (-32003, msg.clone()),
            Error::NotFound(msg) => (-32004, msg.clone()),
            Error::Upstream(msg) => (-32000, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
