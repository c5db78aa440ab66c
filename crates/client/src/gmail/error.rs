//! Gmail API client error types.

use std::sync::Arc;

use mailcache_core::Error;

/// Errors from the Gmail REST client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GmailError {
    /// No OAuth access token configured.
    #[error("missing access token: MAILCACHE_GMAIL_ACCESS_TOKEN not set")]
    MissingToken,

    /// Base URL could not be parsed or extended with a path.
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    /// Token rejected or lacking scope.
    #[error("authentication failed: HTTP {status}")]
    AuthError { status: u16 },

    /// Still rate limited after all retries.
    #[error("rate limited: too many requests")]
    RateLimited,

    /// Message or label does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("HTTP error: {status} - {body}")]
    HttpError { status: u16, body: String },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GmailError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { GmailError::Timeout } else { GmailError::Network(Arc::new(err)) }
    }
}

impl From<GmailError> for Error {
    fn from(err: GmailError) -> Self {
        match err {
            GmailError::MissingToken => Error::NotConfigured(err.to_string()),
            GmailError::AuthError { .. } => Error::UpstreamAuth(err.to_string()),
            GmailError::RateLimited => Error::UpstreamRateLimited(err.to_string()),
            GmailError::NotFound(what) => Error::NotFound(what),
            other => Error::Upstream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GmailError::MissingToken;
        assert!(err.to_string().contains("access token"));

        let err = GmailError::HttpError { status: 500, body: "backend".to_string() };
        assert_eq!(err.to_string(), "HTTP error: 500 - backend");
    }

    #[test]
    fn test_maps_into_core_error() {
        assert!(matches!(Error::from(GmailError::MissingToken), Error::NotConfigured(_)));
        assert!(matches!(Error::from(GmailError::AuthError { status: 401 }), Error::UpstreamAuth(_)));
        assert!(matches!(Error::from(GmailError::RateLimited), Error::UpstreamRateLimited(_)));
        assert!(matches!(Error::from(GmailError::NotFound("m1".into())), Error::NotFound(id) if id == "m1"));
        assert!(matches!(Error::from(GmailError::Timeout), Error::Upstream(_)));
    }
}
