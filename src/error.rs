use std::time::Duration;

/// Errors surfaced by the monitoring core.
///
/// Everything except `ConfigurationInvalid` is recoverable: the polling task
/// that hit it logs the error and tries again on its next interval.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure or a non-2xx HTTP status.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// 2xx response whose envelope carries `success: false`.
    #[error("upstream rejected the request: {0}")]
    UpstreamRejected(String),

    /// Response body or embedded blob could not be decoded.
    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    /// An expected sub-resource (profile, member) is absent.
    #[error("{0} not found")]
    NotFound(String),

    /// HTTP 429 with the server-provided wait.
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),

    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigurationInvalid(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::UpstreamUnavailable(err.to_string())
        }
    }
}
