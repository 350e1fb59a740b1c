//! Fetch error types.

/// Why a single request (or the whole retry run) failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchCause {
    /// Non-2xx response.
    #[error("HTTP status {0}")]
    Status(u16),

    /// Request exceeded its timeout.
    #[error("request timeout")]
    Timeout,

    /// Connection, DNS or TLS failure.
    #[error("network error: {0}")]
    Network(String),

    /// URL could not be built or parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// robots.txt forbids the path.
    #[error("disallowed by robots.txt")]
    RobotsDisallowed,

    /// Response body could not be read or was too large.
    #[error("body error: {0}")]
    Body(String),
}

/// A failed fetch.
///
/// `retryable` is true for single-attempt failures the executor may retry,
/// and false once the executor has given up or the request must not be
/// issued at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch {url} failed after {attempts} attempt(s): {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: FetchCause,
    pub retryable: bool,
    pub attempts: u32,
}

impl FetchError {
    /// Failure of attempt `attempt`; the executor will try again.
    pub fn retryable(url: impl Into<String>, cause: FetchCause, attempt: u32) -> Self {
        Self { url: url.into(), cause, retryable: true, attempts: attempt }
    }

    /// Terminal error; the executor will not retry it.
    pub fn fatal(url: impl Into<String>, cause: FetchCause, attempts: u32) -> Self {
        Self { url: url.into(), cause, retryable: false, attempts }
    }
}

impl From<reqwest::Error> for FetchCause {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchCause::Timeout
        } else if err.is_body() || err.is_decode() {
            FetchCause::Body(err.to_string())
        } else {
            FetchCause::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FetchError::fatal("https://www.wg-gesucht.de/x", FetchCause::Status(503), 3);
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("3 attempt"));
        assert!(!err.retryable);

        assert!(FetchCause::RobotsDisallowed.to_string().contains("robots.txt"));
    }

    #[test]
    fn test_single_attempt_error_is_retryable() {
        let err = FetchError::retryable("https://www.wg-gesucht.de/x", FetchCause::Timeout, 1);
        assert!(err.retryable);
        assert_eq!(err.attempts, 1);
        assert!(err.to_string().contains("1 attempt"));
    }
}
