use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{ErrorKind, Failure};

/// Final outcome of a request that did not succeed.
///
/// Every submitted request resolves exactly once, either with its response
/// or with one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernorError {
    #[error("authentication/authorization failed: {0}")]
    Auth(Failure),

    #[error("client error: {0}")]
    Client(Failure),

    #[error("server error: {0}")]
    Server(Failure),

    #[error("network error: {0}")]
    Network(Failure),

    #[error("request failed: {0}")]
    Unknown(Failure),

    #[error("request cancelled before it started")]
    Cancelled,
}

impl GovernorError {
    /// Wrap a terminal failure according to its classification.
    pub fn from_failure(failure: Failure) -> Self {
        match failure.kind() {
            ErrorKind::Auth => GovernorError::Auth(failure),
            ErrorKind::Client => GovernorError::Client(failure),
            ErrorKind::Server => GovernorError::Server(failure),
            ErrorKind::Network => GovernorError::Network(failure),
            ErrorKind::Unknown | ErrorKind::Cancelled => GovernorError::Unknown(failure),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernorError::Auth(_) => ErrorKind::Auth,
            GovernorError::Client(_) => ErrorKind::Client,
            GovernorError::Server(_) => ErrorKind::Server,
            GovernorError::Network(_) => ErrorKind::Network,
            GovernorError::Unknown(_) => ErrorKind::Unknown,
            GovernorError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// The executor-reported failure, if this error came from one.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            GovernorError::Auth(f)
            | GovernorError::Client(f)
            | GovernorError::Server(f)
            | GovernorError::Network(f)
            | GovernorError::Unknown(f) => Some(f),
            GovernorError::Cancelled => None,
        }
    }

    /// HTTP status of the last response, if one was received.
    pub fn status(&self) -> Option<u16> {
        self.failure().and_then(Failure::status_code)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GovernorError::Cancelled)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_failure_by_kind() {
        let err = GovernorError::from_failure(Failure::status(403, "forbidden"));
        assert!(matches!(err, GovernorError::Auth(_)));
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(err.status(), Some(403));

        let err = GovernorError::from_failure(Failure::timed_out("deadline"));
        assert!(matches!(err, GovernorError::Network(_)));
        assert_eq!(err.status(), None);

        let err = GovernorError::from_failure(Failure::aborted("user navigated away"));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn error_display() {
        let err = GovernorError::from_failure(Failure::status(503, "unavailable"));
        assert_eq!(err.to_string(), "server error: status 503: unavailable");
        assert_eq!(
            GovernorError::Cancelled.to_string(),
            "request cancelled before it started"
        );
    }

    #[test]
    fn cancelled_has_no_failure() {
        assert!(GovernorError::Cancelled.failure().is_none());
        assert!(GovernorError::Cancelled.is_cancelled());
        assert_eq!(GovernorError::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
