//! Failure shape reported by executors, and its classification.
//!
//! Executors never decide retry themselves; they only describe what went
//! wrong. The governor maps that shape onto an [`ErrorKind`] and the kind
//! alone decides whether another attempt is allowed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What an executor observed when a request did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "cause", content = "status", rename_all = "snake_case")]
pub enum FailureCause {
    /// A response arrived with this (non-success) status code.
    Status(u16),

    /// No response was received (connection refused, reset, DNS, ...).
    NoResponse,

    /// The executor's own deadline elapsed before a response arrived.
    TimedOut,

    /// The caller aborted the request. Never retried.
    Aborted,

    /// Anything the executor could not describe more precisely.
    Other,
}

/// A failed attempt as reported by an executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub cause: FailureCause,
    pub message: String,
}

impl Failure {
    pub fn new(cause: FailureCause, message: impl Into<String>) -> Self {
        Self {
            cause,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::new(FailureCause::Status(status), message)
    }

    pub fn no_response(message: impl Into<String>) -> Self {
        Self::new(FailureCause::NoResponse, message)
    }

    pub fn timed_out(message: impl Into<String>) -> Self {
        Self::new(FailureCause::TimedOut, message)
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::new(FailureCause::Aborted, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureCause::Other, message)
    }

    /// HTTP status code, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self.cause {
            FailureCause::Status(code) => Some(code),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        classify(self)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cause {
            FailureCause::Status(code) => write!(f, "status {code}: {}", self.message),
            FailureCause::NoResponse => write!(f, "no response: {}", self.message),
            FailureCause::TimedOut => write!(f, "timed out: {}", self.message),
            FailureCause::Aborted => write!(f, "aborted: {}", self.message),
            FailureCause::Other => f.write_str(&self.message),
        }
    }
}

/// Operational classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 401 / 403. Retrying cannot change an auth decision.
    Auth,
    /// Other 4xx. The request itself is wrong.
    Client,
    /// 5xx. Retryable.
    Server,
    /// No response or executor timeout. Retryable.
    Network,
    /// Unknown shape, including caller aborts. Not retryable.
    Unknown,
    /// Synthesized by `clear()`.
    Cancelled,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Server | ErrorKind::Network)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Client => "client",
            ErrorKind::Server => "server",
            ErrorKind::Network => "network",
            ErrorKind::Unknown => "unknown",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Map a failure shape onto its kind.
///
/// Pure function of the shape: the attempt number never matters.
pub fn classify(failure: &Failure) -> ErrorKind {
    match failure.cause {
        FailureCause::Status(401 | 403) => ErrorKind::Auth,
        FailureCause::Status(400..=499) => ErrorKind::Client,
        FailureCause::Status(500..) => ErrorKind::Server,
        FailureCause::Status(_) => ErrorKind::Unknown,
        FailureCause::NoResponse | FailureCause::TimedOut => ErrorKind::Network,
        FailureCause::Aborted | FailureCause::Other => ErrorKind::Unknown,
    }
}
