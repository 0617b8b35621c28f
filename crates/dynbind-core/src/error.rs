//! Error types for dynbind
//!
//! This module defines all error types used throughout the crate, and the
//! coarse [`ErrorKind`] buckets callers use to pick a response status.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for dynbind operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing input
    Validation,
    /// Hostname already claimed
    Conflict,
    /// Unknown token or hostname
    NotFound,
    /// The DNS-update agent failed
    Execution,
    /// Storage, configuration or other internal failure
    Internal,
}

/// Core error type for dynbind
#[derive(Error, Debug)]
pub enum Error {
    /// A required request field was absent or empty
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Hostname failed syntax validation
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// IP address failed syntax or version validation
    #[error("Invalid IP address: {0}")]
    InvalidIp(String),

    /// Token is not 32 hex characters
    #[error("Invalid token format")]
    InvalidToken,

    /// Operation name not recognised by the dispatcher
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// The transport could not decode the request fields
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Hostname is already bound to a token
    #[error("Hostname already taken: {0}")]
    HostnameTaken(String),

    /// No binding exists for the token
    #[error("Token not found")]
    UnknownToken,

    /// No existence marker for the hostname
    #[error("Hostname not found: {0}")]
    UnknownHostname(String),

    /// DNS-update agent did not complete successfully
    #[error("DNS update failed: {0}")]
    Execution(#[from] ExecutionFailure),

    /// Binding store errors
    #[error("Binding store error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a DNS-update agent run failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    /// The agent could not be started
    #[error("failed to start agent {program}: {reason}")]
    Spawn {
        /// Program that was invoked
        program: String,
        /// OS error text
        reason: String,
    },

    /// The agent exited with a non-zero status
    #[error("agent exited with status {code}{}", stderr_suffix(.stderr))]
    ExitCode {
        /// Exit status
        code: i32,
        /// Captured stderr, trimmed
        stderr: String,
    },

    /// The agent was terminated by a signal
    #[error("agent terminated by signal {0}")]
    Signal(i32),

    /// The agent did not finish within the configured timeout
    #[error("agent timed out after {0:?}")]
    Timeout(Duration),

    /// The script could not be delivered on the agent's stdin
    #[error("agent did not accept the script: {0}")]
    Stdin(String),

    /// Waiting on the agent failed
    #[error("failed to wait for agent: {0}")]
    Wait(String),
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl Error {
    /// Create an invalid hostname error
    pub fn invalid_hostname(msg: impl Into<String>) -> Self {
        Self::InvalidHostname(msg.into())
    }

    /// Create an invalid IP error
    pub fn invalid_ip(msg: impl Into<String>) -> Self {
        Self::InvalidIp(msg.into())
    }

    /// Create a binding store error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingField(_)
            | Error::InvalidHostname(_)
            | Error::InvalidIp(_)
            | Error::InvalidToken
            | Error::UnknownOperation(_)
            | Error::MalformedRequest(_) => ErrorKind::Validation,
            Error::HostnameTaken(_) => ErrorKind::Conflict,
            Error::UnknownToken | Error::UnknownHostname(_) => ErrorKind::NotFound,
            Error::Execution(_) => ErrorKind::Execution,
            Error::Storage(_) | Error::Config(_) | Error::Io(_) | Error::Json(_) => {
                ErrorKind::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::MissingField("token").kind(), ErrorKind::Validation);
        assert_eq!(Error::InvalidToken.kind(), ErrorKind::Validation);
        assert_eq!(
            Error::MalformedRequest("bad body".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::HostnameTaken("myhost".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(Error::UnknownToken.kind(), ErrorKind::NotFound);
        assert_eq!(
            Error::from(ExecutionFailure::Signal(9)).kind(),
            ErrorKind::Execution
        );
        assert_eq!(Error::storage("disk full").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_exit_code_message() {
        let bare = ExecutionFailure::ExitCode {
            code: 2,
            stderr: String::new(),
        };
        assert_eq!(bare.to_string(), "agent exited with status 2");

        let with_stderr = ExecutionFailure::ExitCode {
            code: 1,
            stderr: "update failed: REFUSED".into(),
        };
        assert_eq!(
            with_stderr.to_string(),
            "agent exited with status 1: update failed: REFUSED"
        );
    }
}
