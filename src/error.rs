// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `hubsocket` library.
//!
//! Failures are grouped by where they originate: client configuration,
//! the transport, frame decoding, the authentication handshake, individual
//! commands, and filter comparisons.

use thiserror::Error;

use crate::compare::{Comparison, OperandKind};

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The client was configured incorrectly.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurred on the transport.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A frame could not be decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The authentication handshake failed.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// A command did not complete successfully.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// A listener pattern did not compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// No connection is currently established.
    #[error("client is not connected")]
    NotConnected,

    /// `run` was called while the client was already running.
    #[error("client is already running")]
    AlreadyRunning,

    /// The client was closed and cannot be restarted.
    #[error("client is closed")]
    Closed,
}

impl Error {
    /// Returns true if this error means the server refused the credentials.
    #[must_use]
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, Self::Auth(AuthError::Invalid(_)))
    }

    /// Returns true if this error is a command timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Command(CommandError::Timeout { .. }))
    }
}

/// Errors detected while building a client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No host was provided.
    #[error("home assistant host is required")]
    MissingHost,

    /// No access token was provided.
    #[error("access token is required")]
    MissingToken,

    /// The host could not be turned into a websocket URL.
    #[error("invalid host {host}: {message}")]
    InvalidHost {
        /// The host as given.
        host: String,
        /// Why it was rejected.
        message: String,
    },

    /// A numeric setting is out of its allowed range.
    #[error("{setting} must be at least {min}")]
    OutOfRange {
        /// Name of the setting.
        setting: &'static str,
        /// Smallest accepted value.
        min: u64,
    },
}

/// Errors related to the socket transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Dialing the hub failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Reading from or writing to the socket failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The socket was closed.
    #[error("connection closed")]
    Closed,

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// The server sent a frame that does not fit the current phase.
    #[error("unexpected {received} message, expected {expected}")]
    UnexpectedMessage {
        /// The message type that was expected.
        expected: &'static str,
        /// The message type that was received.
        received: String,
    },
}

/// Errors related to decoding frames and payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A version string could not be understood.
    #[error("invalid version {0:?}, expected major.minor.patch")]
    InvalidVersion(String),

    /// An entity ID is not of the form `domain.name`.
    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),
}

/// Errors from the authentication phase.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The server explicitly rejected the credentials.
    #[error("credentials rejected: {0}")]
    Invalid(String),

    /// Neither `auth_ok` nor `auth_invalid` was received in time.
    #[error("failed to authenticate after {attempts} attempts")]
    AttemptsExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The server runs an older protocol than supported.
    #[error("home assistant {found} is older than the minimum supported {minimum}")]
    UnsupportedVersion {
        /// Version the server advertised.
        found: String,
        /// Minimum version this client accepts.
        minimum: String,
    },

    /// The greeting did not carry a version.
    #[error("server greeting did not include a version")]
    MissingVersion,
}

/// Errors returned to the caller of a command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The server answered with `success: false`.
    #[error("command failed: error code: {code}, message: {message}")]
    Server {
        /// Server-supplied error code.
        code: String,
        /// Server-supplied error message.
        message: String,
    },

    /// No reply arrived before the deadline.
    #[error("response timeout for request {id} after {timeout_ms} ms")]
    Timeout {
        /// The request ID.
        id: u64,
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// The connection was reset or closed while the request was outstanding.
    #[error("connection reset while waiting for request {id}")]
    ConnectionReset {
        /// The request ID.
        id: u64,
    },
}

/// Errors from converting a raw state value into a typed value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The text is not a value of the requested type.
    #[error("{value:?} is not convertible to {target}")]
    NotConvertible {
        /// The raw text.
        value: String,
        /// Name of the requested type.
        target: &'static str,
    },
}

/// Errors from evaluating a filter condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompareError {
    /// The observed value could not be coerced to the operand's type.
    #[error(transparent)]
    Coercion(#[from] ValueError),

    /// The comparison is not defined for the operand's type.
    #[error("{comparison} is not supported for {operand} operands")]
    UnsupportedComparison {
        /// The requested comparison.
        comparison: Comparison,
        /// The kind of operand it was applied to.
        operand: OperandKind,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_display() {
        let err = CommandError::Server {
            code: "not_found".to_string(),
            message: "Service not found.".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "command failed: error code: not_found, message: Service not found."
        );
    }

    #[test]
    fn timeout_is_distinct_from_server_failure() {
        let timeout: Error = CommandError::Timeout {
            id: 7,
            timeout_ms: 10_000,
        }
        .into();
        let server: Error = CommandError::Server {
            code: "x".to_string(),
            message: "y".to_string(),
        }
        .into();

        assert!(timeout.is_timeout());
        assert!(!server.is_timeout());
    }

    #[test]
    fn auth_rejection_is_detected() {
        let err: Error = AuthError::Invalid("Invalid access token".to_string()).into();
        assert!(err.is_auth_rejected());
        assert_eq!(
            err.to_string(),
            "authentication error: credentials rejected: Invalid access token"
        );
    }

    #[test]
    fn value_error_display() {
        let err = ValueError::NotConvertible {
            value: "abc".to_string(),
            target: "integer",
        };
        assert_eq!(err.to_string(), "\"abc\" is not convertible to integer");
    }

    #[test]
    fn compare_error_from_value_error() {
        let err: CompareError = ValueError::NotConvertible {
            value: "x".to_string(),
            target: "float",
        }
        .into();
        assert!(matches!(err, CompareError::Coercion(_)));
    }
}
