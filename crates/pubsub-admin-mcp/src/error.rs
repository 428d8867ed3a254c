//! Error types for the admin tool server.
//!
//! # Error Hierarchy
//!
//! ```text
//! InvocationError (one tool call, never escapes a tool)
//! ├── Validation(String)
//! ├── NoSession(String)
//! ├── Timeout(Duration)
//! └── Remote(RemoteError)
//!
//! ServerError (host lifecycle)
//! ├── Transport(TransportError)
//! ├── Registry(RegistryError)
//! └── Serialization(serde_json::Error)
//!
//! ConfigError (configuration loading)
//! ```

use crate::sdk::{RemoteError, RemoteErrorReason};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for host operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Discriminant carried by every failed tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Arguments were missing or had the wrong shape.
    Validation,
    /// No session is bound under the requested id.
    NoSession,
    /// The server did not answer within the operation timeout.
    Timeout,
    /// The server answered with a failure.
    Remote,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NoSession => "no_session",
            Self::Timeout => "timeout",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single tool invocation failed.
///
/// Tools turn this into a flagged result; it is never propagated to the
/// protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("invalid arguments: {0}")]
    Validation(String),

    #[error("No active session for session id '{0}'")]
    NoSession(String),

    #[error("timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// Server-side failure; displays the server's message verbatim.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl InvocationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NoSession(_) => ErrorKind::NoSession,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Remote(_) => ErrorKind::Remote,
        }
    }

    /// The server's reason, for remote failures.
    pub fn reason(&self) -> Option<RemoteErrorReason> {
        match self {
            Self::Remote(error) => Some(error.reason()),
            _ => None,
        }
    }
}

/// Tool registration errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),
}

/// Transport-layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    Closed,

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that stop the server loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
