//! Failures reported by the messaging server.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for operations dispatched to the messaging server.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Why the server rejected an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorReason {
    /// The session's roles lack a required permission.
    PermissionDenied,
    /// A named entity does not exist.
    NotFound,
    /// A named entity already exists.
    AlreadyExists,
    /// A script, selector or specification could not be parsed.
    InvalidSyntax,
    /// The session was closed before the operation completed.
    SessionClosed,
    /// Any other server-side rejection.
    Rejected,
}

impl RemoteErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::InvalidSyntax => "invalid_syntax",
            Self::SessionClosed => "session_closed",
            Self::Rejected => "rejected",
        }
    }
}

/// A failure returned by the server for a single operation.
///
/// The message is reported to callers verbatim, so `Display` prints nothing
/// but the message itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    reason: RemoteErrorReason,
    message: String,
}

impl RemoteError {
    pub fn new(reason: RemoteErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorReason::PermissionDenied, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorReason::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorReason::AlreadyExists, message)
    }

    pub fn invalid_syntax(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorReason::InvalidSyntax, message)
    }

    pub fn session_closed(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorReason::SessionClosed, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorReason::Rejected, message)
    }

    pub fn reason(&self) -> RemoteErrorReason {
        self.reason
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
