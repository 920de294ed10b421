//! Error types for request dispatch failures.
//!
//! Every variant is rendered into an `error` reply on the connection it came
//! from. Only [`DispatchError::RequestTooLarge`] and transport failures end
//! the connection.

use std::io;

use thiserror::Error;

use hvnode_vswitch::SwitchError;

use crate::lifecycle::LifecycleError;

/// Errors surfaced during request parsing and dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Request line is not valid UTF-8 JSON.
    #[error("malformed request: {message}")]
    MalformedJson {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Request JSON parsed but does not have the expected shape.
    #[error("invalid request structure: {message}")]
    InvalidStructure { message: String },

    /// `cmd` names no known operation.
    #[error("unknown command: {command}")]
    UnknownCommand { command: String },

    /// Request line exceeds the framing limit.
    #[error("request too large: {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge { size: usize, max_size: usize },

    /// Another import holds the guard.
    #[error("import already in progress")]
    Busy,

    /// Lifecycle provider failure.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Switch reconciliation failure.
    #[error(transparent)]
    Switch(#[from] SwitchError),

    /// IO error during read or write.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Response serialization failed.
    #[error("failed to serialize response: {0}")]
    SerializeResponse(#[from] serde_json::Error),

    /// Internal error (for example a panicking provider).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DispatchError {
    /// Creates a malformed request error from a serde error.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::MalformedJson {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed request error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedJson {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Creates an unknown command error.
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }

    /// Creates a request too large error.
    pub fn request_too_large(size: usize, max_size: usize) -> Self {
        Self::RequestTooLarge { size, max_size }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
