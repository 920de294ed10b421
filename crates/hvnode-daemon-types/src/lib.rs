//! Wire types exchanged between `hvnoded` and its parent process.
//!
//! Every reply is a single JSON object on its own line. The `status` field
//! discriminates the reply kind:
//!
//! ```json
//! {"status":"ok","cmd":"version","data":{"version":"0.1.0"}}
//! {"status":"error","cmd":"import-vm","error":"import already in progress"}
//! {"status":"progress","cmd":"import-vm","percent":40}
//! {"status":"pong","cmd":"ping"}
//! ```
//!
//! A command produces zero or more `progress` replies followed by exactly one
//! terminal reply (`ok`, `error` or `pong`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request field carrying the operation name.
pub const COMMAND_FIELD: &str = "cmd";

/// Reply sent by the daemon for a single command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// The command succeeded.
    Ok {
        /// Originating command name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
        /// Optional payload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    /// The command failed or could not be parsed.
    Error {
        /// Originating command name, absent when the request was unreadable.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
        /// Human-readable failure description.
        error: String,
    },
    /// Intermediate progress of a long-running command.
    Progress {
        /// Originating command name.
        cmd: String,
        /// Completion percentage in `0..=100`.
        percent: u8,
    },
    /// Reply to `ping`.
    Pong {
        /// Originating command name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },
}

impl Response {
    /// Builds a success reply.
    #[must_use]
    pub fn ok(cmd: impl Into<String>, data: Option<Value>) -> Self {
        Self::Ok {
            cmd: Some(cmd.into()),
            data,
        }
    }

    /// Builds an error reply.
    #[must_use]
    pub fn error(cmd: Option<String>, error: impl Into<String>) -> Self {
        Self::Error {
            cmd,
            error: error.into(),
        }
    }

    /// Builds a progress reply.
    #[must_use]
    pub fn progress(cmd: impl Into<String>, percent: u8) -> Self {
        Self::Progress {
            cmd: cmd.into(),
            percent,
        }
    }

    /// Builds a pong reply.
    #[must_use]
    pub fn pong(cmd: impl Into<String>) -> Self {
        Self::Pong {
            cmd: Some(cmd.into()),
        }
    }

    /// Returns `true` for replies that end a command's response stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }

    /// Returns the originating command name when one is attached.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Ok { cmd, .. } | Self::Error { cmd, .. } | Self::Pong { cmd } => cmd.as_deref(),
            Self::Progress { cmd, .. } => Some(cmd.as_str()),
        }
    }
}
