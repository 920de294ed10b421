//! Request deserialization for the dispatch loop.
//!
//! A request line is a JSON object whose `cmd` field selects the operation.
//! The remaining fields are the operation's arguments, named in kebab-case.
//! Unknown extra fields are ignored.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use hvnode_daemon_types::{COMMAND_FIELD, Response};

use super::errors::DispatchError;

/// Arguments of `import-vm`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImportArgs {
    /// Emit a progress reply for each percentage the import reports.
    #[serde(default)]
    pub report_progress: bool,
    /// Keystore directory handed to the import.
    #[serde(default)]
    pub keystore_dir: String,
}

/// Arguments of `switch-ensure` and `switch-repair`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SwitchArgs {
    /// Bind the switch to an ethernet adapter rather than a non-ethernet one.
    #[serde(default = "default_prefer_ethernet")]
    pub prefer_ethernet: bool,
}

impl Default for SwitchArgs {
    fn default() -> Self {
        Self {
            prefer_ethernet: default_prefer_ethernet(),
        }
    }
}

const fn default_prefer_ethernet() -> bool {
    true
}

/// Operation selected by a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report the daemon version.
    Version,
    /// Liveness probe.
    Ping,
    /// Start the virtual machine.
    StartVm,
    /// Stop the virtual machine.
    StopVm,
    /// Import the virtual machine.
    ImportVm(ImportArgs),
    /// Return the last guest key-value snapshot.
    GetKvp,
    /// Create the managed switch when it is missing.
    SwitchEnsure(SwitchArgs),
    /// Rebind the managed switch's ports.
    SwitchRepair(SwitchArgs),
    /// Remove the managed switch.
    SwitchRemove,
    /// Describe the managed switch.
    SwitchStatus,
}

/// Parsed request: the normalised command name and its typed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    name: String,
    command: Command,
}

/// A request that could not be turned into a [`Command`].
///
/// `cmd` is kept when the request got far enough to name one, so the error
/// reply can echo it.
#[derive(Debug)]
pub struct RequestRejection {
    /// Lower-cased command name, if the request carried one.
    pub cmd: Option<String>,
    /// Why the request was rejected.
    pub error: DispatchError,
}

impl RequestRejection {
    fn anonymous(error: DispatchError) -> Self {
        Self { cmd: None, error }
    }

    /// Converts the rejection into the error reply sent to the client.
    pub fn into_response(self) -> Response {
        Response::error(self.cmd, self.error.to_string())
    }
}

impl CommandRequest {
    /// Parses one request line.
    ///
    /// Trailing whitespace (including the newline delimiter) is trimmed before
    /// parsing. The command name is matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns a [`RequestRejection`] carrying
    /// [`DispatchError::MalformedJson`] for unreadable lines,
    /// [`DispatchError::InvalidStructure`] for a missing or mistyped field and
    /// [`DispatchError::UnknownCommand`] for an unsupported `cmd`.
    pub fn parse(line: &[u8]) -> Result<Self, RequestRejection> {
        let trimmed = trim_trailing_whitespace(line);
        if trimmed.is_empty() {
            return Err(RequestRejection::anonymous(DispatchError::malformed(
                "empty request line",
            )));
        }

        let value: Value = serde_json::from_slice(trimmed)
            .map_err(|error| RequestRejection::anonymous(DispatchError::from_json_error(error)))?;
        let Value::Object(fields) = value else {
            return Err(RequestRejection::anonymous(
                DispatchError::invalid_structure("request must be a JSON object"),
            ));
        };
        let name = match fields.get(COMMAND_FIELD) {
            Some(Value::String(name)) => name.trim().to_ascii_lowercase(),
            Some(_) => {
                return Err(RequestRejection::anonymous(
                    DispatchError::invalid_structure("cmd field must be a string"),
                ));
            }
            None => {
                return Err(RequestRejection::anonymous(
                    DispatchError::invalid_structure("missing cmd field"),
                ));
            }
        };

        match Command::from_fields(&name, fields) {
            Ok(command) => Ok(Self { name, command }),
            Err(error) => Err(RequestRejection {
                cmd: Some(name),
                error,
            }),
        }
    }

    /// Lower-cased command name, echoed in every reply.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Typed operation.
    pub fn command(&self) -> &Command {
        &self.command
    }
}

impl Command {
    fn from_fields(name: &str, fields: Map<String, Value>) -> Result<Self, DispatchError> {
        let command = match name {
            "version" => Self::Version,
            "ping" => Self::Ping,
            "start-vm" => Self::StartVm,
            "stop-vm" => Self::StopVm,
            "import-vm" => Self::ImportVm(arguments(name, fields)?),
            "get-kvp" => Self::GetKvp,
            "switch-ensure" => Self::SwitchEnsure(arguments(name, fields)?),
            "switch-repair" => Self::SwitchRepair(arguments(name, fields)?),
            "switch-remove" => Self::SwitchRemove,
            "switch-status" => Self::SwitchStatus,
            _ => return Err(DispatchError::unknown_command(name)),
        };
        Ok(command)
    }
}

fn arguments<T: DeserializeOwned>(name: &str, fields: Map<String, Value>) -> Result<T, DispatchError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|error| DispatchError::invalid_structure(format!("{name}: {error}")))
}

/// Trims trailing ASCII whitespace from a byte slice.
fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}
