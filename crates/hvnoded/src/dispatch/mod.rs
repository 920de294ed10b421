//! Newline-delimited JSON command dispatch.
//!
//! ## Protocol
//!
//! Clients send one JSON object per line. The `cmd` field names the operation
//! (matched case-insensitively); any other fields are its arguments:
//!
//! ```json
//! {"cmd":"import-vm","report-progress":true,"keystore-dir":"C:\\node\\keystore"}
//! ```
//!
//! The daemon answers every request with zero or more `progress` replies and
//! exactly one terminal reply (`ok`, `error` or `pong`):
//!
//! ```json
//! {"status":"progress","cmd":"import-vm","percent":40}
//! {"status":"ok","cmd":"import-vm"}
//! ```
//!
//! Malformed or unknown requests get an `error` reply and the connection keeps
//! serving. Blank lines are ignored. A line over [`MAX_REQUEST_BYTES`] is
//! answered with an error and the connection is closed.
//!
//! ## Imports
//!
//! `import-vm` is non-reentrant across the whole process. While one import
//! runs, any other `import-vm` is refused with `import already in progress`.

mod errors;
mod guard;
mod handler;
mod request;
mod response;
mod router;

pub use self::errors::DispatchError;
pub use self::guard::{ImportGuard, ImportPermit};
pub use self::handler::{DispatchConnectionHandler, MAX_REQUEST_BYTES};
pub use self::request::{Command, CommandRequest, ImportArgs, RequestRejection, SwitchArgs};
pub use self::response::ResponseEmitter;
pub use self::router::{DaemonReconciler, DispatchServices};
