//! Connection handler that dispatches newline-delimited JSON commands.
//!
//! A connection carries any number of requests. They are served strictly in
//! order and each one yields exactly one terminal reply, so a client may
//! pipeline requests and match replies by position.

use std::io::{self, BufRead, BufReader, Write};

use tracing::{debug, warn};

use hvnode_daemon_types::Response;

use crate::transport::{ConnectionHandler, ConnectionStream};

use super::errors::DispatchError;
use super::request::CommandRequest;
use super::response::ResponseEmitter;
use super::router::{CommandRouter, DISPATCH_TARGET, DispatchServices};

/// Maximum size of a single request line in bytes, delimiter included.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Input discarded after an oversized request before the connection closes.
const DRAIN_LIMIT_BYTES: usize = 16 * MAX_REQUEST_BYTES;

/// Connection handler that parses and dispatches commands until the peer
/// disconnects.
pub struct DispatchConnectionHandler {
    router: CommandRouter,
}

impl DispatchConnectionHandler {
    /// Creates a handler over the shared services.
    #[must_use]
    pub fn new(services: DispatchServices) -> Self {
        Self {
            router: CommandRouter::new(services),
        }
    }

    fn dispatch(&self, stream: ConnectionStream) {
        let writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "failed to split connection");
                return;
            }
        };
        let mut reader = BufReader::new(stream);
        let mut emitter = ResponseEmitter::new(writer);
        self.serve(&mut reader, &mut emitter);
    }

    /// Serves requests from `reader` until end of input or a fatal error.
    pub(crate) fn serve<R: BufRead, W: Write>(
        &self,
        reader: &mut R,
        emitter: &mut ResponseEmitter<W>,
    ) {
        loop {
            let line = match read_request_line(reader) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(target: DISPATCH_TARGET, "client disconnected");
                    return;
                }
                Err(error) => {
                    warn!(target: DISPATCH_TARGET, %error, "failed to read request");
                    if matches!(error, DispatchError::RequestTooLarge { .. }) {
                        let _ = emitter.error(None, &error);
                        // Unread input would turn the close into a reset and
                        // lose the error reply.
                        drain_input(reader, DRAIN_LIMIT_BYTES);
                    }
                    return;
                }
            };

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let response = self.respond(&line, emitter);
            if let Err(error) = emitter.emit(&response) {
                warn!(target: DISPATCH_TARGET, %error, "failed to write response");
                return;
            }
        }
    }

    fn respond<W: Write>(&self, line: &[u8], emitter: &mut ResponseEmitter<W>) -> Response {
        let request = match CommandRequest::parse(line) {
            Ok(request) => request,
            Err(rejection) => {
                warn!(
                    target: DISPATCH_TARGET,
                    cmd = rejection.cmd.as_deref(),
                    error = %rejection.error,
                    "rejected request"
                );
                return rejection.into_response();
            }
        };

        match self.router.route(&request, emitter) {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    cmd = request.name(),
                    %error,
                    "command failed"
                );
                Response::error(Some(request.name().to_owned()), error.to_string())
            }
        }
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.dispatch(stream);
    }
}

/// Reads one bounded request line.
///
/// Returns `Ok(None)` at end of input with nothing buffered. A final line
/// without a delimiter is returned as is.
fn read_request_line<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>, DispatchError> {
    let mut line = Vec::new();
    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        };
        if available.is_empty() {
            return Ok((!line.is_empty()).then_some(line));
        }

        let (consumed, complete) = match available.iter().position(|b| *b == b'\n') {
            Some(newline) => (newline + 1, true),
            None => (available.len(), false),
        };
        line.extend_from_slice(&available[..consumed]);
        reader.consume(consumed);
        enforce_limit(line.len())?;
        if complete {
            return Ok(Some(line));
        }
    }
}

/// Discards input until end of stream, a read error or `limit` bytes.
fn drain_input<R: BufRead>(reader: &mut R, limit: usize) {
    let mut drained = 0;
    while drained < limit {
        let available = match reader.fill_buf() {
            Ok([]) | Err(_) => return,
            Ok(available) => available.len(),
        };
        reader.consume(available);
        drained += available;
    }
}

/// Enforces the maximum request size limit.
fn enforce_limit(size: usize) -> Result<(), DispatchError> {
    if size > MAX_REQUEST_BYTES {
        return Err(DispatchError::request_too_large(size, MAX_REQUEST_BYTES));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;
    use crate::tests::support::{ScriptedLifecycle, dispatch_services};

    fn run(input: impl Into<Vec<u8>>) -> Vec<serde_json::Value> {
        let handler = DispatchConnectionHandler::new(dispatch_services(ScriptedLifecycle::new()));
        let mut reader = Cursor::new(input.into());
        let mut emitter = ResponseEmitter::new(Vec::new());
        handler.serve(&mut reader, &mut emitter);
        String::from_utf8(emitter.into_inner())
            .expect("utf8 output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("reply is JSON"))
            .collect()
    }

    #[test]
    fn answers_each_request_in_order() {
        let replies = run("{\"cmd\":\"ping\"}\n{\"cmd\":\"version\"}\n");
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["status"], "pong");
        assert_eq!(replies[1]["status"], "ok");
        assert_eq!(replies[1]["data"]["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn skips_blank_lines() {
        let replies = run("\n   \r\n{\"cmd\":\"ping\"}\n\n");
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["status"], "pong");
    }

    #[rstest]
    #[case("garbage\n")]
    #[case("{\"cmd\":\"reboot\"}\n")]
    #[case("[1,2]\n")]
    fn keeps_serving_after_a_bad_request(#[case] bad: &str) {
        let replies = run(format!("{bad}{{\"cmd\":\"ping\"}}\n"));
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["status"], "error");
        assert_eq!(replies[1]["status"], "pong");
    }

    #[test]
    fn serves_a_final_line_without_delimiter() {
        let replies = run("{\"cmd\":\"ping\"}");
        assert_eq!(replies.len(), 1);
    }

    #[test]
    fn oversized_line_is_rejected_and_closes_the_connection() {
        let mut input = vec![b'x'; MAX_REQUEST_BYTES + 1];
        input.extend_from_slice(b"\n{\"cmd\":\"ping\"}\n");
        let replies = run(input);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["status"], "error");
        assert!(replies[0].get("cmd").is_none());
        assert!(
            replies[0]["error"]
                .as_str()
                .is_some_and(|error| error.contains("request too large"))
        );
    }

    #[test]
    fn line_at_the_limit_is_accepted() {
        let request = b"{\"cmd\":\"ping\"}";
        let mut input = request.to_vec();
        input.resize(MAX_REQUEST_BYTES - 1, b' ');
        input.push(b'\n');
        let replies = run(input);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["status"], "pong");
    }
}
