//! Response serialization for the dispatch loop.

use std::io::Write;

use hvnode_daemon_types::Response;

use super::errors::DispatchError;

/// Writes replies as newline-delimited JSON.
///
/// Every reply is flushed as soon as it is written so progress reaches the
/// client while the command is still running.
pub struct ResponseEmitter<W> {
    writer: W,
}

impl<W: Write> ResponseEmitter<W> {
    /// Wraps the output half of a connection.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes one reply and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, writing or flushing fails.
    pub fn emit(&mut self, response: &Response) -> Result<(), DispatchError> {
        serde_json::to_writer(&mut self.writer, response)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes a progress reply for `cmd`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn progress(&mut self, cmd: &str, percent: u8) -> Result<(), DispatchError> {
        self.emit(&Response::progress(cmd, percent))
    }

    /// Writes an error reply describing `error`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn error(&mut self, cmd: Option<&str>, error: &DispatchError) -> Result<(), DispatchError> {
        self.emit(&Response::error(cmd.map(str::to_owned), error.to_string()))
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn written(emitter: ResponseEmitter<Vec<u8>>) -> String {
        String::from_utf8(emitter.into_inner()).expect("valid utf8")
    }

    #[test]
    fn writes_one_line_per_reply() {
        let mut emitter = ResponseEmitter::new(Vec::new());
        emitter
            .emit(&Response::ok("version", Some(json!({"version": "0.1.0"}))))
            .expect("emit ok");
        emitter.emit(&Response::pong("ping")).expect("emit pong");

        assert_eq!(
            written(emitter),
            concat!(
                r#"{"status":"ok","cmd":"version","data":{"version":"0.1.0"}}"#,
                "\n",
                r#"{"status":"pong","cmd":"ping"}"#,
                "\n",
            )
        );
    }

    #[test]
    fn progress_carries_the_percentage() {
        let mut emitter = ResponseEmitter::new(Vec::new());
        emitter.progress("import-vm", 40).expect("emit progress");
        assert_eq!(
            written(emitter),
            "{\"status\":\"progress\",\"cmd\":\"import-vm\",\"percent\":40}\n"
        );
    }

    #[test]
    fn error_without_command_omits_cmd() {
        let mut emitter = ResponseEmitter::new(Vec::new());
        emitter
            .error(None, &DispatchError::malformed("empty request line"))
            .expect("emit error");
        assert_eq!(
            written(emitter),
            "{\"status\":\"error\",\"error\":\"malformed request: empty request line\"}\n"
        );
    }
}
