use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match hvnoded::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Telemetry may not be installed yet when launch fails early.
            let _ = writeln!(io::stderr(), "hvnoded: {error}");
            ExitCode::FAILURE
        }
    }
}
