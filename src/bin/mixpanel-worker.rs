//! Delivery subprocess started by `WorkerSupervisor`.
//!
//! Reads one collector URL per line from stdin and requests each of them. Exits when stdin is
//! closed.
use std::process::ExitCode;

use mixpanel::{transport::relay, HttpTransport};

fn main() -> ExitCode {
    env_logger::init();

    let stdin = std::io::stdin();
    match relay(stdin.lock(), &HttpTransport::new()) {
        Ok(delivered) => {
            log::debug!(target: "mixpanel", delivered; "input closed, worker exiting");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!(target: "mixpanel", "failed to read from stdin: {}", err);
            ExitCode::FAILURE
        }
    }
}
