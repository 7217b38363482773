//! Empathy completion backend binary.
//! Run with: cargo run --bin empathy-server

use std::process::ExitCode;

use empathy_chat::start_empathy_server;

fn main() -> ExitCode {
    start_empathy_server::run()
}
