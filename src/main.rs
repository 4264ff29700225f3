//! planopt CLI entry point
//!
//! Parses arguments and dispatches to the command. All logic, including
//! error reporting, lives in the `cli` module.

use std::process::ExitCode;

use planopt::cli;

fn main() -> ExitCode {
    cli::run()
}
