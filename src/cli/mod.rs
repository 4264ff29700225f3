//! CLI module for planopt
//!
//! Provides command-line access to optimizer decisions:
//! - optimize: candidates, costs and one selected plan
//! - entangle: two related queries resolved together
//! - sample: observed selection frequencies over many draws

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, CommonOptions};
pub use commands::{
    entangle, finish, load_config, optimize, run, run_command, sample, NoBackend,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
