//! Powerscope CLI library.
//!
//! Configuration loading, script replay, the interactive REPL and output
//! formatting for the `powerscope` binary.

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod repl;
pub mod script;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
pub use output::Formatter;
pub use script::{replay, Script, Step};
