//! Rulemon CLI library
//!
//! Argument parsing, configuration, logging setup and command handlers for
//! the `rulemon` binary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod output;

pub use commands::{Cli, ColorArg, Commands, CoverageArgs, FormatArg, RunArgs};
pub use config::{load_monitor_config, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use logging::init_logging;
pub use output::{OutputFormat, ProgressReporter};
