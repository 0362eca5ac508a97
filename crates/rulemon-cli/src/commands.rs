//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Rulemon: runtime traffic-rule monitor and coverage tracker
#[derive(Parser, Debug)]
#[command(name = "rulemon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the monitor over a scripted scenario or a recorded world
    ///
    /// With --scenario a built-in scripted world is used. Without it,
    /// JSON-lines world snapshots are read from --input (or stdin) against
    /// the lane graph given by --map.
    Run(RunArgs),

    /// Summarise the persisted coverage lattice
    Coverage(CoverageArgs),

    /// List built-in scenarios
    Scenarios,
}

/// Arguments for the run command
#[derive(Parser, Debug, Clone, Default)]
pub struct RunArgs {
    /// Built-in scenario to run
    #[arg(short, long)]
    pub scenario: Option<String>,

    /// Monitor configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Lane graph (JSON) for a recorded world
    #[arg(short, long)]
    pub map: Option<PathBuf>,

    /// JSON-lines snapshot file; stdin when omitted
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(short, long)]
    pub ticks: Option<u64>,

    /// Output format for the run summary
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,

    /// Exit with an error when a new bug is found
    #[arg(long)]
    pub fail_on_bug: bool,
}

/// Arguments for the coverage command
#[derive(Parser, Debug, Clone, Default)]
pub struct CoverageArgs {
    /// Monitor configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Summary output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Color output argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
