//! Rulemon CLI binary entry point

use clap::Parser;
use rulemon_cli::{handlers, init_logging, Cli, CliConfig, CliResult, Commands, Verbosity};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(config.verbosity, config.color.should_color());

    match cli.command {
        Commands::Run(args) => handlers::execute_run(&config, &args).map(|_| ()),
        Commands::Coverage(args) => handlers::execute_coverage(&config, &args).map(|_| ()),
        Commands::Scenarios => handlers::execute_scenarios(&config),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(cli.color.into())
}
