//! Scenarios command handler

use crate::config::CliConfig;
use crate::error::CliResult;
use rulemon::Scenario;

/// List the built-in scenarios, one per line
pub fn execute_scenarios(_config: &CliConfig) -> CliResult<()> {
    for line in scenario_lines() {
        println!("{line}");
    }
    Ok(())
}

fn scenario_lines() -> Vec<String> {
    Scenario::ALL
        .iter()
        .map(|s| format!("{:<22} {}", s.name(), s.description()))
        .collect()
}
