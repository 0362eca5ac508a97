//! Coverage command handler

use crate::commands::CoverageArgs;
use crate::config::{load_monitor_config, CliConfig};
use crate::error::{CliError, CliResult};
use crate::output::{render_coverage_summary, OutputFormat};
use rulemon::coverage::MicroBinId;
use rulemon::rules::default_rules;
use rulemon::{CellState, CoverageSummary, CoverageTracker, CsvCoverageFile, MonitorConfig};
use serde::Serialize;

/// Cell counts for one rule's micro-bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleCoverage {
    /// Rule the column belongs to
    pub rule: MicroBinId,
    /// `COVERED` cells
    pub covered: usize,
    /// `BUG` cells
    pub bugs: usize,
    /// `UNCOVERED` cells
    pub uncovered: usize,
    /// `INVALID` cells
    pub invalid: usize,
}

#[derive(Serialize)]
struct CoverageReport {
    summary: CoverageSummary,
    rules: Vec<RuleCoverage>,
}

/// Summarise the persisted coverage file named by the monitor configuration
pub fn execute_coverage(config: &CliConfig, args: &CoverageArgs) -> CliResult<CoverageSummary> {
    let monitor_config = load_monitor_config(args.config.as_deref())?;
    let tracker = open_tracker(&monitor_config)?;
    let summary = tracker.summary();
    let rules = rule_breakdown(&tracker);

    match OutputFormat::from(args.format) {
        OutputFormat::Json => {
            let report = CoverageReport { summary, rules };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            print!("{}", render_coverage_summary(&summary, OutputFormat::Text)?);
            if !config.verbosity.is_quiet() {
                println!(
                    "{:<8} {:>8} {:>6} {:>10} {:>8}",
                    "rule", "covered", "bugs", "uncovered", "invalid"
                );
                for r in &rules {
                    println!(
                        "{:<8} {:>8} {:>6} {:>10} {:>8}",
                        r.rule.to_string(),
                        r.covered,
                        r.bugs,
                        r.uncovered,
                        r.invalid
                    );
                }
            }
        }
    }
    Ok(summary)
}

fn open_tracker(config: &MonitorConfig) -> CliResult<CoverageTracker> {
    if !config.coverage_path.exists() {
        return Err(CliError::config(format!(
            "no coverage file at {}",
            config.coverage_path.display()
        )));
    }
    let bins = default_rules(config.emergency_radius)?
        .iter()
        .map(|a| (a.id(), a.validity().cloned()))
        .collect();
    let store = Box::new(CsvCoverageFile::new(config.coverage_path.clone()));
    Ok(CoverageTracker::new(config.space()?, bins, store)?)
}

/// Per-rule cell counts, in column order
#[must_use]
pub fn rule_breakdown(tracker: &CoverageTracker) -> Vec<RuleCoverage> {
    let mut rules: Vec<RuleCoverage> = tracker
        .bins()
        .iter()
        .map(|&rule| RuleCoverage {
            rule,
            covered: 0,
            bugs: 0,
            uncovered: 0,
            invalid: 0,
        })
        .collect();
    for row in tracker.rows().values() {
        for (entry, cell) in rules.iter_mut().zip(row) {
            match cell {
                CellState::Covered => entry.covered += 1,
                CellState::Bug => entry.bugs += 1,
                CellState::Uncovered => entry.uncovered += 1,
                CellState::Invalid => entry.invalid += 1,
            }
        }
    }
    rules
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::commands::{FormatArg, RunArgs};
    use crate::config::{ColorChoice, Verbosity};
    use crate::handlers::execute_run;
    use rulemon::RuleId;
    use std::fs;
    use tempfile::TempDir;

    fn quiet() -> CliConfig {
        CliConfig::new()
            .with_verbosity(Verbosity::Quiet)
            .with_color(ColorChoice::Never)
    }

    fn config_in(dir: &TempDir) -> std::path::PathBuf {
        let config = MonitorConfig::new()
            .with_tick_interval_ms(0)
            .with_coverage_path(dir.path().join("coverage.csv"))
            .with_score_path(dir.path().join("score.csv"));
        let path = dir.path().join("monitor.yaml");
        fs::write(&path, config.to_yaml().unwrap()).unwrap();
        path
    }

    #[test]
    fn test_missing_coverage_file() {
        let dir = TempDir::new().unwrap();
        let args = CoverageArgs {
            config: Some(config_in(&dir)),
            format: FormatArg::Text,
        };
        let err = execute_coverage(&quiet(), &args).unwrap_err();
        assert!(err.to_string().contains("no coverage file"));
    }

    #[test]
    fn test_coverage_after_run() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        execute_run(
            &quiet(),
            &RunArgs {
                scenario: Some("stationary-collision".to_string()),
                config: Some(config.clone()),
                ..RunArgs::default()
            },
        )
        .unwrap();

        let args = CoverageArgs {
            config: Some(config),
            format: FormatArg::Json,
        };
        let summary = execute_coverage(&quiet(), &args).unwrap();
        assert_eq!(summary.macro_cases, 1);
        assert_eq!(summary.bugs, 2);
        assert_eq!(summary.new_macro_cases, 0);
    }

    #[test]
    fn test_rule_breakdown_counts_columns() {
        let dir = TempDir::new().unwrap();
        let config_path = config_in(&dir);
        execute_run(
            &quiet(),
            &RunArgs {
                scenario: Some("stationary-collision".to_string()),
                config: Some(config_path.clone()),
                ..RunArgs::default()
            },
        )
        .unwrap();

        let config = MonitorConfig::load(&config_path).unwrap();
        let tracker = open_tracker(&config).unwrap();
        let rules = rule_breakdown(&tracker);
        assert_eq!(rules.len(), tracker.bins().len());
        let total_bugs: usize = rules.iter().map(|r| r.bugs).sum();
        assert_eq!(total_bugs, 2);
        let collision = rules
            .iter()
            .find(|r| r.rule == RuleId::new(126, 0))
            .unwrap();
        assert_eq!(collision.bugs, 1);
    }
}
