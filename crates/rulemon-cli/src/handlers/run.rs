//! Run command handler

use crate::commands::RunArgs;
use crate::config::{load_monitor_config, CliConfig};
use crate::error::{CliError, CliResult};
use crate::output::{render_run_summary, ProgressReporter};
use rulemon::{JsonLinesWorld, LaneGraph, Monitor, MonitorConfig, RunSummary, Scenario, WorldSource};
use std::fs::{self, File};
use std::io::{self, BufReader};
use tracing::info;

/// Monitor a scripted scenario or a recorded world and print the summary
pub fn execute_run(config: &CliConfig, args: &RunArgs) -> CliResult<RunSummary> {
    let mut monitor_config = load_monitor_config(args.config.as_deref())?;
    if args.ticks.is_some() {
        monitor_config = monitor_config.with_max_ticks(args.ticks);
    }
    let use_color = config.color.should_color();
    let mut reporter = ProgressReporter::new(use_color, config.verbosity.is_quiet());

    let summary = if let Some(name) = &args.scenario {
        let scenario: Scenario = name.parse()?;
        let world = scenario.world(&monitor_config.ego_role)?;
        let frames = world.remaining() as u64;
        let total = monitor_config.max_ticks.map_or(frames, |max| max.min(frames));
        info!(scenario = scenario.name(), frames, "running scenario");
        reporter.start_progress(total, scenario.name());
        monitor(world, monitor_config, &reporter)?
    } else {
        let map_path = args
            .map
            .as_deref()
            .ok_or_else(|| CliError::invalid_argument("--map is required without --scenario"))?;
        let map = LaneGraph::from_json(&fs::read_to_string(map_path)?)?;
        match &args.input {
            Some(path) => {
                let reader = BufReader::new(File::open(path)?);
                monitor(JsonLinesWorld::new(reader, map), monitor_config, &reporter)?
            }
            None => monitor(
                JsonLinesWorld::new(io::stdin().lock(), map),
                monitor_config,
                &reporter,
            )?,
        }
    };

    println!("{}", render_run_summary(&summary, args.format.into(), use_color)?);
    if args.fail_on_bug && summary.bugs_found > 0 {
        return Err(CliError::run(format!("{} bug(s) found", summary.bugs_found)));
    }
    Ok(summary)
}

fn monitor<W: WorldSource>(
    world: W,
    config: MonitorConfig,
    reporter: &ProgressReporter,
) -> CliResult<RunSummary> {
    let mut monitor = Monitor::new(world, config)?;
    let summary = monitor.run_with(|report| {
        reporter.increment(1);
        for rule in &report.bugs_found {
            reporter.bug(&format!("frame {}: rule {rule} violated", report.frame));
        }
        for rule in &report.unfair_tests {
            reporter.unfair(&format!(
                "frame {}: rule {rule} violated outside its precondition",
                report.frame
            ));
        }
    });
    reporter.finish();
    Ok(summary?)
}
