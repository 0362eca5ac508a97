//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use rulemon::{CoverageSummary, RunSummary};
use std::fmt::Write as _;

/// Summary output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

/// Progress and finding messages on stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Use colored output
    pub use_color: bool,
    /// Suppress everything except failures
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a tick progress bar
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Advance the progress bar
    pub fn increment(&self, delta: u64) {
        if let Some(ref pb) = self.progress_bar {
            pb.inc(delta);
        }
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn line(&self, message: &str) {
        match self.progress_bar {
            Some(ref pb) => pb.suspend(|| {
                let _ = self.term.write_line(message);
            }),
            None => {
                let _ = self.term.write_line(message);
            }
        }
    }

    /// Report a genuine rule violation
    pub fn bug(&self, message: &str) {
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "BUG".to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Report a vacuous violation
    pub fn unfair(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "UNFAIR".to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        self.line(&format!("{prefix} {message}"));
    }
}

/// Render a run summary
pub fn render_run_summary(
    summary: &RunSummary,
    format: OutputFormat,
    use_color: bool,
) -> serde_json::Result<String> {
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(summary);
    }
    let (bug_style, ok_style) = styles(use_color);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "ticks: {} ({} faulted), stopped: {:?}, {:.2}s",
        summary.ticks,
        summary.faulted_ticks,
        summary.stop_reason,
        summary.duration.as_secs_f64()
    );
    let bugs = if summary.bugs_found > 0 {
        bug_style.apply_to(summary.bugs_found).to_string()
    } else {
        ok_style.apply_to(summary.bugs_found).to_string()
    };
    let _ = writeln!(
        out,
        "bugs found: {bugs}, unfair tests: {}, newly covered cells: {}",
        summary.unfair_tests, summary.newly_covered
    );
    let _ = writeln!(out, "score: {}", summary.score);
    out.push_str(&coverage_lines(&summary.coverage));
    Ok(out)
}

/// Render a coverage summary
pub fn render_coverage_summary(
    summary: &CoverageSummary,
    format: OutputFormat,
) -> serde_json::Result<String> {
    if format == OutputFormat::Json {
        return serde_json::to_string_pretty(summary);
    }
    Ok(coverage_lines(summary))
}

fn coverage_lines(summary: &CoverageSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "coverage: {:.4}% of {} reachable cells ({} unrestricted)",
        summary.percentage(),
        summary.reachable,
        summary.unrestricted
    );
    let _ = writeln!(
        out,
        "macro cases: {} ({} new), covered: {}, bugs: {}, uncovered: {}, invalid: {}",
        summary.macro_cases,
        summary.new_macro_cases,
        summary.covered,
        summary.bugs,
        summary.uncovered,
        summary.invalid
    );
    out
}

fn styles(use_color: bool) -> (Style, Style) {
    if use_color {
        (Style::new().red().bold(), Style::new().green().bold())
    } else {
        (Style::new(), Style::new())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod output_format_tests {
        use super::*;

        #[test]
        fn test_default_format() {
            assert_eq!(OutputFormat::default(), OutputFormat::Text);
        }
    }

    mod progress_reporter_tests {
        use super::*;

        #[test]
        fn test_new_reporter() {
            let reporter = ProgressReporter::new(false, true);
            assert!(!reporter.use_color);
            assert!(reporter.quiet);
        }

        #[test]
        fn test_messages() {
            let reporter = ProgressReporter::new(false, false);
            reporter.bug("rule 126.0 violated");
            reporter.unfair("rule 219.0 violated vacuously");
            reporter.info("entered junction");
            // No panic = success
        }

        #[test]
        fn test_progress_bar() {
            let mut reporter = ProgressReporter::new(false, false);
            reporter.start_progress(10, "ticks");
            reporter.increment(3);
            reporter.bug("inside the bar");
            reporter.finish();
        }

        #[test]
        fn test_quiet_mode_skips_bar() {
            let mut reporter = ProgressReporter::new(false, true);
            reporter.start_progress(10, "ticks");
            assert!(reporter.progress_bar.is_none());
        }
    }

    mod render_tests {
        use super::*;

        fn summary() -> RunSummary {
            RunSummary {
                ticks: 60,
                bugs_found: 2,
                score: 2,
                coverage: CoverageSummary {
                    macro_cases: 1,
                    covered: 1,
                    bugs: 2,
                    reachable: 100,
                    ..CoverageSummary::default()
                },
                ..RunSummary::default()
            }
        }

        #[test]
        fn test_text_summary() {
            let text = render_run_summary(&summary(), OutputFormat::Text, false).unwrap();
            assert!(text.contains("ticks: 60"));
            assert!(text.contains("bugs found: 2"));
            assert!(text.contains("score: 2"));
            assert!(text.contains("coverage: 3.0000% of 100 reachable cells"));
        }

        #[test]
        fn test_json_summary() {
            let text = render_run_summary(&summary(), OutputFormat::Json, false).unwrap();
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value["bugs_found"], 2);
            assert_eq!(value["stop_reason"], "world_ended");
            assert_eq!(value["coverage"]["bugs"], 2);
        }

        #[test]
        fn test_coverage_summary() {
            let text =
                render_coverage_summary(&summary().coverage, OutputFormat::Text).unwrap();
            assert!(text.contains("macro cases: 1"));
            assert!(text.contains("bugs: 2"));
        }
    }
}
