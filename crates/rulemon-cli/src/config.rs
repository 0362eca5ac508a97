//! CLI configuration

use crate::error::{CliError, CliResult};
use rulemon::MonitorConfig;
use std::path::Path;

/// Verbosity level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Only errors
    Quiet,
    /// Findings and summaries
    #[default]
    Normal,
    /// Monitor lifecycle logging
    Verbose,
    /// Per-tick logging
    Debug,
}

impl Verbosity {
    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Check if debug mode
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::Debug)
    }

    /// Log filter used when `RUST_LOG` is unset
    #[must_use]
    pub const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Detect terminal support
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Whether output should be colored
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color choice
    pub color: ColorChoice,
}

impl CliConfig {
    /// Create a new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }
}

/// Load the monitor configuration, falling back to defaults without a file
pub fn load_monitor_config(path: Option<&Path>) -> CliResult<MonitorConfig> {
    match path {
        Some(path) if !path.exists() => Err(CliError::config(format!(
            "config file not found: {}",
            path.display()
        ))),
        Some(path) => Ok(MonitorConfig::load(path)?),
        None => Ok(MonitorConfig::default()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_default() {
            assert_eq!(Verbosity::default(), Verbosity::Normal);
        }

        #[test]
        fn test_predicates() {
            assert!(Verbosity::Quiet.is_quiet());
            assert!(!Verbosity::Normal.is_verbose());
            assert!(Verbosity::Verbose.is_verbose());
            assert!(Verbosity::Debug.is_verbose());
            assert!(Verbosity::Debug.is_debug());
            assert!(!Verbosity::Verbose.is_debug());
        }

        #[test]
        fn test_log_filter() {
            assert_eq!(Verbosity::Quiet.log_filter(), "error");
            assert_eq!(Verbosity::Normal.log_filter(), "warn");
            assert_eq!(Verbosity::Verbose.log_filter(), "info");
            assert_eq!(Verbosity::Debug.log_filter(), "debug");
        }
    }

    mod color_choice_tests {
        use super::*;

        #[test]
        fn test_always_and_never() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
        }

        #[test]
        fn test_default() {
            assert_eq!(ColorChoice::default(), ColorChoice::Auto);
        }
    }

    mod cli_config_tests {
        use super::*;

        #[test]
        fn test_builder() {
            let config = CliConfig::new()
                .with_verbosity(Verbosity::Debug)
                .with_color(ColorChoice::Never);
            assert_eq!(config.verbosity, Verbosity::Debug);
            assert_eq!(config.color, ColorChoice::Never);
        }
    }

    mod monitor_config_tests {
        use super::*;
        use tempfile::TempDir;

        #[test]
        fn test_defaults_without_file() {
            let config = load_monitor_config(None).unwrap();
            assert_eq!(config, MonitorConfig::default());
        }

        #[test]
        fn test_missing_file_is_config_error() {
            let dir = TempDir::new().unwrap();
            let err = load_monitor_config(Some(&dir.path().join("absent.yaml"))).unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
        }

        #[test]
        fn test_loads_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("monitor.yaml");
            std::fs::write(&path, "tick_interval_ms: 0\nego_role: ego\n").unwrap();
            let config = load_monitor_config(Some(&path)).unwrap();
            assert_eq!(config.tick_interval_ms, 0);
            assert_eq!(config.ego_role, "ego");
        }
    }
}
