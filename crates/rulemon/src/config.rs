//! Monitor configuration.
//!
//! Loaded from YAML; every field has a default so a partial file works.
//!
//! ```yaml
//! tick_interval_ms: 100
//! coverage_path: out/coverage.csv
//! default_speed_limit: 50
//! coverage_space:
//!   - variable: rain
//!   - variable: num_vehicles
//!     max: 10
//! ```

use crate::coverage::{CoverageSpace, CoverageVariable, SpeedLimit, VariableDecl};
use crate::result::{RulemonError, RulemonResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything the monitor needs besides the world itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Pause between ticks; zero runs as fast as the world supplies snapshots
    pub tick_interval_ms: u64,
    /// Coverage table file
    pub coverage_path: PathBuf,
    /// Score file
    pub score_path: PathBuf,
    /// Role name that identifies the vehicle under test
    pub ego_role: String,
    /// Speed limit assumed when none is reported, km/h
    pub default_speed_limit: u32,
    /// Radius within which an emergency vehicle must be given way to, metres
    pub emergency_radius: f64,
    /// Drop an assertion from the pool after its first violation
    pub retire_violated: bool,
    /// Lateral offset of the junction partition, in lane widths
    pub lane_width_multiple: f64,
    /// Look-ahead / look-back distance along lanes, metres
    pub lookahead: f64,
    /// Stop after this many ticks
    pub max_ticks: Option<u64>,
    /// Ordered coverage variables
    pub coverage_space: Vec<VariableDecl>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            coverage_path: PathBuf::from("out/coverage.csv"),
            score_path: PathBuf::from("out/score.csv"),
            ego_role: "hero".to_string(),
            default_speed_limit: 70,
            emergency_radius: 50.0,
            retire_violated: true,
            lane_width_multiple: 1.0,
            lookahead: 10.0,
            max_ticks: None,
            coverage_space: default_coverage_space(),
        }
    }
}

/// Every variable, counts bounded at 20 vehicles and 20 pedestrians
#[must_use]
pub fn default_coverage_space() -> Vec<VariableDecl> {
    vec![
        VariableDecl::symbolic(CoverageVariable::Rain),
        VariableDecl::symbolic(CoverageVariable::GroundWater),
        VariableDecl::count(CoverageVariable::NumVehicles, 20),
        VariableDecl::count(CoverageVariable::NumPedestrians, 20),
        VariableDecl::symbolic(CoverageVariable::BikesPresent),
        VariableDecl::symbolic(CoverageVariable::CarsPresent),
        VariableDecl::symbolic(CoverageVariable::SpeedLimit),
        VariableDecl::symbolic(CoverageVariable::RoadGraph),
        VariableDecl::symbolic(CoverageVariable::EmergencyVehicle),
        VariableDecl::symbolic(CoverageVariable::TimeOfDay),
    ]
}

impl MonitorConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate YAML
    pub fn from_yaml(yaml: &str) -> RulemonResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a YAML file
    pub fn load(path: impl AsRef<Path>) -> RulemonResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            RulemonError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> RulemonResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> RulemonResult<()> {
        self.speed_limit()?;
        self.space()?;
        if !(self.emergency_radius.is_finite() && self.emergency_radius >= 0.0) {
            return Err(RulemonError::config("emergency_radius must be a non-negative number"));
        }
        if !(self.lookahead.is_finite() && self.lookahead > 0.0) {
            return Err(RulemonError::config("lookahead must be positive"));
        }
        if self.ego_role.is_empty() {
            return Err(RulemonError::config("ego_role must not be empty"));
        }
        Ok(())
    }

    /// Default speed limit as a posted value
    pub fn speed_limit(&self) -> RulemonResult<SpeedLimit> {
        SpeedLimit::from_kmh(self.default_speed_limit).ok_or_else(|| {
            RulemonError::config(format!(
                "default_speed_limit {} is not a posted limit",
                self.default_speed_limit
            ))
        })
    }

    /// Coverage space built from the declaration
    pub fn space(&self) -> RulemonResult<CoverageSpace> {
        CoverageSpace::new(&self.coverage_space)
    }

    /// Tick interval
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Set the tick interval
    #[must_use]
    pub const fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    /// Set the coverage file
    #[must_use]
    pub fn with_coverage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.coverage_path = path.into();
        self
    }

    /// Set the score file
    #[must_use]
    pub fn with_score_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.score_path = path.into();
        self
    }

    /// Set the ego role name
    #[must_use]
    pub fn with_ego_role(mut self, role: impl Into<String>) -> Self {
        self.ego_role = role.into();
        self
    }

    /// Set the default speed limit, km/h
    #[must_use]
    pub const fn with_default_speed_limit(mut self, kmh: u32) -> Self {
        self.default_speed_limit = kmh;
        self
    }

    /// Set whether violated assertions leave the pool
    #[must_use]
    pub const fn with_retire_violated(mut self, retire: bool) -> Self {
        self.retire_violated = retire;
        self
    }

    /// Set the tick budget
    #[must_use]
    pub const fn with_max_ticks(mut self, ticks: Option<u64>) -> Self {
        self.max_ticks = ticks;
        self
    }

    /// Set the coverage space
    #[must_use]
    pub fn with_coverage_space(mut self, decls: Vec<VariableDecl>) -> Self {
        self.coverage_space = decls;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_valid() {
        let config = MonitorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.speed_limit().unwrap(), SpeedLimit::Seventy);
        assert_eq!(config.space().unwrap().len(), 10);
    }

    #[test]
    fn test_partial_yaml() {
        let config = MonitorConfig::from_yaml(
            "default_speed_limit: 30\n\
             retire_violated: false\n\
             coverage_space:\n  - variable: rain\n  - variable: num_vehicles\n    max: 4\n",
        )
        .unwrap();
        assert_eq!(config.default_speed_limit, 30);
        assert!(!config.retire_violated);
        assert_eq!(config.ego_role, "hero");
        assert_eq!(config.space().unwrap().size(), 5 * 5);
    }

    #[test]
    fn test_rejects_unposted_limit() {
        let err = MonitorConfig::from_yaml("default_speed_limit: 33\n").unwrap_err();
        assert!(matches!(err, RulemonError::Config { .. }));
    }

    #[test]
    fn test_rejects_count_without_max() {
        assert!(MonitorConfig::from_yaml("coverage_space:\n  - variable: num_pedestrians\n").is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = MonitorConfig::new()
            .with_tick_interval_ms(0)
            .with_max_ticks(Some(12))
            .with_ego_role("ego");
        let back = MonitorConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(MonitorConfig::load(dir.path().join("nope.yaml")).is_err());
    }
}
