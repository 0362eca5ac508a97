//! Command handlers
//!
//! Each handler takes the global CLI configuration plus its own arguments.

pub mod coverage;
pub mod run;
pub mod scenarios;

pub use coverage::{execute_coverage, rule_breakdown, RuleCoverage};
pub use run::execute_run;
pub use scenarios::execute_scenarios;
