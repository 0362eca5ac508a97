//! Combinatorial coverage tracking for rule monitors.
//!
//! The environment is described by an ordered set of discrete
//! [`CoverageVariable`]s. Each tick projects the world onto one
//! [`CoverageKey`] (a macro case); within that case every rule owns one
//! micro-bin whose [`CellState`] climbs a monotone lattice:
//!
//! ```text
//! INVALID ──valid──▶ UNCOVERED ──precondition──▶ COVERED
//!                        │                          │
//!                        └────────violation─────────┴──▶ BUG
//! ```
//!
//! A rule's [`ValidityRequirement`] confines it to part of the space; the
//! reachable size of the lattice is the sum of each rule's restricted
//! product of domain sizes.

mod cell;
mod space;
mod store;
mod tracker;
mod validity;
mod variable;

pub use cell::CellState;
pub use space::{CoverageKey, CoverageSample, CoverageSpace, Domain, KeyIter, VariableDecl};
pub use store::{
    decode_table, encode_table, CoverageRows, CoverageStore, CsvCoverageFile,
    MemoryCoverageStore, FORMAT_TAG, FORMAT_VERSION,
};
pub(crate) use store::write_atomic;
pub use tracker::{CoverageSummary, CoverageTracker, MicroBinId, TrackerUpdate};
pub use validity::ValidityRequirement;
pub use variable::{
    ColumnKind, CoverageValue, CoverageVariable, EmergencyStatus, Presence, RoadGraph,
    SpeedLimit, TimeOfDay, WeatherLevel,
};

#[cfg(test)]
mod tests;
