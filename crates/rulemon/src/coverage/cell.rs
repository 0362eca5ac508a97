//! Micro-bin cell lattice.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one (macro case, rule) cell.
///
/// Ordered `Invalid < Uncovered < Covered < Bug`; a cell only moves up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellState {
    /// The rule is not meaningful here
    Invalid,
    /// Valid but never exercised
    Uncovered,
    /// Precondition was active at least once
    Covered,
    /// A violation was observed
    Bug,
}

impl CellState {
    /// Persisted label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Uncovered => "UNCOVERED",
            Self::Covered => "COVERED",
            Self::Bug => "BUG",
        }
    }

    /// Parse a persisted label
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "INVALID" => Some(Self::Invalid),
            "UNCOVERED" => Some(Self::Uncovered),
            "COVERED" => Some(Self::Covered),
            "BUG" => Some(Self::Bug),
            _ => None,
        }
    }

    /// Apply one tick's observation; never moves down the lattice.
    ///
    /// `valid` lifts an `INVALID` cell to `UNCOVERED` first, so a single
    /// tick may take a cell straight from `INVALID` to `BUG`. A violation
    /// wins over coverage within the same tick.
    #[must_use]
    pub fn advance(self, valid: bool, covered: bool, violated: bool) -> Self {
        let state = if valid && self == Self::Invalid {
            Self::Uncovered
        } else {
            self
        };
        match state {
            Self::Uncovered | Self::Covered if violated => Self::Bug,
            Self::Uncovered if covered => Self::Covered,
            other => other,
        }
    }

    /// Counts toward coverage
    #[must_use]
    pub const fn is_covered(self) -> bool {
        matches!(self, Self::Covered | Self::Bug)
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
