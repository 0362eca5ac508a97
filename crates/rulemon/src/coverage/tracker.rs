//! Coverage lattice: one row of micro-bin cells per observed macro case.

use super::cell::CellState;
use super::space::{CoverageKey, CoverageSpace};
use super::store::{CoverageRows, CoverageStore};
use super::validity::ValidityRequirement;
use crate::assertion::RuleId;
use crate::result::{RulemonError, RulemonResult};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

/// Micro-bins are identified by the rule they track
pub type MicroBinId = RuleId;

/// What one tick changed in the lattice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerUpdate {
    /// The key had never been seen before
    pub new_macro_case: bool,
    /// Cells that entered `COVERED` or `BUG`
    pub newly_covered: usize,
    /// Cells that entered `BUG`
    pub new_bugs: usize,
    /// Any cell or row changed
    pub changed: bool,
}

/// Aggregate counts over the lattice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Observed macro cases
    pub macro_cases: usize,
    /// Macro cases first seen in this session
    pub new_macro_cases: usize,
    /// Cells in `COVERED`
    pub covered: usize,
    /// Cells in `BUG`
    pub bugs: usize,
    /// Cells in `UNCOVERED`
    pub uncovered: usize,
    /// Cells in `INVALID` among observed rows
    pub invalid: usize,
    /// Cells that can ever leave `INVALID`
    pub reachable: u64,
    /// Micro-bins times unrestricted space size
    pub unrestricted: u64,
}

impl CoverageSummary {
    /// Covered or buggy cells as a percentage of the reachable space
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.reachable == 0 {
            return 0.0;
        }
        (self.covered + self.bugs) as f64 / self.reachable as f64 * 100.0
    }
}

/// Owns the coverage lattice and persists it on every change
#[derive(Debug)]
pub struct CoverageTracker {
    space: CoverageSpace,
    bins: Vec<MicroBinId>,
    requirements: Vec<Option<ValidityRequirement>>,
    rows: CoverageRows,
    store: Box<dyn CoverageStore>,
    new_macro_cases: usize,
}

impl CoverageTracker {
    /// Create a tracker over `space` with one micro-bin per rule.
    ///
    /// Loads existing rows from `store`; an empty store is initialised with
    /// the header so the schema is fixed from the first tick.
    pub fn new(
        space: CoverageSpace,
        bins: Vec<(MicroBinId, Option<ValidityRequirement>)>,
        mut store: Box<dyn CoverageStore>,
    ) -> RulemonResult<Self> {
        let mut seen = HashSet::new();
        for (id, _) in &bins {
            if !seen.insert(*id) {
                return Err(RulemonError::config(format!("rule {id} registered twice")));
            }
        }
        let (bins, requirements): (Vec<_>, Vec<_>) = bins.into_iter().unzip();

        let rows = match store.load(&space, &bins)? {
            Some(rows) => {
                info!(rows = rows.len(), bins = bins.len(), "loaded coverage lattice");
                rows
            }
            None => {
                let rows = CoverageRows::new();
                store.save(&space, &bins, &rows)?;
                info!(bins = bins.len(), "initialised empty coverage lattice");
                rows
            }
        };

        Ok(Self {
            space,
            bins,
            requirements,
            rows,
            store,
            new_macro_cases: 0,
        })
    }

    /// Feed one tick's sets of valid, covered and violated rules.
    ///
    /// A bin reported valid at a key outside its requirement stays `INVALID`.
    pub fn update(
        &mut self,
        key: &CoverageKey,
        valid: &BTreeSet<MicroBinId>,
        covered: &BTreeSet<MicroBinId>,
        violated: &BTreeSet<MicroBinId>,
    ) -> RulemonResult<TrackerUpdate> {
        if key.values().len() != self.space.len() {
            return Err(RulemonError::schema(format!(
                "key {key} does not belong to the configured space"
            )));
        }

        let mut update = TrackerUpdate::default();
        let width = self.bins.len();
        let row = match self.rows.entry(key.clone()) {
            Entry::Vacant(entry) => {
                update.new_macro_case = true;
                update.changed = true;
                entry.insert(vec![CellState::Invalid; width])
            }
            Entry::Occupied(entry) => entry.into_mut(),
        };

        for ((cell, bin), requirement) in row.iter_mut().zip(&self.bins).zip(&self.requirements) {
            let defined = requirement.as_ref().map_or(true, |r| r.is_valid(key));
            let before = *cell;
            let after = before.advance(
                defined && valid.contains(bin),
                covered.contains(bin),
                violated.contains(bin),
            );
            if after == before {
                continue;
            }
            update.changed = true;
            match after {
                CellState::Bug => {
                    update.new_bugs += 1;
                    update.newly_covered += 1;
                }
                CellState::Covered => update.newly_covered += 1,
                CellState::Invalid | CellState::Uncovered => {}
            }
            debug!(key = %key, rule = %bin, from = %before, to = %after, "cell transition");
            *cell = after;
        }

        if update.new_macro_case {
            self.new_macro_cases += 1;
            info!(key = %key, "new macro case");
        }
        if update.changed {
            self.store.save(&self.space, &self.bins, &self.rows)?;
        }
        Ok(update)
    }

    /// The coverage space
    #[must_use]
    pub fn space(&self) -> &CoverageSpace {
        &self.space
    }

    /// Micro-bins in column order
    #[must_use]
    pub fn bins(&self) -> &[MicroBinId] {
        &self.bins
    }

    /// All observed rows
    #[must_use]
    pub fn rows(&self) -> &CoverageRows {
        &self.rows
    }

    /// Row for a key
    #[must_use]
    pub fn row(&self, key: &CoverageKey) -> Option<&[CellState]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    /// State of one cell
    #[must_use]
    pub fn cell(&self, key: &CoverageKey, bin: MicroBinId) -> Option<CellState> {
        let index = self.bins.iter().position(|b| *b == bin)?;
        self.rows.get(key).map(|row| row[index])
    }

    /// Number of (key, bin) cells that can ever leave `INVALID`
    #[must_use]
    pub fn reachable_size(&self) -> u64 {
        self.requirements
            .iter()
            .map(|req| match req {
                Some(req) => req.reachable_size(&self.space),
                None => self.space.size(),
            })
            .fold(0_u64, u64::saturating_add)
    }

    /// Whether a bin is defined at `key`
    #[must_use]
    pub fn is_reachable(&self, key: &CoverageKey, bin: MicroBinId) -> bool {
        self.bins
            .iter()
            .position(|b| *b == bin)
            .is_some_and(|i| self.requirements[i].as_ref().map_or(true, |r| r.is_valid(key)))
    }

    /// Aggregate counts
    #[must_use]
    pub fn summary(&self) -> CoverageSummary {
        let mut summary = CoverageSummary {
            macro_cases: self.rows.len(),
            new_macro_cases: self.new_macro_cases,
            reachable: self.reachable_size(),
            unrestricted: self.space.size().saturating_mul(self.bins.len() as u64),
            ..CoverageSummary::default()
        };
        for cell in self.rows.values().flatten() {
            match cell {
                CellState::Invalid => summary.invalid += 1,
                CellState::Uncovered => summary.uncovered += 1,
                CellState::Covered => summary.covered += 1,
                CellState::Bug => summary.bugs += 1,
            }
        }
        summary
    }
}
