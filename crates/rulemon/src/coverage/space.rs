//! The ordered coverage space and the keys that index it.

use super::variable::{ColumnKind, CoverageValue, CoverageVariable};
use crate::result::{RulemonError, RulemonResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Value domain of one variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// The variable's closed symbolic set
    Symbolic,
    /// Integers `0..=max`
    Count {
        /// Largest representable count
        max: u32,
    },
}

/// One declared axis: a variable plus, for counts, its bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDecl {
    /// The variable
    pub variable: CoverageVariable,
    /// Upper bound for count variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl VariableDecl {
    /// Declare a symbolic variable
    #[must_use]
    pub const fn symbolic(variable: CoverageVariable) -> Self {
        Self {
            variable,
            max: None,
        }
    }

    /// Declare a count variable with an upper bound
    #[must_use]
    pub const fn count(variable: CoverageVariable, max: u32) -> Self {
        Self {
            variable,
            max: Some(max),
        }
    }
}

/// Ordered list of declared variables with their domains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageSpace {
    axes: Vec<(CoverageVariable, Domain)>,
}

impl CoverageSpace {
    /// Build a space from declarations, validating kinds and duplicates
    pub fn new(decls: &[VariableDecl]) -> RulemonResult<Self> {
        let mut seen = HashSet::new();
        let mut axes = Vec::with_capacity(decls.len());
        for decl in decls {
            if !seen.insert(decl.variable) {
                return Err(RulemonError::config(format!(
                    "coverage variable {} declared twice",
                    decl.variable
                )));
            }
            let domain = match (decl.variable.kind(), decl.max) {
                (ColumnKind::Count, Some(max)) => Domain::Count { max },
                (ColumnKind::Count, None) => {
                    return Err(RulemonError::config(format!(
                        "count variable {} needs a max",
                        decl.variable
                    )))
                }
                (ColumnKind::Enum, None) => Domain::Symbolic,
                (ColumnKind::Enum, Some(_)) => {
                    return Err(RulemonError::config(format!(
                        "symbolic variable {} does not take a max",
                        decl.variable
                    )))
                }
            };
            axes.push((decl.variable, domain));
        }
        if axes.is_empty() {
            return Err(RulemonError::config("coverage space has no variables"));
        }
        Ok(Self { axes })
    }

    /// Declared variables in order
    pub fn variables(&self) -> impl Iterator<Item = CoverageVariable> + '_ {
        self.axes.iter().map(|(variable, _)| *variable)
    }

    /// Declared axes in order
    #[must_use]
    pub fn axes(&self) -> &[(CoverageVariable, Domain)] {
        &self.axes
    }

    /// Number of declared variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.axes.len()
    }

    /// Always false for a constructed space
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Domain of a declared variable
    #[must_use]
    pub fn domain(&self, variable: CoverageVariable) -> Option<Domain> {
        self.axes
            .iter()
            .find(|(v, _)| *v == variable)
            .map(|(_, domain)| *domain)
    }

    /// All values of one axis
    #[must_use]
    pub fn values_of(&self, variable: CoverageVariable) -> Vec<CoverageValue> {
        match self.domain(variable) {
            Some(Domain::Symbolic) => variable.symbolic_values().unwrap_or_default(),
            Some(Domain::Count { max }) => (0..=max)
                .filter_map(|count| variable.count_value(count))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Number of values on one axis
    #[must_use]
    pub fn axis_size(&self, variable: CoverageVariable) -> u64 {
        match self.domain(variable) {
            Some(Domain::Symbolic) => variable.symbolic_values().map_or(0, |v| v.len() as u64),
            Some(Domain::Count { max }) => u64::from(max) + 1,
            None => 0,
        }
    }

    /// Whether `value` lies in its variable's declared domain
    #[must_use]
    pub fn contains(&self, value: &CoverageValue) -> bool {
        match (self.domain(value.variable()), value.count()) {
            (Some(Domain::Symbolic), None) => true,
            (Some(Domain::Count { max }), Some(count)) => count <= max,
            _ => false,
        }
    }

    /// Product of all axis sizes
    #[must_use]
    pub fn size(&self) -> u64 {
        self.variables()
            .map(|v| self.axis_size(v))
            .fold(1_u64, u64::saturating_mul)
    }

    /// Clamp a count to the declared bound of its variable
    #[must_use]
    pub fn clamp_count(&self, variable: CoverageVariable, count: u32) -> u32 {
        match self.domain(variable) {
            Some(Domain::Count { max }) => count.min(max),
            _ => count,
        }
    }

    /// Project a sample onto this space's variable order
    pub fn key(&self, sample: &CoverageSample) -> RulemonResult<CoverageKey> {
        let mut values = Vec::with_capacity(self.axes.len());
        for variable in self.variables() {
            let value = sample.get(variable).ok_or_else(|| {
                RulemonError::config(format!("sample is missing variable {variable}"))
            })?;
            values.push(value);
        }
        self.key_from_values(values)
    }

    /// Validate an ordered value list as a key of this space
    pub fn key_from_values(&self, values: Vec<CoverageValue>) -> RulemonResult<CoverageKey> {
        if values.len() != self.axes.len() {
            return Err(RulemonError::schema(format!(
                "key has {} values, space has {} variables",
                values.len(),
                self.axes.len()
            )));
        }
        for (value, variable) in values.iter().zip(self.variables()) {
            if value.variable() != variable || !self.contains(value) {
                return Err(RulemonError::DomainMismatch {
                    variable: variable.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(CoverageKey(values))
    }

    /// Iterate every key of the space in lexicographic axis order.
    ///
    /// Only sensible for small spaces.
    #[must_use]
    pub fn keys(&self) -> KeyIter {
        let axes: Vec<Vec<CoverageValue>> = self.variables().map(|v| self.values_of(v)).collect();
        let done = axes.iter().any(Vec::is_empty);
        KeyIter {
            indices: vec![0; axes.len()],
            axes,
            done,
        }
    }
}

/// Odometer over every key of a [`CoverageSpace`]
#[derive(Debug)]
pub struct KeyIter {
    axes: Vec<Vec<CoverageValue>>,
    indices: Vec<usize>,
    done: bool,
}

impl Iterator for KeyIter {
    type Item = CoverageKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let key = CoverageKey(
            self.indices
                .iter()
                .zip(&self.axes)
                .map(|(&i, axis)| axis[i])
                .collect(),
        );
        // advance the last axis first
        let mut pos = self.axes.len();
        loop {
            if pos == 0 {
                self.done = true;
                break;
            }
            pos -= 1;
            self.indices[pos] += 1;
            if self.indices[pos] < self.axes[pos].len() {
                break;
            }
            self.indices[pos] = 0;
        }
        Some(key)
    }
}

/// One macro-level case: a value per declared variable, in space order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoverageKey(Vec<CoverageValue>);

impl CoverageKey {
    /// Values in space order
    #[must_use]
    pub fn values(&self) -> &[CoverageValue] {
        &self.0
    }

    /// Value of a given variable, if declared
    #[must_use]
    pub fn get(&self, variable: CoverageVariable) -> Option<CoverageValue> {
        self.0.iter().copied().find(|v| v.variable() == variable)
    }
}

impl fmt::Display for CoverageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self.0.iter().map(CoverageValue::cell).collect();
        write!(f, "({})", cells.join(", "))
    }
}

/// Observed values for the current tick, keyed by variable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageSample {
    values: BTreeMap<CoverageVariable, CoverageValue>,
}

impl CoverageSample {
    /// Create an empty sample
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value under its own variable
    pub fn insert(&mut self, value: CoverageValue) {
        self.values.insert(value.variable(), value);
    }

    /// Builder form of [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, value: CoverageValue) -> Self {
        self.insert(value);
        self
    }

    /// Value recorded for `variable`
    #[must_use]
    pub fn get(&self, variable: CoverageVariable) -> Option<CoverageValue> {
        self.values.get(&variable).copied()
    }
}

impl FromIterator<CoverageValue> for CoverageSample {
    fn from_iter<I: IntoIterator<Item = CoverageValue>>(iter: I) -> Self {
        let mut sample = Self::new();
        for value in iter {
            sample.insert(value);
        }
        sample
    }
}
