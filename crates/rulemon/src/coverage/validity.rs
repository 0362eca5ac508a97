//! Validity requirements: the region of the coverage space where a rule is
//! meaningful.

use super::space::{CoverageKey, CoverageSpace};
use super::variable::{CoverageValue, CoverageVariable, RoadGraph};
use crate::result::{RulemonError, RulemonResult};
use std::collections::{BTreeMap, BTreeSet};

/// Per-variable allowed value sets; unrestricted variables admit anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidityRequirement {
    allowed: BTreeMap<CoverageVariable, BTreeSet<CoverageValue>>,
}

impl ValidityRequirement {
    /// Requirement with no restrictions
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `variable` to `values`.
    ///
    /// Every value must belong to `variable`, and the set must be non-empty.
    /// Restricting the same variable twice intersects the sets.
    pub fn allow(
        mut self,
        variable: CoverageVariable,
        values: impl IntoIterator<Item = CoverageValue>,
    ) -> RulemonResult<Self> {
        let mut set = BTreeSet::new();
        for value in values {
            if value.variable() != variable {
                return Err(RulemonError::InvalidRequirement {
                    message: format!("value {value} is not a {variable} value"),
                });
            }
            set.insert(value);
        }
        if let Some(existing) = self.allowed.get(&variable) {
            set = set.intersection(existing).copied().collect();
        }
        if set.is_empty() {
            return Err(RulemonError::InvalidRequirement {
                message: format!("no allowed values left for {variable}"),
            });
        }
        self.allowed.insert(variable, set);
        Ok(self)
    }

    /// Restriction to junction-shaped road graphs (three or more arms)
    #[must_use]
    pub fn in_junction() -> Self {
        let values: BTreeSet<CoverageValue> = RoadGraph::junction_shapes()
            .into_iter()
            .map(CoverageValue::RoadGraph)
            .collect();
        let mut allowed = BTreeMap::new();
        allowed.insert(CoverageVariable::RoadGraph, values);
        Self { allowed }
    }

    /// Allowed set for a variable, `None` when unrestricted
    #[must_use]
    pub fn allowed(&self, variable: CoverageVariable) -> Option<&BTreeSet<CoverageValue>> {
        self.allowed.get(&variable)
    }

    /// Restricted variables
    pub fn variables(&self) -> impl Iterator<Item = CoverageVariable> + '_ {
        self.allowed.keys().copied()
    }

    /// Whether every restricted variable's value in `key` is allowed.
    ///
    /// Restrictions on variables absent from the key are ignored.
    #[must_use]
    pub fn is_valid(&self, key: &CoverageKey) -> bool {
        self.allowed.iter().all(|(variable, set)| {
            key.get(*variable)
                .map_or(true, |value| set.contains(&value))
        })
    }

    /// Number of keys of `space` this requirement admits
    #[must_use]
    pub fn reachable_size(&self, space: &CoverageSpace) -> u64 {
        space
            .variables()
            .map(|variable| match self.allowed.get(&variable) {
                Some(set) => set.iter().filter(|v| space.contains(v)).count() as u64,
                None => space.axis_size(variable),
            })
            .fold(1_u64, u64::saturating_mul)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::variable::{TimeOfDay, WeatherLevel};

    #[test]
    fn test_allow_rejects_foreign_values() {
        let err = ValidityRequirement::new()
            .allow(
                CoverageVariable::Rain,
                [CoverageValue::TimeOfDay(TimeOfDay::Night)],
            )
            .unwrap_err();
        assert!(matches!(err, RulemonError::InvalidRequirement { .. }));
    }

    #[test]
    fn test_allow_rejects_empty() {
        assert!(ValidityRequirement::new()
            .allow(CoverageVariable::Rain, [])
            .is_err());
    }

    #[test]
    fn test_allow_twice_intersects() {
        let req = ValidityRequirement::new()
            .allow(
                CoverageVariable::Rain,
                [
                    CoverageValue::Rain(WeatherLevel::None),
                    CoverageValue::Rain(WeatherLevel::Heavy),
                ],
            )
            .unwrap()
            .allow(CoverageVariable::Rain, [CoverageValue::Rain(WeatherLevel::Heavy)])
            .unwrap();
        assert_eq!(req.allowed(CoverageVariable::Rain).unwrap().len(), 1);
    }

    #[test]
    fn test_in_junction_shapes() {
        let req = ValidityRequirement::in_junction();
        let set = req.allowed(CoverageVariable::RoadGraph).unwrap();
        assert!(set.contains(&CoverageValue::RoadGraph(RoadGraph::Tttt)));
        assert!(set.contains(&CoverageValue::RoadGraph(RoadGraph::Fttt)));
        assert!(!set.contains(&CoverageValue::RoadGraph(RoadGraph::Tftf)));
    }
}
