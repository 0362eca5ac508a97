//! Monitored rules and their per-tick state machine.
//!
//! An [`Assertion`] pairs a precondition ("the rule applies right now") with
//! a check ("the required behaviour holds right now"). Each tick it records
//! whether it was exercised and whether it failed, and classifies failures
//! as genuine or vacuous.

use crate::coverage::{CoverageKey, ValidityRequirement};
use crate::result::{RulemonError, RulemonResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule number plus subcase, e.g. `170.1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId {
    /// Rule number
    pub rule: u32,
    /// Subcase within the rule
    pub subcase: u32,
}

impl RuleId {
    /// Create a rule id
    #[must_use]
    pub const fn new(rule: u32, subcase: u32) -> Self {
        Self { rule, subcase }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.rule, self.subcase)
    }
}

impl FromStr for RuleId {
    type Err = RulemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| part.trim().parse::<u32>().ok();
        s.split_once('.')
            .and_then(|(rule, subcase)| Some(Self::new(parse(rule)?, parse(subcase)?)))
            .ok_or_else(|| RulemonError::config(format!("invalid rule id '{s}'")))
    }
}

/// How the precondition is read when classifying a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Trigger {
    /// Genuine iff the precondition holds in the violating tick
    #[default]
    Level,
    /// Genuine iff the precondition switched on in the violating tick
    Edge,
}

/// A probe evaluated against the tick context
pub type Oracle<C> = Box<dyn Fn(&C) -> RulemonResult<bool>>;

/// Raw oracle values for one tick, before any state is touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// Precondition value
    pub precondition: bool,
    /// Check value
    pub holds: bool,
}

/// What one tick did to an assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckOutcome {
    /// Precondition was active this tick
    pub precondition_active: bool,
    /// The check failed this tick
    pub violated: bool,
    /// The failure does not count as a defect
    pub vacuous: bool,
    /// First failure of the run
    pub first_violation: bool,
}

impl CheckOutcome {
    /// A violation that counts as a discovered defect
    #[must_use]
    pub const fn is_genuine_violation(&self) -> bool {
        self.violated && !self.vacuous
    }
}

/// One monitored rule over a context type `C`
pub struct Assertion<C> {
    id: RuleId,
    description: String,
    precondition: Oracle<C>,
    check: Oracle<C>,
    validity: Option<ValidityRequirement>,
    trigger: Trigger,
    covered: bool,
    violated: bool,
    zero_value: bool,
    precondition_active_in_tick: bool,
    violated_in_tick: bool,
}

impl<C> fmt::Debug for Assertion<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assertion")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("trigger", &self.trigger)
            .field("validity", &self.validity)
            .field("covered", &self.covered)
            .field("violated", &self.violated)
            .field("zero_value", &self.zero_value)
            .finish_non_exhaustive()
    }
}

impl<C> Assertion<C> {
    /// Create a level-triggered assertion valid everywhere
    pub fn new(
        id: RuleId,
        description: impl Into<String>,
        precondition: impl Fn(&C) -> RulemonResult<bool> + 'static,
        check: impl Fn(&C) -> RulemonResult<bool> + 'static,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            precondition: Box::new(precondition),
            check: Box::new(check),
            validity: None,
            trigger: Trigger::Level,
            covered: false,
            violated: false,
            zero_value: false,
            precondition_active_in_tick: false,
            violated_in_tick: false,
        }
    }

    /// Restrict the assertion to part of the coverage space
    #[must_use]
    pub fn with_validity(mut self, validity: ValidityRequirement) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Set how the precondition is read
    #[must_use]
    pub const fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Rule id
    #[must_use]
    pub const fn id(&self) -> RuleId {
        self.id
    }

    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Validity requirement, if any
    #[must_use]
    pub fn validity(&self) -> Option<&ValidityRequirement> {
        self.validity.as_ref()
    }

    /// Trigger mode
    #[must_use]
    pub const fn trigger(&self) -> Trigger {
        self.trigger
    }

    /// Precondition was ever active
    #[must_use]
    pub const fn covered(&self) -> bool {
        self.covered
    }

    /// Check ever failed
    #[must_use]
    pub const fn violated(&self) -> bool {
        self.violated
    }

    /// Some failure was vacuous
    #[must_use]
    pub const fn zero_value(&self) -> bool {
        self.zero_value
    }

    /// Precondition flag of the last evaluated tick
    #[must_use]
    pub const fn precondition_active_in_tick(&self) -> bool {
        self.precondition_active_in_tick
    }

    /// Violation flag of the last evaluated tick
    #[must_use]
    pub const fn violated_in_tick(&self) -> bool {
        self.violated_in_tick
    }

    /// Whether the rule is defined at `key`
    #[must_use]
    pub fn is_active(&self, key: &CoverageKey) -> bool {
        self.validity.as_ref().map_or(true, |v| v.is_valid(key))
    }

    /// Clear the tick flags for a tick in which the rule was not evaluated
    pub fn skip_tick(&mut self) {
        self.precondition_active_in_tick = false;
        self.violated_in_tick = false;
    }

    /// Run both oracles without touching any state.
    ///
    /// Oracle faults carry this rule's id.
    pub fn evaluate(&self, ctx: &C) -> RulemonResult<Probe> {
        let tag = |err: RulemonError| match err {
            RulemonError::Oracle { .. } => err,
            other => RulemonError::oracle(self.id.to_string(), other.to_string()),
        };
        let precondition = (self.precondition)(ctx).map_err(tag)?;
        let holds = (self.check)(ctx).map_err(tag)?;
        Ok(Probe {
            precondition,
            holds,
        })
    }

    /// Fold one tick's probe into the state machine
    pub fn apply(&mut self, probe: Probe) -> CheckOutcome {
        let previously_active = self.precondition_active_in_tick;

        self.precondition_active_in_tick = probe.precondition;
        if probe.precondition {
            self.covered = true;
        }

        let violated = !probe.holds;
        self.violated_in_tick = violated;
        let first_violation = violated && !self.violated;
        let mut vacuous = false;
        if violated {
            self.violated = true;
            let genuine = match self.trigger {
                Trigger::Level => probe.precondition,
                Trigger::Edge => probe.precondition && !previously_active,
            };
            if !genuine {
                vacuous = true;
                self.zero_value = true;
            }
        }

        CheckOutcome {
            precondition_active: probe.precondition,
            violated,
            vacuous,
            first_violation,
        }
    }

    /// Evaluate and apply in one step
    pub fn check(&mut self, ctx: &C) -> RulemonResult<CheckOutcome> {
        let probe = self.evaluate(ctx)?;
        Ok(self.apply(probe))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct Tick {
        pre: bool,
        ok: bool,
    }

    fn probe_assertion(trigger: Trigger) -> Assertion<Tick> {
        Assertion::new(RuleId::new(1, 0), "probe", |t: &Tick| Ok(t.pre), |t: &Tick| Ok(t.ok))
            .with_trigger(trigger)
    }

    #[test]
    fn test_rule_id_display_and_parse() {
        let id = RuleId::new(170, 1);
        assert_eq!(id.to_string(), "170.1");
        assert_eq!("170.1".parse::<RuleId>().unwrap(), id);
        assert!("170".parse::<RuleId>().is_err());
        assert!("a.b".parse::<RuleId>().is_err());
    }

    #[test]
    fn test_precondition_sets_covered() {
        let mut a = probe_assertion(Trigger::Level);
        a.check(&Tick { pre: false, ok: true }).unwrap();
        assert!(!a.covered());
        a.check(&Tick { pre: true, ok: true }).unwrap();
        assert!(a.covered());
        a.check(&Tick { pre: false, ok: true }).unwrap();
        assert!(a.covered());
        assert!(!a.precondition_active_in_tick());
    }

    #[test]
    fn test_violation_is_sticky() {
        let mut a = probe_assertion(Trigger::Level);
        let first = a.check(&Tick { pre: true, ok: false }).unwrap();
        assert!(first.first_violation);
        let next = a.check(&Tick { pre: true, ok: true }).unwrap();
        assert!(!next.violated);
        assert!(a.violated());
        assert!(!a.violated_in_tick());
        let again = a.check(&Tick { pre: true, ok: false }).unwrap();
        assert!(!again.first_violation);
    }

    #[test]
    fn test_edge_rising_violation_is_genuine() {
        let mut a = probe_assertion(Trigger::Edge);
        a.check(&Tick { pre: false, ok: true }).unwrap();
        let out = a.check(&Tick { pre: true, ok: false }).unwrap();
        assert!(out.is_genuine_violation());
        assert!(!a.zero_value());
    }

    #[test]
    fn test_edge_held_violation_is_vacuous() {
        let mut a = probe_assertion(Trigger::Edge);
        a.check(&Tick { pre: true, ok: true }).unwrap();
        let out = a.check(&Tick { pre: true, ok: false }).unwrap();
        assert!(out.vacuous);
        assert!(a.zero_value());
    }

    #[test]
    fn test_level_depends_only_on_current_tick() {
        for previous in [false, true] {
            let mut a = probe_assertion(Trigger::Level);
            a.check(&Tick { pre: previous, ok: true }).unwrap();
            let out = a.check(&Tick { pre: true, ok: false }).unwrap();
            assert!(out.is_genuine_violation());

            let mut b = probe_assertion(Trigger::Level);
            b.check(&Tick { pre: previous, ok: true }).unwrap();
            let out = b.check(&Tick { pre: false, ok: false }).unwrap();
            assert!(out.vacuous);
            assert!(b.zero_value());
        }
    }

    #[test]
    fn test_skip_tick_resets_edge_history() {
        let mut a = probe_assertion(Trigger::Edge);
        a.check(&Tick { pre: true, ok: true }).unwrap();
        a.skip_tick();
        let out = a.check(&Tick { pre: true, ok: false }).unwrap();
        assert!(out.is_genuine_violation());
    }

    #[test]
    fn test_oracle_fault_leaves_state_untouched() {
        let mut a: Assertion<Tick> = Assertion::new(
            RuleId::new(126, 0),
            "faulty",
            |_| Ok(true),
            |_| Err(RulemonError::config("speed limit missing")),
        );
        let err = a.check(&Tick { pre: true, ok: true }).unwrap_err();
        match err {
            RulemonError::Oracle { rule, message } => {
                assert_eq!(rule, "126.0");
                assert!(message.contains("speed limit"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!a.covered());
        assert!(!a.violated());
    }

    #[test]
    fn test_validity_gates_activity() {
        use crate::coverage::{
            CoverageSample, CoverageSpace, CoverageValue, CoverageVariable, TimeOfDay,
            VariableDecl,
        };
        let space =
            CoverageSpace::new(&[VariableDecl::symbolic(CoverageVariable::TimeOfDay)]).unwrap();
        let night = ValidityRequirement::new()
            .allow(
                CoverageVariable::TimeOfDay,
                [CoverageValue::TimeOfDay(TimeOfDay::Night)],
            )
            .unwrap();
        let a = probe_assertion(Trigger::Level).with_validity(night);
        let day = space
            .key(&CoverageSample::new().with(CoverageValue::TimeOfDay(TimeOfDay::Day)))
            .unwrap();
        let dark = space
            .key(&CoverageSample::new().with(CoverageValue::TimeOfDay(TimeOfDay::Night)))
            .unwrap();
        assert!(!a.is_active(&day));
        assert!(a.is_active(&dark));
    }
}
