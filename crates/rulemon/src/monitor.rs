//! Tick orchestrator.
//!
//! Every tick the monitor pulls one snapshot, refreshes the junction
//! episode, drains sensor events, projects the world onto the coverage
//! space and runs the assertion pool in two phases: every active oracle is
//! evaluated first, and only if none of them faulted are the results folded
//! into the assertions, the coverage lattice and the score. Events drained
//! for a faulted tick are carried into the next one.

use crate::assertion::{Assertion, CheckOutcome, RuleId};
use crate::config::MonitorConfig;
use crate::coverage::{
    CoverageKey, CoverageStore, CoverageSummary, CoverageTracker, CsvCoverageFile, TimeOfDay,
    TrackerUpdate,
};
use crate::events::{EventAccumulator, EventSink, TickEvents};
use crate::junction::{JunctionClassifier, JunctionState, JunctionStatus};
use crate::result::{RulemonError, RulemonResult};
use crate::road::road_graph_shape;
use crate::rules::{default_rules, TickContext};
use crate::score::ScoreStore;
use crate::world::{CoverageSampler, WorldSource};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Cross-thread request to end [`Monitor::run`] after the current tick
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Ask the loop to stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop was requested
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Simulator frame
    pub frame: u64,
    /// Macro case of the tick
    pub key: CoverageKey,
    /// Junction classification in force
    pub junction: JunctionState,
    /// Events drained for the tick
    pub events: TickEvents,
    /// Outcome of every evaluated assertion
    pub outcomes: Vec<(RuleId, CheckOutcome)>,
    /// Rules that failed genuinely for the first time
    pub bugs_found: Vec<RuleId>,
    /// Rules that failed vacuously for the first time
    pub unfair_tests: Vec<RuleId>,
    /// Score change
    pub score_delta: i64,
    /// Score after the change
    pub score: i64,
    /// Lattice changes
    pub coverage: TrackerUpdate,
}

/// Why [`Monitor::run`] returned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The world produced no more snapshots
    #[default]
    WorldEnded,
    /// `max_ticks` was reached
    TickLimit,
    /// A [`StopHandle`] fired
    Stopped,
}

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Ticks attempted
    pub ticks: u64,
    /// Ticks skipped because an oracle faulted
    pub faulted_ticks: u64,
    /// Genuine first violations
    pub bugs_found: usize,
    /// Vacuous first violations
    pub unfair_tests: usize,
    /// Cells that entered `COVERED` or `BUG`
    pub newly_covered: usize,
    /// Score at the end of the run
    pub score: i64,
    /// Lattice totals at the end of the run
    pub coverage: CoverageSummary,
    /// Why the loop ended
    pub stop_reason: StopReason,
    /// Wall-clock time
    pub duration: Duration,
}

impl RunSummary {
    fn record(&mut self, report: &TickReport) {
        self.bugs_found += report.bugs_found.len();
        self.unfair_tests += report.unfair_tests.len();
        self.newly_covered += report.coverage.newly_covered;
    }
}

/// Runtime monitor over a [`WorldSource`]
#[derive(Debug)]
pub struct Monitor<W> {
    world: W,
    config: MonitorConfig,
    assertions: Vec<Assertion<TickContext>>,
    retired: Vec<Assertion<TickContext>>,
    tracker: CoverageTracker,
    score: ScoreStore,
    events: EventAccumulator,
    carried: TickEvents,
    classifier: JunctionClassifier,
    sampler: CoverageSampler,
    junction: JunctionStatus,
    stop: StopHandle,
    ticks: u64,
}

impl<W: WorldSource> Monitor<W> {
    /// Monitor the built-in rule catalogue, persisting to the configured files
    pub fn new(world: W, config: MonitorConfig) -> RulemonResult<Self> {
        let rules = default_rules(config.emergency_radius)?;
        let store = Box::new(CsvCoverageFile::new(config.coverage_path.clone()));
        Self::with_rules(world, config, rules, store)
    }

    /// Monitor an explicit assertion pool against an explicit coverage store
    pub fn with_rules(
        mut world: W,
        config: MonitorConfig,
        assertions: Vec<Assertion<TickContext>>,
        store: Box<dyn CoverageStore>,
    ) -> RulemonResult<Self> {
        config.validate()?;
        let bins = assertions
            .iter()
            .map(|a| (a.id(), a.validity().cloned()))
            .collect();
        let tracker = CoverageTracker::new(config.space()?, bins, store)?;
        let score = ScoreStore::open(config.score_path.clone())?;

        let events = EventAccumulator::new();
        world.attach_events(events.sink());
        let classifier = JunctionClassifier::new()
            .with_lookback(config.lookahead)
            .with_lane_width_multiple(config.lane_width_multiple);
        let sampler = CoverageSampler::new(config.speed_limit()?);

        Ok(Self {
            world,
            config,
            assertions,
            retired: Vec::new(),
            tracker,
            score,
            events,
            carried: TickEvents::default(),
            classifier,
            sampler,
            junction: JunctionStatus::none(),
            stop: StopHandle::default(),
            ticks: 0,
        })
    }

    /// Handle for sensor callbacks
    #[must_use]
    pub fn event_sink(&self) -> EventSink {
        self.events.sink()
    }

    /// Handle that ends [`Self::run`]
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Assertions still in the pool
    #[must_use]
    pub fn assertions(&self) -> &[Assertion<TickContext>] {
        &self.assertions
    }

    /// Assertions retired after their first violation.
    ///
    /// They are no longer evaluated but still mark their bins valid.
    #[must_use]
    pub fn retired(&self) -> &[Assertion<TickContext>] {
        &self.retired
    }

    /// The coverage lattice
    #[must_use]
    pub const fn tracker(&self) -> &CoverageTracker {
        &self.tracker
    }

    /// Current junction episode
    #[must_use]
    pub const fn junction(&self) -> &JunctionStatus {
        &self.junction
    }

    /// Snapshots consumed so far
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The world being monitored
    #[must_use]
    pub const fn world(&self) -> &W {
        &self.world
    }

    /// Run one tick; `Ok(None)` once the world has ended.
    ///
    /// An oracle fault is returned before any assertion, cell or score is
    /// touched, and the tick's events are kept for the next tick. A missing
    /// ego is fatal.
    pub fn tick(&mut self) -> RulemonResult<Option<TickReport>> {
        let Some(snapshot) = self.world.next_snapshot()? else {
            return Ok(None);
        };
        self.ticks += 1;
        let frame = snapshot.frame;
        let weather = snapshot.weather;
        let (ego, others) = snapshot.split_ego(&self.config.ego_role)?;

        let map = self.world.road_map();
        let ego_waypoint = map.nearest_waypoint(ego.location());
        let current = ego_waypoint.and_then(|w| w.junction);
        if current != self.junction.junction_id() {
            self.junction = match current {
                Some(id) => match map.junction(id) {
                    Some(junction) => {
                        let status = self.classifier.classify(map, &junction, ego.location());
                        info!(frame, junction = id, state = %status.state, "entered junction");
                        status
                    }
                    None => {
                        warn!(frame, junction = id, "waypoint references an unknown junction");
                        JunctionStatus::none()
                    }
                },
                None => {
                    debug!(frame, "left junction");
                    JunctionStatus::none()
                }
            };
        }

        let shape = road_graph_shape(
            map,
            &ego.transform,
            self.junction.junction.as_ref(),
            self.config.lookahead,
        );
        let sample = self
            .sampler
            .sample(self.tracker.space(), &ego, &others, &weather, shape);
        let key = self.tracker.space().key(&sample)?;
        let events = self
            .events
            .drain()
            .merged(std::mem::take(&mut self.carried));

        let speed_limit = self.sampler.speed_limit(&ego);
        let ctx = TickContext {
            ego,
            others,
            junction: self.junction.clone(),
            events,
            speed_limit,
            time_of_day: TimeOfDay::from_sun_altitude(weather.sun_altitude_angle),
            ego_waypoint,
        };

        let probes = match self
            .assertions
            .iter()
            .map(|a| {
                if a.is_active(&key) {
                    a.evaluate(&ctx).map(Some)
                } else {
                    Ok(None)
                }
            })
            .collect::<RulemonResult<Vec<_>>>()
        {
            Ok(probes) => probes,
            Err(err) => {
                self.carried = events;
                return Err(err);
            }
        };

        let mut report = TickReport {
            frame,
            key,
            junction: self.junction.state,
            events,
            outcomes: Vec::new(),
            bugs_found: Vec::new(),
            unfair_tests: Vec::new(),
            score_delta: 0,
            score: 0,
            coverage: TrackerUpdate::default(),
        };
        let mut valid = BTreeSet::new();
        let mut covered = BTreeSet::new();
        let mut violated = BTreeSet::new();

        for (assertion, probe) in self.assertions.iter_mut().zip(probes) {
            let Some(probe) = probe else {
                assertion.skip_tick();
                continue;
            };
            let id = assertion.id();
            let outcome = assertion.apply(probe);
            valid.insert(id);
            if outcome.precondition_active {
                covered.insert(id);
            }
            if outcome.is_genuine_violation() {
                violated.insert(id);
            }
            if outcome.first_violation {
                if outcome.vacuous {
                    warn!(frame, rule = %id, description = assertion.description(), "unfair test");
                    report.unfair_tests.push(id);
                    report.score_delta -= 1;
                } else {
                    info!(frame, rule = %id, description = assertion.description(), "bug found");
                    report.bugs_found.push(id);
                    report.score_delta += 1;
                }
            }
            report.outcomes.push((id, outcome));
        }

        if self.config.retire_violated {
            let (retired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.assertions)
                .into_iter()
                .partition(Assertion::violated);
            for assertion in &retired {
                debug!(rule = %assertion.id(), "assertion retired");
            }
            self.assertions = kept;
            self.retired.extend(retired);
        }
        valid.extend(
            self.retired
                .iter()
                .filter(|a| a.is_active(&report.key))
                .map(Assertion::id),
        );

        report.coverage = self
            .tracker
            .update(&report.key, &valid, &covered, &violated)?;
        report.score = self.score.add(report.score_delta)?;
        trace!(frame, key = %report.key, evaluated = report.outcomes.len(), "tick complete");
        Ok(Some(report))
    }

    /// Run until the world ends, the tick budget is spent or a stop is
    /// requested
    pub fn run(&mut self) -> RulemonResult<RunSummary> {
        self.run_with(|_| {})
    }

    /// [`Self::run`], calling `on_tick` after every completed tick
    pub fn run_with(&mut self, mut on_tick: impl FnMut(&TickReport)) -> RulemonResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        info!(
            rules = self.assertions.len(),
            space = self.tracker.space().size(),
            reachable = self.tracker.reachable_size(),
            "monitor started"
        );

        summary.stop_reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Stopped;
            }
            if self.config.max_ticks.is_some_and(|max| summary.ticks >= max) {
                break StopReason::TickLimit;
            }
            let tick_started = Instant::now();
            match self.tick() {
                Ok(Some(report)) => {
                    summary.ticks += 1;
                    summary.record(&report);
                    on_tick(&report);
                }
                Ok(None) => break StopReason::WorldEnded,
                Err(err @ RulemonError::Oracle { .. }) => {
                    summary.ticks += 1;
                    summary.faulted_ticks += 1;
                    warn!(error = %err, "oracle fault, tick skipped");
                }
                Err(err) => {
                    error!(error = %err, "monitor aborted");
                    return Err(err);
                }
            }
            if let Some(rest) = self.config.tick_interval().checked_sub(tick_started.elapsed()) {
                thread::sleep(rest);
            }
        };

        summary.coverage = self.tracker.summary();
        summary.score = self.score.read()?;
        summary.duration = started.elapsed();
        info!(
            ticks = summary.ticks,
            bugs = summary.bugs_found,
            unfair = summary.unfair_tests,
            score = summary.score,
            reason = ?summary.stop_reason,
            "monitor finished"
        );
        Ok(summary)
    }
}
