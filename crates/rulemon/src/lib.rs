//! Rulemon: runtime rule monitor for driving scenarios
//!
//! At a fixed tick the monitor samples the vehicle under test and its
//! surroundings, evaluates traffic-rule assertions against the sample and
//! records which combinations of environment conditions and rule outcomes
//! have been exercised.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   snapshot   ┌──────────────┐   TickContext   ┌────────────┐
//! │ WorldSource  │─────────────►│   Monitor    │────────────────►│ Assertions │
//! │ (sim/script) │              │ (tick loop)  │◄────────────────│ (rules)    │
//! └──────────────┘              └──────┬───────┘   outcomes      └────────────┘
//!        ▲ EventSink                   │ key + {valid, covered, violated}
//!        │                             ▼
//! ┌──────┴───────┐              ┌──────────────┐     ┌────────────┐
//! │ sensor       │              │ Coverage     │────►│ CSV file   │
//! │ callbacks    │              │ Tracker      │     └────────────┘
//! └──────────────┘              └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rulemon::{Monitor, MonitorConfig, Scenario};
//!
//! let world = Scenario::StationaryCollision.world("hero")?;
//! let mut monitor = Monitor::new(world, MonitorConfig::default())?;
//! let summary = monitor.run()?;
//! println!("score {}", summary.score);
//! # Ok::<(), rulemon::RulemonError>(())
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod assertion;
mod config;
/// Combinatorial coverage space, lattice and persistence
pub mod coverage;
mod events;
mod geometry;
mod junction;
mod monitor;
mod result;
mod road;
/// Built-in traffic rules
#[allow(clippy::unnecessary_wraps)]
pub mod rules;
/// Scripted worlds
pub mod scenario;
mod score;
mod world;

pub use assertion::{Assertion, CheckOutcome, Oracle, Probe, RuleId, Trigger};
pub use config::{default_coverage_space, MonitorConfig};
pub use coverage::{
    CellState, CoverageKey, CoverageSpace, CoverageStore, CoverageSummary, CoverageTracker,
    CoverageValue, CoverageVariable, CsvCoverageFile, MemoryCoverageStore, ValidityRequirement,
    VariableDecl,
};
pub use events::{
    EventAccumulator, EventSink, LaneMarking, MarkingColor, MarkingKind, SimEvent, TickEvents,
};
pub use geometry::{line_intersection, BoundingBox, Transform, Vec2, Vec3, EPSILON};
pub use junction::{
    vehicle_in_junction, JunctionClassifier, JunctionQuadrant, JunctionState, JunctionStatus,
    PartitionedJunction, JUNCTION_Z_MARGIN,
};
pub use monitor::{Monitor, RunSummary, StopHandle, StopReason, TickReport};
pub use result::{RulemonError, RulemonResult};
pub use road::{
    road_graph_shape, Junction, JunctionId, LaneGraph, LaneGraphBuilder, RoadMap, Waypoint,
    WaypointId,
};
pub use rules::TickContext;
pub use scenario::{Scenario, ScriptedWorld};
pub use score::ScoreStore;
pub use world::{
    ActorState, Control, CoverageSampler, JsonLinesWorld, LightState, Weather, WorldSnapshot,
    WorldSource,
};
