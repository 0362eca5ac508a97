//! Out-of-band simulator events.
//!
//! Sensor callbacks may fire on any thread. They report through an
//! [`EventSink`]; the monitor drains the shared [`EventAccumulator`] once per
//! tick. Only "at least one event of this kind since the last drain" is
//! kept.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Lane marking style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkingKind {
    /// Broken line
    Broken,
    /// Solid line
    Solid,
    /// Double solid
    SolidSolid,
    /// Solid on the near side, broken on the far side
    SolidBroken,
    /// Broken on the near side, solid on the far side
    BrokenSolid,
    /// Double broken
    BrokenBroken,
    /// Botts' dots
    BottsDots,
    /// Grass verge
    Grass,
    /// Kerb
    Curb,
    /// No marking
    None,
}

impl MarkingKind {
    /// Crossing this marking is never permitted
    #[must_use]
    pub const fn is_solid(self) -> bool {
        matches!(self, Self::Solid | Self::SolidSolid)
    }
}

/// Lane marking colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkingColor {
    /// White
    White,
    /// Yellow
    Yellow,
    /// Anything else
    Other,
}

/// One crossed lane marking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaneMarking {
    /// Marking style
    pub kind: MarkingKind,
    /// Marking colour
    pub color: MarkingColor,
}

impl LaneMarking {
    /// Create a marking
    #[must_use]
    pub const fn new(kind: MarkingKind, color: MarkingColor) -> Self {
        Self { kind, color }
    }
}

/// A simulator notification, as carried by recorded or scripted worlds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    /// The ego crossed one or more lane markings
    LaneInvasion {
        /// Markings crossed
        markings: Vec<LaneMarking>,
    },
    /// The ego hit something
    Collision,
}

/// Event flags captured for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Some lane marking was crossed
    pub lane_invasion: bool,
    /// A solid marking was crossed
    pub solid_marking_crossed: bool,
    /// A yellow marking was crossed
    pub yellow_marking_crossed: bool,
    /// The ego collided with something
    pub collision: bool,
}

impl TickEvents {
    /// Union of two sets of flags
    #[must_use]
    pub const fn merged(self, other: Self) -> Self {
        Self {
            lane_invasion: self.lane_invasion || other.lane_invasion,
            solid_marking_crossed: self.solid_marking_crossed || other.solid_marking_crossed,
            yellow_marking_crossed: self.yellow_marking_crossed || other.yellow_marking_crossed,
            collision: self.collision || other.collision,
        }
    }
}

#[derive(Debug, Default)]
struct Flags {
    lane_invasion: AtomicBool,
    solid_marking_crossed: AtomicBool,
    yellow_marking_crossed: AtomicBool,
    collision: AtomicBool,
}

/// Producer handle for event callbacks
#[derive(Debug, Clone)]
pub struct EventSink {
    flags: Arc<Flags>,
}

impl EventSink {
    /// Report crossed lane markings
    pub fn lane_invasion(&self, markings: &[LaneMarking]) {
        trace!(count = markings.len(), "lane invasion");
        self.flags.lane_invasion.store(true, Ordering::Release);
        if markings.iter().any(|m| m.kind.is_solid()) {
            self.flags.solid_marking_crossed.store(true, Ordering::Release);
        }
        if markings.iter().any(|m| m.color == MarkingColor::Yellow) {
            self.flags.yellow_marking_crossed.store(true, Ordering::Release);
        }
    }

    /// Report a collision
    pub fn collision(&self) {
        trace!("collision");
        self.flags.collision.store(true, Ordering::Release);
    }

    /// Report a recorded event
    pub fn emit(&self, event: &SimEvent) {
        match event {
            SimEvent::LaneInvasion { markings } => self.lane_invasion(markings),
            SimEvent::Collision => self.collision(),
        }
    }
}

/// Single-consumer side of the event flags
#[derive(Debug, Default)]
pub struct EventAccumulator {
    flags: Arc<Flags>,
}

impl EventAccumulator {
    /// Create an accumulator with all flags clear
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// New producer handle
    #[must_use]
    pub fn sink(&self) -> EventSink {
        EventSink {
            flags: Arc::clone(&self.flags),
        }
    }

    /// Take the flags raised since the last drain and clear them
    pub fn drain(&self) -> TickEvents {
        TickEvents {
            lane_invasion: self.flags.lane_invasion.swap(false, Ordering::AcqRel),
            solid_marking_crossed: self.flags.solid_marking_crossed.swap(false, Ordering::AcqRel),
            yellow_marking_crossed: self
                .flags
                .yellow_marking_crossed
                .swap(false, Ordering::AcqRel),
            collision: self.flags.collision.swap(false, Ordering::AcqRel),
        }
    }
}
