//! Built-in scripted worlds.
//!
//! Each [`Scenario`] is a deterministic sequence of snapshots over a small
//! synthetic lane graph, sampled every [`FRAME_SECONDS`]. Vehicles follow
//! straight-legged routes at constant speed; steering is reported for the
//! last and first couple of metres around each bend.

use crate::events::{EventSink, SimEvent};
use crate::geometry::{BoundingBox, Transform, Vec2, Vec3, EPSILON};
use crate::result::{RulemonError, RulemonResult};
use crate::road::{JunctionId, LaneGraph, RoadMap, WaypointId};
use crate::world::{ActorState, Control, LightState, Weather, WorldSnapshot, WorldSource};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Simulated time between two snapshots, seconds
pub const FRAME_SECONDS: f64 = 0.1;

/// Junction id used by [`t_junction_map`]
pub const T_JUNCTION_ID: JunctionId = 1;

const LANE_WIDTH: f64 = 4.0;
const SPACING: f64 = 2.0;
const TURN_WINDOW: f64 = 2.0;
const STEER: f64 = 0.5;

/// World that replays a fixed list of snapshots
#[derive(Debug)]
pub struct ScriptedWorld {
    map: LaneGraph,
    frames: VecDeque<WorldSnapshot>,
    sink: Option<EventSink>,
}

impl ScriptedWorld {
    /// Replay `frames` against `map`
    pub fn new(map: LaneGraph, frames: impl IntoIterator<Item = WorldSnapshot>) -> Self {
        Self {
            map,
            frames: frames.into_iter().collect(),
            sink: None,
        }
    }

    /// Snapshots not yet handed out
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// The lane graph
    #[must_use]
    pub const fn map(&self) -> &LaneGraph {
        &self.map
    }
}

impl WorldSource for ScriptedWorld {
    fn next_snapshot(&mut self) -> RulemonResult<Option<WorldSnapshot>> {
        let Some(mut snapshot) = self.frames.pop_front() else {
            return Ok(None);
        };
        snapshot.dispatch_events(self.sink.as_ref());
        Ok(Some(snapshot))
    }

    fn road_map(&self) -> &dyn RoadMap {
        &self.map
    }

    fn attach_events(&mut self, sink: EventSink) {
        self.sink = Some(sink);
    }
}

/// Built-in scenario selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Ego drives into a parked car on a straight road
    StationaryCollision,
    /// Ego emerges from the minor arm of a T-junction across major traffic
    TJunctionMinor,
    /// Ego turns off the major road across oncoming traffic
    TJunctionMajor,
}

impl Scenario {
    /// Every built-in scenario
    pub const ALL: [Self; 3] = [
        Self::StationaryCollision,
        Self::TJunctionMinor,
        Self::TJunctionMajor,
    ];

    /// Selector name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StationaryCollision => "stationary-collision",
            Self::TJunctionMinor => "t-junction-minor",
            Self::TJunctionMajor => "t-junction-major",
        }
    }

    /// Look up a scenario by selector name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// One-line summary
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::StationaryCollision => "drive into a parked car on a straight 30 km/h road",
            Self::TJunctionMinor => "leave the minor arm of a T-junction while major traffic passes",
            Self::TJunctionMajor => "turn off the major road across an oncoming car",
        }
    }

    /// Build the scripted world, tagging the ego with `ego_role`
    pub fn world(self, ego_role: &str) -> RulemonResult<ScriptedWorld> {
        let world = match self {
            Self::StationaryCollision => stationary_collision(ego_role)?,
            Self::TJunctionMinor => t_junction_minor(ego_role)?,
            Self::TJunctionMajor => t_junction_major(ego_role)?,
        };
        debug!(scenario = self.name(), frames = world.remaining(), "scenario built");
        Ok(world)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = RulemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|s| s.name()).collect();
            RulemonError::config(format!("unknown scenario '{s}' (known: {})", known.join(", ")))
        })
    }
}

const fn v(x: f64, y: f64) -> Vec2 {
    Vec2::new(x, y)
}

fn last(ids: &[WaypointId]) -> RulemonResult<WaypointId> {
    ids.last()
        .copied()
        .ok_or_else(|| RulemonError::config("lane produced no waypoints"))
}

fn first(ids: &[WaypointId]) -> RulemonResult<WaypointId> {
    ids.first()
        .copied()
        .ok_or_else(|| RulemonError::config("lane produced no waypoints"))
}

/// Two-lane road along the x axis, eastbound at y = 2, westbound at y = -2
pub fn straight_road() -> RulemonResult<LaneGraph> {
    let mut b = LaneGraph::builder();
    b.lane(v(-100.0, 2.0), v(100.0, 2.0), SPACING, LANE_WIDTH, None);
    b.lane(v(100.0, -2.0), v(-100.0, -2.0), SPACING, LANE_WIDTH, None);
    b.build()
}

/// T-junction centred on the origin.
///
/// The major road runs along the x axis (eastbound at y = 2, westbound at
/// y = -2); the minor arm joins from negative y (northbound at x = -2,
/// southbound at x = 2). Junction waypoints sit on the 20 m box edges.
pub fn t_junction_map() -> RulemonResult<LaneGraph> {
    let j = Some(T_JUNCTION_ID);
    let mut b = LaneGraph::builder();

    let east_in = b.lane(v(-60.0, 2.0), v(-12.0, 2.0), SPACING, LANE_WIDTH, None);
    let from_west = b.waypoint(v(-10.0, 2.0), 0.0, LANE_WIDTH, j);
    let to_east = b.waypoint(v(10.0, 2.0), 0.0, LANE_WIDTH, j);
    let east_out = b.lane(v(12.0, 2.0), v(60.0, 2.0), SPACING, LANE_WIDTH, None);

    let west_in = b.lane(v(60.0, -2.0), v(12.0, -2.0), SPACING, LANE_WIDTH, None);
    let from_east = b.waypoint(v(10.0, -2.0), 180.0, LANE_WIDTH, j);
    let to_west = b.waypoint(v(-10.0, -2.0), 180.0, LANE_WIDTH, j);
    let west_out = b.lane(v(-12.0, -2.0), v(-60.0, -2.0), SPACING, LANE_WIDTH, None);

    let north_in = b.lane(v(-2.0, -60.0), v(-2.0, -12.0), SPACING, LANE_WIDTH, None);
    let from_south = b.waypoint(v(-2.0, -10.0), 90.0, LANE_WIDTH, j);
    let to_south = b.waypoint(v(2.0, -10.0), -90.0, LANE_WIDTH, j);
    let south_out = b.lane(v(2.0, -12.0), v(2.0, -60.0), SPACING, LANE_WIDTH, None);

    b.link(last(&east_in)?, from_west)
        .link(to_east, first(&east_out)?)
        .link(last(&west_in)?, from_east)
        .link(to_west, first(&west_out)?)
        .link(last(&north_in)?, from_south)
        .link(to_south, first(&south_out)?);

    let segments = vec![
        (from_west, to_east),
        (from_west, to_south),
        (from_east, to_west),
        (from_east, to_south),
        (from_south, to_east),
        (from_south, to_west),
    ];
    for (entry, exit) in &segments {
        b.link(*entry, *exit);
    }
    b.junction(
        T_JUNCTION_ID,
        BoundingBox::new(Vec3::zero(), Vec3::new(10.0, 10.0, 2.0), 0.0),
        segments,
    );
    b.build()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RoutePose {
    location: Vec2,
    direction: Vec2,
    steer: f64,
    finished: bool,
}

impl RoutePose {
    fn yaw_deg(&self) -> f64 {
        self.direction.y.atan2(self.direction.x).to_degrees()
    }
}

/// Polyline followed at constant speed
#[derive(Debug, Clone, PartialEq)]
struct Route {
    points: Vec<Vec2>,
}

impl Route {
    fn new(points: &[(f64, f64)]) -> Self {
        Self {
            points: points.iter().map(|&(x, y)| v(x, y)).collect(),
        }
    }

    fn direction(from: Vec2, to: Vec2) -> Vec2 {
        (to - from).normalized().unwrap_or_else(|| v(1.0, 0.0))
    }

    fn turn(before: Vec2, after: Vec2) -> f64 {
        let cross = before.x * after.y - before.y * after.x;
        if cross > EPSILON {
            STEER
        } else if cross < -EPSILON {
            -STEER
        } else {
            0.0
        }
    }

    fn pose_at(&self, distance: f64) -> RoutePose {
        let legs: Vec<(Vec2, Vec2)> = self.points.windows(2).map(|w| (w[0], w[1])).collect();
        let final_leg = legs.len().saturating_sub(1);
        let mut remaining = distance.max(0.0);

        for (i, &(from, to)) in legs.iter().enumerate() {
            let length = from.distance(to);
            if remaining > length && i < final_leg {
                remaining -= length;
                continue;
            }
            let direction = Self::direction(from, to);
            let travelled = remaining.min(length);
            let steer = if length - travelled < TURN_WINDOW && i < final_leg {
                let (next_from, next_to) = legs[i + 1];
                Self::turn(direction, Self::direction(next_from, next_to))
            } else if travelled < TURN_WINDOW && i > 0 {
                let (prev_from, prev_to) = legs[i - 1];
                Self::turn(Self::direction(prev_from, prev_to), direction)
            } else {
                0.0
            };
            return RoutePose {
                location: from + direction * travelled,
                direction,
                steer,
                finished: remaining >= length,
            };
        }

        RoutePose {
            location: self.points.first().copied().unwrap_or_else(Vec2::zero),
            direction: v(1.0, 0.0),
            steer: 0.0,
            finished: true,
        }
    }
}

/// A vehicle following a route
#[derive(Debug, Clone)]
struct Mover {
    id: u32,
    type_id: &'static str,
    route: Route,
    speed: f64,
    role: Option<String>,
    speed_limit: Option<f64>,
}

impl Mover {
    fn new(id: u32, type_id: &'static str, route: Route, speed: f64) -> Self {
        Self {
            id,
            type_id,
            route,
            speed,
            role: None,
            speed_limit: None,
        }
    }

    fn ego(role: &str, route: Route, speed: f64, speed_limit: f64) -> Self {
        Self {
            role: Some(role.to_string()),
            speed_limit: Some(speed_limit),
            ..Self::new(1, "vehicle.tesla.model3", route, speed)
        }
    }

    fn at_frame(&self, frame: u64) -> ActorState {
        let pose = self
            .route
            .pose_at(self.speed * FRAME_SECONDS * frame as f64);
        let moving = !pose.finished && self.speed > 0.0;
        let control = if moving {
            Control {
                steer: pose.steer,
                throttle: 0.4,
                brake: 0.0,
            }
        } else {
            Control {
                brake: 1.0,
                ..Control::default()
            }
        };
        let velocity = if moving {
            Vec3::from(pose.direction * self.speed)
        } else {
            Vec3::zero()
        };
        let transform = Transform::new(pose.location.into(), pose.yaw_deg());
        let mut actor = ActorState::vehicle(self.id, self.type_id, transform)
            .with_velocity(velocity)
            .with_control(control)
            .with_lights(LightState {
                low_beam: true,
                ..LightState::default()
            });
        if let Some(role) = &self.role {
            actor = actor.with_role(role.clone());
        }
        if let Some(limit) = self.speed_limit {
            actor = actor.with_speed_limit(limit);
        }
        actor
    }
}

fn snapshot(frame: u64, actors: Vec<ActorState>, events: Vec<SimEvent>) -> WorldSnapshot {
    WorldSnapshot {
        frame,
        weather: Weather::clear_noon(),
        actors,
        events,
    }
}

fn play(map: LaneGraph, movers: &[Mover], frames: u64) -> ScriptedWorld {
    let snapshots = (0..frames).map(|frame| {
        let actors = movers.iter().map(|m| m.at_frame(frame)).collect();
        snapshot(frame, actors, Vec::new())
    });
    ScriptedWorld::new(map, snapshots)
}

fn stationary_collision(ego_role: &str) -> RulemonResult<ScriptedWorld> {
    let parked = ActorState::vehicle(
        2,
        "vehicle.audi.tt",
        Transform::new(Vec3::new(10.0, 2.0, 0.0), 0.0),
    );
    let ego = Mover::ego(ego_role, Route::new(&[(-20.0, 2.0), (100.0, 2.0)]), 6.0, 30.0);
    let contact = parked.location().x - parked.extent.x;

    let mut frames = Vec::new();
    let mut crashed: Option<ActorState> = None;
    for frame in 0..60 {
        let mut events = Vec::new();
        let state = if let Some(stopped) = &crashed {
            stopped.clone()
        } else {
            let moving = ego.at_frame(frame);
            if moving.location().x + moving.extent.x >= contact {
                events.push(SimEvent::Collision);
                crashed = Some(
                    moving
                        .clone()
                        .with_velocity(Vec3::zero())
                        .with_control(Control {
                            brake: 1.0,
                            ..Control::default()
                        }),
                );
            }
            moving
        };
        frames.push(snapshot(frame, vec![state, parked.clone()], events));
    }
    Ok(ScriptedWorld::new(straight_road()?, frames))
}

fn t_junction_minor(ego_role: &str) -> RulemonResult<ScriptedWorld> {
    let ego = Mover::ego(
        ego_role,
        Route::new(&[(-2.0, -40.0), (-2.0, -2.0), (-40.0, -2.0)]),
        5.0,
        50.0,
    );
    let traffic = Mover::new(
        2,
        "vehicle.audi.a2",
        Route::new(&[(-40.0, 2.0), (60.0, 2.0)]),
        8.0,
    );
    Ok(play(t_junction_map()?, &[ego, traffic], 140))
}

fn t_junction_major(ego_role: &str) -> RulemonResult<ScriptedWorld> {
    let ego = Mover::ego(
        ego_role,
        Route::new(&[(-40.0, 2.0), (2.0, 2.0), (2.0, -40.0)]),
        6.0,
        50.0,
    );
    let oncoming = Mover::new(
        2,
        "vehicle.nissan.micra",
        Route::new(&[(40.0, -2.0), (-60.0, -2.0)]),
        6.0,
    );
    Ok(play(t_junction_map()?, &[ego, oncoming], 120))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::events::EventAccumulator;

    #[test]
    fn test_names_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(Scenario::from_name(scenario.name()), Some(scenario));
            assert_eq!(scenario.to_string().parse::<Scenario>().unwrap(), scenario);
        }
        assert!("roundabout".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_t_junction_map_shape() {
        let map = t_junction_map().unwrap();
        let junction = map.junction(T_JUNCTION_ID).unwrap();
        assert_eq!(junction.segments.len(), 6);
        let entry = map.nearest_waypoint(Vec3::new(-10.0, 2.0, 0.0)).unwrap();
        assert_eq!(entry.junction, Some(T_JUNCTION_ID));
        let before = map.nearest_waypoint(Vec3::new(-20.0, 2.0, 0.0)).unwrap();
        assert_eq!(before.junction, None);
    }

    #[test]
    fn test_route_steers_around_bends() {
        let route = Route::new(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let start = route.pose_at(0.0);
        assert_eq!(start.steer, 0.0);
        assert!(!start.finished);
        let bend = route.pose_at(9.0);
        assert_eq!(bend.steer, STEER);
        let after = route.pose_at(15.0);
        assert!(after.location.distance(v(10.0, 5.0)) < 1e-9);
        assert!((after.yaw_deg() - 90.0).abs() < 1e-9);
        assert!(route.pose_at(25.0).finished);
    }

    #[test]
    fn test_collision_scenario_emits_one_collision() {
        let acc = EventAccumulator::new();
        let mut world = Scenario::StationaryCollision.world("hero").unwrap();
        world.attach_events(acc.sink());
        let mut collisions = 0;
        let mut stopped_frames = 0;
        while let Some(snapshot) = world.next_snapshot().unwrap() {
            if acc.drain().collision {
                collisions += 1;
            }
            let (ego, _) = snapshot.split_ego("hero").unwrap();
            if ego.speed() == 0.0 {
                stopped_frames += 1;
            }
        }
        assert_eq!(collisions, 1);
        assert!(stopped_frames > 10);
    }

    #[test]
    fn test_scenarios_carry_the_ego() {
        for scenario in Scenario::ALL {
            let mut world = scenario.world("ego").unwrap();
            assert!(world.remaining() > 0);
            let snapshot = world.next_snapshot().unwrap().unwrap();
            let (ego, others) = snapshot.split_ego("ego").unwrap();
            assert!(ego.speed() > 0.0);
            assert_eq!(others.len(), 1);
        }
    }
}
