//! Road topology queries.
//!
//! [`RoadMap`] is the lane-graph interface the monitor needs from the
//! simulator; [`LaneGraph`] is a serialisable in-memory implementation used
//! for scripted worlds and for maps exported alongside live runs.

use crate::coverage::RoadGraph;
use crate::geometry::{BoundingBox, Transform, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

/// Junction identifier
pub type JunctionId = u32;

/// Waypoint identifier
pub type WaypointId = u32;

/// A point on a lane centre line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Unique id
    pub id: WaypointId,
    /// Pose along the lane
    pub transform: Transform,
    /// Lane width in metres
    pub lane_width: f64,
    /// Junction this waypoint lies in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub junction: Option<JunctionId>,
}

impl Waypoint {
    /// Ground-plane location
    #[must_use]
    pub const fn location(&self) -> Vec2 {
        self.transform.location.xy()
    }
}

/// A junction with its entry/exit lane segments resolved to waypoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    /// Junction id
    pub id: JunctionId,
    /// Area covered by the junction
    pub bounding_box: BoundingBox,
    /// `(entry, exit)` pairs of every lane crossing the junction
    pub segments: Vec<(Waypoint, Waypoint)>,
}

/// Lane-graph queries used by the monitor
pub trait RoadMap {
    /// Waypoint closest to a location
    fn nearest_waypoint(&self, location: Vec3) -> Option<Waypoint>;

    /// Waypoints roughly `distance` metres ahead, one per branch
    fn next(&self, waypoint: &Waypoint, distance: f64) -> Vec<Waypoint>;

    /// Waypoints roughly `distance` metres behind, one per branch
    fn previous(&self, waypoint: &Waypoint, distance: f64) -> Vec<Waypoint>;

    /// Junction by id
    fn junction(&self, id: JunctionId) -> Option<Junction>;
}

/// Connectivity shape around a pose.
///
/// Inside a junction each segment end is bucketed by its bearing from the
/// junction centre relative to the heading; the approach is always counted
/// as behind. Outside, the shape is ahead if the lane continues and behind
/// if it has a predecessor. A pose with no connections reports a dead end.
#[must_use]
pub fn road_graph_shape(
    map: &dyn RoadMap,
    pose: &Transform,
    junction: Option<&Junction>,
    lookahead: f64,
) -> RoadGraph {
    let dead_end = RoadGraph::Fftf;
    let Some(junction) = junction else {
        let Some(wp) = map.nearest_waypoint(pose.location) else {
            return dead_end;
        };
        let ahead = !map.next(&wp, lookahead).is_empty();
        let behind = !map.previous(&wp, lookahead).is_empty();
        return RoadGraph::from_flags(ahead, false, behind, false).unwrap_or(dead_end);
    };

    let centre = junction.bounding_box.location.xy();
    let forward = pose.forward_vector();
    let right = pose.right_vector();
    let (mut ahead, mut rightward, mut leftward) = (false, false, false);
    for (entry, exit) in &junction.segments {
        for end in [entry, exit] {
            let bearing = end.location() - centre;
            let (f, r) = (bearing.dot(forward), bearing.dot(right));
            if f.abs() >= r.abs() {
                ahead |= f > 0.0;
            } else if r > 0.0 {
                rightward = true;
            } else {
                leftward = true;
            }
        }
    }
    RoadGraph::from_flags(ahead, rightward, true, leftward).unwrap_or(dead_end)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JunctionRecord {
    id: JunctionId,
    bounding_box: BoundingBox,
    segments: Vec<(WaypointId, WaypointId)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LaneGraphRecord {
    waypoints: Vec<Waypoint>,
    #[serde(default)]
    links: Vec<(WaypointId, WaypointId)>,
    #[serde(default)]
    junctions: Vec<JunctionRecord>,
}

/// In-memory lane graph.
///
/// Serialises as `{ waypoints, links, junctions }` where `links` are
/// successor edges and junction segments reference waypoint ids.
#[derive(Debug, Clone)]
pub struct LaneGraph {
    record: LaneGraphRecord,
    index: HashMap<WaypointId, usize>,
    successors: HashMap<WaypointId, Vec<WaypointId>>,
    predecessors: HashMap<WaypointId, Vec<WaypointId>>,
}

impl Serialize for LaneGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.record.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LaneGraph {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = LaneGraphRecord::deserialize(deserializer)?;
        Self::from_record(record).map_err(serde::de::Error::custom)
    }
}

impl LaneGraph {
    fn from_record(record: LaneGraphRecord) -> crate::RulemonResult<Self> {
        let mut index = HashMap::new();
        for (i, wp) in record.waypoints.iter().enumerate() {
            if index.insert(wp.id, i).is_some() {
                return Err(crate::RulemonError::topology(format!(
                    "duplicate waypoint id {}",
                    wp.id
                )));
            }
        }
        let known = |id: &WaypointId| index.contains_key(id);

        let mut successors: HashMap<WaypointId, Vec<WaypointId>> = HashMap::new();
        let mut predecessors: HashMap<WaypointId, Vec<WaypointId>> = HashMap::new();
        for (from, to) in &record.links {
            if !known(from) || !known(to) {
                return Err(crate::RulemonError::topology(format!(
                    "link {from} -> {to} references an unknown waypoint"
                )));
            }
            successors.entry(*from).or_default().push(*to);
            predecessors.entry(*to).or_default().push(*from);
        }

        let mut junction_ids = HashSet::new();
        for junction in &record.junctions {
            if !junction_ids.insert(junction.id) {
                return Err(crate::RulemonError::topology(format!(
                    "duplicate junction id {}",
                    junction.id
                )));
            }
            if let Some((a, b)) = junction
                .segments
                .iter()
                .find(|(a, b)| !known(a) || !known(b))
            {
                return Err(crate::RulemonError::topology(format!(
                    "junction {} segment {a} -> {b} references an unknown waypoint",
                    junction.id
                )));
            }
        }

        Ok(Self {
            record,
            index,
            successors,
            predecessors,
        })
    }

    /// Start building a graph
    #[must_use]
    pub fn builder() -> LaneGraphBuilder {
        LaneGraphBuilder::default()
    }

    /// Parse a graph from JSON
    pub fn from_json(text: &str) -> crate::RulemonResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Waypoint by id
    #[must_use]
    pub fn waypoint(&self, id: WaypointId) -> Option<Waypoint> {
        self.index.get(&id).map(|&i| self.record.waypoints[i])
    }

    /// Number of waypoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.record.waypoints.len()
    }

    /// Graph has no waypoints
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record.waypoints.is_empty()
    }

    fn walk(
        &self,
        start: &Waypoint,
        distance: f64,
        edges: &HashMap<WaypointId, Vec<WaypointId>>,
    ) -> Vec<Waypoint> {
        let mut reached = Vec::new();
        let mut visited = HashSet::from([start.id]);
        let mut queue = VecDeque::from([(*start, 0.0_f64)]);

        while let Some((wp, travelled)) = queue.pop_front() {
            let children: Vec<Waypoint> = edges
                .get(&wp.id)
                .into_iter()
                .flatten()
                .filter_map(|id| self.waypoint(*id))
                .collect();
            if children.is_empty() && wp.id != start.id {
                // lane ends before the requested distance
                reached.push(wp);
                continue;
            }
            for child in children {
                if !visited.insert(child.id) {
                    continue;
                }
                let total = travelled + child.location().distance(wp.location());
                if total >= distance {
                    reached.push(child);
                } else {
                    queue.push_back((child, total));
                }
            }
        }
        reached
    }
}

impl RoadMap for LaneGraph {
    fn nearest_waypoint(&self, location: Vec3) -> Option<Waypoint> {
        let point = location.xy();
        self.record
            .waypoints
            .iter()
            .min_by(|a, b| {
                a.location()
                    .distance(point)
                    .total_cmp(&b.location().distance(point))
            })
            .copied()
    }

    fn next(&self, waypoint: &Waypoint, distance: f64) -> Vec<Waypoint> {
        self.walk(waypoint, distance, &self.successors)
    }

    fn previous(&self, waypoint: &Waypoint, distance: f64) -> Vec<Waypoint> {
        self.walk(waypoint, distance, &self.predecessors)
    }

    fn junction(&self, id: JunctionId) -> Option<Junction> {
        let record = self.record.junctions.iter().find(|j| j.id == id)?;
        let segments = record
            .segments
            .iter()
            .filter_map(|(entry, exit)| Some((self.waypoint(*entry)?, self.waypoint(*exit)?)))
            .collect();
        Some(Junction {
            id,
            bounding_box: record.bounding_box,
            segments,
        })
    }
}

/// Incremental [`LaneGraph`] construction
#[derive(Debug, Default)]
pub struct LaneGraphBuilder {
    record: LaneGraphRecord,
    next_id: WaypointId,
}

impl LaneGraphBuilder {
    /// Add a waypoint and return its id
    pub fn waypoint(
        &mut self,
        location: Vec2,
        yaw_deg: f64,
        lane_width: f64,
        junction: Option<JunctionId>,
    ) -> WaypointId {
        let id = self.next_id;
        self.next_id += 1;
        self.record.waypoints.push(Waypoint {
            id,
            transform: Transform::new(location.into(), yaw_deg),
            lane_width,
            junction,
        });
        id
    }

    /// Add waypoints along a straight lane, each linked to the next
    pub fn lane(
        &mut self,
        from: Vec2,
        to: Vec2,
        spacing: f64,
        lane_width: f64,
        junction: Option<JunctionId>,
    ) -> Vec<WaypointId> {
        let delta = to - from;
        let yaw = delta.y.atan2(delta.x).to_degrees();
        let steps = (delta.length() / spacing).ceil().max(1.0) as usize;
        let step = delta / steps as f64;
        let ids: Vec<WaypointId> = (0..=steps)
            .map(|i| self.waypoint(from + step * i as f64, yaw, lane_width, junction))
            .collect();
        for pair in ids.windows(2) {
            self.link(pair[0], pair[1]);
        }
        ids
    }

    /// Add a successor edge
    pub fn link(&mut self, from: WaypointId, to: WaypointId) -> &mut Self {
        self.record.links.push((from, to));
        self
    }

    /// Declare a junction from `(entry, exit)` waypoint pairs
    pub fn junction(
        &mut self,
        id: JunctionId,
        bounding_box: BoundingBox,
        segments: Vec<(WaypointId, WaypointId)>,
    ) -> &mut Self {
        self.record.junctions.push(JunctionRecord {
            id,
            bounding_box,
            segments,
        });
        self
    }

    /// Validate and build
    pub fn build(self) -> crate::RulemonResult<LaneGraph> {
        LaneGraph::from_record(self.record).map_err(|err| {
            warn!(%err, "rejected lane graph");
            err
        })
    }
}
