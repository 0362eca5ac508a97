//! Junction classification and quadrant partitioning.
//!
//! When the vehicle enters a junction the classifier decides whether it
//! approaches on the major road of a T, on the minor road, or into a
//! roundabout. For T-junctions it also splits the junction plane into four
//! quadrants used by the give-way rules.

use crate::geometry::{line_intersection, BoundingBox, Vec2, Vec3};
use crate::road::{Junction, JunctionId, RoadMap, Waypoint};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Vertical margin added to junction boxes for membership tests
pub const JUNCTION_Z_MARGIN: f64 = 5.0;

/// Kind of junction the vehicle is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JunctionState {
    /// Approaching on the through road of a T
    TOnMajor,
    /// Approaching on the terminating road of a T
    TOnMinor,
    /// Part of a roundabout
    Roundabout,
    /// In a junction that could not be classified
    Unknown,
    /// Not in a junction
    None,
}

impl JunctionState {
    /// Both T-junction cases
    #[must_use]
    pub const fn is_t_junction(self) -> bool {
        matches!(self, Self::TOnMajor | Self::TOnMinor)
    }
}

impl fmt::Display for JunctionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TOnMajor => "T_ON_MAJOR",
            Self::TOnMinor => "T_ON_MINOR",
            Self::Roundabout => "ROUNDABOUT",
            Self::Unknown => "UNKNOWN",
            Self::None => "NONE",
        })
    }
}

/// Region of a partitioned T-junction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JunctionQuadrant {
    /// Far lane, not yet past the turn
    OuterBeforeTurning,
    /// Far lane, past the turn
    OuterAfterTurning,
    /// Near lane, not yet past the turn
    InnerBeforeTurning,
    /// Near lane, past the turn
    InnerAfterTurning,
}

/// Cross point plus two separating directions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartitionedJunction {
    cross_point: Vec2,
    lane_separation: Vec2,
    turning_separation: Vec2,
}

impl PartitionedJunction {
    /// Create a partition
    #[must_use]
    pub const fn new(cross_point: Vec2, lane_separation: Vec2, turning_separation: Vec2) -> Self {
        Self {
            cross_point,
            lane_separation,
            turning_separation,
        }
    }

    /// Cross point
    #[must_use]
    pub const fn cross_point(&self) -> Vec2 {
        self.cross_point
    }

    /// Lane-separation direction
    #[must_use]
    pub const fn lane_separation(&self) -> Vec2 {
        self.lane_separation
    }

    /// Turning-separation direction
    #[must_use]
    pub const fn turning_separation(&self) -> Vec2 {
        self.turning_separation
    }

    /// Whether `location` is on the inner side of the lane separation
    #[must_use]
    pub fn inner_lane(&self, location: Vec2) -> bool {
        (location - self.cross_point).dot(self.lane_separation) > 0.0
    }

    /// Whether `location` is past the turning separation
    #[must_use]
    pub fn past_turning(&self, location: Vec2) -> bool {
        (location - self.cross_point).dot(self.turning_separation) > 0.0
    }

    /// Quadrant containing `location`.
    ///
    /// Only the signs of the projections matter, so the offset is not
    /// normalised; a point on a separating line falls on the non-positive
    /// side.
    #[must_use]
    pub fn get_quadrant(&self, location: Vec2) -> JunctionQuadrant {
        match (self.inner_lane(location), self.past_turning(location)) {
            (true, true) => JunctionQuadrant::InnerAfterTurning,
            (true, false) => JunctionQuadrant::InnerBeforeTurning,
            (false, true) => JunctionQuadrant::OuterAfterTurning,
            (false, false) => JunctionQuadrant::OuterBeforeTurning,
        }
    }
}

/// Classification of the current junction episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JunctionStatus {
    /// Junction the vehicle is in
    pub junction: Option<Junction>,
    /// Classification
    pub state: JunctionState,
    /// Quadrants, for T-junctions only
    pub partition: Option<PartitionedJunction>,
}

impl JunctionStatus {
    /// Not in a junction
    #[must_use]
    pub const fn none() -> Self {
        Self {
            junction: None,
            state: JunctionState::None,
            partition: None,
        }
    }

    fn unknown(junction: &Junction) -> Self {
        Self {
            junction: Some(junction.clone()),
            state: JunctionState::Unknown,
            partition: None,
        }
    }

    /// Id of the junction, if any
    #[must_use]
    pub fn junction_id(&self) -> Option<JunctionId> {
        self.junction.as_ref().map(|j| j.id)
    }

    /// Quadrant of a location, for partitioned junctions
    #[must_use]
    pub fn quadrant(&self, location: Vec2) -> Option<JunctionQuadrant> {
        self.partition.map(|p| p.get_quadrant(location))
    }

    /// Whether a location lies in the junction box (with vertical margin)
    #[must_use]
    pub fn contains(&self, location: Vec3) -> bool {
        self.junction
            .as_ref()
            .is_some_and(|j| vehicle_in_junction(&j.bounding_box, location))
    }

    /// Driving straight through on the major road
    #[must_use]
    pub fn straight_on(&self, steer: f64) -> bool {
        steer == 0.0 && self.state == JunctionState::TOnMajor
    }
}

impl Default for JunctionStatus {
    fn default() -> Self {
        Self::none()
    }
}

/// Membership test against a junction box grown upward by
/// [`JUNCTION_Z_MARGIN`], probing half the margin above the location
#[must_use]
pub fn vehicle_in_junction(bounding_box: &BoundingBox, location: Vec3) -> bool {
    let margin = Vec3::new(0.0, 0.0, JUNCTION_Z_MARGIN);
    bounding_box
        .expanded(margin)
        .contains(location + margin * 0.5)
}

/// Junction classifier with its geometric tolerances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionClassifier {
    lookback: f64,
    lane_width_multiple: f64,
    straight_tolerance: f64,
    entry_match: f64,
    duplicate_entry: f64,
}

impl Default for JunctionClassifier {
    fn default() -> Self {
        Self {
            lookback: 10.0,
            lane_width_multiple: 1.0,
            straight_tolerance: 1.0,
            entry_match: 0.01,
            duplicate_entry: 0.1,
        }
    }
}

impl JunctionClassifier {
    /// Create a classifier with default tolerances
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Distance used to look back along the approach and ahead past exits
    #[must_use]
    pub fn with_lookback(mut self, metres: f64) -> Self {
        self.lookback = metres;
        self
    }

    /// Lateral offset of the partition line, in lane widths
    #[must_use]
    pub fn with_lane_width_multiple(mut self, multiple: f64) -> Self {
        self.lane_width_multiple = multiple;
        self
    }

    /// Classify `junction` as approached from `vehicle`
    #[must_use]
    pub fn classify(&self, map: &dyn RoadMap, junction: &Junction, vehicle: Vec3) -> JunctionStatus {
        let position = vehicle.xy();
        let Some(entry) = junction
            .segments
            .iter()
            .map(|(entry, _)| entry)
            .min_by(|a, b| {
                a.location()
                    .distance(position)
                    .total_cmp(&b.location().distance(position))
            })
            .copied()
        else {
            warn!(junction = junction.id, "junction has no lane segments");
            return JunctionStatus::unknown(junction);
        };
        let origin = entry.location();

        let destinations: Vec<Waypoint> = junction
            .segments
            .iter()
            .filter(|(e, _)| e.location().distance(origin) < self.entry_match)
            .map(|(_, exit)| *exit)
            .collect();
        if destinations.is_empty() {
            return JunctionStatus::unknown(junction);
        }

        let Some(direction) = map
            .previous(&entry, self.lookback)
            .first()
            .and_then(|prev| (origin - prev.location()).normalized())
        else {
            warn!(junction = junction.id, entry = entry.id, "degenerate approach direction");
            return JunctionStatus::unknown(junction);
        };
        let normal = direction.cross_up();

        let roundabout = destinations.iter().all(|d| {
            map.next(d, self.lookback)
                .first()
                .and_then(|w| w.junction)
                == Some(junction.id)
        });
        if roundabout {
            debug!(junction = junction.id, "roundabout");
            return JunctionStatus {
                junction: Some(junction.clone()),
                state: JunctionState::Roundabout,
                partition: None,
            };
        }

        let (mut straight, mut other) = (false, false);
        for d in &destinations {
            let reach = d.location().distance(origin);
            let projected = origin + direction * reach;
            if d.location().distance(projected) < self.straight_tolerance {
                straight = true;
            } else {
                other = true;
            }
        }
        let state = match (straight, other) {
            (true, true) => JunctionState::TOnMajor,
            (false, true) => JunctionState::TOnMinor,
            _ => return JunctionStatus::unknown(junction),
        };

        let mut others: Vec<Waypoint> = junction
            .segments
            .iter()
            .map(|(e, _)| *e)
            .filter(|e| e.location().distance(origin) > self.duplicate_entry)
            .collect();
        others.sort_by(|a, b| {
            a.location()
                .distance(origin)
                .total_cmp(&b.location().distance(origin))
        });
        let Some(second) = others.first() else {
            warn!(junction = junction.id, "T-junction with a single entrance");
            return JunctionStatus::unknown(junction);
        };

        let offset = normal * (entry.lane_width * self.lane_width_multiple);
        let partition = match state {
            JunctionState::TOnMajor => line_intersection(
                origin - offset,
                direction,
                second.location() - direction * (second.lane_width / 2.0),
                normal,
            )
            .map(|cross| PartitionedJunction::new(cross, -normal, direction)),
            _ => line_intersection(
                origin + offset,
                direction,
                second.location() + direction * (second.lane_width / 2.0),
                normal,
            )
            .map(|cross| PartitionedJunction::new(cross, -direction, -normal)),
        };
        let Some(partition) = partition else {
            warn!(junction = junction.id, "partition lines are parallel");
            return JunctionStatus::unknown(junction);
        };

        debug!(
            junction = junction.id,
            state = %state,
            cross_x = partition.cross_point().x,
            cross_y = partition.cross_point().y,
            "classified junction"
        );
        JunctionStatus {
            junction: Some(junction.clone()),
            state,
            partition: Some(partition),
        }
    }
}
