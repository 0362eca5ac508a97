//! World snapshots and their projection onto the coverage space.

use crate::coverage::{
    CoverageSample, CoverageSpace, CoverageValue, CoverageVariable, EmergencyStatus, Presence,
    RoadGraph, SpeedLimit, TimeOfDay, WeatherLevel,
};
use crate::events::{EventSink, SimEvent};
use crate::geometry::{BoundingBox, Transform, Vec3};
use crate::result::{RulemonError, RulemonResult};
use crate::road::{LaneGraph, RoadMap};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use tracing::{debug, trace};

/// Type-id fragments that mark emergency vehicles
const EMERGENCY_TYPES: [&str; 3] = ["police", "ambulance", "firetruck"];

/// Driver inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Control {
    /// Steering in `[-1, 1]`, negative is left
    #[serde(default)]
    pub steer: f64,
    /// Throttle in `[0, 1]`
    #[serde(default)]
    pub throttle: f64,
    /// Brake in `[0, 1]`
    #[serde(default)]
    pub brake: f64,
}

/// Vehicle light flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightState {
    /// Dipped headlights
    pub low_beam: bool,
    /// Main beam
    pub high_beam: bool,
    /// Position lights
    pub position: bool,
    /// Siren / emergency beacons
    pub siren: bool,
}

impl LightState {
    /// Any headlight is on
    #[must_use]
    pub const fn headlights(&self) -> bool {
        self.low_beam || self.high_beam
    }
}

/// One actor in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorState {
    /// Simulator id
    pub id: u32,
    /// Blueprint id, e.g. `vehicle.tesla.model3`
    pub type_id: String,
    /// Role attribute; the ego carries the configured role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    /// Pose
    pub transform: Transform,
    /// Velocity in m/s
    #[serde(default)]
    pub velocity: Vec3,
    /// Bounding box half-extents
    #[serde(default)]
    pub extent: Vec3,
    /// Wheel count, zero for walkers
    #[serde(default)]
    pub wheels: u8,
    /// Driver inputs
    #[serde(default)]
    pub control: Control,
    /// Lights
    #[serde(default)]
    pub lights: LightState,
    /// Speed limit reported for the actor's lane, km/h
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_limit: Option<f64>,
}

impl ActorState {
    /// A four-wheeled vehicle at rest
    #[must_use]
    pub fn vehicle(id: u32, type_id: impl Into<String>, transform: Transform) -> Self {
        Self {
            id,
            type_id: type_id.into(),
            role_name: None,
            transform,
            velocity: Vec3::zero(),
            extent: Vec3::new(2.4, 1.0, 0.8),
            wheels: 4,
            control: Control::default(),
            lights: LightState::default(),
            speed_limit: None,
        }
    }

    /// A pedestrian at rest
    #[must_use]
    pub fn walker(id: u32, transform: Transform) -> Self {
        Self {
            type_id: "walker.pedestrian.0001".to_string(),
            extent: Vec3::new(0.3, 0.3, 0.9),
            wheels: 0,
            ..Self::vehicle(id, "", transform)
        }
    }

    /// Set the role name
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role_name = Some(role.into());
        self
    }

    /// Set the velocity
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the driver inputs
    #[must_use]
    pub fn with_control(mut self, control: Control) -> Self {
        self.control = control;
        self
    }

    /// Set the light flags
    #[must_use]
    pub fn with_lights(mut self, lights: LightState) -> Self {
        self.lights = lights;
        self
    }

    /// Set the reported speed limit
    #[must_use]
    pub fn with_speed_limit(mut self, kmh: f64) -> Self {
        self.speed_limit = Some(kmh);
        self
    }

    /// Set the wheel count
    #[must_use]
    pub fn with_wheels(mut self, wheels: u8) -> Self {
        self.wheels = wheels;
        self
    }

    /// Speed in m/s
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.velocity.length()
    }

    /// Speed in km/h
    #[must_use]
    pub fn speed_kmh(&self) -> f64 {
        self.speed() * 3.6
    }

    /// Oriented bounding box
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.transform.location, self.extent, self.transform.yaw_deg)
    }

    /// Location
    #[must_use]
    pub const fn location(&self) -> Vec3 {
        self.transform.location
    }

    /// Any kind of vehicle
    #[must_use]
    pub fn is_vehicle(&self) -> bool {
        self.type_id.starts_with("vehicle.")
    }

    /// A pedestrian
    #[must_use]
    pub fn is_walker(&self) -> bool {
        self.type_id.starts_with("walker.")
    }

    /// Police, ambulance or fire vehicle
    #[must_use]
    pub fn is_emergency(&self) -> bool {
        self.is_vehicle() && EMERGENCY_TYPES.iter().any(|t| self.type_id.contains(t))
    }
}

/// Weather parameters, percentages except the sun angle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weather {
    /// Rain intensity
    pub precipitation: f64,
    /// Standing water
    pub precipitation_deposits: f64,
    /// Cloud cover
    pub cloudiness: f64,
    /// Sun altitude in degrees
    pub sun_altitude_angle: f64,
}

impl Weather {
    /// Clear midday
    #[must_use]
    pub const fn clear_noon() -> Self {
        Self {
            precipitation: 0.0,
            precipitation_deposits: 0.0,
            cloudiness: 5.0,
            sun_altitude_angle: 45.0,
        }
    }

    /// Clear night
    #[must_use]
    pub const fn clear_night() -> Self {
        Self {
            sun_altitude_angle: -30.0,
            ..Self::clear_noon()
        }
    }
}

/// Everything the simulator reports for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Simulator frame number
    #[serde(default)]
    pub frame: u64,
    /// Weather
    #[serde(default)]
    pub weather: Weather,
    /// All actors, ego included
    pub actors: Vec<ActorState>,
    /// Notifications raised since the previous snapshot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

impl WorldSnapshot {
    /// Move the carried events into `sink`
    pub fn dispatch_events(&mut self, sink: Option<&EventSink>) {
        let events = std::mem::take(&mut self.events);
        match sink {
            Some(sink) => events.iter().for_each(|e| sink.emit(e)),
            None if !events.is_empty() => {
                debug!(frame = self.frame, dropped = events.len(), "no event sink attached");
            }
            None => {}
        }
    }

    /// Separate the ego (found by role) from the other actors
    pub fn split_ego(self, role: &str) -> RulemonResult<(ActorState, Vec<ActorState>)> {
        let searched = self.actors.len();
        let mut ego = None;
        let mut others = Vec::with_capacity(searched.saturating_sub(1));
        for actor in self.actors {
            if ego.is_none() && actor.role_name.as_deref() == Some(role) {
                ego = Some(actor);
            } else {
                others.push(actor);
            }
        }
        ego.map(|ego| (ego, others))
            .ok_or_else(|| RulemonError::EgoNotFound {
                role: role.to_string(),
                searched,
            })
    }
}

/// Supplier of per-tick world state
pub trait WorldSource {
    /// Next snapshot; `Ok(None)` once the world has ended
    fn next_snapshot(&mut self) -> RulemonResult<Option<WorldSnapshot>>;

    /// Lane graph of the world
    fn road_map(&self) -> &dyn RoadMap;

    /// Register the sink that sensor callbacks report through
    fn attach_events(&mut self, _sink: EventSink) {}
}

/// World fed as one JSON [`WorldSnapshot`] per line
#[derive(Debug)]
pub struct JsonLinesWorld<R> {
    reader: R,
    map: LaneGraph,
    line: usize,
    sink: Option<EventSink>,
}

impl<R: BufRead> JsonLinesWorld<R> {
    /// Read snapshots from `reader` against `map`
    pub fn new(reader: R, map: LaneGraph) -> Self {
        Self {
            reader,
            map,
            line: 0,
            sink: None,
        }
    }
}

impl<R: BufRead> WorldSource for JsonLinesWorld<R> {
    fn next_snapshot(&mut self) -> RulemonResult<Option<WorldSnapshot>> {
        let mut buf = String::new();
        loop {
            buf.clear();
            if self.reader.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            if !buf.trim().is_empty() {
                break;
            }
        }
        let mut snapshot: WorldSnapshot = serde_json::from_str(buf.trim())
            .map_err(|e| RulemonError::world(format!("line {}: {e}", self.line)))?;
        trace!(line = self.line, frame = snapshot.frame, "read snapshot");
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

/// Projects a snapshot onto the coverage variables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageSampler {
    default_speed_limit: SpeedLimit,
}

impl Default for CoverageSampler {
    fn default() -> Self {
        Self::new(SpeedLimit::Seventy)
    }
}

impl CoverageSampler {
    /// Create a sampler falling back to `default_speed_limit`
    #[must_use]
    pub const fn new(default_speed_limit: SpeedLimit) -> Self {
        Self {
            default_speed_limit,
        }
    }

    /// Speed limit of the ego's lane, or the default when missing or not
    /// one of the posted values
    #[must_use]
    pub fn speed_limit(&self, ego: &ActorState) -> SpeedLimit {
        let Some(kmh) = ego.speed_limit.filter(|v| v.is_finite() && *v >= 0.0) else {
            debug!(default = %self.default_speed_limit, "no speed limit reported");
            return self.default_speed_limit;
        };
        SpeedLimit::from_kmh(kmh.round() as u32).unwrap_or_else(|| {
            debug!(kmh, default = %self.default_speed_limit, "unrecognised speed limit");
            self.default_speed_limit
        })
    }

    /// Sample every variable; counts are clamped to `space`
    #[must_use]
    pub fn sample(
        &self,
        space: &CoverageSpace,
        ego: &ActorState,
        others: &[ActorState],
        weather: &Weather,
        road_graph: RoadGraph,
    ) -> CoverageSample {
        let vehicles: Vec<&ActorState> = others.iter().filter(|a| a.is_vehicle()).collect();
        let pedestrians = others.iter().filter(|a| a.is_walker()).count();
        let emergency = if vehicles.iter().any(|v| v.is_emergency() && v.lights.siren) {
            EmergencyStatus::Active
        } else if vehicles.iter().any(|v| v.is_emergency()) {
            EmergencyStatus::Present
        } else {
            EmergencyStatus::None
        };
        let count = |variable: CoverageVariable, n: usize| {
            let n = u32::try_from(n).unwrap_or(u32::MAX);
            variable.count_value(space.clamp_count(variable, n))
        };

        let mut sample = CoverageSample::new()
            .with(CoverageValue::Rain(WeatherLevel::from_percent(weather.precipitation)))
            .with(CoverageValue::GroundWater(WeatherLevel::from_percent(
                weather.precipitation_deposits,
            )))
            .with(CoverageValue::BikesPresent(Presence::from(
                vehicles.iter().any(|v| v.wheels == 2),
            )))
            .with(CoverageValue::CarsPresent(Presence::from(
                vehicles.iter().any(|v| v.wheels >= 4),
            )))
            .with(CoverageValue::SpeedLimit(self.speed_limit(ego)))
            .with(CoverageValue::RoadGraph(road_graph))
            .with(CoverageValue::EmergencyVehicle(emergency))
            .with(CoverageValue::TimeOfDay(TimeOfDay::from_sun_altitude(
                weather.sun_altitude_angle,
            )));
        for value in [
            count(CoverageVariable::NumVehicles, vehicles.len()),
            count(CoverageVariable::NumPedestrians, pedestrians),
        ]
        .into_iter()
        .flatten()
        {
            sample.insert(value);
        }
        sample
    }
}
