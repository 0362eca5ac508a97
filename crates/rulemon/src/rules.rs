//! Built-in rule catalogue and the per-tick context its oracles read.

use crate::assertion::{Assertion, RuleId, Trigger};
use crate::coverage::{
    CoverageValue, CoverageVariable, EmergencyStatus, SpeedLimit, TimeOfDay, ValidityRequirement,
};
use crate::events::TickEvents;
use crate::geometry::{BoundingBox, Vec3};
use crate::junction::{JunctionQuadrant, JunctionState, JunctionStatus};
use crate::result::RulemonResult;
use crate::road::Waypoint;
use crate::world::ActorState;
use tracing::warn;

/// Below this speed (m/s) a vehicle counts as stopped
pub const STOPPED_SPEED: f64 = 0.1;

/// Everything a rule oracle may look at for one tick
#[derive(Debug, Clone)]
pub struct TickContext {
    /// The vehicle under test
    pub ego: ActorState,
    /// Every other actor
    pub others: Vec<ActorState>,
    /// Current junction episode
    pub junction: JunctionStatus,
    /// Events raised since the previous tick
    pub events: TickEvents,
    /// Speed limit in force, default already applied
    pub speed_limit: SpeedLimit,
    /// Light conditions
    pub time_of_day: TimeOfDay,
    /// Lane waypoint nearest the ego
    pub ego_waypoint: Option<Waypoint>,
}

impl TickContext {
    /// Other vehicles
    pub fn vehicles(&self) -> impl Iterator<Item = &ActorState> {
        self.others.iter().filter(|a| a.is_vehicle())
    }

    /// Other vehicles inside the current junction
    pub fn vehicles_in_junction(&self) -> impl Iterator<Item = &ActorState> {
        self.vehicles()
            .filter(|v| self.junction.contains(v.location()))
    }

    /// Ego is (nearly) stationary
    #[must_use]
    pub fn ego_stopped(&self) -> bool {
        self.ego.speed() < STOPPED_SPEED
    }

    /// Nearest waypoint, if the ego is within a lane width of it
    #[must_use]
    pub fn ego_lane(&self) -> Option<&Waypoint> {
        self.ego_waypoint
            .as_ref()
            .filter(|w| self.ego.location().xy().distance(w.location()) <= w.lane_width)
    }
}

/// Thinking plus braking distance in metres for a speed in m/s
#[must_use]
pub fn stopping_distance(speed: f64) -> f64 {
    0.675 * speed + speed * speed / 12.96
}

/// Whether `location` lies in a box of `length` metres directly ahead of
/// `vehicle`, as wide as the vehicle
#[must_use]
pub fn location_within_box_in_front(vehicle: &ActorState, length: f64, location: Vec3) -> bool {
    let forward = vehicle.transform.forward_vector();
    let offset = forward * (vehicle.extent.x + length / 2.0);
    let centre = vehicle.location() + Vec3::from(offset);
    let extent = Vec3::new(length / 2.0, vehicle.extent.y, vehicle.extent.z * 2.0);
    BoundingBox::new(centre, extent, vehicle.transform.yaw_deg).contains(location)
}

/// The ego may turn left without cutting across `vehicle`
#[must_use]
pub fn performing_safe_left_turn(ctx: &TickContext, vehicle: &ActorState) -> bool {
    let steering_left = ctx.ego.control.steer < 0.0;
    match ctx.junction.state {
        JunctionState::TOnMinor => {
            let quadrant = ctx.junction.quadrant(vehicle.location().xy());
            (steering_left && quadrant != Some(JunctionQuadrant::InnerAfterTurning))
                || vehicle.speed() <= STOPPED_SPEED
        }
        JunctionState::TOnMajor => steering_left,
        state => {
            warn!(%state, "left-turn check outside a T-junction");
            false
        }
    }
}

/// The ego may turn right without cutting across `vehicle`
#[must_use]
pub fn performing_safe_right_turn(ctx: &TickContext, vehicle: &ActorState) -> bool {
    let steering_right = ctx.ego.control.steer > 0.0;
    let quadrant = ctx.junction.quadrant(vehicle.location().xy());
    let inner_after = quadrant == Some(JunctionQuadrant::InnerAfterTurning);
    match ctx.junction.state {
        JunctionState::TOnMinor => {
            (steering_right && inner_after && vehicle.control.steer < 0.0)
                || vehicle.speed() <= STOPPED_SPEED
        }
        JunctionState::TOnMajor => {
            (steering_right && !inner_after) || vehicle.speed() <= STOPPED_SPEED
        }
        state => {
            warn!(%state, "right-turn check outside a T-junction");
            false
        }
    }
}

/// Stationary on the wrong side of the lane centre, facing oncoming traffic
#[must_use]
pub fn parked_left(ego: &ActorState, waypoint: &Waypoint) -> bool {
    let to_ego = ego.location().xy() - waypoint.location();
    let right = waypoint.transform.right_vector();
    ego.speed() <= 0.0 && to_ego.dot(right) < 0.0 && to_ego.length() >= waypoint.lane_width / 8.0
}

fn only(variable: CoverageVariable, values: &[CoverageValue]) -> RulemonResult<ValidityRequirement> {
    ValidityRequirement::new().allow(variable, values.iter().copied())
}

/// 124.0: stay within the posted limit
#[must_use]
pub fn speed_limit() -> Assertion<TickContext> {
    Assertion::new(
        RuleId::new(124, 0),
        "You must not exceed maximum speed limits",
        |ctx: &TickContext| Ok(ctx.ego.speed_limit.is_some()),
        |ctx: &TickContext| Ok(ctx.ego.speed_kmh() <= f64::from(ctx.speed_limit.kmh())),
    )
}

/// 126.0: keep a stopping distance to whatever is ahead
#[must_use]
pub fn safe_stopping_distance() -> Assertion<TickContext> {
    Assertion::new(
        RuleId::new(126, 0),
        "Leave enough space between you and the vehicle in front",
        |ctx: &TickContext| {
            let window = stopping_distance(ctx.ego.speed()) + 5.0;
            Ok(!ctx.ego_stopped()
                && ctx
                    .others
                    .iter()
                    .any(|a| location_within_box_in_front(&ctx.ego, window, a.location())))
        },
        |ctx: &TickContext| {
            let distance = stopping_distance(ctx.ego.speed());
            Ok(!ctx
                .others
                .iter()
                .any(|a| location_within_box_in_front(&ctx.ego, distance, a.location())))
        },
    )
}

/// 170.0: from the minor road, give way to traffic in the junction
pub fn give_way_minor() -> RulemonResult<Assertion<TickContext>> {
    Ok(Assertion::new(
        RuleId::new(170, 0),
        "Give way to traffic on the major road at a T-junction",
        |ctx: &TickContext| {
            Ok(ctx.junction.state == JunctionState::TOnMinor
                && ctx.vehicles_in_junction().next().is_some())
        },
        |ctx: &TickContext| {
            if ctx.junction.state != JunctionState::TOnMinor || ctx.ego_stopped() {
                return Ok(true);
            }
            Ok(ctx.vehicles_in_junction().all(|v| {
                performing_safe_left_turn(ctx, v) || performing_safe_right_turn(ctx, v)
            }))
        },
    )
    .with_validity(ValidityRequirement::in_junction()))
}

/// 170.1: turning off the major road, give way to traffic in the junction
pub fn give_way_major() -> RulemonResult<Assertion<TickContext>> {
    Ok(Assertion::new(
        RuleId::new(170, 1),
        "Give way to oncoming traffic when turning off a major road",
        |ctx: &TickContext| {
            Ok(ctx.junction.state == JunctionState::TOnMajor
                && ctx.vehicles_in_junction().next().is_some())
        },
        |ctx: &TickContext| {
            if ctx.junction.state != JunctionState::TOnMajor
                || ctx.junction.straight_on(ctx.ego.control.steer)
                || ctx.ego_stopped()
            {
                return Ok(true);
            }
            Ok(ctx.vehicles_in_junction().all(|v| {
                performing_safe_left_turn(ctx, v) || performing_safe_right_turn(ctx, v)
            }))
        },
    )
    .with_validity(ValidityRequirement::in_junction()))
}

/// 219.0: stop accelerating when an emergency vehicle with siren is near
pub fn give_way_to_emergency(radius: f64) -> RulemonResult<Assertion<TickContext>> {
    Ok(Assertion::new(
        RuleId::new(219, 0),
        "Give way to emergency vehicles using sirens",
        move |ctx: &TickContext| {
            Ok(ctx.vehicles().any(|v| {
                v.is_emergency() && v.lights.siren && v.location().distance(ctx.ego.location()) <= radius
            }))
        },
        |ctx: &TickContext| Ok(ctx.ego.control.throttle <= 0.0 || ctx.ego_stopped()),
    )
    .with_validity(only(
        CoverageVariable::EmergencyVehicle,
        &[CoverageValue::EmergencyVehicle(EmergencyStatus::Active)],
    )?))
}

/// 129.0: do not cross solid lane markings
#[must_use]
pub fn solid_lane_markings() -> Assertion<TickContext> {
    Assertion::new(
        RuleId::new(129, 0),
        "Do not cross solid white lines",
        |ctx: &TickContext| Ok(ctx.events.lane_invasion),
        |ctx: &TickContext| Ok(!ctx.events.solid_marking_crossed),
    )
    .with_trigger(Trigger::Edge)
}

/// 113.0: headlights on when moving in the dark
pub fn headlights_at_night() -> RulemonResult<Assertion<TickContext>> {
    Ok(Assertion::new(
        RuleId::new(113, 0),
        "Use headlights at night and in poor light",
        |ctx: &TickContext| Ok(ctx.time_of_day != TimeOfDay::Day && !ctx.ego_stopped()),
        |ctx: &TickContext| Ok(ctx.ego.lights.headlights() || ctx.ego_stopped()),
    )
    .with_validity(only(
        CoverageVariable::TimeOfDay,
        &[
            CoverageValue::TimeOfDay(TimeOfDay::Dusk),
            CoverageValue::TimeOfDay(TimeOfDay::Night),
        ],
    )?))
}

/// 248.0: do not park against the flow of traffic at night
pub fn parking_at_night() -> RulemonResult<Assertion<TickContext>> {
    Ok(Assertion::new(
        RuleId::new(248, 0),
        "Do not park facing against the traffic flow at night",
        |ctx: &TickContext| {
            Ok(ctx.time_of_day == TimeOfDay::Night
                && ctx.ego.speed() <= 0.0
                && ctx.ego_lane().is_some())
        },
        |ctx: &TickContext| Ok(ctx.ego_lane().map_or(true, |w| !parked_left(&ctx.ego, w))),
    )
    .with_validity(only(
        CoverageVariable::TimeOfDay,
        &[CoverageValue::TimeOfDay(TimeOfDay::Night)],
    )?))
}

/// 2.0: no collisions while driving
#[must_use]
pub fn no_collisions() -> Assertion<TickContext> {
    Assertion::new(
        RuleId::new(2, 0),
        "Do not collide with other road users or the environment",
        |ctx: &TickContext| Ok(!ctx.ego_stopped()),
        |ctx: &TickContext| Ok(!ctx.events.collision),
    )
}

/// The full catalogue
pub fn default_rules(emergency_radius: f64) -> RulemonResult<Vec<Assertion<TickContext>>> {
    Ok(vec![
        speed_limit(),
        safe_stopping_distance(),
        give_way_minor()?,
        give_way_major()?,
        give_way_to_emergency(emergency_radius)?,
        solid_lane_markings(),
        headlights_at_night()?,
        parking_at_night()?,
        no_collisions(),
    ])
}
