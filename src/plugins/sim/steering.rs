//! Boat-like arrival steering shared by the chase and dock phases.

use bevy::prelude::*;

use crate::vessels::{
    arrival_speed, flatten, move_towards, rotate_heading_towards, HeadingSource, NavigationFault,
    SteerParams, Vessel,
};

// =============================================================================
// Constants
// =============================================================================

const MIN_TARGET_DISTANCE: f32 = 0.001;
const MIN_LOCK_LENGTH_SQUARED: f32 = 0.001;
const MIN_FORWARD_LENGTH_SQUARED: f32 = 0.0001;

// =============================================================================
// Steering
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SteerReport {
    /// Planar distance to the target before moving.
    pub distance: f32,
    pub desired_speed: f32,
    pub fault: Option<NavigationFault>,
}

/// Advances one vessel by one tick toward `target`.
///
/// The target is flattened onto the vessel's altitude, the heading turns at a
/// constant angular rate, and speed follows the arrival profile at the
/// vessel's accel/decel. When `target_velocity` is given, its component along
/// the vessel's forward axis is added to the arrival speed so a moving target
/// can be matched; the sum is capped at the max speed and the stop zone still
/// asks for zero.
pub fn steer(
    transform: &mut Transform,
    vessel: &mut Vessel,
    target: Vec3,
    target_velocity: Option<Vec3>,
    params: &SteerParams,
    heading: HeadingSource,
    delta_seconds: f32,
) -> SteerReport {
    let position = transform.translation;
    let to_target = flatten(target - position);
    let distance = to_target.length();
    let target_direction = (distance > MIN_TARGET_DISTANCE).then(|| to_target / distance);

    let desired_heading = match heading {
        HeadingSource::FreeChase => target_direction,
        HeadingSource::LockedTo(direction) => locked_heading(direction, target_direction),
    };

    let mut fault = None;
    let current_forward = flatten(transform.forward().as_vec3());
    match desired_heading {
        Some(desired) if current_forward.length_squared() > MIN_FORWARD_LENGTH_SQUARED => {
            let turn_rate = params.turn_rate_deg.min(vessel.propulsion.turn_rate_deg);
            let max_angle = turn_rate.to_radians() * delta_seconds;
            let new_forward = rotate_heading_towards(current_forward, desired, max_angle);
            transform.look_to(new_forward, Vec3::Y);
        }
        _ => fault = Some(NavigationFault::DegenerateGeometry),
    }

    let forward = transform.forward().as_vec3();
    let max_speed = params.max_speed.min(vessel.propulsion.max_speed);
    let arrival = arrival_speed(distance, max_speed, params.slow_radius, params.stop_distance);
    let desired_speed = match target_velocity {
        Some(velocity) if distance > params.stop_distance => {
            let matched = flatten(velocity).dot(flatten(forward)).max(0.0);
            (arrival + matched).min(max_speed)
        }
        _ => arrival,
    };

    let rate = if desired_speed > vessel.speed {
        vessel.propulsion.accel
    } else {
        vessel.propulsion.decel
    };
    vessel.speed = move_towards(vessel.speed, desired_speed, rate * delta_seconds);

    transform.translation += forward * vessel.speed * delta_seconds;

    SteerReport {
        distance,
        desired_speed,
        fault,
    }
}

/// Horizontal projection of `lock`. Only a vertical lock falls back to the
/// target direction.
fn locked_heading(lock: Vec3, target_direction: Option<Vec3>) -> Option<Vec3> {
    let lock = flatten(lock.normalize_or_zero());
    if lock.length_squared() < MIN_LOCK_LENGTH_SQUARED {
        return target_direction;
    }
    Some(lock.normalize())
}

// =============================================================================
// Tests
// =============================================================================
