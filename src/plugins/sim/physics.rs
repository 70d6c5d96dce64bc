//! Minimal rigid-body step for dynamic passengers: integration plus a deck
//! contact so bodies stay seated on the platform they ride.

use bevy::prelude::*;

use crate::platforms::{DynamicBody, Passenger, Platform};
use crate::plugins::core::SimConfig;

/// Bodies this close above the deck still count as touching it.
const DECK_CONTACT_EPSILON: f32 = 0.01;

/// Semi-implicit Euler. World gravity is added only for bodies that still
/// respond to it; accumulated accelerations are cleared afterwards.
pub fn integrate_dynamic_bodies(
    time: Res<Time<Fixed>>,
    config: Res<SimConfig>,
    mut bodies: Query<(&mut Transform, &mut DynamicBody)>,
) {
    let delta_seconds = time.delta_secs();
    if delta_seconds <= 0.0 {
        return;
    }

    for (mut transform, mut body) in bodies.iter_mut() {
        let mut acceleration = body.acceleration;
        if body.use_world_gravity {
            acceleration += config.world_gravity;
        }

        body.velocity += acceleration * delta_seconds;
        transform.translation += body.velocity * delta_seconds;
        body.last_acceleration = acceleration;
        body.acceleration = Vec3::ZERO;
    }
}

/// Keeps riding bodies on or above their platform's deck plane and drags
/// their tangential velocity toward the deck's.
pub fn resolve_deck_contacts(
    time: Res<Time<Fixed>>,
    platforms: Query<(&Transform, &Platform)>,
    mut bodies: Query<(&mut Transform, &mut DynamicBody, &Passenger), Without<Platform>>,
) {
    let delta_seconds = time.delta_secs();

    for (mut transform, mut body, passenger) in bodies.iter_mut() {
        let Some(riding) = passenger.riding else {
            continue;
        };
        let Ok((deck_transform, platform)) = platforms.get(riding) else {
            continue;
        };

        let normal = deck_transform.up().as_vec3();
        let deck_point = deck_transform.transform_point(Vec3::new(0.0, platform.deck_height, 0.0));
        let height = (transform.translation - deck_point).dot(normal);
        if height > DECK_CONTACT_EPSILON {
            continue;
        }

        if height < 0.0 {
            transform.translation -= normal * height;
        }
        let into_deck = body.velocity.dot(normal);
        if into_deck < 0.0 {
            body.velocity -= normal * into_deck;
        }

        let relative = body.velocity - platform.velocity;
        let tangential = relative - normal * relative.dot(normal);
        let grip = (platform.deck_friction * delta_seconds).min(1.0);
        body.velocity -= tangential * grip;
    }
}
