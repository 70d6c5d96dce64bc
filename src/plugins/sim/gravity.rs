use bevy::prelude::*;

use crate::platforms::{align_up, local_gravity_acceleration, DynamicBody, LocalGravity};

/// Applies source-relative gravity once per physics step and, when enabled,
/// eases each body's up axis toward the source's up axis.
///
/// A source that is itself a dynamic body (other than the body) cannot be
/// resolved and that body gets no local gravity this step.
pub fn apply_local_gravity(
    time: Res<Time<Fixed>>,
    sources: Query<&Transform, Without<DynamicBody>>,
    mut bodies: Query<(Entity, &mut Transform, &mut DynamicBody, &LocalGravity)>,
) {
    let delta_seconds = time.delta_secs();

    for (entity, mut transform, mut body, gravity) in bodies.iter_mut() {
        let source_up = if gravity.source == entity {
            transform.up().as_vec3()
        } else {
            match sources.get(gravity.source) {
                Ok(source) => source.up().as_vec3(),
                Err(_) => continue,
            }
        };

        body.apply_acceleration(local_gravity_acceleration(source_up, gravity.strength));

        if gravity.align_to_surface {
            transform.rotation = align_up(
                transform.rotation,
                source_up,
                gravity.align_speed * delta_seconds,
            );
        }
    }
}
