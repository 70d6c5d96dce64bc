//! Carries kinematic passengers along with their platform's pose change.

use bevy::prelude::*;

use crate::platforms::{DynamicBody, KinematicBody, PassengerKind, Platform};

/// Records each platform's pose delta for this tick and issues the matching
/// movement command to every registered kinematic passenger.
///
/// Dynamic passengers are left to friction and local gravity; only their
/// registry entries are maintained here.
pub fn transfer_platform_motion(
    time: Res<Time>,
    mut platforms: Query<(Entity, &Transform, &mut Platform)>,
    mut kinematic: Query<(&Transform, &mut KinematicBody), Without<Platform>>,
    dynamic: Query<(), With<DynamicBody>>,
) {
    let delta_seconds = time.delta_secs();

    for (entity, transform, mut platform) in platforms.iter_mut() {
        let pruned = platform.registry.retain(|body, kind| match kind {
            PassengerKind::Kinematic => kinematic.contains(body),
            PassengerKind::Dynamic => dynamic.contains(body),
        });
        if pruned > 0 {
            debug!("Platform {:?} dropped {} stale passengers", entity, pruned);
        }

        let delta = platform.record_pose(transform, delta_seconds);
        for body in platform.registry.kinematic() {
            let Ok((body_transform, mut body_motion)) = kinematic.get_mut(*body) else {
                continue;
            };
            let offset = body_transform.translation - delta.pivot;
            body_motion.command(delta.carry(offset));
        }
    }
}

/// Applies and clears pending kinematic movement.
pub fn apply_kinematic_motion(mut bodies: Query<(&mut Transform, &mut KinematicBody)>) {
    for (mut transform, mut body) in bodies.iter_mut() {
        if body.pending == Vec3::ZERO {
            body.last_applied = Vec3::ZERO;
            continue;
        }
        transform.translation += body.pending;
        body.last_applied = body.pending;
        body.pending = Vec3::ZERO;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::SystemState;
    use std::f32::consts::FRAC_PI_2;
    use std::time::Duration;

    type TransferParams<'w, 's> = (
        Res<'w, Time>,
        Query<'w, 's, (Entity, &'static Transform, &'static mut Platform)>,
        Query<'w, 's, (&'static Transform, &'static mut KinematicBody), Without<Platform>>,
        Query<'w, 's, (), With<DynamicBody>>,
    );

    fn run_transfer(world: &mut World) {
        let mut system_state: SystemState<TransferParams> = SystemState::new(world);
        {
            let (time, platforms, kinematic, dynamic) = system_state.get_mut(world);
            transfer_platform_motion(time, platforms, kinematic, dynamic);
        }
        system_state.apply(world);
    }

    fn world_with_time() -> World {
        let mut world = World::default();
        let mut time = Time::<()>::default();
        time.advance_by(Duration::from_secs_f32(0.1));
        world.insert_resource(time);
        world
    }

    #[test]
    fn quarter_turn_swings_passenger_through_arc() {
        let mut world = world_with_time();
        let passenger = world
            .spawn((Transform::from_xyz(5.0, 0.0, 0.0), KinematicBody::default()))
            .id();
        let mut platform = Platform::default();
        platform
            .registry
            .register(passenger, PassengerKind::Kinematic);
        let deck = world.spawn((Transform::IDENTITY, platform)).id();

        // First pass only primes the previous pose.
        run_transfer(&mut world);
        assert_eq!(
            world.get::<KinematicBody>(passenger).expect("body").pending,
            Vec3::ZERO
        );

        world.get_mut::<Transform>(deck).expect("deck").rotation =
            Quat::from_rotation_y(-FRAC_PI_2);
        run_transfer(&mut world);

        let pending = world.get::<KinematicBody>(passenger).expect("body").pending;
        assert!(pending.abs_diff_eq(Vec3::new(-5.0, 0.0, 5.0), 1.0e-4));
    }

    #[test]
    fn translation_and_rotation_compose_rigidly() {
        let mut world = world_with_time();
        let passenger = world
            .spawn((Transform::from_xyz(2.0, 1.0, 0.0), KinematicBody::default()))
            .id();
        let mut platform = Platform::default();
        platform
            .registry
            .register(passenger, PassengerKind::Kinematic);
        let deck = world.spawn((Transform::IDENTITY, platform)).id();
        run_transfer(&mut world);

        let moved = Transform::from_xyz(0.0, 0.0, -4.0).with_rotation(Quat::from_rotation_y(0.4));
        *world.get_mut::<Transform>(deck).expect("deck") = moved;
        run_transfer(&mut world);

        let start = Vec3::new(2.0, 1.0, 0.0);
        let pending = world.get::<KinematicBody>(passenger).expect("body").pending;
        let expected = moved.transform_point(start);
        assert!((start + pending).abs_diff_eq(expected, 1.0e-4));

        let velocity = world.get::<Platform>(deck).expect("deck").velocity;
        assert!(velocity.abs_diff_eq(Vec3::new(0.0, 0.0, -40.0), 1.0e-2));
    }

    #[test]
    fn dynamic_passengers_are_not_repositioned_and_stale_entries_pruned() {
        let mut world = world_with_time();
        let crate_body = world
            .spawn((Transform::from_xyz(1.0, 0.0, 0.0), DynamicBody::default()))
            .id();
        let gone = world.spawn(KinematicBody::default()).id();
        let mut platform = Platform::default();
        platform.registry.register(crate_body, PassengerKind::Dynamic);
        platform.registry.register(gone, PassengerKind::Kinematic);
        let deck = world.spawn((Transform::IDENTITY, platform)).id();
        world.despawn(gone);

        run_transfer(&mut world);
        world.get_mut::<Transform>(deck).expect("deck").translation = Vec3::X;
        run_transfer(&mut world);

        let registry = &world.get::<Platform>(deck).expect("deck").registry;
        assert_eq!(registry.dynamic(), &[crate_body]);
        assert!(registry.kinematic().is_empty());
        assert_eq!(
            world.get::<Transform>(crate_body).expect("crate").translation,
            Vec3::new(1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn kinematic_motion_is_applied_once() {
        let mut world = World::default();
        let body = world
            .spawn((Transform::IDENTITY, KinematicBody::default()))
            .id();
        world
            .get_mut::<KinematicBody>(body)
            .expect("body")
            .command(Vec3::new(1.0, 0.0, 2.0));

        let mut system_state: SystemState<Query<(&mut Transform, &mut KinematicBody)>> =
            SystemState::new(&mut world);
        for _ in 0..2 {
            let bodies = system_state.get_mut(&mut world);
            apply_kinematic_motion(bodies);
        }
        system_state.apply(&mut world);

        let transform = world.get::<Transform>(body).expect("transform");
        assert_eq!(transform.translation, Vec3::new(1.0, 0.0, 2.0));
        let motion = world.get::<KinematicBody>(body).expect("body");
        assert_eq!(motion.pending, Vec3::ZERO);
        assert_eq!(motion.last_applied, Vec3::ZERO);
    }
}
