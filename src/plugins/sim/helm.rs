//! Platform self-motion: helm wheel, cruise propulsion and sway.

use bevy::prelude::*;

use crate::platforms::PlatformHelm;
use crate::vessels::{move_towards, planar_distance, Vessel};

/// Moves every helmed platform for this tick. Runs before passenger transfer
/// so the recorded pose delta includes this motion.
pub fn drive_platforms(
    time: Res<Time>,
    mut platforms: Query<(&mut Transform, &mut Vessel, &mut PlatformHelm)>,
    operators: Query<&Transform, Without<PlatformHelm>>,
) {
    let delta_seconds = time.delta_secs();
    if delta_seconds <= 0.0 {
        return;
    }
    let elapsed = time.elapsed_secs();

    for (mut transform, mut vessel, mut helm) in platforms.iter_mut() {
        let honoured = match helm.operator {
            None => true,
            Some(operator) => match operators.get(operator) {
                Ok(operator_transform) => {
                    let wheel = transform.transform_point(helm.wheel_offset);
                    planar_distance(operator_transform.translation, wheel)
                        <= helm.interaction_distance
                }
                Err(_) => true,
            },
        };

        let steering = helm.update_wheel(honoured, delta_seconds);
        let (yaw_from_pose, _, _) = transform.rotation.to_euler(EulerRot::YXZ);
        let yaw_deg = helm.yaw_deg.unwrap_or(yaw_from_pose.to_degrees())
            - steering * helm.steering_sensitivity * delta_seconds;
        helm.yaw_deg = Some(yaw_deg);
        let base_altitude = *helm.base_altitude.get_or_insert(transform.translation.y);

        let rate = if helm.cruise_speed > vessel.speed {
            vessel.propulsion.accel
        } else {
            vessel.propulsion.decel
        };
        vessel.speed = move_towards(vessel.speed, helm.cruise_speed, rate * delta_seconds);

        let heading = Quat::from_rotation_y(yaw_deg.to_radians());
        transform.translation += heading * Vec3::NEG_Z * vessel.speed * delta_seconds;

        let (bob, pitch_deg, roll_deg) = helm.sway.sample(elapsed);
        transform.translation.y = base_altitude + bob;
        transform.rotation = Quat::from_euler(
            EulerRot::YXZ,
            yaw_deg.to_radians(),
            pitch_deg.to_radians(),
            roll_deg.to_radians(),
        );
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::Sway;
    use crate::vessels::Propulsion;
    use bevy::ecs::system::SystemState;
    use std::time::Duration;

    type HelmParams<'w, 's> = (
        Res<'w, Time>,
        Query<
            'w,
            's,
            (
                &'static mut Transform,
                &'static mut Vessel,
                &'static mut PlatformHelm,
            ),
        >,
        Query<'w, 's, &'static Transform, Without<PlatformHelm>>,
    );

    fn run_helm(world: &mut World, ticks: usize) {
        let mut system_state: SystemState<HelmParams> = SystemState::new(world);
        for _ in 0..ticks {
            world
                .resource_mut::<Time>()
                .advance_by(Duration::from_secs_f32(0.1));
            {
                let (time, platforms, operators) = system_state.get_mut(world);
                drive_platforms(time, platforms, operators);
            }
            system_state.apply(world);
        }
    }

    fn spawn_ship(world: &mut World, helm: PlatformHelm) -> Entity {
        world
            .spawn((
                Transform::from_xyz(0.0, 1.0, 0.0),
                Vessel {
                    speed: 5.0,
                    propulsion: Propulsion::default(),
                },
                helm,
            ))
            .id()
    }

    fn world_with_time() -> World {
        let mut world = World::default();
        world.insert_resource(Time::<()>::default());
        world
    }

    #[test]
    fn calm_platform_cruises_straight_ahead() {
        let mut world = world_with_time();
        let ship = spawn_ship(
            &mut world,
            PlatformHelm {
                sway: Sway::calm(),
                ..PlatformHelm::default()
            },
        );

        run_helm(&mut world, 10);

        let transform = world.get::<Transform>(ship).expect("ship");
        assert!(transform
            .translation
            .abs_diff_eq(Vec3::new(0.0, 1.0, -5.0), 1.0e-4));
        assert!(transform.rotation.angle_between(Quat::IDENTITY) < 1.0e-5);
    }

    #[test]
    fn positive_input_turns_to_starboard() {
        let mut world = world_with_time();
        let ship = spawn_ship(
            &mut world,
            PlatformHelm {
                turn_input: 1.0,
                sway: Sway::calm(),
                ..PlatformHelm::default()
            },
        );

        run_helm(&mut world, 20);

        let transform = world.get::<Transform>(ship).expect("ship");
        assert!(transform.forward().as_vec3().x > 0.0);
        assert!(world.get::<PlatformHelm>(ship).expect("helm").wheel_angle > 0.0);
    }

    #[test]
    fn distant_operator_cannot_steer() {
        let mut world = world_with_time();
        let operator = world.spawn(Transform::from_xyz(20.0, 0.0, 0.0)).id();
        let ship = spawn_ship(
            &mut world,
            PlatformHelm {
                turn_input: 1.0,
                operator: Some(operator),
                sway: Sway::calm(),
                ..PlatformHelm::default()
            },
        );

        run_helm(&mut world, 10);

        let helm = world.get::<PlatformHelm>(ship).expect("helm");
        assert_eq!(helm.wheel_angle, 0.0);
        let transform = world.get::<Transform>(ship).expect("ship");
        assert!(transform.forward().as_vec3().abs_diff_eq(Vec3::NEG_Z, 1.0e-5));
    }

    #[test]
    fn operator_at_wheel_steers_regardless_of_height() {
        let mut world = world_with_time();
        let operator = world.spawn(Transform::from_xyz(1.0, 5.0, 0.0)).id();
        let ship = spawn_ship(
            &mut world,
            PlatformHelm {
                turn_input: -1.0,
                operator: Some(operator),
                sway: Sway::calm(),
                ..PlatformHelm::default()
            },
        );

        run_helm(&mut world, 1);

        assert!(world.get::<PlatformHelm>(ship).expect("helm").wheel_angle < 0.0);
    }

    #[test]
    fn sway_bobs_around_base_altitude() {
        let mut world = world_with_time();
        let ship = spawn_ship(&mut world, PlatformHelm::default());

        let mut highest = f32::MIN;
        let mut lowest = f32::MAX;
        for _ in 0..80 {
            run_helm(&mut world, 1);
            let y = world.get::<Transform>(ship).expect("ship").translation.y;
            highest = highest.max(y);
            lowest = lowest.min(y);
        }

        assert!(highest <= 1.25 + 1.0e-4);
        assert!(lowest >= 0.75 - 1.0e-4);
        assert!(highest - lowest > 0.3);
    }
}
