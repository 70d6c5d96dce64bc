//! Chase, dock-point selection and the phased docking approach.

use bevy::prelude::*;

use crate::platforms::Platform;
use crate::plugins::core::EventLog;
use crate::vessels::{
    planar_distance, relative_pose, AttachedTo, DockPhase, DockPoint, HeadingSource,
    NavigationFault, NavigationState, Navigator, Vessel,
};

use super::steering::steer;

// =============================================================================
// Systems
// =============================================================================

/// Runs one navigation step for every free-floating autonomous vessel.
///
/// Docked vessels carry `AttachedTo` and are moved by the attachment step
/// instead. Targets must not be navigators themselves.
#[allow(clippy::type_complexity)]
pub fn navigate_vessels(
    time: Res<Time>,
    mut commands: Commands,
    mut log: ResMut<EventLog>,
    mut vessels: Query<
        (Entity, &mut Transform, &mut Vessel, &mut Navigator),
        Without<AttachedTo>,
    >,
    targets: Query<&Transform, Without<Navigator>>,
    dock_points: Query<&DockPoint>,
    mut platforms: Query<&mut Platform>,
) {
    let delta_seconds = time.delta_secs();
    if delta_seconds <= 0.0 {
        return;
    }

    for (entity, mut transform, mut vessel, mut navigator) in vessels.iter_mut() {
        match navigator.state() {
            NavigationState::Chasing => {
                let Some(target_transform) =
                    navigator.target.and_then(|target| targets.get(target).ok())
                else {
                    record_fault(entity, &mut navigator, NavigationFault::MissingReference);
                    continue;
                };
                let target_velocity = navigator
                    .target
                    .filter(|_| navigator.match_target_speed)
                    .map(|target| platform_velocity(&platforms, target));

                let chase_point = target_transform.transform_point(navigator.chase.offset);
                let steer_params = navigator.chase.steer;
                let report = steer(
                    &mut transform,
                    &mut vessel,
                    chase_point,
                    target_velocity,
                    &steer_params,
                    HeadingSource::FreeChase,
                    delta_seconds,
                );
                if let Some(fault) = report.fault {
                    record_fault(entity, &mut navigator, fault);
                }

                let candidates = navigator.dock_points.map(|slot| {
                    slot.and_then(|dock_point| {
                        resolve_dock(dock_point, &targets, &dock_points)
                            .map(|resolved| (dock_point, resolved.dock_pose.translation))
                    })
                });
                let Some((dock_point, distance)) = select_dock_point(
                    transform.translation,
                    candidates[0],
                    candidates[1],
                    navigator.dock.tie_tolerance,
                ) else {
                    continue;
                };

                if distance <= navigator.dock.start_distance {
                    navigator.begin_docking(dock_point);
                    info!(
                        "Vessel {:?} committed to dock point {:?} at {:.1}",
                        entity, dock_point, distance
                    );
                    log.push(format!("Docking committed at {:.1}", distance));
                }
            }
            NavigationState::Docking => {
                let resolved = navigator
                    .session()
                    .and_then(|session| resolve_dock(session.dock_point, &targets, &dock_points));
                let Some(mut dock) = resolved else {
                    navigator.abandon_docking(NavigationFault::StaleSession);
                    warn!("Vessel {:?} lost its dock point, chasing again", entity);
                    log.push("Docking abandoned: dock point gone".to_string());
                    continue;
                };
                if navigator.match_target_speed {
                    dock.platform_velocity = Some(platform_velocity(&platforms, dock.platform));
                }

                let hard_docked = docking_step(
                    entity,
                    &mut transform,
                    &mut vessel,
                    &mut navigator,
                    &dock,
                    &mut log,
                    delta_seconds,
                );
                if !hard_docked {
                    continue;
                }

                commands.entity(entity).insert(AttachedTo {
                    platform: dock.platform,
                    relative: relative_pose(&dock.platform_pose, &transform),
                });
                if let Ok(mut platform) = platforms.get_mut(dock.platform) {
                    platform.attach(entity);
                }
            }
            NavigationState::Docked => {}
        }
    }
}

// =============================================================================
// Dock-point selection
// =============================================================================

/// Nearer of the two candidates by straight-line distance. The left
/// candidate wins when both are within `tie_tolerance` of each other.
pub fn select_dock_point(
    position: Vec3,
    left: Option<(Entity, Vec3)>,
    right: Option<(Entity, Vec3)>,
    tie_tolerance: f32,
) -> Option<(Entity, f32)> {
    let left = left.map(|(entity, point)| (entity, position.distance(point)));
    let right = right.map(|(entity, point)| (entity, position.distance(point)));

    match (left, right) {
        (Some(left), Some(right)) => {
            if left.1 <= right.1 + tie_tolerance {
                Some(left)
            } else {
                Some(right)
            }
        }
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

// =============================================================================
// Docking
// =============================================================================

/// A dock point resolved to world space for this tick.
struct ResolvedDock {
    platform: Entity,
    platform_pose: Transform,
    dock_pose: Transform,
    platform_velocity: Option<Vec3>,
}

fn resolve_dock(
    dock_point: Entity,
    targets: &Query<&Transform, Without<Navigator>>,
    dock_points: &Query<&DockPoint>,
) -> Option<ResolvedDock> {
    let point = dock_points.get(dock_point).ok()?;
    let parent = targets.get(point.vessel).ok()?;
    Some(ResolvedDock {
        platform: point.vessel,
        platform_pose: *parent,
        dock_pose: point.world_pose(parent),
        platform_velocity: None,
    })
}

fn platform_velocity(platforms: &Query<&mut Platform>, entity: Entity) -> Vec3 {
    platforms
        .get(entity)
        .map(|platform| platform.velocity)
        .unwrap_or(Vec3::ZERO)
}

/// Advances the docking session by at most one phase. Returns true on hard dock.
///
/// Lane and snap thresholds compare planar distances, not 3-D ones: steering
/// holds the vessel at its own altitude, so a bobbing dock point must not keep
/// a threshold from being crossed.
fn docking_step(
    entity: Entity,
    transform: &mut Transform,
    vessel: &mut Vessel,
    navigator: &mut Navigator,
    dock: &ResolvedDock,
    log: &mut EventLog,
    delta_seconds: f32,
) -> bool {
    let Some(phase) = navigator.phase() else {
        return false;
    };
    let config = navigator.dock;
    let dock_position = dock.dock_pose.translation;
    let lane = dock_position + dock.dock_pose.right().as_vec3() * config.approach_offset;
    let lock = HeadingSource::LockedTo(dock.dock_pose.forward().as_vec3());
    let position = transform.translation;

    let (target, params) = match phase {
        DockPhase::ApproachLane if planar_distance(position, lane) > config.lane_switch_distance => {
            (lane, config.approach_params())
        }
        DockPhase::ApproachLane => {
            navigator.advance_phase(DockPhase::SlideIn);
            debug!("Vessel {:?} reached the approach lane", entity);
            log.push("Sliding in".to_string());
            (dock_position, config.slide_params())
        }
        DockPhase::SlideIn if planar_distance(position, dock_position) > config.snap_distance => {
            (dock_position, config.slide_params())
        }
        DockPhase::SlideIn => {
            transform.translation = dock_position;
            transform.rotation = dock.dock_pose.rotation;
            vessel.speed = 0.0;
            navigator.advance_phase(DockPhase::HardDocked);
            navigator.complete_docking();

            info!("Vessel {:?} hard-docked to {:?}", entity, dock.platform);
            log.push("Hard docked".to_string());
            return true;
        }
        DockPhase::HardDocked => return false,
    };

    let report = steer(
        transform,
        vessel,
        target,
        dock.platform_velocity,
        &params,
        lock,
        delta_seconds,
    );
    if let Some(fault) = report.fault {
        record_fault(entity, navigator, fault);
    }
    false
}

fn record_fault(entity: Entity, navigator: &mut Navigator, fault: NavigationFault) {
    if navigator.last_fault != Some(fault) {
        debug!("Vessel {:?}: {}", entity, fault);
    }
    navigator.last_fault = Some(fault);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vessels::Propulsion;
    use bevy::ecs::system::SystemState;
    use std::time::Duration;

    type NavigateParams<'w, 's> = (
        Res<'w, Time>,
        Commands<'w, 's>,
        ResMut<'w, EventLog>,
        Query<
            'w,
            's,
            (Entity, &'static mut Transform, &'static mut Vessel, &'static mut Navigator),
            Without<AttachedTo>,
        >,
        Query<'w, 's, &'static Transform, Without<Navigator>>,
        Query<'w, 's, &'static DockPoint>,
        Query<'w, 's, &'static mut Platform>,
    );

    fn world_with_time(delta_seconds: f32) -> World {
        let mut world = World::default();
        let mut time = Time::<()>::default();
        time.advance_by(Duration::from_secs_f32(delta_seconds));
        world.insert_resource(time);
        world.insert_resource(EventLog::default());
        world
    }

    fn run_navigation(world: &mut World) {
        let mut system_state: SystemState<NavigateParams> = SystemState::new(world);
        {
            let (time, commands, log, vessels, targets, dock_points, platforms) =
                system_state.get_mut(world);
            navigate_vessels(time, commands, log, vessels, targets, dock_points, platforms);
        }
        system_state.apply(world);
    }

    fn spawn_platform(world: &mut World, position: Vec3) -> Entity {
        world
            .spawn((Transform::from_translation(position), Platform::default()))
            .id()
    }

    fn spawn_dock_point(world: &mut World, platform: Entity, offset: Vec3) -> Entity {
        world
            .spawn(DockPoint {
                vessel: platform,
                local: Transform::from_translation(offset),
                name: "dock".to_string(),
            })
            .id()
    }

    fn spawn_raider(world: &mut World, navigator: Navigator, position: Vec3) -> Entity {
        world
            .spawn((
                Transform::from_translation(position).looking_to(Vec3::NEG_Z, Vec3::Y),
                Vessel::new(Propulsion::default()),
                navigator,
            ))
            .id()
    }

    #[test]
    fn select_dock_point_prefers_nearer_candidate() {
        let mut world = World::default();
        let near = world.spawn_empty().id();
        let far = world.spawn_empty().id();

        let chosen = select_dock_point(
            Vec3::ZERO,
            Some((far, Vec3::new(18.0, 0.0, 0.0))),
            Some((near, Vec3::new(0.0, 0.0, 12.0))),
            1.0e-4,
        );
        assert_eq!(chosen.map(|(entity, _)| entity), Some(near));
        assert!((chosen.map(|(_, distance)| distance).unwrap_or(0.0) - 12.0).abs() < 1.0e-5);
    }

    #[test]
    fn select_dock_point_ties_go_left() {
        let mut world = World::default();
        let left = world.spawn_empty().id();
        let right = world.spawn_empty().id();

        let chosen = select_dock_point(
            Vec3::ZERO,
            Some((left, Vec3::new(-5.0, 0.0, 0.0))),
            Some((right, Vec3::new(5.0, 0.0, 0.0))),
            1.0e-4,
        );
        assert_eq!(chosen.map(|(entity, _)| entity), Some(left));
        assert_eq!(select_dock_point(Vec3::ZERO, None, None, 1.0e-4), None);
    }

    #[test]
    fn chasing_commits_to_nearer_dock_point_in_range() {
        let mut world = world_with_time(0.02);
        let platform = spawn_platform(&mut world, Vec3::ZERO);
        let near = spawn_dock_point(&mut world, platform, Vec3::new(0.0, 0.0, 12.0));
        let far = spawn_dock_point(&mut world, platform, Vec3::new(0.0, 0.0, -18.0));
        let raider = spawn_raider(
            &mut world,
            Navigator::new(platform).with_dock_points(Some(far), Some(near)),
            Vec3::ZERO,
        );

        run_navigation(&mut world);

        let navigator = world.get::<Navigator>(raider).cloned();
        let navigator = navigator.expect("raider keeps its navigator");
        assert_eq!(navigator.state(), NavigationState::Docking);
        assert_eq!(navigator.session().map(|session| session.dock_point), Some(near));
        assert_eq!(navigator.phase(), Some(DockPhase::ApproachLane));
        assert_eq!(world.resource::<EventLog>().entries().len(), 1);
    }

    #[test]
    fn chasing_without_dock_points_stays_chasing() {
        let mut world = world_with_time(0.02);
        let platform = spawn_platform(&mut world, Vec3::new(0.0, 0.0, -5.0));
        let raider = spawn_raider(&mut world, Navigator::new(platform), Vec3::ZERO);

        for _ in 0..10 {
            run_navigation(&mut world);
        }

        let navigator = world.get::<Navigator>(raider).expect("navigator");
        assert_eq!(navigator.state(), NavigationState::Chasing);
        assert!(world.get::<Vessel>(raider).expect("vessel").speed > 0.0);
    }

    #[test]
    fn missing_target_is_a_no_op() {
        let mut world = world_with_time(0.02);
        let gone = world.spawn_empty().id();
        world.despawn(gone);
        let raider = spawn_raider(&mut world, Navigator::new(gone), Vec3::new(1.0, 0.0, 1.0));

        run_navigation(&mut world);

        let transform = world.get::<Transform>(raider).expect("transform");
        assert_eq!(transform.translation, Vec3::new(1.0, 0.0, 1.0));
        let navigator = world.get::<Navigator>(raider).expect("navigator");
        assert_eq!(navigator.state(), NavigationState::Chasing);
        assert_eq!(navigator.last_fault, Some(NavigationFault::MissingReference));
    }

    #[test]
    fn removed_dock_point_falls_back_to_chasing() {
        let mut world = world_with_time(0.02);
        let platform = spawn_platform(&mut world, Vec3::ZERO);
        let dock = spawn_dock_point(&mut world, platform, Vec3::new(3.0, 0.0, 0.0));
        let mut navigator = Navigator::new(platform).with_dock_points(Some(dock), None);
        navigator.begin_docking(dock);
        let raider = spawn_raider(&mut world, navigator, Vec3::new(0.0, 0.0, 15.0));

        world.despawn(dock);
        run_navigation(&mut world);

        let navigator = world.get::<Navigator>(raider).expect("navigator");
        assert_eq!(navigator.state(), NavigationState::Chasing);
        assert!(navigator.session().is_none());
        assert_eq!(navigator.last_fault, Some(NavigationFault::StaleSession));
    }

    #[test]
    fn phases_advance_in_order_and_hard_dock_matches_pose() {
        let mut world = world_with_time(0.02);
        let platform = spawn_platform(&mut world, Vec3::ZERO);
        // Starboard dock point facing forward; the raider starts on the line
        // of its approach lane, half a meter out.
        let dock = spawn_dock_point(&mut world, platform, Vec3::new(3.0, 0.0, 0.0));
        let mut navigator = Navigator::new(platform).with_dock_points(None, Some(dock));
        navigator.dock.approach_offset = 0.5;
        let raider = spawn_raider(&mut world, navigator, Vec3::new(3.5, 0.0, 18.0));

        let mut phases = Vec::new();
        for _ in 0..6000 {
            run_navigation(&mut world);
            let navigator = world.get::<Navigator>(raider).expect("navigator");
            if let Some(phase) = navigator.phase() {
                if phases.last() != Some(&phase) {
                    phases.push(phase);
                }
            }
            if navigator.state() == NavigationState::Docked {
                break;
            }
        }

        let navigator = world.get::<Navigator>(raider).expect("navigator");
        assert_eq!(navigator.state(), NavigationState::Docked);
        assert_eq!(navigator.docked_at(), Some(dock));
        assert_eq!(phases, vec![DockPhase::ApproachLane, DockPhase::SlideIn]);

        let transform = world.get::<Transform>(raider).expect("transform");
        assert!(transform.translation.abs_diff_eq(Vec3::new(3.0, 0.0, 0.0), 1.0e-5));
        assert!(transform.rotation.angle_between(Quat::IDENTITY) < 1.0e-5);
        assert_eq!(world.get::<Vessel>(raider).expect("vessel").speed, 0.0);

        let attached = world.get::<AttachedTo>(raider).expect("attached after hard dock");
        assert_eq!(attached.platform, platform);
        assert!(world
            .get::<Platform>(platform)
            .expect("platform")
            .attached
            .contains(&raider));
    }

    #[test]
    fn hard_docked_session_does_not_snap_again() {
        let mut world = world_with_time(0.02);
        let platform = spawn_platform(&mut world, Vec3::ZERO);
        let dock = spawn_dock_point(&mut world, platform, Vec3::new(3.0, 0.0, 0.0));
        let mut navigator = Navigator::new(platform).with_dock_points(None, Some(dock));
        navigator.begin_docking(dock);
        navigator.advance_phase(DockPhase::SlideIn);
        navigator.advance_phase(DockPhase::HardDocked);
        let raider = spawn_raider(&mut world, navigator, Vec3::new(3.2, 0.0, 0.2));

        run_navigation(&mut world);

        let transform = world.get::<Transform>(raider).expect("transform");
        assert_eq!(transform.translation, Vec3::new(3.2, 0.0, 0.2));
        assert!(world.get::<AttachedTo>(raider).is_none());
        assert!(world.resource::<EventLog>().entries().is_empty());
        let navigator = world.get::<Navigator>(raider).expect("navigator");
        assert_eq!(navigator.state(), NavigationState::Docking);
    }

    #[test]
    fn platform_speed_is_matched_only_when_enabled() {
        let mut world = world_with_time(0.1);
        let mut moving = Platform::default();
        moving.velocity = Vec3::new(0.0, 0.0, -4.0);
        let platform = world
            .spawn((Transform::from_xyz(0.0, 0.0, -40.0), moving))
            .id();
        // Chase point sits 7 m ahead of both raiders: arrival alone asks for 5.
        let plain = spawn_raider(&mut world, Navigator::new(platform), Vec3::new(0.0, 0.0, -25.0));
        let matched = spawn_raider(
            &mut world,
            Navigator::new(platform).with_target_speed_matching(true),
            Vec3::new(0.0, 0.0, -25.0),
        );
        for raider in [plain, matched] {
            world.get_mut::<Vessel>(raider).expect("vessel").speed = 5.0;
        }

        run_navigation(&mut world);

        let plain = world.get::<Vessel>(plain).expect("vessel").speed;
        let matched = world.get::<Vessel>(matched).expect("vessel").speed;
        assert!((plain - 5.0).abs() < 1.0e-4);
        // Arrival 5 plus 4 along the bow, reached at accel 4 over 0.1 s.
        assert!((matched - 5.4).abs() < 1.0e-4);
    }
}
