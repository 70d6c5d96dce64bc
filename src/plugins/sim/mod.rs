//! Simulation plugin and system scheduling.

use bevy::prelude::*;

use crate::platforms::Platform;
use crate::plugins::core::{
    sim_not_paused, LogicSet, LogicTick, PhysicsSet, PhysicsTick, SimTickCount,
};
use crate::vessels::{NavigationState, Navigator};

mod attachment;
mod docking;
mod gravity;
mod helm;
mod overlaps;
mod physics;
mod steering;
mod transfer;

pub use attachment::{follow_attachments, process_undock_requests, UndockQueue};
pub use docking::{navigate_vessels, select_dock_point};
pub use gravity::apply_local_gravity;
pub use helm::drive_platforms;
pub use overlaps::{
    apply_overlap_events, detect_capture_overlaps, OverlapEvent, OverlapKind, OverlapQueue,
};
pub use physics::{integrate_dynamic_bodies, resolve_deck_contacts};
pub use steering::{steer, SteerReport};
pub use transfer::{apply_kinematic_motion, transfer_platform_motion};

pub struct SimPlugin;

impl Plugin for SimPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OverlapQueue>()
            .init_resource::<UndockQueue>()
            .add_systems(
                LogicTick,
                (process_undock_requests, detect_capture_overlaps, apply_overlap_events)
                    .chain()
                    .in_set(LogicSet::Requests)
                    .run_if(sim_not_paused),
            )
            .add_systems(
                LogicTick,
                drive_platforms
                    .in_set(LogicSet::PlatformMotion)
                    .run_if(sim_not_paused),
            )
            .add_systems(
                LogicTick,
                (transfer_platform_motion, apply_kinematic_motion)
                    .chain()
                    .in_set(LogicSet::PassengerTransfer)
                    .run_if(sim_not_paused),
            )
            .add_systems(
                LogicTick,
                follow_attachments
                    .in_set(LogicSet::Attachment)
                    .run_if(sim_not_paused),
            )
            .add_systems(
                LogicTick,
                (navigate_vessels, count_logic_ticks)
                    .chain()
                    .in_set(LogicSet::Navigation)
                    .run_if(sim_not_paused),
            )
            .add_systems(
                PhysicsTick,
                apply_local_gravity
                    .in_set(PhysicsSet::Forces)
                    .run_if(sim_not_paused),
            )
            .add_systems(
                PhysicsTick,
                integrate_dynamic_bodies
                    .in_set(PhysicsSet::Integrate)
                    .run_if(sim_not_paused),
            )
            .add_systems(
                PhysicsTick,
                (resolve_deck_contacts, count_physics_ticks)
                    .chain()
                    .in_set(PhysicsSet::Contacts)
                    .run_if(sim_not_paused),
            );
    }
}

fn count_logic_ticks(
    mut counter: ResMut<SimTickCount>,
    navigators: Query<&Navigator>,
    platforms: Query<&Platform>,
) {
    counter.logic = counter.logic.saturating_add(1);

    if counter.logic % 60 == 0 {
        let docked = navigators
            .iter()
            .filter(|navigator| navigator.state() == NavigationState::Docked)
            .count();
        let passengers: usize = platforms.iter().map(|platform| platform.registry.len()).sum();
        debug!(
            "Logic tick {}: {} navigators ({} docked), {} passengers aboard",
            counter.logic,
            navigators.iter().count(),
            docked,
            passengers
        );
    }
}

fn count_physics_ticks(mut counter: ResMut<SimTickCount>) {
    counter.physics = counter.physics.saturating_add(1);
}
