//! Rigid attachment of docked vessels and the undock request queue.

use bevy::prelude::*;

use crate::platforms::Platform;
use crate::plugins::core::EventLog;
use crate::vessels::{compose_pose, AttachedTo, NavigationState, Navigator, Vessel};

/// Undock requests from the host, processed between ticks.
#[derive(Resource, Debug, Default)]
pub struct UndockQueue {
    pending: Vec<Entity>,
}

impl UndockQueue {
    pub fn push(&mut self, vessel: Entity) {
        if !self.pending.contains(&vessel) {
            self.pending.push(vessel);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.pending)
    }
}

/// Re-seats every attached vessel on its platform. A missing platform leaves
/// the vessel where it is.
pub fn follow_attachments(
    platforms: Query<&Transform, Without<AttachedTo>>,
    mut attached: Query<(&mut Transform, &AttachedTo)>,
) {
    for (mut transform, attachment) in attached.iter_mut() {
        let Ok(platform) = platforms.get(attachment.platform) else {
            continue;
        };
        *transform = compose_pose(platform, &attachment.relative);
    }
}

/// Detaches vessels whose undock was requested. Requests for vessels that are
/// not Docked are dropped.
pub fn process_undock_requests(
    mut commands: Commands,
    mut queue: ResMut<UndockQueue>,
    mut log: ResMut<EventLog>,
    mut vessels: Query<(&mut Navigator, &mut Vessel, Option<&AttachedTo>)>,
    mut platforms: Query<&mut Platform>,
) {
    if queue.is_empty() {
        return;
    }

    for entity in queue.drain() {
        let Ok((mut navigator, mut vessel, attachment)) = vessels.get_mut(entity) else {
            debug!("Undock request for unknown vessel {:?}", entity);
            continue;
        };
        if navigator.state() != NavigationState::Docked {
            debug!("Ignoring undock for {:?}: not docked", entity);
            continue;
        }

        if let Some(attachment) = attachment {
            if let Ok(mut platform) = platforms.get_mut(attachment.platform) {
                platform.detach(entity);
            }
            commands.entity(entity).remove::<AttachedTo>();
        }
        vessel.speed = 0.0;
        navigator.undock();

        info!("Vessel {:?} undocked", entity);
        log.push("Undocked".to_string());
    }
}

// =============================================================================
// Tests
// =============================================================================
