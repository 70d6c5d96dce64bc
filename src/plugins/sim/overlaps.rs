//! Capture-volume overlap edges and passenger registry membership.

use bevy::prelude::*;

use crate::platforms::{
    CaptureVolume, DynamicBody, KinematicBody, LocalGravity, Passenger, PassengerKind, Platform,
};
use crate::plugins::core::EventLog;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OverlapKind {
    Enter,
    Exit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OverlapEvent {
    pub body: Entity,
    pub platform: Entity,
    pub kind: OverlapKind,
}

/// Enter/exit edges waiting to be applied. Hosts with their own collision
/// detection may push edges here directly.
#[derive(Resource, Debug, Default)]
pub struct OverlapQueue {
    events: Vec<OverlapEvent>,
}

impl OverlapQueue {
    pub fn push(&mut self, event: OverlapEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<OverlapEvent> {
        std::mem::take(&mut self.events)
    }
}

// =============================================================================
// Systems
// =============================================================================

/// Emits an edge whenever a passenger's position enters or leaves a capture
/// volume. A despawned platform counts as an exit.
pub fn detect_capture_overlaps(
    mut queue: ResMut<OverlapQueue>,
    volumes: Query<(Entity, &Transform, &CaptureVolume)>,
    passengers: Query<(Entity, &Transform, &Passenger)>,
) {
    for (body, transform, passenger) in passengers.iter() {
        for platform in passenger.overlaps.iter() {
            if !volumes.contains(*platform) {
                queue.push(OverlapEvent {
                    body,
                    platform: *platform,
                    kind: OverlapKind::Exit,
                });
            }
        }

        for (platform, platform_transform, volume) in volumes.iter() {
            if platform == body {
                continue;
            }
            let inside = volume.contains(platform_transform, transform.translation);
            let was_inside = passenger.overlaps.contains(&platform);
            let kind = match (inside, was_inside) {
                (true, false) => OverlapKind::Enter,
                (false, true) => OverlapKind::Exit,
                _ => continue,
            };
            queue.push(OverlapEvent {
                body,
                platform,
                kind,
            });
        }
    }
}

/// Applies queued edges to the registries. First registrant wins: an enter
/// from a second platform is only remembered, and becomes the owner if the
/// body exits its current platform while still inside the other.
pub fn apply_overlap_events(
    mut commands: Commands,
    mut queue: ResMut<OverlapQueue>,
    mut log: ResMut<EventLog>,
    mut passengers: Query<(&mut Passenger, Option<&mut DynamicBody>, Has<KinematicBody>)>,
    mut platforms: Query<&mut Platform>,
) {
    if queue.is_empty() {
        return;
    }

    for event in queue.drain() {
        let Ok((mut passenger, mut dynamic, is_kinematic)) = passengers.get_mut(event.body) else {
            debug!("Overlap edge for non-passenger {:?}", event.body);
            continue;
        };
        let kind = if is_kinematic {
            PassengerKind::Kinematic
        } else if dynamic.is_some() {
            PassengerKind::Dynamic
        } else {
            continue;
        };

        match event.kind {
            OverlapKind::Enter => {
                passenger.note_overlap(event.platform);
                match passenger.riding {
                    None => {
                        if board(
                            &mut commands,
                            &mut platforms,
                            event,
                            kind,
                            dynamic.as_deref_mut(),
                        ) {
                            passenger.riding = Some(event.platform);
                            log.push(format!("Passenger boarded {:?}", event.platform));
                        }
                    }
                    Some(current) if current == event.platform => {}
                    Some(current) => {
                        warn!(
                            "Passenger {:?} entered {:?} while riding {:?}; keeping first",
                            event.body, event.platform, current
                        );
                    }
                }
            }
            OverlapKind::Exit => {
                passenger.clear_overlap(event.platform);
                if passenger.riding != Some(event.platform) {
                    continue;
                }

                leave(
                    &mut commands,
                    &mut platforms,
                    event,
                    kind,
                    dynamic.as_deref_mut(),
                );
                passenger.riding = None;
                log.push(format!("Passenger left {:?}", event.platform));

                let candidates = passenger.overlaps.clone();
                for platform in candidates {
                    let handoff = OverlapEvent {
                        platform,
                        ..event
                    };
                    if board(
                        &mut commands,
                        &mut platforms,
                        handoff,
                        kind,
                        dynamic.as_deref_mut(),
                    ) {
                        passenger.riding = Some(platform);
                        info!("Passenger {:?} handed off to {:?}", event.body, platform);
                        break;
                    }
                }
            }
        }
    }
}

fn board(
    commands: &mut Commands,
    platforms: &mut Query<&mut Platform>,
    event: OverlapEvent,
    kind: PassengerKind,
    dynamic: Option<&mut DynamicBody>,
) -> bool {
    let Ok(mut platform) = platforms.get_mut(event.platform) else {
        return false;
    };
    platform.registry.register(event.body, kind);

    if kind == PassengerKind::Dynamic {
        if let Some(dynamic) = dynamic {
            dynamic.use_world_gravity = false;
        }
        commands
            .entity(event.body)
            .insert(platform.local_gravity(event.platform));
    }
    debug!("Registered {:?} on {:?} as {:?}", event.body, event.platform, kind);
    true
}

fn leave(
    commands: &mut Commands,
    platforms: &mut Query<&mut Platform>,
    event: OverlapEvent,
    kind: PassengerKind,
    dynamic: Option<&mut DynamicBody>,
) {
    if let Ok(mut platform) = platforms.get_mut(event.platform) {
        platform.registry.unregister(event.body);
    }
    if kind != PassengerKind::Dynamic {
        return;
    }
    if let Some(dynamic) = dynamic {
        dynamic.use_world_gravity = true;
    }
    commands.entity(event.body).remove::<LocalGravity>();
}

// =============================================================================
// Tests
// =============================================================================
