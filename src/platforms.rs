use bevy::prelude::*;

use crate::vessels::move_towards;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PassengerKind {
    /// Moved by explicit position commands (character controllers).
    Kinematic,
    /// Moved by forces under the physics integrator.
    Dynamic,
}

/// Bodies currently carried by one platform, partitioned by kind.
#[derive(Debug, Clone, Default)]
pub struct PassengerRegistry {
    kinematic: Vec<Entity>,
    dynamic: Vec<Entity>,
}

impl PassengerRegistry {
    /// Returns false if the body was already registered.
    pub fn register(&mut self, body: Entity, kind: PassengerKind) -> bool {
        if self.contains(body) {
            return false;
        }
        match kind {
            PassengerKind::Kinematic => self.kinematic.push(body),
            PassengerKind::Dynamic => self.dynamic.push(body),
        }
        true
    }

    pub fn unregister(&mut self, body: Entity) -> Option<PassengerKind> {
        if let Some(index) = self.kinematic.iter().position(|entry| *entry == body) {
            self.kinematic.remove(index);
            return Some(PassengerKind::Kinematic);
        }
        if let Some(index) = self.dynamic.iter().position(|entry| *entry == body) {
            self.dynamic.remove(index);
            return Some(PassengerKind::Dynamic);
        }
        None
    }

    pub fn contains(&self, body: Entity) -> bool {
        self.kinematic.contains(&body) || self.dynamic.contains(&body)
    }

    pub fn kind_of(&self, body: Entity) -> Option<PassengerKind> {
        if self.kinematic.contains(&body) {
            Some(PassengerKind::Kinematic)
        } else if self.dynamic.contains(&body) {
            Some(PassengerKind::Dynamic)
        } else {
            None
        }
    }

    pub fn kinematic(&self) -> &[Entity] {
        &self.kinematic
    }

    pub fn dynamic(&self) -> &[Entity] {
        &self.dynamic
    }

    pub fn len(&self) -> usize {
        self.kinematic.len() + self.dynamic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries the predicate rejects. Returns how many were removed.
    pub fn retain(&mut self, mut keep: impl FnMut(Entity, PassengerKind) -> bool) -> usize {
        let before = self.len();
        self.kinematic
            .retain(|entry| keep(*entry, PassengerKind::Kinematic));
        self.dynamic.retain(|entry| keep(*entry, PassengerKind::Dynamic));
        before - self.len()
    }
}

/// Pose change of a platform over one logic tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseDelta {
    pub translation: Vec3,
    pub rotation: Quat,
    /// Platform position before the tick; rotation happens about this point.
    pub pivot: Vec3,
}

impl Default for PoseDelta {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            pivot: Vec3::ZERO,
        }
    }
}

impl PoseDelta {
    pub fn between(previous: (Vec3, Quat), current: &Transform) -> Self {
        Self {
            translation: current.translation - previous.0,
            rotation: (current.rotation * previous.1.inverse()).normalize(),
            pivot: previous.0,
        }
    }

    /// Movement that keeps a body at `offset` from the pivot rigidly seated.
    pub fn carry(&self, offset: Vec3) -> Vec3 {
        self.translation + (self.rotation * offset - offset)
    }
}

/// A vessel that carries passengers on its deck.
#[derive(Component, Debug, Clone)]
pub struct Platform {
    pub registry: PassengerRegistry,
    /// Vessels hard-docked to this platform.
    pub attached: Vec<Entity>,
    pub gravity: f32,
    pub align_to_surface: bool,
    pub align_speed: f32,
    /// Deck plane height in the platform's local frame.
    pub deck_height: f32,
    pub deck_friction: f32,
    /// Linear velocity over the last logic tick.
    pub velocity: Vec3,
    pub last_delta: PoseDelta,
    pub(crate) previous: Option<(Vec3, Quat)>,
}

impl Default for Platform {
    fn default() -> Self {
        Self {
            registry: PassengerRegistry::default(),
            attached: Vec::new(),
            gravity: 9.81,
            align_to_surface: true,
            align_speed: 5.0,
            deck_height: 0.0,
            deck_friction: 8.0,
            velocity: Vec3::ZERO,
            last_delta: PoseDelta::default(),
            previous: None,
        }
    }
}

impl Platform {
    /// Computes the delta since the last recorded pose and remembers the new one.
    /// The first call yields an identity delta.
    pub fn record_pose(&mut self, current: &Transform, delta_seconds: f32) -> PoseDelta {
        let previous = self
            .previous
            .unwrap_or((current.translation, current.rotation));
        let delta = PoseDelta::between(previous, current);

        self.velocity = if delta_seconds > 0.0 {
            delta.translation / delta_seconds
        } else {
            Vec3::ZERO
        };
        self.last_delta = delta;
        self.previous = Some((current.translation, current.rotation));
        delta
    }

    pub fn attach(&mut self, vessel: Entity) {
        if !self.attached.contains(&vessel) {
            self.attached.push(vessel);
        }
    }

    pub fn detach(&mut self, vessel: Entity) -> bool {
        let before = self.attached.len();
        self.attached.retain(|entry| *entry != vessel);
        before != self.attached.len()
    }

    /// Gravity installed on dynamic passengers registered to this platform.
    pub fn local_gravity(&self, source: Entity) -> LocalGravity {
        LocalGravity {
            source,
            strength: self.gravity,
            align_to_surface: self.align_to_surface,
            align_speed: self.align_speed,
        }
    }
}

/// Oriented box in the platform's local frame that captures passengers.
#[derive(Component, Debug, Clone, Copy)]
pub struct CaptureVolume {
    pub center: Vec3,
    pub half_extents: Vec3,
}

impl CaptureVolume {
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    pub fn contains(&self, platform: &Transform, point: Vec3) -> bool {
        let local = platform.rotation.inverse() * (point - platform.translation) - self.center;
        local.x.abs() <= self.half_extents.x
            && local.y.abs() <= self.half_extents.y
            && local.z.abs() <= self.half_extents.z
    }
}

/// A body that can board platforms.
#[derive(Component, Debug, Clone, Default)]
pub struct Passenger {
    /// Platform whose registry currently holds this body.
    pub riding: Option<Entity>,
    /// Platforms whose capture volume currently overlaps this body, oldest first.
    pub overlaps: Vec<Entity>,
}

impl Passenger {
    pub fn note_overlap(&mut self, platform: Entity) {
        if !self.overlaps.contains(&platform) {
            self.overlaps.push(platform);
        }
    }

    pub fn clear_overlap(&mut self, platform: Entity) {
        self.overlaps.retain(|entry| *entry != platform);
    }
}

/// Position-commanded body. `pending` is consumed once per logic tick.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct KinematicBody {
    pub pending: Vec3,
    pub last_applied: Vec3,
}

impl KinematicBody {
    pub fn command(&mut self, movement: Vec3) {
        self.pending += movement;
    }
}

#[derive(Component, Debug, Clone, Copy)]
pub struct DynamicBody {
    pub velocity: Vec3,
    /// Accelerations accumulated for the current physics step.
    pub acceleration: Vec3,
    pub use_world_gravity: bool,
    /// Total acceleration integrated on the last physics step.
    pub last_acceleration: Vec3,
}

impl Default for DynamicBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            use_world_gravity: true,
            last_acceleration: Vec3::ZERO,
        }
    }
}

impl DynamicBody {
    pub fn apply_acceleration(&mut self, acceleration: Vec3) {
        self.acceleration += acceleration;
    }
}

/// Gravity along the source's down axis instead of world down.
#[derive(Component, Debug, Clone, Copy)]
pub struct LocalGravity {
    /// Entity whose up axis defines "up". May be the body itself.
    pub source: Entity,
    pub strength: f32,
    pub align_to_surface: bool,
    pub align_speed: f32,
}

impl LocalGravity {
    pub fn new(source: Entity) -> Self {
        Self {
            source,
            strength: 9.81,
            align_to_surface: true,
            align_speed: 5.0,
        }
    }
}

pub fn local_gravity_acceleration(source_up: Vec3, strength: f32) -> Vec3 {
    -source_up.normalize_or_zero() * strength
}

/// Slerps `current` a fraction `t` of the way toward the shortest-arc rotation
/// that maps its up axis onto `field_up`.
pub fn align_up(current: Quat, field_up: Vec3, t: f32) -> Quat {
    let body_up = (current * Vec3::Y).normalize_or_zero();
    let field_up = field_up.normalize_or_zero();
    if body_up == Vec3::ZERO || field_up == Vec3::ZERO {
        return current;
    }

    let target = Quat::from_rotation_arc(body_up, field_up) * current;
    current.slerp(target, t.clamp(0.0, 1.0)).normalize()
}

// =============================================================================
// Helm & sway
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Sway {
    pub bob_height: f32,
    pub bob_speed: f32,
    pub roll_angle: f32,
    pub roll_speed: f32,
    pub pitch_angle: f32,
    pub pitch_speed: f32,
    pub phase: f32,
}

impl Default for Sway {
    fn default() -> Self {
        Self {
            bob_height: 0.25,
            bob_speed: 1.0,
            roll_angle: 5.0,
            roll_speed: 0.8,
            pitch_angle: 2.0,
            pitch_speed: 0.6,
            phase: 0.0,
        }
    }
}

impl Sway {
    pub fn calm() -> Self {
        Self {
            bob_height: 0.0,
            roll_angle: 0.0,
            pitch_angle: 0.0,
            ..Self::default()
        }
    }

    /// Returns (bob, pitch degrees, roll degrees) at time `t`.
    pub fn sample(&self, t: f32) -> (f32, f32, f32) {
        let t = t + self.phase;
        let bob = (t * self.bob_speed).sin() * self.bob_height;
        let pitch = (t * self.pitch_speed).cos() * self.pitch_angle;
        let roll = (t * self.roll_speed).sin() * self.roll_angle;
        (bob, pitch, roll)
    }
}

/// Steered self-motion of a platform: wheel, cruise propulsion and sway.
#[derive(Component, Debug, Clone)]
pub struct PlatformHelm {
    /// Host-supplied wheel input in [-1, 1]; positive turns to starboard.
    pub turn_input: f32,
    pub cruise_speed: f32,
    pub steering_sensitivity: f32,
    pub wheel_rotate_speed: f32,
    pub max_wheel_angle: f32,
    /// Steering is honoured only while this entity is near the wheel.
    pub operator: Option<Entity>,
    pub interaction_distance: f32,
    /// Wheel position in the platform's local frame.
    pub wheel_offset: Vec3,
    pub sway: Sway,
    pub wheel_angle: f32,
    pub yaw_deg: Option<f32>,
    pub base_altitude: Option<f32>,
}

impl Default for PlatformHelm {
    fn default() -> Self {
        Self {
            turn_input: 0.0,
            cruise_speed: 5.0,
            steering_sensitivity: 10.0,
            wheel_rotate_speed: 100.0,
            max_wheel_angle: 180.0,
            operator: None,
            interaction_distance: 3.0,
            wheel_offset: Vec3::ZERO,
            sway: Sway::default(),
            wheel_angle: 0.0,
            yaw_deg: None,
            base_altitude: None,
        }
    }
}

impl PlatformHelm {
    /// Advances the wheel and returns the normalized steering in [-1, 1].
    pub fn update_wheel(&mut self, honoured: bool, delta_seconds: f32) -> f32 {
        let step = self.wheel_rotate_speed * delta_seconds;

        if !honoured {
            self.wheel_angle = move_towards(self.wheel_angle, 0.0, step);
            return 0.0;
        }

        let input = self.turn_input.clamp(-1.0, 1.0);
        self.wheel_angle =
            (self.wheel_angle + input * step).clamp(-self.max_wheel_angle, self.max_wheel_angle);

        if input.abs() < f32::EPSILON {
            self.wheel_angle = move_towards(self.wheel_angle, 0.0, step * 0.5);
        }

        if self.max_wheel_angle > 0.0 {
            self.wheel_angle / self.max_wheel_angle
        } else {
            0.0
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
