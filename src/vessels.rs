use bevy::prelude::*;

/// Observable navigation state of an autonomous vessel.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum NavigationState {
    #[default]
    Chasing,
    Docking,
    Docked,
}

/// Approach phase inside a docking session. Phases only ever advance.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum DockPhase {
    ApproachLane,
    SlideIn,
    HardDocked,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DockingSession {
    pub dock_point: Entity,
    pub phase: DockPhase,
}

/// Recoverable navigation faults. None of these stop the simulation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum NavigationFault {
    MissingReference,
    StaleSession,
    DegenerateGeometry,
}

impl std::fmt::Display for NavigationFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NavigationFault::MissingReference => "missing reference",
            NavigationFault::StaleSession => "stale docking session",
            NavigationFault::DegenerateGeometry => "degenerate geometry",
        };
        f.write_str(label)
    }
}

/// Where the steering controller takes its desired heading from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HeadingSource {
    /// Point the bow at the target.
    FreeChase,
    /// Stay parallel to the given world direction.
    LockedTo(Vec3),
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Propulsion {
    /// Hard ceiling on forward speed, whatever the steering parameters ask for.
    pub max_speed: f32,
    pub accel: f32,
    pub decel: f32,
    /// Hard ceiling on yaw rate, degrees per second.
    pub turn_rate_deg: f32,
}

impl Default for Propulsion {
    fn default() -> Self {
        Self {
            max_speed: 12.0,
            accel: 4.0,
            decel: 6.0,
            turn_rate_deg: 90.0,
        }
    }
}

/// A self-propelled boat. Moves only along its own forward axis.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Vessel {
    pub speed: f32,
    pub propulsion: Propulsion,
}

impl Vessel {
    pub fn new(propulsion: Propulsion) -> Self {
        Self {
            speed: 0.0,
            propulsion,
        }
    }
}

/// Per-call steering limits for the arrival controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SteerParams {
    pub max_speed: f32,
    pub turn_rate_deg: f32,
    pub slow_radius: f32,
    pub stop_distance: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChaseConfig {
    /// Chase point in the target's local frame (+Z is astern).
    pub offset: Vec3,
    pub steer: SteerParams,
}

impl Default for ChaseConfig {
    fn default() -> Self {
        Self {
            offset: Vec3::new(0.0, 0.0, 8.0),
            steer: SteerParams {
                max_speed: 10.0,
                turn_rate_deg: 60.0,
                slow_radius: 10.0,
                stop_distance: 4.0,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DockConfig {
    pub start_distance: f32,
    pub approach_offset: f32,
    pub snap_distance: f32,
    pub max_speed: f32,
    pub turn_rate_deg: f32,
    pub lane_switch_distance: f32,
    pub lane_slow_radius: f32,
    pub slide_speed_fraction: f32,
    pub slide_slow_radius: f32,
    /// Candidate distances closer than this are treated as equal.
    pub tie_tolerance: f32,
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            start_distance: 20.0,
            approach_offset: 6.0,
            snap_distance: 0.8,
            max_speed: 6.0,
            turn_rate_deg: 80.0,
            lane_switch_distance: 1.5,
            lane_slow_radius: 5.0,
            slide_speed_fraction: 0.6,
            slide_slow_radius: 3.0,
            tie_tolerance: 1.0e-4,
        }
    }
}

/// Dock phases steer to stop inside their switch threshold, not on it, so the
/// threshold is crossed in finite time.
const PHASE_STOP_FRACTION: f32 = 0.5;

impl DockConfig {
    pub fn approach_params(&self) -> SteerParams {
        SteerParams {
            max_speed: self.max_speed,
            turn_rate_deg: self.turn_rate_deg,
            slow_radius: self.lane_slow_radius,
            stop_distance: self.lane_switch_distance * PHASE_STOP_FRACTION,
        }
    }

    pub fn slide_params(&self) -> SteerParams {
        SteerParams {
            max_speed: self.max_speed * self.slide_speed_fraction,
            turn_rate_deg: self.turn_rate_deg,
            slow_radius: self.slide_slow_radius,
            stop_distance: self.snap_distance * PHASE_STOP_FRACTION,
        }
    }
}

/// Autonomous chase-and-dock brain. Owns the docking session exclusively.
#[derive(Component, Debug, Clone)]
pub struct Navigator {
    pub target: Option<Entity>,
    /// Left candidate first; it wins ties.
    pub dock_points: [Option<Entity>; 2],
    pub chase: ChaseConfig,
    pub dock: DockConfig,
    /// Adds the target platform's forward velocity to the arrival speed
    /// outside the stop distance, never above the phase's max speed.
    pub match_target_speed: bool,
    pub last_fault: Option<NavigationFault>,
    state: NavigationState,
    session: Option<DockingSession>,
    docked_at: Option<Entity>,
}

impl Navigator {
    pub fn new(target: Entity) -> Self {
        Self {
            target: Some(target),
            dock_points: [None, None],
            chase: ChaseConfig::default(),
            dock: DockConfig::default(),
            match_target_speed: false,
            last_fault: None,
            state: NavigationState::Chasing,
            session: None,
            docked_at: None,
        }
    }

    pub fn with_dock_points(mut self, left: Option<Entity>, right: Option<Entity>) -> Self {
        self.dock_points = [left, right];
        self
    }

    pub fn with_target_speed_matching(mut self, enabled: bool) -> Self {
        self.match_target_speed = enabled;
        self
    }

    pub fn state(&self) -> NavigationState {
        self.state
    }

    pub fn session(&self) -> Option<DockingSession> {
        self.session
    }

    pub fn phase(&self) -> Option<DockPhase> {
        self.session.map(|session| session.phase)
    }

    /// Dock point the vessel is hard-docked to, while Docked.
    pub fn docked_at(&self) -> Option<Entity> {
        self.docked_at
    }

    pub fn begin_docking(&mut self, dock_point: Entity) {
        self.state = NavigationState::Docking;
        self.session = Some(DockingSession {
            dock_point,
            phase: DockPhase::ApproachLane,
        });
    }

    /// Moves the session to `phase` if that is a forward step. Returns whether it moved.
    pub fn advance_phase(&mut self, phase: DockPhase) -> bool {
        match self.session.as_mut() {
            Some(session) if phase > session.phase => {
                session.phase = phase;
                true
            }
            _ => false,
        }
    }

    pub fn complete_docking(&mut self) {
        self.docked_at = self.session.map(|session| session.dock_point);
        self.session = None;
        self.state = NavigationState::Docked;
    }

    /// Drops the session and goes back to chasing.
    pub fn abandon_docking(&mut self, fault: NavigationFault) {
        self.session = None;
        self.state = NavigationState::Chasing;
        self.last_fault = Some(fault);
    }

    /// Returns false unless currently Docked.
    pub fn undock(&mut self) -> bool {
        if self.state != NavigationState::Docked {
            return false;
        }
        self.state = NavigationState::Chasing;
        self.docked_at = None;
        true
    }
}

/// Named anchor on a target vessel. The pose is stored in the vessel's local frame.
#[derive(Component, Debug, Clone)]
pub struct DockPoint {
    pub vessel: Entity,
    pub local: Transform,
    pub name: String,
}

impl DockPoint {
    pub fn world_pose(&self, vessel: &Transform) -> Transform {
        compose_pose(vessel, &self.local)
    }
}

/// Rigid attachment of a docked vessel to its platform.
#[derive(Component, Debug, Clone, Copy)]
pub struct AttachedTo {
    pub platform: Entity,
    pub relative: Transform,
}

// =============================================================================
// Math helpers
// =============================================================================

/// Three-zone arrival profile: full speed outside `slow_radius`, zero inside
/// `stop_distance`, linear in between.
pub fn arrival_speed(distance: f32, max_speed: f32, slow_radius: f32, stop_distance: f32) -> f32 {
    if distance > slow_radius {
        return max_speed;
    }
    if distance <= stop_distance {
        return 0.0;
    }

    let span = slow_radius - stop_distance;
    if span <= f32::EPSILON {
        return 0.0;
    }

    max_speed * ((distance - stop_distance) / span).clamp(0.0, 1.0)
}

pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + (target - current).signum() * max_delta
    }
}

/// Rotates `current` toward `desired` by at most `max_angle` radians.
pub fn rotate_heading_towards(current: Vec3, desired: Vec3, max_angle: f32) -> Vec3 {
    let current = current.normalize_or_zero();
    let desired = desired.normalize_or_zero();
    if current == Vec3::ZERO {
        return desired;
    }
    if desired == Vec3::ZERO {
        return current;
    }

    let angle = current.angle_between(desired);
    if angle <= max_angle {
        return desired;
    }

    let axis = current.cross(desired);
    // Opposite vectors: any horizontal turn is as short as the other.
    let axis = if axis.length_squared() < 1.0e-8 {
        Vec3::Y
    } else {
        axis.normalize()
    };

    (Quat::from_axis_angle(axis, max_angle.max(0.0)) * current).normalize_or_zero()
}

pub fn flatten(vector: Vec3) -> Vec3 {
    Vec3::new(vector.x, 0.0, vector.z)
}

pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    flatten(a - b).length()
}

pub fn compose_pose(parent: &Transform, relative: &Transform) -> Transform {
    parent.mul_transform(*relative)
}

/// Pose of `child` expressed in `parent`'s frame. Assumes unit parent scale.
pub fn relative_pose(parent: &Transform, child: &Transform) -> Transform {
    let inverse = parent.rotation.inverse();
    Transform {
        translation: inverse * (child.translation - parent.translation),
        rotation: inverse * child.rotation,
        scale: child.scale,
    }
}

// =============================================================================
// Tests
// =============================================================================
