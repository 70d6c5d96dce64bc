//! RON scenario descriptions and spawning.

use bevy::prelude::*;

use crate::platforms::{
    CaptureVolume, DynamicBody, KinematicBody, Passenger, PassengerKind, Platform, PlatformHelm,
    Sway,
};
use crate::vessels::{DockPoint, Navigator, Propulsion, Vessel};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub platforms: Vec<PlatformSpec>,
    #[serde(default)]
    pub raiders: Vec<RaiderSpec>,
    #[serde(default)]
    pub passengers: Vec<PassengerSpec>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PlatformSpec {
    pub name: String,
    pub position: (f32, f32, f32),
    #[serde(default)]
    pub yaw_deg: f32,
    #[serde(default = "default_cruise_speed")]
    pub cruise_speed: f32,
    #[serde(default)]
    pub turn_input: f32,
    /// Passenger name allowed to steer; anyone may steer when unset.
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub wheel_offset: (f32, f32, f32),
    #[serde(default)]
    pub sway: Option<Sway>,
    #[serde(default)]
    pub deck_height: f32,
    #[serde(default = "default_capture_half_extents")]
    pub capture_half_extents: (f32, f32, f32),
    #[serde(default)]
    pub dock_points: Vec<DockPointSpec>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DockPointSpec {
    pub name: String,
    pub offset: (f32, f32, f32),
    /// Local +X (right) must point away from the hull.
    #[serde(default)]
    pub yaw_deg: f32,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RaiderSpec {
    pub name: String,
    pub target: String,
    pub position: (f32, f32, f32),
    #[serde(default)]
    pub yaw_deg: f32,
    #[serde(default)]
    pub propulsion: Option<Propulsion>,
    /// Left and right dock point names on the target. Defaults to the
    /// target's first two dock points.
    #[serde(default)]
    pub dock_points: Vec<String>,
    /// Chase point in the target's frame; line it up with a dock point's
    /// approach lane for a parallel approach.
    #[serde(default)]
    pub chase_offset: Option<(f32, f32, f32)>,
    #[serde(default)]
    pub approach_offset: Option<f32>,
    #[serde(default)]
    pub match_target_speed: bool,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PassengerSpec {
    pub name: String,
    pub kind: PassengerKind,
    pub position: (f32, f32, f32),
}

fn default_cruise_speed() -> f32 {
    5.0
}

fn default_capture_half_extents() -> (f32, f32, f32) {
    (3.0, 2.0, 8.0)
}

/// Entities created for a scenario, by name.
#[derive(Debug, Default)]
pub struct SpawnedScenario {
    pub platforms: Vec<(String, Entity)>,
    pub dock_points: Vec<(String, Entity)>,
    pub raiders: Vec<(String, Entity)>,
    pub passengers: Vec<(String, Entity)>,
}

impl SpawnedScenario {
    pub fn platform(&self, name: &str) -> Option<Entity> {
        find(&self.platforms, name)
    }

    pub fn raider(&self, name: &str) -> Option<Entity> {
        find(&self.raiders, name)
    }

    pub fn passenger(&self, name: &str) -> Option<Entity> {
        find(&self.passengers, name)
    }
}

fn find(entries: &[(String, Entity)], name: &str) -> Option<Entity> {
    entries
        .iter()
        .find(|(entry, _)| entry == name)
        .map(|(_, entity)| *entity)
}

fn vec3(value: (f32, f32, f32)) -> Vec3 {
    Vec3::new(value.0, value.1, value.2)
}

fn pose(position: (f32, f32, f32), yaw_deg: f32) -> Transform {
    Transform::from_translation(vec3(position)).with_rotation(Quat::from_rotation_y(yaw_deg.to_radians()))
}

// =============================================================================
// Loading
// =============================================================================

const SAMPLE_RON: &str = r#"
(
    platforms: [
        (
            name: "flagship",
            position: (0.0, 0.0, 0.0),
            cruise_speed: 2.0,
            operator: Some("helmsman"),
            wheel_offset: (0.0, 1.0, 4.0),
            deck_height: 1.0,
            capture_half_extents: (3.0, 2.0, 8.0),
            dock_points: [
                (name: "port", offset: (-3.0, 0.0, 0.0), yaw_deg: 180.0),
                (name: "starboard", offset: (3.0, 0.0, 0.0)),
            ],
        ),
    ],
    raiders: [
        (
            name: "raider",
            target: "flagship",
            position: (3.5, 0.0, 45.0),
            chase_offset: Some((3.5, 0.0, 12.0)),
            approach_offset: Some(0.5),
            match_target_speed: true,
        ),
    ],
    passengers: [
        (name: "helmsman", kind: Kinematic, position: (0.0, 1.0, 4.5)),
        (name: "cargo", kind: Dynamic, position: (1.0, 1.0, -3.0)),
    ],
)
"#;

pub fn sample_scenario() -> Result<Scenario, String> {
    parse_scenario(SAMPLE_RON)
}

pub fn parse_scenario(contents: &str) -> Result<Scenario, String> {
    ron::de::from_str::<Scenario>(contents).map_err(|error| format!("RON parse error: {}", error))
}

pub fn load_scenario(path: &Path) -> Result<Scenario, String> {
    match fs::read_to_string(path) {
        Ok(contents) => parse_scenario(&contents),
        Err(error) => Err(format!("Read error ({}): {}", path.display(), error)),
    }
}

// =============================================================================
// Spawning
// =============================================================================

/// Spawns every platform, passenger and raider. Unknown name references are
/// reported before anything referencing them is spawned.
pub fn spawn_scenario(world: &mut World, scenario: &Scenario) -> Result<SpawnedScenario, String> {
    let mut spawned = SpawnedScenario::default();

    for spec in scenario.passengers.iter() {
        let transform = Transform::from_translation(vec3(spec.position));
        let mut entity = world.spawn((Name::new(spec.name.clone()), transform, Passenger::default()));
        match spec.kind {
            PassengerKind::Kinematic => entity.insert(KinematicBody::default()),
            PassengerKind::Dynamic => entity.insert(DynamicBody::default()),
        };
        spawned.passengers.push((spec.name.clone(), entity.id()));
    }

    for spec in scenario.platforms.iter() {
        let operator = match &spec.operator {
            Some(name) => Some(
                spawned
                    .passenger(name)
                    .ok_or_else(|| format!("Platform {} has unknown operator {}", spec.name, name))?,
            ),
            None => None,
        };

        let helm = PlatformHelm {
            turn_input: spec.turn_input,
            cruise_speed: spec.cruise_speed,
            operator,
            wheel_offset: vec3(spec.wheel_offset),
            sway: spec.sway.unwrap_or_default(),
            ..PlatformHelm::default()
        };
        let platform = Platform {
            deck_height: spec.deck_height,
            ..Platform::default()
        };
        let entity = world
            .spawn((
                Name::new(spec.name.clone()),
                pose(spec.position, spec.yaw_deg),
                Vessel::new(Propulsion::default()),
                helm,
                platform,
                CaptureVolume::new(
                    Vec3::new(0.0, spec.deck_height, 0.0),
                    vec3(spec.capture_half_extents),
                ),
            ))
            .id();
        spawned.platforms.push((spec.name.clone(), entity));

        for dock in spec.dock_points.iter() {
            let dock_entity = world
                .spawn((
                    Name::new(format!("{}/{}", spec.name, dock.name)),
                    DockPoint {
                        vessel: entity,
                        local: pose(dock.offset, dock.yaw_deg),
                        name: dock.name.clone(),
                    },
                ))
                .id();
            spawned
                .dock_points
                .push((format!("{}/{}", spec.name, dock.name), dock_entity));
        }
    }

    for spec in scenario.raiders.iter() {
        let target = spawned
            .platform(&spec.target)
            .ok_or_else(|| format!("Raider {} has unknown target {}", spec.name, spec.target))?;
        let target_spec = scenario
            .platforms
            .iter()
            .find(|platform| platform.name == spec.target)
            .ok_or_else(|| format!("Raider {} has unknown target {}", spec.name, spec.target))?;

        let dock_names: Vec<String> = if spec.dock_points.is_empty() {
            target_spec
                .dock_points
                .iter()
                .take(2)
                .map(|dock| dock.name.clone())
                .collect()
        } else {
            spec.dock_points.iter().take(2).cloned().collect()
        };
        let mut dock_entities = [None, None];
        for (slot, name) in dock_entities.iter_mut().zip(dock_names.iter()) {
            let key = format!("{}/{}", spec.target, name);
            let entity = find(&spawned.dock_points, &key)
                .ok_or_else(|| format!("Raider {} has unknown dock point {}", spec.name, key))?;
            *slot = Some(entity);
        }

        let mut navigator = Navigator::new(target)
            .with_dock_points(dock_entities[0], dock_entities[1])
            .with_target_speed_matching(spec.match_target_speed);
        if let Some(offset) = spec.chase_offset {
            navigator.chase.offset = vec3(offset);
        }
        if let Some(offset) = spec.approach_offset {
            navigator.dock.approach_offset = offset;
        }
        let entity = world
            .spawn((
                Name::new(spec.name.clone()),
                pose(spec.position, spec.yaw_deg),
                Vessel::new(spec.propulsion.unwrap_or_default()),
                navigator,
            ))
            .id();
        spawned.raiders.push((spec.name.clone(), entity));
    }

    info!(
        "Spawned scenario ({} platforms, {} raiders, {} passengers)",
        spawned.platforms.len(),
        spawned.raiders.len(),
        spawned.passengers.len()
    );
    Ok(spawned)
}
