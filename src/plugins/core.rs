use bevy::ecs::schedule::ScheduleLabel;
use bevy::prelude::*;

use std::time::Duration;

pub struct CorePlugin;

/// Variable-rate tick: requests, platform motion, passenger transfer, navigation.
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicTick;

/// Fixed-rate tick: forces, integration, deck contacts.
#[derive(ScheduleLabel, Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicsTick;

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicSet {
    /// Overlap enter/exit and undock requests, applied between computations.
    Requests,
    PlatformMotion,
    PassengerTransfer,
    Attachment,
    Navigation,
}

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhysicsSet {
    Forces,
    Integrate,
    Contacts,
}

#[derive(Resource, Debug, Clone)]
pub struct SimConfig {
    pub physics_hz: f32,
    pub world_gravity: Vec3,
    /// Upper bound on physics steps run for a single frame.
    pub max_physics_steps: u32,
    pub paused: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            physics_hz: 50.0,
            world_gravity: Vec3::new(0.0, -9.81, 0.0),
            max_physics_steps: 8,
            paused: false,
        }
    }
}

#[derive(Resource, Debug)]
pub struct EventLog {
    entries: Vec<String>,
    max_entries: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            max_entries: 32,
        }
    }
}

impl EventLog {
    pub fn push(&mut self, entry: String) {
        self.entries.push(entry);
        if self.entries.len() > self.max_entries {
            let overflow = self.entries.len() - self.max_entries;
            self.entries.drain(0..overflow);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

#[derive(Resource, Debug, Default)]
pub struct SimTickCount {
    pub logic: u64,
    pub physics: u64,
}

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        let config = SimConfig::default();
        let fixed_time = fixed_time_from_config(&config);

        app.insert_resource(config)
            .insert_resource(fixed_time)
            .insert_resource(Time::<()>::default())
            .init_resource::<EventLog>()
            .init_resource::<SimTickCount>()
            .init_schedule(LogicTick)
            .init_schedule(PhysicsTick)
            .configure_sets(
                LogicTick,
                (
                    LogicSet::Requests,
                    LogicSet::PlatformMotion,
                    LogicSet::PassengerTransfer,
                    LogicSet::Attachment,
                    LogicSet::Navigation,
                )
                    .chain(),
            )
            .configure_sets(
                PhysicsTick,
                (PhysicsSet::Forces, PhysicsSet::Integrate, PhysicsSet::Contacts).chain(),
            );

        info!(
            "Core ready (physics {} Hz, gravity {:?})",
            app.world().resource::<SimConfig>().physics_hz,
            app.world().resource::<SimConfig>().world_gravity
        );
    }
}

pub fn sim_not_paused(config: Res<SimConfig>) -> bool {
    !config.paused
}

pub fn fixed_time_from_config(config: &SimConfig) -> Time<Fixed> {
    let physics_hz = if config.physics_hz <= 0.0 {
        50.0
    } else {
        config.physics_hz
    };
    let seconds = 1.0 / physics_hz;
    Time::<Fixed>::from_duration(Duration::from_secs_f32(seconds))
}
