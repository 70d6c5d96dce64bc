//! Host-facing simulation loop over the logic and physics schedules.

use bevy::prelude::*;

use crate::plugins::core::{CorePlugin, LogicTick, PhysicsTick, SimConfig};
use crate::plugins::sim::{OverlapEvent, OverlapKind, OverlapQueue, SimPlugin, UndockQueue};
use crate::vessels::{NavigationState, Navigator};
use std::time::Duration;

pub struct Simulation {
    app: App,
    accumulator: f32,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulation {
    pub fn new() -> Self {
        let mut app = App::new();
        app.add_plugins((CorePlugin, SimPlugin));
        Self::from_app(app)
    }

    /// Wraps an app that already has `CorePlugin` and `SimPlugin` added.
    pub fn from_app(mut app: App) -> Self {
        app.finish();
        app.cleanup();
        Self {
            app,
            accumulator: 0.0,
        }
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    /// One variable-rate logic tick. A delta that does not fit a `Duration`
    /// skips the tick.
    pub fn tick(&mut self, delta_seconds: f32) {
        let Some(delta) = tick_duration(delta_seconds) else {
            return;
        };
        let world = self.app.world_mut();
        world.resource_mut::<Time>().advance_by(delta);
        world.run_schedule(LogicTick);
    }

    /// One fixed-rate physics step of `delta_seconds`.
    pub fn tick_physics(&mut self, delta_seconds: f32) {
        let Some(delta) = tick_duration(delta_seconds) else {
            return;
        };
        let world = self.app.world_mut();
        world.resource_mut::<Time<Fixed>>().advance_by(delta);
        world.run_schedule(PhysicsTick);
    }

    /// Runs the physics steps owed for `frame_seconds`, capped per frame, then
    /// one logic tick. Returns the number of physics steps taken.
    pub fn advance(&mut self, frame_seconds: f32) -> u32 {
        let timestep = self
            .world()
            .resource::<Time<Fixed>>()
            .timestep()
            .as_secs_f32();
        let max_steps = self.world().resource::<SimConfig>().max_physics_steps;
        if !frame_seconds.is_finite() {
            warn!("Ignoring non-finite frame time {}", frame_seconds);
            return 0;
        }

        self.accumulator += frame_seconds.max(0.0);
        let mut steps = 0;
        while self.accumulator >= timestep && steps < max_steps {
            self.tick_physics(timestep);
            self.accumulator -= timestep;
            steps += 1;
        }
        if steps == max_steps && self.accumulator >= timestep {
            debug!(
                "Dropping {:.3}s of physics backlog",
                self.accumulator - self.accumulator % timestep
            );
            self.accumulator %= timestep;
        }

        self.tick(frame_seconds);
        steps
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.world_mut().resource_mut::<SimConfig>().paused = paused;
    }

    pub fn request_undock(&mut self, vessel: Entity) {
        self.world_mut().resource_mut::<UndockQueue>().push(vessel);
    }

    /// Host-detected capture-volume edge; applied at the start of the next tick.
    pub fn notify_overlap(&mut self, body: Entity, platform: Entity, kind: OverlapKind) {
        self.world_mut()
            .resource_mut::<OverlapQueue>()
            .push(OverlapEvent {
                body,
                platform,
                kind,
            });
    }

    pub fn navigation_state(&self, vessel: Entity) -> Option<NavigationState> {
        self.world()
            .get::<Navigator>(vessel)
            .map(|navigator| navigator.state())
    }
}

fn tick_duration(seconds: f32) -> Option<Duration> {
    match Duration::try_from_secs_f32(seconds.max(0.0)) {
        Ok(duration) => Some(duration),
        Err(error) => {
            warn!("Skipping tick of {}s: {}", seconds, error);
            None
        }
    }
}
