use bevy::log::LogPlugin;
use bevy::prelude::*;

use std::path::Path;
use std::process;

use tidecraft::platforms::Platform;
use tidecraft::plugins::core::{CorePlugin, EventLog, SimTickCount};
use tidecraft::plugins::sim::SimPlugin;
use tidecraft::scenario::{load_scenario, sample_scenario, spawn_scenario};
use tidecraft::Simulation;

const FRAME_SECONDS: f32 = 1.0 / 60.0;
const DEFAULT_DURATION_SECONDS: f32 = 60.0;

fn main() {
    let mut app = App::new();
    app.add_plugins((LogPlugin::default(), CorePlugin, SimPlugin));
    let mut simulation = Simulation::from_app(app);

    let mut args = std::env::args().skip(1);
    let scenario = match args.next() {
        Some(path) => load_scenario(Path::new(&path)),
        None => sample_scenario(),
    };
    let scenario = match scenario {
        Ok(scenario) => scenario,
        Err(error) => {
            error!("{}", error);
            process::exit(1);
        }
    };

    let duration = match args.next() {
        Some(text) => match text.parse::<f32>() {
            Ok(seconds) if seconds > 0.0 => seconds,
            _ => {
                error!("Invalid duration: {}", text);
                process::exit(1);
            }
        },
        None => DEFAULT_DURATION_SECONDS,
    };

    let spawned = match spawn_scenario(simulation.world_mut(), &scenario) {
        Ok(spawned) => spawned,
        Err(error) => {
            error!("Scenario rejected: {}", error);
            process::exit(1);
        }
    };

    let frames = (duration / FRAME_SECONDS).ceil() as u32;
    for _ in 0..frames {
        simulation.advance(FRAME_SECONDS);
    }

    let ticks = simulation.world().resource::<SimTickCount>();
    info!(
        "Ran {:.1}s ({} logic ticks, {} physics steps)",
        duration, ticks.logic, ticks.physics
    );
    for (name, entity) in spawned.raiders.iter() {
        match simulation.navigation_state(*entity) {
            Some(state) => info!("{}: {:?}", name, state),
            None => warn!("{}: despawned", name),
        }
    }
    for (name, entity) in spawned.platforms.iter() {
        if let Some(platform) = simulation.world().get::<Platform>(*entity) {
            info!(
                "{}: {} passengers, {} docked vessels",
                name,
                platform.registry.len(),
                platform.attached.len()
            );
        }
    }
    for entry in simulation.world().resource::<EventLog>().entries() {
        info!("log: {}", entry);
    }
}
