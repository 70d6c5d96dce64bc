//! Watercraft chase and docking, moving-deck passengers and deck-relative
//! gravity, as Bevy ECS schedules driven by the host.

pub mod platforms;
pub mod plugins;
pub mod scenario;
pub mod simulation;
pub mod vessels;

pub use simulation::Simulation;
