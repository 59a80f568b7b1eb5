pub mod actions;
pub mod components;
pub mod config;
pub mod economy;
pub mod engine;
pub mod error;
pub mod events;
pub mod rng;
pub mod save;
pub mod scenario;
pub mod servant;
pub mod snapshot;
pub mod spatial;
pub mod structures;
pub mod systems;
pub mod task;
pub mod web;
pub mod world;

pub use actions::Tool;
pub use engine::{Engine, EngineBuilder, EngineSettings, TickSummary};
pub use error::SimError;
pub use scenario::{Scenario, ScenarioLoader};
pub use world::{Settlement, SettlementSnapshot};
