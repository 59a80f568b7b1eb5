use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::{
    components::Inventory,
    config::{MapConfig, Tuning},
    engine::EngineSettings,
    events::SettlementEvent,
    spatial::{generate, GenerationParams},
    world::Settlement,
};

fn default_dt_seconds() -> f64 {
    0.1
}

fn default_settlers() -> Vec<String> {
    vec!["Adalyn".to_string(), "Brom".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub ticks: Option<u64>,
    /// Wall seconds per fixed tick.
    #[serde(default = "default_dt_seconds")]
    pub dt_seconds: f64,
    #[serde(default)]
    pub snapshot_interval_ticks: u64,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub generation: GenerationParams,
    #[serde(default = "default_settlers")]
    pub settlers: Vec<String>,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub tuning: Tuning,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        scenario
            .validate()
            .with_context(|| format!("Invalid scenario {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn validate(&self) -> Result<()> {
        self.map.validate().context("map")?;
        self.tuning.validate().context("tuning")?;
        Ok(())
    }

    /// Generates the seeded map, founds the town center and brings in the
    /// starting settlers.
    pub fn build_world(&self) -> Settlement {
        let grid = generate(self.map.width, self.map.height, self.seed, &self.generation);
        let mut world = Settlement::new(grid, self.tuning.clone(), self.seed);
        world.inventory = self.inventory;
        world
            .events
            .push(SettlementEvent::WorldGenerated { seed: self.seed });
        world.place_town_center();
        for name in &self.settlers {
            world.spawn_settler(name);
        }
        world.water_rations = 0;
        world.assign_housing();
        info!(
            scenario = %self.name,
            seed = self.seed,
            width = self.map.width,
            height = self.map.height,
            settlers = self.settlers.len(),
            "world built"
        );
        world
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(6_000)
    }

    pub fn engine_settings(&self, snapshot_dir: impl Into<PathBuf>) -> EngineSettings {
        EngineSettings {
            scenario_name: self.name.clone(),
            seed: self.seed,
            dt_seconds: self.dt_seconds,
            snapshot_interval_ticks: self.snapshot_interval_ticks,
            snapshot_dir: snapshot_dir.into(),
        }
    }
}
