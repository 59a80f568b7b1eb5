use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Largest map, in tiles, that a scenario or a save may describe.
pub const MAX_MAP_TILES: u64 = 1 << 20;

fn default_map_width() -> u32 {
    120
}

fn default_map_height() -> u32 {
    120
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_map_width")]
    pub width: u32,
    #[serde(default = "default_map_height")]
    pub height: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: default_map_width(),
            height: default_map_height(),
        }
    }
}

impl MapConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "map must be at least 1x1, got {}x{}",
            self.width,
            self.height
        );
        ensure!(
            u64::from(self.width) * u64::from(self.height) <= MAX_MAP_TILES,
            "map {}x{} exceeds {MAX_MAP_TILES} tiles",
            self.width,
            self.height
        );
        Ok(())
    }
}

/// Gameplay constants. Every field may be overridden from a scenario's
/// `tuning:` block; omitted fields keep the shipped values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// World units per tile edge.
    pub tile_size: f32,
    /// Simulated minutes per second of wall time.
    pub minutes_per_second: f64,
    /// Clock position (minutes past midnight) of a fresh world.
    pub start_minutes: f64,

    pub hunger_decay_per_minute: f32,
    pub thirst_decay_per_minute: f32,
    pub shelter_decay_per_minute: f32,
    pub shelter_regen_per_minute: f32,
    pub nightly_shelter_bonus: f32,
    pub max_need: f32,
    pub hunger_threshold: f32,
    pub thirst_threshold: f32,

    pub age_per_day: f32,
    pub adult_age: f32,
    pub old_age: f32,

    pub gather_interval_minutes: f32,
    pub gather_work_seconds: f32,
    pub move_speed: f32,

    pub base_food_storage: u32,
    pub food_per_silo: u32,
    pub water_per_well: u32,
    pub hut_capacity: u32,

    pub breeding_chance_per_pair: f64,
    pub max_breeding_chance: f64,

    pub crop_growth_per_tick: f32,
    pub tree_respawn_days: u32,
    pub rock_respawn_days: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            tile_size: 32.0,
            minutes_per_second: 24.0,
            start_minutes: 6.0 * 60.0,
            hunger_decay_per_minute: 0.035,
            thirst_decay_per_minute: 0.05,
            shelter_decay_per_minute: 0.02,
            shelter_regen_per_minute: 0.02,
            nightly_shelter_bonus: 20.0,
            max_need: 100.0,
            hunger_threshold: 60.0,
            thirst_threshold: 60.0,
            age_per_day: 0.2,
            adult_age: 18.0,
            old_age: 80.0,
            gather_interval_minutes: 240.0,
            gather_work_seconds: 3.0,
            move_speed: 70.0,
            base_food_storage: 20,
            food_per_silo: 40,
            water_per_well: 8,
            hut_capacity: 6,
            breeding_chance_per_pair: 0.1,
            max_breeding_chance: 0.4,
            crop_growth_per_tick: 0.6,
            tree_respawn_days: 3,
            rock_respawn_days: 7,
        }
    }
}

impl Tuning {
    /// Rejects values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.tile_size.is_finite() && self.tile_size > 0.0,
            "tile_size must be positive, got {}",
            self.tile_size
        );
        ensure!(
            self.max_need.is_finite() && self.max_need > 0.0,
            "max_need must be positive, got {}",
            self.max_need
        );
        ensure!(
            self.minutes_per_second.is_finite() && self.minutes_per_second >= 0.0,
            "minutes_per_second must not be negative, got {}",
            self.minutes_per_second
        );
        ensure!(
            self.move_speed.is_finite() && self.move_speed >= 0.0,
            "move_speed must not be negative, got {}",
            self.move_speed
        );
        Ok(())
    }
}
