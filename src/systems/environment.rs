use anyhow::Result;
use tracing::debug;

use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    world::Settlement,
};

/// Crop growth every tick, regrowth of harvested trees and rocks once per
/// day rollover.
pub struct EnvironmentSystem;

impl EnvironmentSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnvironmentSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for EnvironmentSystem {
    fn name(&self) -> &str {
        "environment"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut Settlement,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let growth = world.tuning.crop_growth_per_tick * world.daylight_factor();
        world.grid.tick_crop_growth(growth);

        for _ in 0..ctx.day_rollovers {
            let structures = &world.structures;
            let restored = world
                .grid
                .tick_daily_respawn(|pos| structures.occupied(pos));
            if restored > 0 {
                debug!(restored, day = world.clock.day, "resources regrew");
            }
        }
        Ok(())
    }
}
