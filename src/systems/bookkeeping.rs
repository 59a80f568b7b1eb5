use anyhow::Result;
use tracing::debug;

use crate::{
    economy,
    engine::{System, SystemContext},
    rng::SystemRng,
    world::Settlement,
};

/// Re-applies the derived caps after everything else has run, so that a
/// demolished silo or well never leaves the stockpile above capacity.
pub struct BookkeepingSystem;

impl BookkeepingSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BookkeepingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for BookkeepingSystem {
    fn name(&self) -> &str {
        "bookkeeping"
    }

    fn run(
        &mut self,
        _ctx: &SystemContext,
        world: &mut Settlement,
        _rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let max_food = economy::max_food_storage(&world.structures, &world.tuning);
        if world.inventory.food > max_food {
            debug!(food = world.inventory.food, max_food, "food spoiled over capacity");
            world.inventory.food = max_food;
        }
        let water = economy::water_capacity(&world.structures, &world.tuning);
        world.water_rations = world.water_rations.min(water);
        Ok(())
    }
}
