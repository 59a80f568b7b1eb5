use anyhow::Result;
use rand::Rng;
use tracing::{debug, info};

use crate::{
    components::ServantId,
    economy,
    engine::{System, SystemContext},
    events::{Need, SettlementEvent},
    rng::SystemRng,
    servant::{Needs, Servant},
    structures::StructureKind,
    world::Settlement,
};

pub const CHILD_NAMES: [&str; 8] = [
    "Cora", "Eldon", "Mira", "Soren", "Lysa", "Tavin", "Enid", "Hale",
];

/// The day-boundary batch pass, run once per rollover.
pub struct PopulationSystem;

impl PopulationSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PopulationSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for PopulationSystem {
    fn name(&self) -> &str {
        "population"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut Settlement,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        for _ in 0..ctx.day_rollovers {
            run_daily_pass(world, rng);
        }
        Ok(())
    }
}

/// Housing, feeding, breeding, pruning, then housing again.
pub fn run_daily_pass<R: Rng>(world: &mut Settlement, rng: &mut R) {
    world.assign_housing();
    feed_and_water(world);
    breed(world, rng);
    let pruned = world.prune_dead();
    world.assign_housing();
    if pruned > 0 {
        debug!(pruned, "removed dead servants");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedReport {
    pub fed: u32,
    pub watered: u32,
    pub hungry: u32,
    pub thirsty: u32,
}

/// Each living servant below max hunger eats one food and is fully
/// restored; likewise for thirst against the day's well rations. Housed
/// servants also get the nightly shelter bonus.
pub fn feed_and_water(world: &mut Settlement) -> FeedReport {
    let max = world.tuning.max_need;
    let bonus = world.tuning.nightly_shelter_bonus;
    world.water_rations = economy::water_capacity(&world.structures, &world.tuning);

    let mut report = FeedReport::default();
    for servant in world.servants.iter_mut().filter(|s| s.alive) {
        if servant.needs.hunger < max {
            if world.inventory.food > 0 {
                world.inventory.food -= 1;
                servant.needs.hunger = max;
                report.fed += 1;
            } else {
                report.hungry += 1;
            }
        }
        if servant.needs.thirst < max {
            if world.water_rations > 0 {
                world.water_rations -= 1;
                servant.needs.thirst = max;
                report.watered += 1;
            } else {
                report.thirsty += 1;
            }
        }
        if servant.home.is_some() {
            servant.needs.shelter = (servant.needs.shelter + bonus).min(max);
        }
    }

    if report.hungry > 0 {
        world.events.push(SettlementEvent::Shortage {
            need: Need::Food,
            servants: report.hungry,
        });
    }
    if report.thirsty > 0 {
        world.events.push(SettlementEvent::Shortage {
            need: Need::Water,
            servants: report.thirsty,
        });
    }
    report
}

/// Sum over built huts of floor(living adult residents / 2).
pub fn adult_pairs(world: &Settlement) -> u32 {
    world
        .structures
        .built_of_kind(StructureKind::Hut)
        .map(|hut| {
            let adults = world
                .servants
                .iter()
                .filter(|s| s.alive && s.home == Some(hut.uid) && s.is_adult(&world.tuning))
                .count() as u32;
            adults / 2
        })
        .sum()
}

/// Today's birth probability, or `None` when the settlement cannot support
/// a child: no free hut slot, food of 1 or less, no wells, or no pairs.
pub fn breeding_chance(world: &Settlement) -> Option<f64> {
    let housed = world
        .servants
        .iter()
        .filter(|s| s.alive && s.home.is_some())
        .count() as i64;
    let free = economy::housing_capacity(&world.structures, &world.tuning) as i64 - housed;
    if free <= 0
        || world.inventory.food <= 1
        || economy::water_capacity(&world.structures, &world.tuning) == 0
    {
        return None;
    }
    let pairs = adult_pairs(world);
    if pairs == 0 {
        return None;
    }
    let tuning = &world.tuning;
    Some((tuning.breeding_chance_per_pair * pairs as f64).min(tuning.max_breeding_chance))
}

/// One Bernoulli trial for the whole settlement. On success a child joins
/// near the player and housing is reassigned.
pub fn breed<R: Rng>(world: &mut Settlement, rng: &mut R) -> Option<ServantId> {
    let chance = breeding_chance(world)?;
    if rng.gen::<f64>() >= chance {
        return None;
    }

    let name = format!("{} Jr.", CHILD_NAMES[rng.gen_range(0..CHILD_NAMES.len())]);
    let position = world.near_player(rng);
    let id = world.allocate_servant_id();
    let max = world.tuning.max_need;
    let mut child = Servant::new(id, name.clone(), position, 1.0, &world.tuning);
    child.needs = Needs {
        hunger: max * 0.8,
        thirst: max * 0.8,
        shelter: max,
    };
    world.servants.push(child);
    world.assign_housing();
    info!(servant = %id, chance, "birth");
    world.events.push(SettlementEvent::ServantBorn { id, name });
    Some(id)
}
