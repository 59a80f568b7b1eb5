use anyhow::Result;
use tracing::debug;

use crate::{
    engine::{System, SystemContext},
    events::SettlementEvent,
    rng::SystemRng,
    task::{self, TaskContext},
    world::Settlement,
};

/// Per-tick servant update in collection order: needs decay, then either one
/// task step or the idle cooldown and task search, then the death check.
pub struct ServantSystem;

impl ServantSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ServantSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ServantSystem {
    fn name(&self) -> &str {
        "servants"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut Settlement,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let Settlement {
            tuning,
            grid,
            structures,
            servants,
            inventory,
            events,
            ..
        } = world;
        let minutes = ctx.elapsed_minutes as f32;
        let dt = ctx.dt_seconds as f32;

        for servant in servants.iter_mut().filter(|s| s.alive) {
            servant.decay_needs(minutes, tuning);

            if servant.task.is_some() {
                let mut task_ctx = TaskContext {
                    grid: &mut *grid,
                    structures: &*structures,
                    inventory: &mut *inventory,
                    tuning: &*tuning,
                    events: &mut *events,
                    rng: &mut *rng,
                };
                task::step(servant, dt, &mut task_ctx);
            } else {
                servant.idle_cooldown = (servant.idle_cooldown - minutes).max(0.0);
                if servant.idle_cooldown <= 0.0 {
                    match task::pick_task(servant, grid, inventory, tuning) {
                        Ok(next) => servant.task = Some(next),
                        Err(err) => {
                            debug!(servant = %servant.id, role = servant.role.display(), "{err}");
                            servant.idle_cooldown = tuning.gather_interval_minutes / 2.0;
                        }
                    }
                }
            }

            if let Some(cause) = servant.check_death(tuning) {
                events.push(SettlementEvent::ServantDied {
                    id: servant.id,
                    name: servant.name.clone(),
                    cause,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::rng::RngManager;
    use crate::servant::Role;
    use crate::spatial::{Tile, TileGrid, TilePos};

    fn ctx(minutes: f64) -> SystemContext<'static> {
        SystemContext {
            tick: 1,
            dt_seconds: minutes / 24.0,
            elapsed_minutes: minutes,
            day_rollovers: 0,
            scenario_name: "unit",
        }
    }

    #[test]
    fn idle_servant_without_targets_repolls_at_half_interval() {
        let mut world = Settlement::new(TileGrid::new(10, 10), Tuning::default(), 2);
        let id = world.spawn_settler("Brom");
        let mut rngs = RngManager::new(2);
        ServantSystem::new()
            .run(&ctx(2.4), &mut world, &mut rngs.stream("servants"))
            .unwrap();
        let servant = world.servant(id).unwrap();
        assert!(servant.task.is_none());
        assert_eq!(servant.idle_cooldown, 120.0);
    }

    #[test]
    fn idle_servant_picks_a_role_target() {
        let mut world = Settlement::new(TileGrid::new(10, 10), Tuning::default(), 2);
        world.grid.set_tile(TilePos::new(1, 1), Tile::Rock).unwrap();
        let id = world.spawn_settler("Adalyn");
        world.set_servant_role(id, Role::Miner).unwrap();
        let mut rngs = RngManager::new(2);
        ServantSystem::new()
            .run(&ctx(2.4), &mut world, &mut rngs.stream("servants"))
            .unwrap();
        let task = world.servant(id).unwrap().task.unwrap();
        assert_eq!(task.target, TilePos::new(1, 1));
    }

    #[test]
    fn dying_servant_is_flagged_but_kept() {
        let mut world = Settlement::new(TileGrid::new(10, 10), Tuning::default(), 2);
        let id = world.spawn_settler("Cora");
        world.servant_mut(id).unwrap().needs.thirst = 0.01;
        let mut rngs = RngManager::new(2);
        ServantSystem::new()
            .run(&ctx(2.4), &mut world, &mut rngs.stream("servants"))
            .unwrap();
        let servant = world.servant(id).unwrap();
        assert!(!servant.alive);
        assert!(servant.task.is_none());
        assert_eq!(world.servants().len(), 1);
    }

    #[test]
    fn servant_delivers_before_dying_on_the_same_tick() {
        use crate::components::Payload;
        use crate::structures::StructureKind;
        use crate::task::{Task, TaskKind, TaskPhase};

        let mut world = Settlement::new(TileGrid::new(10, 10), Tuning::default(), 2);
        world.place_town_center();
        world.inventory = crate::components::Inventory::empty();
        let center = world
            .structures
            .built_of_kind(StructureKind::TownCenter)
            .next()
            .unwrap()
            .center(world.tuning.tile_size);
        let id = world.spawn_settler("Cora");
        let servant = world.servant_mut(id).unwrap();
        servant.position = center;
        servant.needs.hunger = 0.01;
        servant.task = Some(Task {
            kind: TaskKind::HarvestTree,
            target: TilePos::new(1, 1),
            phase: TaskPhase::Return {
                payload: Payload {
                    wood: 2,
                    ..Payload::default()
                },
                drop_off: None,
            },
        });
        let mut rngs = RngManager::new(2);
        ServantSystem::new()
            .run(&ctx(2.4), &mut world, &mut rngs.stream("servants"))
            .unwrap();
        assert_eq!(world.inventory().wood, 2);
        assert!(!world.servant(id).unwrap().alive);
    }
}
