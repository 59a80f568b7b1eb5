//! Per-servant gather cycle: travel to a target tile, work it, haul the
//! payload back to a drop-off and deliver it.
//!
//! A task lives only inside [`Servant::task`]. Completion, abandonment and
//! delivery all clear it and put the servant on the full gather cooldown.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::{Inventory, Payload, StructureUid};
use crate::config::Tuning;
use crate::economy;
use crate::error::SimError;
use crate::events::{EventLog, SettlementEvent};
use crate::servant::{Role, Servant};
use crate::spatial::{Tile, TileGrid, TilePos, Vec2};
use crate::structures::StructureRegistry;

/// Distance in world units at which a mover counts as arrived.
pub const ARRIVAL_RADIUS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    HarvestTree,
    HarvestRock,
    HarvestCrop,
    PlantSeed,
}

/// Phase data is only present in the phase it belongs to: a travelling
/// servant carries nothing and a returning one always has a payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskPhase {
    Travel,
    Work {
        remaining: f32,
    },
    Return {
        payload: Payload,
        drop_off: Option<StructureUid>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    pub target: TilePos,
    pub phase: TaskPhase,
}

impl Task {
    pub fn new(kind: TaskKind, target: TilePos) -> Self {
        Self {
            kind,
            target,
            phase: TaskPhase::Travel,
        }
    }
}

/// Everything a task step may read or mutate besides the servant itself.
pub struct TaskContext<'a, R: Rng> {
    pub grid: &'a mut TileGrid,
    pub structures: &'a StructureRegistry,
    pub inventory: &'a mut Inventory,
    pub tuning: &'a Tuning,
    pub events: &'a mut EventLog,
    pub rng: &'a mut R,
}

/// Advances the servant's task by `dt` wall seconds.
pub fn step<R: Rng>(servant: &mut Servant, dt: f32, ctx: &mut TaskContext<'_, R>) {
    let Some(task) = servant.task.take() else {
        return;
    };
    servant.task = advance(servant, task, dt.max(0.0), ctx);
    if servant.task.is_none() {
        servant.idle_cooldown = ctx.tuning.gather_interval_minutes;
    }
}

fn advance<R: Rng>(
    servant: &mut Servant,
    mut task: Task,
    dt: f32,
    ctx: &mut TaskContext<'_, R>,
) -> Option<Task> {
    match task.phase {
        TaskPhase::Travel => {
            let target = task.target.center(ctx.tuning.tile_size);
            if servant.position.distance(target) > ARRIVAL_RADIUS {
                servant
                    .position
                    .step_toward(target, ctx.tuning.move_speed * dt);
                return Some(task);
            }
            if task.kind == TaskKind::PlantSeed {
                plant(servant, task.target, ctx);
                return None;
            }
            task.phase = TaskPhase::Work {
                remaining: ctx.tuning.gather_work_seconds,
            };
            Some(task)
        }
        TaskPhase::Work { remaining } => {
            let remaining = remaining - dt;
            if remaining > 0.0 {
                task.phase = TaskPhase::Work { remaining };
                return Some(task);
            }
            let payload = harvest(servant, &task, ctx);
            if !payload.has_resources() {
                return None;
            }
            let drop_off = ctx
                .structures
                .resolve_drop_off(None, servant.position, ctx.tuning.tile_size)
                .map(|s| s.uid);
            match drop_off {
                Some(uid) => {
                    task.phase = TaskPhase::Return {
                        payload,
                        drop_off: Some(uid),
                    };
                    Some(task)
                }
                None => {
                    abandon(servant, ctx);
                    None
                }
            }
        }
        TaskPhase::Return { payload, drop_off } => {
            if !payload.has_resources() {
                return None;
            }
            let Some(structure) =
                ctx.structures
                    .resolve_drop_off(drop_off, servant.position, ctx.tuning.tile_size)
            else {
                abandon(servant, ctx);
                return None;
            };
            let uid = structure.uid;
            let kind = structure.kind;
            let target = structure.center(ctx.tuning.tile_size);
            if servant.position.distance(target) > ARRIVAL_RADIUS {
                servant
                    .position
                    .step_toward(target, ctx.tuning.move_speed * dt);
                task.phase = TaskPhase::Return {
                    payload,
                    drop_off: Some(uid),
                };
                return Some(task);
            }
            let food_cap = economy::max_food_storage(ctx.structures, ctx.tuning);
            let stored = ctx.inventory.deposit(payload, food_cap);
            ctx.events.push(SettlementEvent::Delivered {
                id: servant.id,
                name: servant.name.clone(),
                stored,
                drop_off: kind,
            });
            None
        }
    }
}

fn abandon<R: Rng>(servant: &Servant, ctx: &mut TaskContext<'_, R>) {
    ctx.events.push(SettlementEvent::PayloadAbandoned {
        id: servant.id,
        name: servant.name.clone(),
    });
}

fn plant<R: Rng>(servant: &Servant, target: TilePos, ctx: &mut TaskContext<'_, R>) {
    if !ctx.grid.is_plantable(target) || !ctx.inventory.take_seed() {
        debug!(servant = %servant.id, x = target.x, y = target.y, "nothing to plant");
        return;
    }
    if ctx.grid.plant(target).is_ok() {
        ctx.events.push(SettlementEvent::SeedPlanted {
            id: servant.id,
            name: servant.name.clone(),
            at: target,
        });
    }
}

/// Resolves the harvest at the end of the work phase.
fn harvest<R: Rng>(servant: &Servant, task: &Task, ctx: &mut TaskContext<'_, R>) -> Payload {
    let tuning = ctx.tuning;
    let mut payload = Payload::default();
    match task.kind {
        TaskKind::HarvestTree => {
            let mut wood: u32 = if ctx.grid.tile(task.target) == Some(Tile::Tree)
                && ctx
                    .grid
                    .start_respawn(task.target, Tile::Tree, tuning.tree_respawn_days)
                    .is_ok()
            {
                2 + ctx.rng.gen_range(0..=1)
            } else {
                1
            };
            if servant.needs.hunger < tuning.hunger_threshold {
                wood = wood.saturating_sub(1);
            }
            payload.wood = wood;
        }
        TaskKind::HarvestRock => {
            let mut stone: u32 = if ctx.grid.tile(task.target) == Some(Tile::Rock)
                && ctx
                    .grid
                    .start_respawn(task.target, Tile::Rock, tuning.rock_respawn_days)
                    .is_ok()
            {
                1 + ctx.rng.gen_range(0..=2)
            } else {
                1
            };
            if servant.needs.thirst < tuning.thirst_threshold {
                stone = stone.saturating_sub(1);
            }
            payload.stone = stone;
        }
        TaskKind::HarvestCrop => {
            if ctx.grid.harvest_crop(task.target) {
                payload.food = 1;
                payload.seeds = 2;
            }
        }
        TaskKind::PlantSeed => plant(servant, task.target, ctx),
    }
    payload
}

/// A pure target search for one role.
pub type TargetStrategy = fn(&TileGrid, TilePos, &Inventory) -> Option<Task>;

const ROLE_STRATEGIES: &[(Role, TargetStrategy)] = &[
    (Role::Lumberjack, lumberjack_target),
    (Role::Miner, miner_target),
    (Role::Farmer, farmer_target),
];

fn lumberjack_target(grid: &TileGrid, from: TilePos, _: &Inventory) -> Option<Task> {
    grid.nearest_tile(from, Tile::Tree)
        .map(|pos| Task::new(TaskKind::HarvestTree, pos))
}

fn miner_target(grid: &TileGrid, from: TilePos, _: &Inventory) -> Option<Task> {
    grid.nearest_tile(from, Tile::Rock)
        .map(|pos| Task::new(TaskKind::HarvestRock, pos))
}

fn farmer_target(grid: &TileGrid, from: TilePos, inventory: &Inventory) -> Option<Task> {
    if let Some(pos) = grid.nearest_mature_crop(from) {
        return Some(Task::new(TaskKind::HarvestCrop, pos));
    }
    if inventory.seeds == 0 {
        return None;
    }
    grid.nearest_plantable(from)
        .map(|pos| Task::new(TaskKind::PlantSeed, pos))
}

/// Fallback for roles without a registered strategy: gather whichever of
/// wood and stone the stockpile holds less of.
pub fn balanced_target(grid: &TileGrid, from: TilePos, inventory: &Inventory) -> Option<Task> {
    if inventory.wood <= inventory.stone {
        lumberjack_target(grid, from, inventory).or_else(|| miner_target(grid, from, inventory))
    } else {
        miner_target(grid, from, inventory).or_else(|| lumberjack_target(grid, from, inventory))
    }
}

pub fn strategy_for(role: Role) -> TargetStrategy {
    ROLE_STRATEGIES
        .iter()
        .find(|(r, _)| *r == role)
        .map(|(_, strategy)| *strategy)
        .unwrap_or(balanced_target)
}

/// Chooses the next task for an idle servant from the tile it stands on.
pub fn pick_task(
    servant: &Servant,
    grid: &TileGrid,
    inventory: &Inventory,
    tuning: &Tuning,
) -> Result<Task, SimError> {
    let from = TilePos::containing(servant.position, tuning.tile_size);
    strategy_for(servant.role)(grid, from, inventory).ok_or(SimError::NoValidTask {
        servant: servant.id,
    })
}

/// World position a servant is currently heading for, if any.
pub fn destination(task: &Task, structures: &StructureRegistry, tuning: &Tuning) -> Option<Vec2> {
    match task.phase {
        TaskPhase::Travel => Some(task.target.center(tuning.tile_size)),
        TaskPhase::Work { .. } => None,
        TaskPhase::Return { drop_off, .. } => drop_off
            .and_then(|uid| structures.get(uid))
            .map(|s| s.center(tuning.tile_size)),
    }
}
