use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::components::{Inventory, ServantId, StructureUid};
use crate::config::Tuning;
use crate::economy::Capacities;
use crate::events::{EventLog, LoggedEvent, SettlementEvent};
use crate::servant::{Role, Servant};
use crate::spatial::{spawn_point, ResourceFeature, Tile, TileGrid, TilePos, Vec2};
use crate::structures::{Structure, StructureKind, StructureRegistry};
use crate::task::{self, TaskKind, TaskPhase};

pub const MINUTES_PER_DAY: f64 = 1440.0;

const ACTION_STREAM_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Day counter plus minutes past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clock {
    pub day: u32,
    pub minutes: f64,
}

impl Clock {
    pub fn new(start_minutes: f64) -> Self {
        Self {
            day: 1,
            minutes: start_minutes.rem_euclid(MINUTES_PER_DAY),
        }
    }

    /// Moves the clock forward and returns how many midnights were crossed.
    pub fn advance(&mut self, minutes: f64) -> u32 {
        if !(minutes > 0.0) {
            return 0;
        }
        self.minutes += minutes;
        let days = (self.minutes / MINUTES_PER_DAY).floor();
        if days >= 1.0 {
            self.minutes -= days * MINUTES_PER_DAY;
            self.day = self.day.saturating_add(days as u32);
        }
        days as u32
    }

    pub fn label(&self) -> String {
        let whole = self.minutes.floor() as u32;
        format!("{:02}:{:02}", (whole / 60) % 24, whole % 60)
    }

    /// 0.2 at night rising to 1.0 at noon.
    pub fn daylight_factor(&self) -> f32 {
        let phase = (self.minutes % MINUTES_PER_DAY) / MINUTES_PER_DAY * std::f64::consts::TAU;
        (0.2 + 0.8 * (phase - std::f64::consts::FRAC_PI_2).sin().max(0.0)) as f32
    }
}

fn default_base_speed() -> f32 {
    140.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_base_speed")]
    pub base_speed: f32,
}

impl Player {
    pub fn at(position: Vec2) -> Self {
        Self {
            x: position.x,
            y: position.y,
            base_speed: default_base_speed(),
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServantView {
    pub id: u64,
    pub name: String,
    pub role: Role,
    pub hunger: f32,
    pub thirst: f32,
    pub shelter: f32,
    pub age: f32,
    pub x: f32,
    pub y: f32,
    pub home: Option<u64>,
    pub task: Option<TaskKind>,
    pub phase: Option<&'static str>,
    /// Where the servant is walking to; `None` while idle or working.
    pub destination: Option<Vec2>,
    pub alive: bool,
}

impl ServantView {
    fn of(servant: &Servant, structures: &StructureRegistry, tuning: &Tuning) -> Self {
        Self {
            id: servant.id.raw(),
            name: servant.name.clone(),
            role: servant.role,
            hunger: servant.needs.hunger,
            thirst: servant.needs.thirst,
            shelter: servant.needs.shelter,
            age: servant.age,
            x: servant.position.x,
            y: servant.position.y,
            home: servant.home.map(StructureUid::raw),
            task: servant.task.map(|t| t.kind),
            phase: servant.task.map(|t| match t.phase {
                TaskPhase::Travel => "travel",
                TaskPhase::Work { .. } => "work",
                TaskPhase::Return { .. } => "return",
            }),
            destination: servant
                .task
                .as_ref()
                .and_then(|task| task::destination(task, structures, tuning)),
            alive: servant.alive,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TerrainSummary {
    pub trees: usize,
    pub rocks: usize,
    pub water: usize,
    pub tilled: usize,
    pub crops: usize,
    pub roads: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementSnapshot {
    pub scenario: String,
    pub tick: u64,
    pub day: u32,
    pub clock: String,
    pub minutes: f64,
    pub paused: bool,
    pub daylight: f32,
    pub inventory: Inventory,
    pub capacities: Capacities,
    pub water_rations: u32,
    pub alive: usize,
    pub housed: usize,
    pub terrain: TerrainSummary,
    pub structures: Vec<Structure>,
    pub servants: Vec<ServantView>,
    pub recent_events: Vec<LoggedEvent>,
}

fn scatter_near<R: Rng>(player: &Player, grid: &TileGrid, tuning: &Tuning, rng: &mut R) -> Vec2 {
    let tile = tuning.tile_size;
    let max_x = grid.width() as f32 * tile - tile / 2.0;
    let max_y = grid.height() as f32 * tile - tile / 2.0;
    Vec2::new(
        (player.x + rng.gen_range(-tile..tile)).clamp(tile / 2.0, max_x),
        (player.y + rng.gen_range(-tile..tile)).clamp(tile / 2.0, max_y),
    )
}

/// The whole simulation state. Every operation takes it by reference; the
/// engine, player actions and persistence are the only writers.
pub struct Settlement {
    pub(crate) tuning: Tuning,
    pub(crate) seed: u64,
    pub(crate) tick: u64,
    pub(crate) clock: Clock,
    pub(crate) grid: TileGrid,
    pub(crate) structures: StructureRegistry,
    pub(crate) servants: Vec<Servant>,
    pub(crate) next_servant_id: u64,
    pub(crate) inventory: Inventory,
    pub(crate) player: Player,
    pub(crate) water_rations: u32,
    pub(crate) events: EventLog,
    pub(crate) paused: bool,
    /// Randomness for player actions and settler placement; systems draw
    /// from their own engine streams.
    pub(crate) rng: ChaCha8Rng,
}

impl Settlement {
    pub fn new(grid: TileGrid, tuning: Tuning, seed: u64) -> Self {
        let spawn = spawn_point(grid.width(), grid.height()).center(tuning.tile_size);
        let clock = Clock::new(tuning.start_minutes);
        let mut events = EventLog::default();
        events.set_stamp(clock.day, clock.label());
        Self {
            tuning,
            seed,
            tick: 0,
            clock,
            grid,
            structures: StructureRegistry::new(),
            servants: Vec::new(),
            next_servant_id: 1,
            inventory: Inventory::default(),
            player: Player::at(spawn),
            water_rations: 0,
            events,
            paused: false,
            rng: ChaCha8Rng::seed_from_u64(seed ^ ACTION_STREAM_SALT),
        }
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn day(&self) -> u32 {
        self.clock.day
    }

    /// Advances the clock by simulated minutes, restamping the event log.
    /// Returns the number of day rollovers.
    pub fn advance_clock(&mut self, minutes: f64) -> u32 {
        let rollovers = self.clock.advance(minutes);
        self.events.set_stamp(self.clock.day, self.clock.label());
        rollovers
    }

    pub fn daylight_factor(&self) -> f32 {
        self.clock.daylight_factor()
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut TileGrid {
        &mut self.grid
    }

    pub fn structures(&self) -> &StructureRegistry {
        &self.structures
    }

    pub fn servants(&self) -> &[Servant] {
        &self.servants
    }

    pub fn servants_mut(&mut self) -> &mut [Servant] {
        &mut self.servants
    }

    pub fn servant(&self, id: ServantId) -> Option<&Servant> {
        self.servants.iter().find(|s| s.id == id)
    }

    pub fn servant_mut(&mut self, id: ServantId) -> Option<&mut Servant> {
        self.servants.iter_mut().find(|s| s.id == id)
    }

    pub fn alive_count(&self) -> usize {
        self.servants.iter().filter(|s| s.alive).count()
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn water_rations(&self) -> u32 {
        self.water_rations
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn capacities(&self) -> Capacities {
        Capacities::of(&self.structures, &self.tuning)
    }

    pub(crate) fn allocate_servant_id(&mut self) -> ServantId {
        let id = ServantId::new(self.next_servant_id);
        self.next_servant_id += 1;
        id
    }

    /// Drops the 3x3 town center centred on the spawn tile. Terrain is left
    /// alone; only regrowth records under the footprint are cleared.
    pub fn place_town_center(&mut self) -> StructureUid {
        let def = StructureKind::TownCenter.definition();
        let center = spawn_point(self.grid.width(), self.grid.height());
        let origin = TilePos::new(
            center.x - def.width as i32 / 2,
            center.y - def.height as i32 / 2,
        );
        self.clear_features_under(origin, def.width, def.height);
        self.structures.insert(StructureKind::TownCenter, origin, 0)
    }

    pub(crate) fn clear_features_under(&mut self, origin: TilePos, width: u32, height: u32) {
        for dy in 0..height as i32 {
            for dx in 0..width as i32 {
                let pos = TilePos::new(origin.x + dx, origin.y + dy);
                let _ = self.grid.set_feature(pos, ResourceFeature::None);
            }
        }
    }

    /// A point within one tile of the player, kept inside the map.
    pub(crate) fn near_player<R: Rng>(&self, rng: &mut R) -> Vec2 {
        scatter_near(&self.player, &self.grid, &self.tuning, rng)
    }

    /// Adds an adult settler within one tile of the player.
    pub fn spawn_settler(&mut self, name: &str) -> ServantId {
        let position = scatter_near(&self.player, &self.grid, &self.tuning, &mut self.rng);
        let age = self.tuning.adult_age + self.rng.gen_range(0.0..4.0);
        let id = self.allocate_servant_id();
        self.servants
            .push(Servant::new(id, name, position, age, &self.tuning));
        self.events.push(SettlementEvent::ServantJoined {
            id,
            name: name.to_string(),
        });
        id
    }

    /// Rebuilds every home assignment: living servants in id order fill the
    /// built huts one at a time up to the per-hut capacity.
    pub fn assign_housing(&mut self) {
        let capacity = self.tuning.hut_capacity as usize;
        let huts: Vec<StructureUid> = self
            .structures
            .built_of_kind(StructureKind::Hut)
            .map(|hut| hut.uid)
            .collect();
        for servant in &mut self.servants {
            servant.home = None;
        }
        if huts.is_empty() || capacity == 0 {
            return;
        }
        let mut occupants = vec![0usize; huts.len()];
        let mut remaining = huts.len() * capacity;
        let mut hut_index = 0;
        self.servants.sort_by_key(|s| s.id);
        for servant in self.servants.iter_mut().filter(|s| s.alive) {
            let slot = hut_index % huts.len();
            if occupants[slot] < capacity {
                occupants[slot] += 1;
                servant.home = Some(huts[slot]);
                remaining -= 1;
                if occupants[slot] >= capacity {
                    hut_index += 1;
                }
            }
            if remaining == 0 {
                break;
            }
        }
    }

    /// Removes dead servants from the live collection.
    pub fn prune_dead(&mut self) -> usize {
        let before = self.servants.len();
        self.servants.retain(|s| s.alive);
        before - self.servants.len()
    }

    pub fn snapshot(&self, scenario: &str) -> SettlementSnapshot {
        SettlementSnapshot {
            scenario: scenario.to_string(),
            tick: self.tick,
            day: self.clock.day,
            clock: self.clock.label(),
            minutes: self.clock.minutes,
            paused: self.paused,
            daylight: self.daylight_factor(),
            inventory: self.inventory,
            capacities: self.capacities(),
            water_rations: self.water_rations,
            alive: self.alive_count(),
            housed: self
                .servants
                .iter()
                .filter(|s| s.alive && s.home.is_some())
                .count(),
            terrain: TerrainSummary {
                trees: self.grid.count_tiles(Tile::Tree),
                rocks: self.grid.count_tiles(Tile::Rock),
                water: self.grid.count_tiles(Tile::Water),
                tilled: self.grid.count_tiles(Tile::Tilled),
                crops: self.grid.count_tiles(Tile::Crop),
                roads: self.grid.count_tiles(Tile::Road),
            },
            structures: self.structures.iter().cloned().collect(),
            servants: self
                .servants
                .iter()
                .map(|servant| ServantView::of(servant, &self.structures, &self.tuning))
                .collect(),
            recent_events: self.events.iter().take(10).cloned().collect(),
        }
    }
}
