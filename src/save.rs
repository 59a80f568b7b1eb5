//! Save-game schema and the lenient loader.
//!
//! Only malformed JSON fails a load, and that error names the offending
//! path. Every field below the document root is lenient: a value of the
//! wrong type is defaulted and reported as a
//! [`SimError::CorruptedSaveField`] rather than failing the load.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{info, warn};

use crate::components::{Inventory, Payload, ServantId, StructureUid};
use crate::config::MAX_MAP_TILES;
use crate::error::SimError;
use crate::scenario::Scenario;
use crate::servant::{Needs, Role, Servant};
use crate::spatial::{CropPlot, ResourceFeature, Tile, TileGrid, TilePos, Vec2};
use crate::structures::{Structure, StructureKind, StructureRegistry};
use crate::task::{Task, TaskKind, TaskPhase};
use crate::world::{Clock, Player, Settlement, MINUTES_PER_DAY};

pub const SAVE_VERSION: u32 = 1;

const FALLBACK_NAME: &str = "Helper";
const FALLBACK_AGE: f32 = 20.0;

fn default_day() -> u32 {
    1
}

fn default_time() -> f64 {
    6.0 * 60.0
}

/// A record field that may be absent or hold a value of the wrong type.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Valid(T),
    Invalid(Value),
    Missing,
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Missing
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Valid(value)
    }
}

impl<T> Field<T> {
    /// Takes the value, or `fallback` with an issue recorded when the field
    /// was present but unreadable.
    fn or_report(self, field: &str, fallback: T, issues: &mut Vec<SimError>) -> T {
        match self {
            Field::Valid(value) => value,
            Field::Missing => fallback,
            Field::Invalid(raw) => {
                issues.push(SimError::corrupted(field, format!("unreadable value {raw}")));
                fallback
            }
        }
    }

    fn into_option(self, field: &str, issues: &mut Vec<SimError>) -> Option<T> {
        match self {
            Field::Valid(value) => Some(value),
            Field::Missing => None,
            Field::Invalid(raw) => {
                issues.push(SimError::corrupted(field, format!("unreadable value {raw}")));
                None
            }
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(Field::Missing);
        }
        Ok(match serde_json::from_value::<T>(raw.clone()) {
            Ok(value) => Field::Valid(value),
            Err(_) => Field::Invalid(raw),
        })
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Valid(value) => value.serialize(serializer),
            Field::Invalid(raw) => raw.serialize(serializer),
            Field::Missing => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedStructure {
    pub uid: Field<u64>,
    #[serde(alias = "id")]
    pub kind: Field<StructureKind>,
    pub x: Field<i32>,
    pub y: Field<i32>,
    pub rotation: Field<u8>,
    pub built: Field<bool>,
    pub progress: Field<f32>,
}

impl SavedStructure {
    fn of(structure: &Structure) -> Self {
        Self {
            uid: structure.uid.raw().into(),
            kind: structure.kind.into(),
            x: structure.origin.x.into(),
            y: structure.origin.y.into(),
            rotation: structure.rotation.into(),
            built: structure.built.into(),
            progress: structure.progress.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedServant {
    pub id: Field<u64>,
    pub name: Field<String>,
    #[serde(alias = "job")]
    pub role: Field<Role>,
    pub hunger: Field<f32>,
    pub thirst: Field<f32>,
    pub shelter: Field<f32>,
    pub age: Field<f32>,
    pub x: Field<f32>,
    pub y: Field<f32>,
    #[serde(alias = "homeId")]
    pub home: Field<u64>,
    #[serde(alias = "taskTimer")]
    pub idle_cooldown: Field<f32>,
    /// Kept raw; see [`sanitize_task`].
    #[serde(alias = "currentTask")]
    pub task: Option<Value>,
    pub alive: Field<bool>,
}

impl SavedServant {
    fn of(servant: &Servant) -> Self {
        Self {
            id: servant.id.raw().into(),
            name: servant.name.clone().into(),
            role: servant.role.into(),
            hunger: servant.needs.hunger.into(),
            thirst: servant.needs.thirst.into(),
            shelter: servant.needs.shelter.into(),
            age: servant.age.into(),
            x: servant.position.x.into(),
            y: servant.position.y.into(),
            home: servant
                .home
                .map(|uid| Field::Valid(uid.raw()))
                .unwrap_or_default(),
            idle_cooldown: servant.idle_cooldown.into(),
            task: servant
                .task
                .as_ref()
                .and_then(|task| serde_json::to_value(task).ok()),
            alive: servant.alive.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedInventory {
    pub wood: Field<u32>,
    pub stone: Field<u32>,
    pub seeds: Field<u32>,
    pub food: Field<u32>,
}

impl SavedInventory {
    fn of(inventory: &Inventory) -> Self {
        Self {
            wood: inventory.wood.into(),
            stone: inventory.stone.into(),
            seeds: inventory.seeds.into(),
            food: inventory.food.into(),
        }
    }

    fn restore(self, issues: &mut Vec<SimError>) -> Inventory {
        let base = Inventory::default();
        Inventory {
            wood: self.wood.or_report("inventory.wood", base.wood, issues),
            stone: self.stone.or_report("inventory.stone", base.stone, issues),
            seeds: self.seeds.or_report("inventory.seeds", base.seeds, issues),
            food: self.food.or_report("inventory.food", base.food, issues),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SavedPlayer {
    pub x: Field<f32>,
    pub y: Field<f32>,
    pub base_speed: Field<f32>,
}

impl SavedPlayer {
    fn of(player: &Player) -> Self {
        Self {
            x: player.x.into(),
            y: player.y.into(),
            base_speed: player.base_speed.into(),
        }
    }

    fn restore(self, base: Player, issues: &mut Vec<SimError>) -> Player {
        Player {
            x: self.x.or_report("player.x", base.x, issues),
            y: self.y.or_report("player.y", base.y, issues),
            base_speed: self
                .base_speed
                .or_report("player.base_speed", base.base_speed, issues)
                .max(0.0),
        }
    }
}

/// Persisted settlement. Every field is lenient; see [`restore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveGame {
    pub version: Field<u32>,
    pub saved_at: Field<DateTime<Utc>>,
    pub seed: Field<u64>,
    pub tick: Field<u64>,
    pub day: Field<u32>,
    /// Minutes past midnight.
    pub time: Field<f64>,
    pub width: Field<u32>,
    pub height: Field<u32>,
    pub world: Field<Vec<Field<Tile>>>,
    /// Raw so that legacy bare-timer entries can be upgraded.
    pub features: Field<Vec<Value>>,
    pub crops: Field<Vec<Field<CropPlot>>>,
    pub player: Field<SavedPlayer>,
    pub inventory: Field<SavedInventory>,
    pub buildings: Field<Vec<Field<SavedStructure>>>,
    pub servants: Field<Vec<Field<SavedServant>>>,
    pub next_servant_id: Field<u64>,
    pub next_building_id: Field<u64>,
    pub water_rations: Field<u32>,
    pub paused: Field<bool>,
}

/// A restored settlement plus everything that had to be defaulted or
/// dropped on the way.
pub struct LoadedGame {
    pub settlement: Settlement,
    pub issues: Vec<SimError>,
}

/// Captures the full persisted state of a settlement.
pub fn capture(world: &Settlement) -> SaveGame {
    SaveGame {
        version: SAVE_VERSION.into(),
        saved_at: Utc::now().into(),
        seed: world.seed.into(),
        tick: world.tick.into(),
        day: world.clock.day.into(),
        time: world.clock.minutes.into(),
        width: world.grid.width().into(),
        height: world.grid.height().into(),
        world: Field::Valid(world.grid.tiles().iter().copied().map(Field::Valid).collect()),
        features: Field::Valid(
            world
                .grid
                .features()
                .iter()
                .map(|feature| serde_json::to_value(feature).unwrap_or(Value::Null))
                .collect(),
        ),
        crops: Field::Valid(
            world
                .grid
                .crops()
                .iter()
                .map(|plot| plot.map_or(Field::Missing, Field::Valid))
                .collect(),
        ),
        player: SavedPlayer::of(&world.player).into(),
        inventory: SavedInventory::of(&world.inventory).into(),
        buildings: Field::Valid(
            world
                .structures
                .iter()
                .map(|structure| Field::Valid(SavedStructure::of(structure)))
                .collect(),
        ),
        servants: Field::Valid(
            world
                .servants
                .iter()
                .map(|servant| Field::Valid(SavedServant::of(servant)))
                .collect(),
        ),
        next_servant_id: world.next_servant_id.into(),
        next_building_id: world.structures.next_uid().into(),
        water_rations: world.water_rations.into(),
        paused: world.paused.into(),
    }
}

pub fn to_json(save: &SaveGame) -> Result<String> {
    serde_json::to_string_pretty(save).context("Failed to encode save game")
}

/// Parses a save document. Only malformed JSON or a document that is not an
/// object fails here; bad values inside it are left for [`restore`].
pub fn from_json(raw: &str) -> Result<SaveGame> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, SaveGame>(&mut deserializer) {
        Ok(save) => Ok(save),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(anyhow!("parse save json: {source}"))
            } else {
                Err(anyhow!("parse save json at {path}: {source}"))
            }
        }
    }
}

pub fn save_to_path(world: &Settlement, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create save dir {}", parent.display()))?;
    }
    let json = to_json(&capture(world))?;
    fs::write(path, json).with_context(|| format!("Failed to write save {}", path.display()))?;
    info!(path = %path.display(), tick = world.tick, "game saved");
    Ok(())
}

pub fn load_from_path(path: impl AsRef<Path>, scenario: &Scenario) -> Result<LoadedGame> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read save {}", path.display()))?;
    let save = from_json(&raw).with_context(|| format!("Failed to load {}", path.display()))?;
    let loaded = restore(save, scenario);
    for issue in &loaded.issues {
        warn!(path = %path.display(), "{issue}");
    }
    Ok(loaded)
}

fn map_dimensions(
    width: Field<u32>,
    height: Field<u32>,
    scenario: &Scenario,
    issues: &mut Vec<SimError>,
) -> (u32, u32) {
    let width = width.into_option("width", issues);
    let height = height.into_option("height", issues);
    let fallback = (scenario.map.width, scenario.map.height);
    match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => {
            if u64::from(w) * u64::from(h) <= MAX_MAP_TILES {
                (w, h)
            } else {
                issues.push(SimError::corrupted(
                    "width",
                    format!("map {w}x{h} exceeds {MAX_MAP_TILES} tiles, using the scenario map"),
                ));
                fallback
            }
        }
        _ => {
            issues.push(SimError::corrupted(
                "width",
                "map dimensions missing, using the scenario map",
            ));
            fallback
        }
    }
}

fn restore_tiles(entries: Vec<Field<Tile>>, issues: &mut Vec<SimError>) -> Vec<Tile> {
    let mut unreadable = 0;
    let layer = entries
        .into_iter()
        .map(|entry| match entry {
            Field::Valid(tile) => tile,
            Field::Invalid(_) | Field::Missing => {
                unreadable += 1;
                Tile::Grass
            }
        })
        .collect();
    if unreadable > 0 {
        issues.push(SimError::corrupted(
            "world",
            format!("{unreadable} unreadable tiles cleared to grass"),
        ));
    }
    layer
}

fn restore_features(
    raw: Vec<Value>,
    rock_respawn_days: u32,
    issues: &mut Vec<SimError>,
) -> Vec<ResourceFeature> {
    let mut unreadable = 0;
    let layer = raw
        .iter()
        .map(|entry| {
            upgrade_feature(entry, rock_respawn_days).unwrap_or_else(|| {
                unreadable += 1;
                ResourceFeature::None
            })
        })
        .collect();
    if unreadable > 0 {
        issues.push(SimError::corrupted(
            "features",
            format!("{unreadable} unreadable entries cleared"),
        ));
    }
    layer
}

fn restore_crops(entries: Vec<Field<CropPlot>>, issues: &mut Vec<SimError>) -> Vec<Option<CropPlot>> {
    let mut unreadable = 0;
    let layer = entries
        .into_iter()
        .map(|entry| match entry {
            Field::Valid(plot) => Some(CropPlot {
                growth: plot.growth.clamp(0.0, CropPlot::MATURE),
            }),
            Field::Missing => None,
            Field::Invalid(_) => {
                unreadable += 1;
                None
            }
        })
        .collect();
    if unreadable > 0 {
        issues.push(SimError::corrupted(
            "crops",
            format!("{unreadable} unreadable plots cleared"),
        ));
    }
    layer
}

/// Rebuilds a settlement from a save. Tuning comes from the scenario; map
/// dimensions fall back to it when the save does not carry usable ones.
/// Nothing in the save can fail the load: unreadable values are defaulted
/// and listed in [`LoadedGame::issues`].
pub fn restore(save: SaveGame, scenario: &Scenario) -> LoadedGame {
    let mut issues = Vec::new();
    let tuning = scenario.tuning.clone();

    let (width, height) = map_dimensions(save.width, save.height, scenario, &mut issues);

    let unreadable_layers: Vec<&str> = [
        ("world", matches!(save.world, Field::Invalid(_))),
        ("features", matches!(save.features, Field::Invalid(_))),
        ("crops", matches!(save.crops, Field::Invalid(_))),
    ]
    .into_iter()
    .filter_map(|(name, invalid)| invalid.then_some(name))
    .collect();
    let tiles = save
        .world
        .into_option("world", &mut issues)
        .map(|entries| restore_tiles(entries, &mut issues));
    let features = save
        .features
        .into_option("features", &mut issues)
        .map(|raw| restore_features(raw, tuning.rock_respawn_days, &mut issues));
    let crops = save
        .crops
        .into_option("crops", &mut issues)
        .map(|entries| restore_crops(entries, &mut issues));
    let (grid, discarded) = TileGrid::from_layers(width, height, tiles, features, crops);
    for layer in discarded {
        if unreadable_layers.contains(&layer) {
            continue;
        }
        issues.push(SimError::corrupted(
            layer,
            format!("layer length does not match {width}x{height}, reset to empty"),
        ));
    }

    let seed = save.seed.or_report("seed", scenario.seed, &mut issues);
    let mut world = Settlement::new(grid, tuning, seed);
    world.tick = save.tick.or_report("tick", 0, &mut issues);
    let day = save.day.or_report("day", default_day(), &mut issues);
    let minutes = save.time.or_report("time", default_time(), &mut issues);
    world.clock = Clock {
        day: day.max(1),
        minutes: if minutes.is_finite() {
            minutes.rem_euclid(MINUTES_PER_DAY)
        } else {
            default_time()
        },
    };
    world.events.set_stamp(world.clock.day, world.clock.label());
    if let Some(player) = save.player.into_option("player", &mut issues) {
        world.player = player.restore(world.player, &mut issues);
    }
    world.inventory = match save.inventory.into_option("inventory", &mut issues) {
        Some(inventory) => inventory.restore(&mut issues),
        None => Inventory::default(),
    };
    world.paused = save.paused.or_report("paused", false, &mut issues);

    let buildings = save.buildings.or_report("buildings", Vec::new(), &mut issues);
    let next_building_id = save
        .next_building_id
        .or_report("next_building_id", 0, &mut issues);
    world.structures = restore_structures(buildings, next_building_id, &world.grid, &mut issues);
    if !world.structures.contains_kind(StructureKind::TownCenter) {
        let uid = world.place_town_center();
        warn!(%uid, "save had no town center, founded a new one");
    }

    let servants = save.servants.or_report("servants", Vec::new(), &mut issues);
    let next_servant_id = save
        .next_servant_id
        .or_report("next_servant_id", 0, &mut issues);
    restore_servants(&mut world, servants, next_servant_id, &mut issues);

    let capacities = world.capacities();
    world.inventory.food = world.inventory.food.min(capacities.max_food);
    let rations = save.water_rations.or_report("water_rations", 0, &mut issues);
    world.water_rations = rations.min(capacities.water);

    world.prune_dead();
    world.assign_housing();
    info!(
        day = world.clock.day,
        servants = world.servants.len(),
        structures = world.structures.len(),
        issues = issues.len(),
        "save restored"
    );

    LoadedGame {
        settlement: world,
        issues,
    }
}

/// Reads one feature-layer entry. Bare numbers and `{timer, type}` objects
/// are the older encodings of a respawn timer.
fn upgrade_feature(entry: &Value, rock_respawn_days: u32) -> Option<ResourceFeature> {
    match entry {
        Value::Null => Some(ResourceFeature::None),
        Value::Number(number) => {
            let timer = number.as_f64().filter(|t| *t >= 0.0)?.round() as u32;
            if timer == 0 {
                return Some(ResourceFeature::None);
            }
            let restore = if timer >= rock_respawn_days {
                Tile::Rock
            } else {
                Tile::Tree
            };
            Some(ResourceFeature::Respawning { timer, restore })
        }
        Value::Object(fields) if fields.contains_key("state") => {
            serde_json::from_value(entry.clone()).ok()
        }
        Value::Object(fields) => {
            let timer = fields.get("timer")?.as_f64().filter(|t| *t >= 0.0)?.round() as u32;
            let restore = match fields.get("type").and_then(Value::as_str) {
                Some("rock") => Tile::Rock,
                _ => Tile::Tree,
            };
            Some(ResourceFeature::Respawning {
                timer: timer.max(1),
                restore,
            })
        }
        _ => None,
    }
}

fn restore_structures(
    saved: Vec<Field<SavedStructure>>,
    next_building_id: u64,
    grid: &TileGrid,
    issues: &mut Vec<SimError>,
) -> StructureRegistry {
    let mut kept: Vec<(Option<u64>, Structure)> = Vec::new();
    for (index, record) in saved.into_iter().enumerate() {
        let Field::Valid(record) = record else {
            issues.push(SimError::corrupted(
                format!("buildings[{index}]"),
                "unreadable structure record, dropped",
            ));
            continue;
        };
        let field = |name: &str| format!("buildings[{index}].{name}");
        let Field::Valid(kind) = record.kind else {
            issues.push(SimError::corrupted(field("kind"), "unknown structure kind, dropped"));
            continue;
        };
        let x = record.x.into_option(&field("x"), issues);
        let y = record.y.into_option(&field("y"), issues);
        let (Some(x), Some(y)) = (x, y) else {
            issues.push(SimError::corrupted(field("x"), "structure has no position, dropped"));
            continue;
        };
        let origin = TilePos::new(x, y);
        if !grid.in_bounds(origin) {
            issues.push(SimError::corrupted(field("x"), "structure lies outside the map, dropped"));
            continue;
        }
        let def = kind.definition();
        let built = record.built.or_report(&field("built"), true, issues);
        let progress = if built {
            100.0
        } else {
            record
                .progress
                .or_report(&field("progress"), 0.0, issues)
                .clamp(0.0, 100.0)
        };
        let uid = record.uid.into_option(&field("uid"), issues);
        kept.push((
            uid,
            Structure {
                uid: StructureUid::new(0),
                kind,
                origin,
                width: def.width,
                height: def.height,
                rotation: record.rotation.or_report(&field("rotation"), 0, issues) % 4,
                built,
                progress,
                drop_off: def.drop_off,
            },
        ));
    }

    let mut next = kept
        .iter()
        .filter_map(|(uid, _)| *uid)
        .max()
        .map_or(1, |max| max + 1)
        .max(next_building_id);
    let mut seen = std::collections::HashSet::new();
    let structures = kept
        .into_iter()
        .map(|(uid, mut structure)| {
            structure.uid = match uid {
                Some(raw) if raw > 0 && seen.insert(raw) => StructureUid::new(raw),
                _ => {
                    let fresh = next;
                    next += 1;
                    seen.insert(fresh);
                    StructureUid::new(fresh)
                }
            };
            structure
        })
        .collect();
    StructureRegistry::from_parts(structures, next)
}

fn restore_servants(
    world: &mut Settlement,
    saved: Vec<Field<SavedServant>>,
    next_servant_id: u64,
    issues: &mut Vec<SimError>,
) {
    let max = world.tuning.max_need;
    let tile = world.tuning.tile_size;
    let max_x = world.grid.width() as f32 * tile - tile / 2.0;
    let max_y = world.grid.height() as f32 * tile - tile / 2.0;
    let player = world.player.position();

    let mut restored: Vec<(Option<u64>, Servant)> = Vec::new();
    for (index, record) in saved.into_iter().enumerate() {
        let Field::Valid(record) = record else {
            issues.push(SimError::corrupted(
                format!("servants[{index}]"),
                "unreadable servant record, dropped",
            ));
            continue;
        };
        let field = |name: &str| format!("servants[{index}].{name}");
        let id = record.id.into_option(&field("id"), issues);
        let name = record
            .name
            .or_report(&field("name"), FALLBACK_NAME.to_string(), issues);
        let role = record.role.or_report(&field("role"), Role::ALL[0], issues);
        let needs = Needs {
            hunger: record.hunger.or_report(&field("hunger"), max, issues).clamp(0.0, max),
            thirst: record.thirst.or_report(&field("thirst"), max, issues).clamp(0.0, max),
            shelter: record.shelter.or_report(&field("shelter"), max, issues).clamp(0.0, max),
        };
        let age = record.age.or_report(&field("age"), FALLBACK_AGE, issues).max(0.0);
        let position = Vec2::new(
            record
                .x
                .or_report(&field("x"), player.x, issues)
                .clamp(tile / 2.0, max_x),
            record
                .y
                .or_report(&field("y"), player.y, issues)
                .clamp(tile / 2.0, max_y),
        );
        let task = record
            .task
            .as_ref()
            .and_then(|raw| match sanitize_task(raw, &world.grid) {
                Ok(task) => Some(task),
                Err(reason) => {
                    issues.push(SimError::corrupted(field("task"), reason));
                    None
                }
            });

        let mut servant = Servant::new(ServantId::new(0), name, position, age, &world.tuning);
        servant.role = role;
        servant.needs = needs;
        servant.home = record
            .home
            .into_option(&field("home"), issues)
            .map(StructureUid::new);
        servant.idle_cooldown = record
            .idle_cooldown
            .or_report(&field("idle_cooldown"), 0.0, issues)
            .max(0.0);
        servant.task = task;
        servant.alive = record.alive.or_report(&field("alive"), true, issues);
        restored.push((id, servant));
    }

    let mut next = restored
        .iter()
        .filter_map(|(id, _)| *id)
        .max()
        .map_or(1, |max| max + 1)
        .max(next_servant_id);
    let mut seen = std::collections::HashSet::new();
    world.servants = restored
        .into_iter()
        .map(|(id, mut servant)| {
            servant.id = match id {
                Some(raw) if raw > 0 && seen.insert(raw) => ServantId::new(raw),
                _ => {
                    let fresh = next;
                    next += 1;
                    seen.insert(fresh);
                    ServantId::new(fresh)
                }
            };
            servant
        })
        .collect();
    world.next_servant_id = next;
}

fn task_kind(raw: &str) -> Option<TaskKind> {
    match raw {
        "harvest_tree" | "tree" => Some(TaskKind::HarvestTree),
        "harvest_rock" | "rock" => Some(TaskKind::HarvestRock),
        "harvest_crop" | "farmHarvest" => Some(TaskKind::HarvestCrop),
        "plant_seed" | "farmPlant" => Some(TaskKind::PlantSeed),
        _ => None,
    }
}

fn read_count(fields: &serde_json::Map<String, Value>, key: &str) -> u32 {
    fields
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .map_or(0, |v| v.max(0.0).floor() as u32)
}

/// Validates a persisted task against the kind and phase allow-lists.
/// Accepts the current tagged layout as well as the flat `type`/`tx`/`ty`
/// one. An unknown phase restarts the task as travel.
pub fn sanitize_task(raw: &Value, grid: &TileGrid) -> Result<Task, String> {
    let fields = raw.as_object().ok_or("task is not an object")?;
    let kind = fields
        .get("kind")
        .or_else(|| fields.get("type"))
        .and_then(Value::as_str)
        .and_then(task_kind)
        .ok_or("task kind is not allowed")?;

    let coord = |value: Option<&Value>| value.and_then(Value::as_f64).filter(|v| v.is_finite());
    let target = fields.get("target").and_then(Value::as_object);
    let (x, y) = match target {
        Some(target) => (coord(target.get("x")), coord(target.get("y"))),
        None => (coord(fields.get("tx")), coord(fields.get("ty"))),
    };
    let (Some(x), Some(y)) = (x, y) else {
        return Err("task target is not numeric".to_string());
    };
    let target = TilePos::new(x.floor() as i32, y.floor() as i32);
    if !grid.in_bounds(target) {
        return Err(format!("task target ({}, {}) is off the map", target.x, target.y));
    }

    let phase_fields = fields
        .get("phase")
        .and_then(Value::as_object)
        .unwrap_or(fields);
    let state = phase_fields.get("state").and_then(Value::as_str);
    let phase = match state {
        Some("work") | Some("gather") => {
            let remaining = phase_fields
                .get("remaining")
                .or_else(|| phase_fields.get("timer"))
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
                .max(0.0);
            TaskPhase::Work {
                remaining: remaining as f32,
            }
        }
        Some("return") => {
            let payload = match phase_fields.get("payload").and_then(Value::as_object) {
                Some(payload) => Payload {
                    wood: read_count(payload, "wood"),
                    stone: read_count(payload, "stone"),
                    food: read_count(payload, "food"),
                    seeds: read_count(payload, "seeds"),
                },
                None => Payload::default(),
            };
            if !payload.has_resources() {
                return Err("returning task carries nothing".to_string());
            }
            let drop_off = phase_fields
                .get("drop_off")
                .or_else(|| phase_fields.get("dropId"))
                .and_then(Value::as_u64)
                .map(StructureUid::new);
            TaskPhase::Return { payload, drop_off }
        }
        _ => TaskPhase::Travel,
    };
    Ok(Task {
        kind,
        target,
        phase,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scenario() -> Scenario {
        serde_yaml::from_str("name: saves\nseed: 5\nmap:\n  width: 24\n  height: 24\n").unwrap()
    }

    #[test]
    fn round_trip_keeps_layers_inventory_and_roster() {
        let scenario = scenario();
        let mut world = scenario.build_world();
        world.grid.set_tile(TilePos::new(2, 2), Tile::Tilled).unwrap();
        world.grid.plant(TilePos::new(2, 2)).unwrap();
        world
            .grid
            .start_respawn(TilePos::new(3, 3), Tile::Tree, 3)
            .unwrap();
        world.inventory.wood = 17;
        let id = world.servants[0].id;
        world.set_servant_role(id, Role::Miner).unwrap();
        world.servants[0].task = Some(Task {
            kind: TaskKind::HarvestRock,
            target: TilePos::new(5, 6),
            phase: TaskPhase::Return {
                payload: Payload {
                    stone: 2,
                    ..Payload::default()
                },
                drop_off: Some(StructureUid::new(1)),
            },
        });

        let json = to_json(&capture(&world)).unwrap();
        let loaded = restore(from_json(&json).unwrap(), &scenario);
        assert!(loaded.issues.is_empty(), "{:?}", loaded.issues);
        let restored = loaded.settlement;

        assert_eq!(restored.grid, world.grid);
        assert_eq!(restored.inventory, world.inventory);
        assert_eq!(
            restored.structures.iter().collect::<Vec<_>>(),
            world.structures.iter().collect::<Vec<_>>()
        );
        assert_eq!(restored.servants, world.servants);
        assert_eq!(restored.clock, world.clock);
    }

    #[test]
    fn malformed_documents_fail_with_context() {
        let err = from_json(r#"{"width": 4, "world": ["grass", "#).unwrap_err();
        assert!(err.to_string().contains("parse save json"), "{err}");
        let err = from_json("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("parse save json"), "{err}");
    }

    fn issue_fields(issues: &[SimError]) -> Vec<String> {
        issues
            .iter()
            .filter_map(|issue| match issue {
                SimError::CorruptedSaveField { field, .. } => Some(field.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn unreadable_top_level_values_are_defaulted() {
        let save = from_json(
            r#"{
                "width": 24, "height": 24,
                "tick": "soon", "day": -3, "time": "noon", "seed": "x",
                "paused": 2, "water_rations": "a",
                "inventory": {"wood": "lots", "stone": 4},
                "player": {"x": "a", "y": 100.0},
                "buildings": {"not": "a list"},
                "servants": [17, {"name": "Ivo"}]
            }"#,
        )
        .unwrap();
        let loaded = restore(save, &scenario());
        let world = &loaded.settlement;

        assert_eq!(world.tick(), 0);
        assert_eq!(world.day(), 1);
        assert_eq!(world.clock().label(), "06:00");
        assert_eq!(world.seed(), 5);
        assert_eq!(world.inventory.wood, 10);
        assert_eq!(world.inventory.stone, 4);
        assert_eq!(world.player.y, 100.0);
        assert!(world.structures.contains_kind(StructureKind::TownCenter));
        assert_eq!(world.servants.len(), 1);
        assert_eq!(world.servants[0].name, "Ivo");

        let fields = issue_fields(&loaded.issues);
        for expected in [
            "tick",
            "day",
            "time",
            "seed",
            "paused",
            "water_rations",
            "inventory.wood",
            "player.x",
            "buildings",
            "servants[0]",
        ] {
            assert!(fields.contains(&expected.to_string()), "{expected} in {fields:?}");
        }
    }

    #[test]
    fn unknown_tiles_clear_to_grass() {
        let save = from_json(
            r#"{"width": 2, "height": 2, "world": ["rock", "lava", "water", 7]}"#,
        )
        .unwrap();
        let loaded = restore(save, &scenario());
        let grid = &loaded.settlement.grid;

        assert_eq!(grid.width(), 2);
        assert_eq!(grid.tile(TilePos::new(0, 0)), Some(Tile::Rock));
        assert_eq!(grid.tile(TilePos::new(0, 1)), Some(Tile::Water));
        assert!(loaded.issues.iter().any(|issue| matches!(
            issue,
            SimError::CorruptedSaveField { field, reason } if field == "world" && reason.contains("2 unreadable")
        )));
    }

    #[test]
    fn oversized_dimensions_fall_back_to_the_scenario_map() {
        let save = from_json(r#"{"width": 4000000000, "height": 4000000000}"#).unwrap();
        let loaded = restore(save, &scenario());
        assert_eq!(loaded.settlement.grid.width(), 24);
        assert_eq!(loaded.settlement.grid.height(), 24);
        assert!(issue_fields(&loaded.issues).contains(&"width".to_string()));
    }

    #[test]
    fn missing_fields_are_defaulted_and_town_center_synthesized() {
        let save = from_json(
            r#"{
                "width": 24, "height": 24,
                "inventory": {"food": 500},
                "buildings": [{"id": "well", "x": 2, "y": 2}, {"id": "castle", "x": 1, "y": 1}],
                "servants": [{"job": "wizard"}, {"id": 7, "name": "Ivo", "hunger": "lots"}]
            }"#,
        )
        .unwrap();
        let loaded = restore(save, &scenario());
        let world = &loaded.settlement;

        assert_eq!(world.day(), 1);
        assert_eq!(world.clock().label(), "06:00");
        assert!(world.structures.contains_kind(StructureKind::TownCenter));
        let well = world
            .structures
            .built_of_kind(StructureKind::Well)
            .next()
            .unwrap();
        assert_eq!(well.progress, 100.0);
        assert!(!well.drop_off);
        assert_eq!(world.inventory.food, 20);

        let helper = world.servants.iter().find(|s| s.name == "Helper").unwrap();
        assert_eq!(helper.name, "Helper");
        assert_eq!(helper.role, Role::Lumberjack);
        assert_eq!(helper.age, 20.0);
        assert_eq!(helper.id.raw(), 8);
        let ivo = world.servants.iter().find(|s| s.name == "Ivo").unwrap();
        assert_eq!(ivo.id.raw(), 7);
        assert_eq!(ivo.needs.hunger, 100.0);
        assert_eq!(world.next_servant_id, 9);

        let fields: Vec<String> = loaded
            .issues
            .iter()
            .filter_map(|issue| match issue {
                SimError::CorruptedSaveField { field, .. } => Some(field.clone()),
                _ => None,
            })
            .collect();
        assert!(fields.contains(&"buildings[1].kind".to_string()));
        assert!(fields.contains(&"servants[0].role".to_string()));
        assert!(fields.contains(&"servants[1].hunger".to_string()));
    }

    #[test]
    fn mismatched_layers_are_reset() {
        let save = from_json(r#"{"width": 4, "height": 4, "world": ["rock", "rock"]}"#).unwrap();
        let loaded = restore(save, &scenario());
        assert_eq!(loaded.settlement.grid.count_tiles(Tile::Rock), 0);
        assert!(loaded.issues.iter().any(|issue| matches!(
            issue,
            SimError::CorruptedSaveField { field, .. } if field == "world"
        )));
    }

    #[test]
    fn legacy_features_are_upgraded() {
        assert_eq!(
            upgrade_feature(&json!(7), 7),
            Some(ResourceFeature::Respawning {
                timer: 7,
                restore: Tile::Rock
            })
        );
        assert_eq!(
            upgrade_feature(&json!(2), 7),
            Some(ResourceFeature::Respawning {
                timer: 2,
                restore: Tile::Tree
            })
        );
        assert_eq!(
            upgrade_feature(&json!({"timer": 4, "type": "rock"}), 7),
            Some(ResourceFeature::Respawning {
                timer: 4,
                restore: Tile::Rock
            })
        );
        assert_eq!(upgrade_feature(&Value::Null, 7), Some(ResourceFeature::None));
        assert_eq!(upgrade_feature(&json!("moss"), 7), None);
    }

    #[test]
    fn tasks_are_checked_against_allow_lists() {
        let grid = TileGrid::new(10, 10);
        let legacy = sanitize_task(
            &json!({"type": "tree", "tx": 3, "ty": 4, "state": "gather", "timer": 1.5}),
            &grid,
        )
        .unwrap();
        assert_eq!(legacy.kind, TaskKind::HarvestTree);
        assert_eq!(legacy.target, TilePos::new(3, 4));
        assert_eq!(legacy.phase, TaskPhase::Work { remaining: 1.5 });

        let odd_state =
            sanitize_task(&json!({"type": "rock", "tx": 1, "ty": 1, "state": "dance"}), &grid)
                .unwrap();
        assert_eq!(odd_state.phase, TaskPhase::Travel);

        assert!(sanitize_task(&json!({"type": "fish", "tx": 1, "ty": 1}), &grid).is_err());
        assert!(sanitize_task(&json!({"type": "rock", "tx": "a", "ty": 1}), &grid).is_err());
        assert!(sanitize_task(&json!({"type": "rock", "tx": 40, "ty": 1}), &grid).is_err());
        assert!(sanitize_task(
            &json!({"type": "rock", "tx": 1, "ty": 1, "state": "return", "payload": {}}),
            &grid
        )
        .is_err());

        let returning = sanitize_task(
            &json!({"type": "rock", "tx": 1, "ty": 1, "state": "return",
                    "payload": {"stone": 2, "wood": -3}, "dropId": "x"}),
            &grid,
        )
        .unwrap();
        assert_eq!(
            returning.phase,
            TaskPhase::Return {
                payload: Payload {
                    stone: 2,
                    ..Payload::default()
                },
                drop_off: None
            }
        );
    }

    #[test]
    fn file_helpers_write_and_read_back() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("slot/save.json");
        let scenario = scenario();
        let world = scenario.build_world();
        save_to_path(&world, &path).unwrap();
        let loaded = load_from_path(&path, &scenario).unwrap();
        assert_eq!(loaded.settlement.servants().len(), world.servants().len());
        assert_eq!(loaded.settlement.seed(), world.seed());
    }
}
