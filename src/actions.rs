//! Direct player commands. Each one validates fully before touching
//! anything, so an `Err` always means the settlement is unchanged.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::{Payload, ServantId, StructureUid};
use crate::economy;
use crate::error::SimError;
use crate::events::SettlementEvent;
use crate::servant::Role;
use crate::spatial::{ResourceFeature, Tile, TilePos};
use crate::structures::{Structure, StructureKind};
use crate::world::Settlement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Hand,
    Hoe,
    Seeder,
    #[serde(alias = "pick")]
    Pickaxe,
    Axe,
}

impl Tool {
    pub(crate) fn verb(self) -> &'static str {
        match self {
            Tool::Hand => "Harvested crop",
            Tool::Hoe => "Tilled soil",
            Tool::Seeder => "Planted a seed",
            Tool::Pickaxe => "Mined rock: +stone",
            Tool::Axe => "Chopped tree: +wood",
        }
    }
}

fn wrong_tile(pos: TilePos, reason: &'static str) -> SimError {
    SimError::InvalidTarget {
        x: pos.x,
        y: pos.y,
        reason,
    }
}

impl Settlement {
    /// Builds `kind` with its top-left corner at `origin`. The footprint is
    /// checked before the price, and nothing is paid unless both pass.
    pub fn place_structure(
        &mut self,
        kind: StructureKind,
        origin: TilePos,
        rotation: u8,
    ) -> Result<StructureUid, SimError> {
        let def = kind.definition();
        if !def.buildable {
            return Err(wrong_tile(origin, "structure kind cannot be built by hand"));
        }
        self.structures.check_placement(&self.grid, kind, origin)?;
        self.inventory.pay(def.cost)?;

        let uid = self.structures.insert(kind, origin, rotation);
        self.clear_features_under(origin, def.width, def.height);
        let footprint: Vec<TilePos> = self
            .structures
            .get(uid)
            .map(|s| s.footprint().collect())
            .unwrap_or_default();
        for pos in footprint {
            match kind {
                StructureKind::Road => {
                    self.grid.clear_crop(pos);
                    let _ = self.grid.set_tile(pos, Tile::Road);
                }
                StructureKind::Field if self.grid.tile(pos) == Some(Tile::Grass) => {
                    let _ = self.grid.set_tile(pos, Tile::Tilled);
                }
                _ => {}
            }
        }
        self.assign_housing();
        self.events.push(SettlementEvent::StructureBuilt { uid, kind });
        Ok(uid)
    }

    /// Removes a structure. Homes and drop-off bindings that pointed at it
    /// go stale and are re-resolved on their next use.
    pub fn demolish_structure(&mut self, uid: StructureUid) -> Result<Structure, SimError> {
        let removed = self
            .structures
            .remove(uid)
            .ok_or(SimError::UnknownStructure(uid))?;
        self.assign_housing();
        self.events.push(SettlementEvent::StructureDemolished {
            uid,
            kind: removed.kind,
        });
        Ok(removed)
    }

    /// Uses a hand tool on one tile and returns what it added to the
    /// stockpile.
    pub fn apply_tool_action(&mut self, pos: TilePos, tool: Tool) -> Result<Payload, SimError> {
        let tile = self
            .grid
            .tile(pos)
            .ok_or(SimError::OutOfBounds { x: pos.x, y: pos.y })?;
        let mut gained = Payload::default();
        match (tool, tile) {
            (Tool::Axe, Tile::Tree) => {
                self.grid
                    .start_respawn(pos, Tile::Tree, self.tuning.tree_respawn_days)?;
                gained.wood = 2 + self.rng.gen_range(0..=1);
            }
            (Tool::Pickaxe, Tile::Rock) => {
                self.grid
                    .start_respawn(pos, Tile::Rock, self.tuning.rock_respawn_days)?;
                gained.stone = 1 + self.rng.gen_range(0..=2);
            }
            (Tool::Hoe, Tile::Grass) => {
                self.grid.set_tile(pos, Tile::Tilled)?;
                self.grid.set_feature(pos, ResourceFeature::None)?;
            }
            (Tool::Seeder, Tile::Tilled) => {
                if !self.grid.is_plantable(pos) {
                    return Err(wrong_tile(pos, "soil is already planted"));
                }
                if self.inventory.seeds == 0 {
                    return Err(SimError::InsufficientResources {
                        resource: "seeds",
                        needed: 1,
                        available: 0,
                    });
                }
                self.grid.plant(pos)?;
                self.inventory.take_seed();
            }
            (Tool::Hand, _) => {
                if !self.grid.harvest_crop(pos) {
                    return Err(wrong_tile(pos, "nothing ripe to harvest"));
                }
                let cap = economy::max_food_storage(&self.structures, &self.tuning);
                gained.food = self.inventory.store_food(1, cap);
                gained.seeds = gained.food * 2;
            }
            (Tool::Axe, _) => return Err(wrong_tile(pos, "the axe needs a tree")),
            (Tool::Pickaxe, _) => return Err(wrong_tile(pos, "the pickaxe needs a rock")),
            (Tool::Hoe, _) => return Err(wrong_tile(pos, "only grass can be tilled")),
            (Tool::Seeder, _) => return Err(wrong_tile(pos, "seeds need tilled soil")),
        }
        self.inventory.wood = self.inventory.wood.saturating_add(gained.wood);
        self.inventory.stone = self.inventory.stone.saturating_add(gained.stone);
        self.inventory.seeds = self.inventory.seeds.saturating_add(gained.seeds);
        self.events.push(SettlementEvent::ToolApplied {
            tool,
            at: pos,
            gained,
        });
        Ok(gained)
    }

    /// Reassigns a servant's role. Any task in flight is dropped and the
    /// servant looks for new work on its next tick.
    pub fn set_servant_role(&mut self, id: ServantId, role: Role) -> Result<(), SimError> {
        let servant = self
            .servants
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(SimError::UnknownServant(id))?;
        if servant.role == role {
            return Ok(());
        }
        servant.role = role;
        servant.task = None;
        servant.idle_cooldown = 0.0;
        let name = servant.name.clone();
        self.events
            .push(SettlementEvent::RoleChanged { id, name, role });
        Ok(())
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn toggle_paused(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Inventory;
    use crate::config::Tuning;
    use crate::spatial::TileGrid;

    fn settlement() -> Settlement {
        Settlement::new(TileGrid::new(20, 20), Tuning::default(), 5)
    }

    #[test]
    fn placement_pays_and_paints_roads() {
        let mut s = settlement();
        s.grid_mut().set_tile(TilePos::new(3, 3), Tile::Tilled).unwrap();
        s.grid_mut().plant(TilePos::new(3, 3)).unwrap();
        s.place_structure(StructureKind::Road, TilePos::new(3, 3), 0)
            .unwrap();
        assert_eq!(s.grid().tile(TilePos::new(3, 3)), Some(Tile::Road));
        assert!(s.grid().crop(TilePos::new(3, 3)).is_none());
        assert_eq!(s.inventory().stone, 9);
    }

    #[test]
    fn tool_gains_saturate_at_the_stock_limit() {
        let mut s = settlement();
        s.grid_mut().set_tile(TilePos::new(4, 4), Tile::Tree).unwrap();
        s.inventory_mut().wood = u32::MAX - 1;
        let gained = s.apply_tool_action(TilePos::new(4, 4), Tool::Axe).unwrap();
        assert!(gained.wood >= 2);
        assert_eq!(s.inventory().wood, u32::MAX);
    }

    #[test]
    fn field_tills_only_grass() {
        let mut s = settlement();
        s.grid_mut().set_tile(TilePos::new(6, 6), Tile::Road).unwrap();
        s.place_structure(StructureKind::Field, TilePos::new(5, 5), 0)
            .unwrap();
        assert_eq!(s.grid().tile(TilePos::new(5, 5)), Some(Tile::Tilled));
        assert_eq!(s.grid().tile(TilePos::new(6, 6)), Some(Tile::Road));
        assert_eq!(s.inventory().wood, 8);
    }

    #[test]
    fn unaffordable_or_blocked_placement_changes_nothing() {
        let mut s = settlement();
        *s.inventory_mut() = Inventory {
            wood: 3,
            ..Inventory::default()
        };
        assert!(matches!(
            s.place_structure(StructureKind::Hut, TilePos::new(1, 1), 0),
            Err(SimError::InsufficientResources { resource: "wood", .. })
        ));
        assert!(s.structures().is_empty());
        assert_eq!(s.inventory().wood, 3);

        s.grid_mut().set_tile(TilePos::new(9, 9), Tile::Water).unwrap();
        assert!(s
            .place_structure(StructureKind::Well, TilePos::new(9, 9), 0)
            .is_err());
        assert_eq!(s.inventory().stone, 10);
        assert!(s
            .place_structure(StructureKind::TownCenter, TilePos::new(0, 0), 0)
            .is_err());
    }

    #[test]
    fn tools_mutate_matching_tiles_only() {
        let mut s = settlement();
        let tree = TilePos::new(2, 2);
        s.grid_mut().set_tile(tree, Tile::Tree).unwrap();

        assert!(matches!(
            s.apply_tool_action(tree, Tool::Pickaxe),
            Err(SimError::InvalidTarget { .. })
        ));
        let gained = s.apply_tool_action(tree, Tool::Axe).unwrap();
        assert!((2..=3).contains(&gained.wood));
        assert_eq!(s.inventory().wood, 10 + gained.wood);
        assert_eq!(
            s.grid().feature(tree),
            Some(ResourceFeature::Respawning {
                timer: 3,
                restore: Tile::Tree
            })
        );
        assert!(matches!(
            s.apply_tool_action(TilePos::new(-1, 0), Tool::Hoe),
            Err(SimError::OutOfBounds { x: -1, y: 0 })
        ));
    }

    #[test]
    fn hoe_seed_and_hand_harvest() {
        let mut s = settlement();
        let pos = TilePos::new(4, 4);
        s.apply_tool_action(pos, Tool::Hoe).unwrap();
        s.apply_tool_action(pos, Tool::Seeder).unwrap();
        assert_eq!(s.inventory().seeds, 9);
        assert!(s.apply_tool_action(pos, Tool::Hand).is_err());

        s.grid_mut().tick_crop_growth(100.0);
        let gained = s.apply_tool_action(pos, Tool::Hand).unwrap();
        assert_eq!((gained.food, gained.seeds), (1, 2));
        assert_eq!(s.inventory().food, 11);
        assert_eq!(s.grid().tile(pos), Some(Tile::Tilled));
    }

    #[test]
    fn seeder_without_seeds_is_refused() {
        let mut s = settlement();
        s.inventory_mut().seeds = 0;
        let pos = TilePos::new(4, 4);
        s.apply_tool_action(pos, Tool::Hoe).unwrap();
        assert!(matches!(
            s.apply_tool_action(pos, Tool::Seeder),
            Err(SimError::InsufficientResources { resource: "seeds", .. })
        ));
        assert!(s.grid().is_plantable(pos));
    }

    #[test]
    fn role_change_drops_the_current_task() {
        let mut s = settlement();
        let id = s.spawn_settler("Brom");
        s.servant_mut(id).unwrap().idle_cooldown = 50.0;
        s.set_servant_role(id, Role::Miner).unwrap();
        let servant = s.servant(id).unwrap();
        assert_eq!(servant.role, Role::Miner);
        assert!(servant.is_idle());
        assert!(matches!(
            s.set_servant_role(ServantId::new(99), Role::Farmer),
            Err(SimError::UnknownServant(_))
        ));
    }

    #[test]
    fn pause_toggles() {
        let mut s = settlement();
        assert!(s.toggle_paused());
        s.set_paused(false);
        assert!(!s.is_paused());
    }
}
