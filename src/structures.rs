use serde::{Deserialize, Serialize};

use crate::components::{Cost, StructureUid};
use crate::error::SimError;
use crate::spatial::{TileGrid, TilePos, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    #[serde(alias = "towncenter")]
    TownCenter,
    Hut,
    Field,
    Road,
    Silo,
    Well,
}

#[derive(Debug, Clone, Copy)]
pub struct StructureDefinition {
    pub kind: StructureKind,
    pub display: &'static str,
    pub width: u32,
    pub height: u32,
    pub cost: Cost,
    pub drop_off: bool,
    pub buildable: bool,
}

const STRUCTURE_TABLE: &[StructureDefinition] = &[
    StructureDefinition {
        kind: StructureKind::TownCenter,
        display: "Town Center",
        width: 3,
        height: 3,
        cost: Cost { wood: 0, stone: 0 },
        drop_off: true,
        buildable: false,
    },
    StructureDefinition {
        kind: StructureKind::Hut,
        display: "Hut",
        width: 2,
        height: 2,
        cost: Cost { wood: 10, stone: 5 },
        drop_off: false,
        buildable: true,
    },
    StructureDefinition {
        kind: StructureKind::Field,
        display: "Field",
        width: 2,
        height: 2,
        cost: Cost { wood: 2, stone: 0 },
        drop_off: false,
        buildable: true,
    },
    StructureDefinition {
        kind: StructureKind::Road,
        display: "Road",
        width: 1,
        height: 1,
        cost: Cost { wood: 0, stone: 1 },
        drop_off: false,
        buildable: true,
    },
    StructureDefinition {
        kind: StructureKind::Silo,
        display: "Silo",
        width: 2,
        height: 2,
        cost: Cost { wood: 6, stone: 6 },
        drop_off: true,
        buildable: true,
    },
    StructureDefinition {
        kind: StructureKind::Well,
        display: "Well",
        width: 1,
        height: 1,
        cost: Cost { wood: 0, stone: 5 },
        drop_off: false,
        buildable: true,
    },
];

impl StructureKind {
    pub fn definition(self) -> &'static StructureDefinition {
        let slot = match self {
            StructureKind::TownCenter => 0,
            StructureKind::Hut => 1,
            StructureKind::Field => 2,
            StructureKind::Road => 3,
            StructureKind::Silo => 4,
            StructureKind::Well => 5,
        };
        &STRUCTURE_TABLE[slot]
    }

    pub fn is_drop_off(self) -> bool {
        self.definition().drop_off
    }

    pub fn display(self) -> &'static str {
        self.definition().display
    }
}

/// Kinds the player may place, in build-menu order.
pub fn buildable_kinds() -> impl Iterator<Item = StructureKind> {
    STRUCTURE_TABLE
        .iter()
        .filter(|def| def.buildable)
        .map(|def| def.kind)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub uid: StructureUid,
    pub kind: StructureKind,
    pub origin: TilePos,
    pub width: u32,
    pub height: u32,
    pub rotation: u8,
    pub built: bool,
    pub progress: f32,
    pub drop_off: bool,
}

impl Structure {
    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x >= self.origin.x
            && pos.y >= self.origin.y
            && pos.x < self.origin.x + self.width as i32
            && pos.y < self.origin.y + self.height as i32
    }

    pub fn footprint(&self) -> impl Iterator<Item = TilePos> + '_ {
        footprint(self.origin, self.width, self.height)
    }

    pub fn center(&self, tile_size: f32) -> Vec2 {
        Vec2 {
            x: (self.origin.x as f32 + self.width as f32 / 2.0) * tile_size,
            y: (self.origin.y as f32 + self.height as f32 / 2.0) * tile_size,
        }
    }

    pub fn accepts_deliveries(&self) -> bool {
        self.built && self.drop_off
    }
}

fn footprint(origin: TilePos, width: u32, height: u32) -> impl Iterator<Item = TilePos> {
    (0..height as i32).flat_map(move |dy| {
        (0..width as i32).map(move |dx| TilePos::new(origin.x + dx, origin.y + dy))
    })
}

/// Authoritative list of placed structures. Uids are handed out
/// monotonically and never reused, so stale references held elsewhere
/// simply fail to resolve.
#[derive(Debug, Clone, Default)]
pub struct StructureRegistry {
    structures: Vec<Structure>,
    next_uid: u64,
}

impl StructureRegistry {
    pub fn new() -> Self {
        Self {
            structures: Vec::new(),
            next_uid: 1,
        }
    }

    pub(crate) fn from_parts(structures: Vec<Structure>, next_uid: u64) -> Self {
        let floor = structures
            .iter()
            .map(|s| s.uid.raw() + 1)
            .max()
            .unwrap_or(1);
        Self {
            structures,
            next_uid: next_uid.max(floor),
        }
    }

    pub fn next_uid(&self) -> u64 {
        self.next_uid
    }

    pub(crate) fn allocate_uid(&mut self) -> StructureUid {
        let uid = StructureUid::new(self.next_uid);
        self.next_uid += 1;
        uid
    }

    pub fn iter(&self) -> impl Iterator<Item = &Structure> {
        self.structures.iter()
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn get(&self, uid: StructureUid) -> Option<&Structure> {
        self.structures.iter().find(|s| s.uid == uid)
    }

    pub fn occupied(&self, pos: TilePos) -> bool {
        self.structures.iter().any(|s| s.contains(pos))
    }

    pub fn contains_kind(&self, kind: StructureKind) -> bool {
        self.structures.iter().any(|s| s.kind == kind)
    }

    pub fn built_count(&self, kind: StructureKind) -> u32 {
        self.built_of_kind(kind).count() as u32
    }

    pub fn built_of_kind(&self, kind: StructureKind) -> impl Iterator<Item = &Structure> {
        self.structures
            .iter()
            .filter(move |s| s.kind == kind && s.built)
    }

    /// Checks a footprint for `kind` at `origin`: every cell in bounds, none
    /// on water, tree or rock, none under another structure.
    pub fn check_placement(
        &self,
        grid: &TileGrid,
        kind: StructureKind,
        origin: TilePos,
    ) -> Result<(), SimError> {
        let def = kind.definition();
        for pos in footprint(origin, def.width, def.height) {
            let tile = grid
                .tile(pos)
                .ok_or(SimError::OutOfBounds { x: pos.x, y: pos.y })?;
            if tile.blocks_construction() {
                return Err(SimError::InvalidTarget {
                    x: pos.x,
                    y: pos.y,
                    reason: "terrain blocks construction",
                });
            }
            if self.occupied(pos) {
                return Err(SimError::InvalidTarget {
                    x: pos.x,
                    y: pos.y,
                    reason: "tile is already built on",
                });
            }
        }
        Ok(())
    }

    pub fn can_place(&self, grid: &TileGrid, kind: StructureKind, origin: TilePos) -> bool {
        self.check_placement(grid, kind, origin).is_ok()
    }

    /// Registers a finished structure. Validation and payment are the
    /// caller's job.
    pub(crate) fn insert(&mut self, kind: StructureKind, origin: TilePos, rotation: u8) -> StructureUid {
        let def = kind.definition();
        let uid = self.allocate_uid();
        self.structures.push(Structure {
            uid,
            kind,
            origin,
            width: def.width,
            height: def.height,
            rotation: rotation % 4,
            built: true,
            progress: 100.0,
            drop_off: def.drop_off,
        });
        uid
    }

    pub(crate) fn remove(&mut self, uid: StructureUid) -> Option<Structure> {
        let idx = self.structures.iter().position(|s| s.uid == uid)?;
        Some(self.structures.remove(idx))
    }

    pub fn nearest_drop_off(&self, from: Vec2, tile_size: f32) -> Option<&Structure> {
        let mut best: Option<(f32, &Structure)> = None;
        for structure in self.structures.iter().filter(|s| s.accepts_deliveries()) {
            let center = structure.center(tile_size);
            let dx = center.x - from.x;
            let dy = center.y - from.y;
            let dist = dx * dx + dy * dy;
            if best.map_or(true, |(best_dist, _)| dist < best_dist) {
                best = Some((dist, structure));
            }
        }
        best.map(|(_, structure)| structure)
    }

    /// The previously bound drop-off if it still accepts deliveries,
    /// otherwise the nearest one.
    pub fn resolve_drop_off(
        &self,
        preferred: Option<StructureUid>,
        from: Vec2,
        tile_size: f32,
    ) -> Option<&Structure> {
        preferred
            .and_then(|uid| self.get(uid))
            .filter(|s| s.accepts_deliveries())
            .or_else(|| self.nearest_drop_off(from, tile_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Tile;

    #[test]
    fn drop_off_flag_follows_kind() {
        assert!(StructureKind::TownCenter.is_drop_off());
        assert!(StructureKind::Silo.is_drop_off());
        assert!(!StructureKind::Hut.is_drop_off());
        assert!(!buildable_kinds().any(|k| k == StructureKind::TownCenter));
        assert_eq!(buildable_kinds().count(), 5);
    }

    #[test]
    fn placement_rejects_blocked_terrain_and_overlap() {
        let mut grid = TileGrid::new(10, 10);
        grid.set_tile(TilePos::new(5, 5), Tile::Water).unwrap();
        let mut registry = StructureRegistry::new();

        assert!(!registry.can_place(&grid, StructureKind::Hut, TilePos::new(4, 4)));
        assert!(matches!(
            registry.check_placement(&grid, StructureKind::Hut, TilePos::new(9, 0)),
            Err(SimError::OutOfBounds { x: 10, y: 0 })
        ));

        registry.insert(StructureKind::Hut, TilePos::new(0, 0), 0);
        assert!(!registry.can_place(&grid, StructureKind::Well, TilePos::new(1, 1)));
        assert!(registry.can_place(&grid, StructureKind::Well, TilePos::new(2, 2)));
    }

    #[test]
    fn uids_are_never_reused() {
        let mut registry = StructureRegistry::new();
        let a = registry.insert(StructureKind::Well, TilePos::new(0, 0), 0);
        registry.remove(a);
        let b = registry.insert(StructureKind::Well, TilePos::new(0, 0), 0);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn resolve_prefers_bound_drop_off_while_it_exists() {
        let mut registry = StructureRegistry::new();
        let near = registry.insert(StructureKind::TownCenter, TilePos::new(0, 0), 0);
        let far = registry.insert(StructureKind::Silo, TilePos::new(20, 20), 0);
        let from = Vec2::new(0.0, 0.0);

        assert_eq!(registry.resolve_drop_off(None, from, 32.0).map(|s| s.uid), Some(near));
        assert_eq!(
            registry.resolve_drop_off(Some(far), from, 32.0).map(|s| s.uid),
            Some(far)
        );
        registry.remove(far);
        assert_eq!(
            registry.resolve_drop_off(Some(far), from, 32.0).map(|s| s.uid),
            Some(near)
        );
        registry.remove(near);
        assert!(registry.resolve_drop_off(Some(far), from, 32.0).is_none());
    }
}
