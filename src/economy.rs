//! Derived settlement capacities. These are pure functions of the built
//! structures and are recomputed on every query, so placing or removing a
//! structure is reflected immediately.

use serde::Serialize;

use crate::config::Tuning;
use crate::structures::{StructureKind, StructureRegistry};

pub fn max_food_storage(structures: &StructureRegistry, tuning: &Tuning) -> u32 {
    tuning.base_food_storage + structures.built_count(StructureKind::Silo) * tuning.food_per_silo
}

pub fn water_capacity(structures: &StructureRegistry, tuning: &Tuning) -> u32 {
    structures.built_count(StructureKind::Well) * tuning.water_per_well
}

pub fn housing_capacity(structures: &StructureRegistry, tuning: &Tuning) -> u32 {
    structures.built_count(StructureKind::Hut) * tuning.hut_capacity
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capacities {
    pub max_food: u32,
    pub water: u32,
    pub housing: u32,
}

impl Capacities {
    pub fn of(structures: &StructureRegistry, tuning: &Tuning) -> Self {
        Self {
            max_food: max_food_storage(structures, tuning),
            water: water_capacity(structures, tuning),
            housing: housing_capacity(structures, tuning),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::TilePos;

    #[test]
    fn capacities_track_built_structures() {
        let tuning = Tuning::default();
        let mut registry = StructureRegistry::new();
        assert_eq!(
            Capacities::of(&registry, &tuning),
            Capacities {
                max_food: 20,
                water: 0,
                housing: 0
            }
        );

        let silo = registry.insert(StructureKind::Silo, TilePos::new(0, 0), 0);
        registry.insert(StructureKind::Well, TilePos::new(4, 0), 0);
        registry.insert(StructureKind::Hut, TilePos::new(6, 0), 0);
        registry.insert(StructureKind::Hut, TilePos::new(9, 0), 0);
        assert_eq!(max_food_storage(&registry, &tuning), 60);
        assert_eq!(water_capacity(&registry, &tuning), 8);
        assert_eq!(housing_capacity(&registry, &tuning), 12);

        registry.remove(silo);
        assert_eq!(max_food_storage(&registry, &tuning), 20);
    }
}
