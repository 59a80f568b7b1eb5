use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServantId(u64);

impl ServantId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ServantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureUid(u64);

impl StructureUid {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StructureUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed construction price of a structure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cost {
    pub wood: u32,
    pub stone: u32,
}

/// Resources carried by a servant between a harvest and a drop-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Payload {
    pub wood: u32,
    pub stone: u32,
    pub food: u32,
    pub seeds: u32,
}

impl Payload {
    pub fn has_resources(&self) -> bool {
        self.wood > 0 || self.stone > 0 || self.food > 0 || self.seeds > 0
    }
}

/// Settlement-wide stockpile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    pub wood: u32,
    pub stone: u32,
    pub seeds: u32,
    pub food: u32,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            wood: 10,
            stone: 10,
            seeds: 10,
            food: 10,
        }
    }
}

impl Inventory {
    pub fn empty() -> Self {
        Self {
            wood: 0,
            stone: 0,
            seeds: 0,
            food: 0,
        }
    }

    pub fn check_affordable(&self, cost: Cost) -> Result<(), SimError> {
        if self.wood < cost.wood {
            return Err(SimError::InsufficientResources {
                resource: "wood",
                needed: cost.wood,
                available: self.wood,
            });
        }
        if self.stone < cost.stone {
            return Err(SimError::InsufficientResources {
                resource: "stone",
                needed: cost.stone,
                available: self.stone,
            });
        }
        Ok(())
    }

    /// Deducts `cost` only when the whole amount is available.
    pub fn pay(&mut self, cost: Cost) -> Result<(), SimError> {
        self.check_affordable(cost)?;
        self.wood -= cost.wood;
        self.stone -= cost.stone;
        Ok(())
    }

    pub fn take_seed(&mut self) -> bool {
        if self.seeds == 0 {
            return false;
        }
        self.seeds -= 1;
        true
    }

    /// Adds food without exceeding `food_cap`; returns the amount actually stored.
    pub fn store_food(&mut self, amount: u32, food_cap: u32) -> u32 {
        let before = self.food;
        self.food = before.saturating_add(amount).min(food_cap.max(before));
        self.food - before
    }

    /// Moves a payload into the stockpile. Food is capped; the returned
    /// payload is what was actually stored.
    pub fn deposit(&mut self, payload: Payload, food_cap: u32) -> Payload {
        self.wood = self.wood.saturating_add(payload.wood);
        self.stone = self.stone.saturating_add(payload.stone);
        self.seeds = self.seeds.saturating_add(payload.seeds);
        let food = self.store_food(payload.food, food_cap);
        Payload { food, ..payload }
    }
}
