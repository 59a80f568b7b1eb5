//! Servants: needs, aging and death.
//!
//! Needs advance once per tick in a fixed order: age, hunger and thirst,
//! then shelter. Death is checked right after, and the first matching
//! cause in [`DeathCause`] order wins.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::components::{ServantId, StructureUid};
use crate::config::Tuning;
use crate::spatial::Vec2;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Lumberjack,
    Miner,
    Farmer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Lumberjack, Role::Miner, Role::Farmer];

    pub fn display(self) -> &'static str {
        match self {
            Role::Lumberjack => "Lumberjack",
            Role::Miner => "Miner",
            Role::Farmer => "Farmer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Starvation,
    Dehydration,
    Exposure,
    OldAge,
}

impl fmt::Display for DeathCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeathCause::Starvation => write!(f, "starvation"),
            DeathCause::Dehydration => write!(f, "dehydration"),
            DeathCause::Exposure => write!(f, "exposure"),
            DeathCause::OldAge => write!(f, "old age"),
        }
    }
}

/// Survival needs, each kept within `[0, max_need]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Needs {
    pub hunger: f32,
    pub thirst: f32,
    pub shelter: f32,
}

impl Needs {
    pub fn full(max_need: f32) -> Self {
        Self {
            hunger: max_need,
            thirst: max_need,
            shelter: max_need,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Servant {
    pub id: ServantId,
    pub name: String,
    pub role: Role,
    pub needs: Needs,
    /// Years.
    pub age: f32,
    pub position: Vec2,
    /// Re-derived by every housing pass; may point at a demolished hut
    /// until then.
    pub home: Option<StructureUid>,
    pub task: Option<Task>,
    /// Simulated minutes until the next task search.
    pub idle_cooldown: f32,
    pub alive: bool,
}

impl Servant {
    pub fn new(id: ServantId, name: impl Into<String>, position: Vec2, age: f32, tuning: &Tuning) -> Self {
        Self {
            id,
            name: name.into(),
            role: Role::default(),
            needs: Needs::full(tuning.max_need),
            age,
            position,
            home: None,
            task: None,
            idle_cooldown: 0.0,
            alive: true,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.task.is_none() && self.idle_cooldown <= 0.0
    }

    pub fn is_adult(&self, tuning: &Tuning) -> bool {
        self.age >= tuning.adult_age
    }

    /// Advances needs by `minutes` of simulated time and marks the servant
    /// dead when a fatal condition is reached. Returns the cause on the
    /// tick of death only.
    pub fn advance_needs(&mut self, minutes: f32, tuning: &Tuning) -> Option<DeathCause> {
        self.decay_needs(minutes, tuning);
        self.check_death(tuning)
    }

    /// Ages the servant and decays or regenerates its needs, clamped to
    /// `0..=max_need`.
    pub fn decay_needs(&mut self, minutes: f32, tuning: &Tuning) {
        if !self.alive {
            return;
        }
        let minutes = minutes.max(0.0);
        let max = tuning.max_need;

        self.age += minutes / 1440.0 * tuning.age_per_day;
        self.needs.hunger = (self.needs.hunger - tuning.hunger_decay_per_minute * minutes).clamp(0.0, max);
        self.needs.thirst = (self.needs.thirst - tuning.thirst_decay_per_minute * minutes).clamp(0.0, max);
        self.needs.shelter = if self.home.is_none() {
            self.needs.shelter - tuning.shelter_decay_per_minute * minutes
        } else {
            self.needs.shelter + tuning.shelter_regen_per_minute * minutes
        }
        .clamp(0.0, max);
    }

    /// Marks a living servant dead if a fatal condition holds, dropping any
    /// task it carried.
    pub fn check_death(&mut self, tuning: &Tuning) -> Option<DeathCause> {
        if !self.alive {
            return None;
        }
        let cause = self.death_cause(tuning)?;
        self.alive = false;
        self.task = None;
        Some(cause)
    }

    pub fn death_cause(&self, tuning: &Tuning) -> Option<DeathCause> {
        if self.needs.hunger <= 0.0 {
            Some(DeathCause::Starvation)
        } else if self.needs.thirst <= 0.0 {
            Some(DeathCause::Dehydration)
        } else if self.needs.shelter <= 0.0 {
            Some(DeathCause::Exposure)
        } else if self.age >= tuning.old_age {
            Some(DeathCause::OldAge)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servant(tuning: &Tuning) -> Servant {
        Servant::new(ServantId::new(1), "Adalyn", Vec2::default(), 20.0, tuning)
    }

    #[test]
    fn needs_stay_in_range_for_huge_steps() {
        let tuning = Tuning::default();
        let mut homed = servant(&tuning);
        homed.home = Some(StructureUid::new(3));
        homed.needs.hunger = 80.0;
        homed.advance_needs(1.0e9, &tuning);
        assert_eq!(homed.needs.hunger, 0.0);
        assert_eq!(homed.needs.shelter, 100.0);

        let mut fresh = servant(&tuning);
        fresh.advance_needs(0.0, &tuning);
        for need in [fresh.needs.hunger, fresh.needs.thirst, fresh.needs.shelter] {
            assert!((0.0..=100.0).contains(&need));
        }
    }

    #[test]
    fn death_causes_are_checked_in_order() {
        let tuning = Tuning::default();
        let mut s = servant(&tuning);
        s.needs.hunger = 0.01;
        s.needs.thirst = 0.01;
        assert_eq!(s.advance_needs(10.0, &tuning), Some(DeathCause::Starvation));
        assert!(!s.alive);
        assert_eq!(s.advance_needs(10.0, &tuning), None);

        let mut s = servant(&tuning);
        s.needs.thirst = 0.01;
        assert_eq!(s.advance_needs(1.0, &tuning), Some(DeathCause::Dehydration));

        let mut s = servant(&tuning);
        s.needs.shelter = 0.01;
        assert_eq!(s.advance_needs(1.0, &tuning), Some(DeathCause::Exposure));

        let mut s = servant(&tuning);
        s.age = 79.999;
        assert_eq!(s.advance_needs(1440.0, &tuning), Some(DeathCause::OldAge));
    }

    #[test]
    fn shelter_regenerates_only_with_a_home() {
        let tuning = Tuning::default();
        let mut s = servant(&tuning);
        s.needs.shelter = 50.0;
        s.advance_needs(100.0, &tuning);
        assert!((s.needs.shelter - 48.0).abs() < 1e-4);
        s.home = Some(StructureUid::new(1));
        s.advance_needs(100.0, &tuning);
        assert!((s.needs.shelter - 50.0).abs() < 1e-4);
    }
}
