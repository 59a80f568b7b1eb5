//! Observable settlement events.
//!
//! Every event is mirrored to `tracing` and kept in a bounded ring
//! (newest first) for UI collaborators.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::actions::Tool;
use crate::components::{Payload, ServantId, StructureUid};
use crate::servant::{DeathCause, Role};
use crate::spatial::TilePos;
use crate::structures::StructureKind;

pub const LOG_LIMIT: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Need {
    Food,
    Water,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementEvent {
    WorldGenerated {
        seed: u64,
    },
    ServantJoined {
        id: ServantId,
        name: String,
    },
    Delivered {
        id: ServantId,
        name: String,
        stored: Payload,
        drop_off: StructureKind,
    },
    PayloadAbandoned {
        id: ServantId,
        name: String,
    },
    SeedPlanted {
        id: ServantId,
        name: String,
        at: TilePos,
    },
    ServantDied {
        id: ServantId,
        name: String,
        cause: DeathCause,
    },
    ServantBorn {
        id: ServantId,
        name: String,
    },
    Shortage {
        need: Need,
        servants: u32,
    },
    StructureBuilt {
        uid: StructureUid,
        kind: StructureKind,
    },
    StructureDemolished {
        uid: StructureUid,
        kind: StructureKind,
    },
    RoleChanged {
        id: ServantId,
        name: String,
        role: Role,
    },
    ToolApplied {
        tool: Tool,
        at: TilePos,
        gained: Payload,
    },
}

fn plural(count: u32) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

impl fmt::Display for SettlementEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementEvent::WorldGenerated { .. } => write!(f, "New world generated. Welcome!"),
            SettlementEvent::ServantJoined { name, .. } => {
                write!(f, "Servant {name} has joined your settlement.")
            }
            SettlementEvent::Delivered {
                name,
                stored,
                drop_off,
                ..
            } => {
                let mut parts = Vec::new();
                if stored.wood > 0 {
                    parts.push(format!("+{} wood", stored.wood));
                }
                if stored.stone > 0 {
                    parts.push(format!("+{} stone", stored.stone));
                }
                if stored.food > 0 {
                    parts.push(format!("+{} food", stored.food));
                }
                if stored.seeds > 0 {
                    parts.push(format!("+{} seeds", stored.seeds));
                }
                if parts.is_empty() {
                    write!(f, "{name} delivered to the {}.", drop_off.display())
                } else {
                    write!(
                        f,
                        "{name} delivered {} to the {}.",
                        parts.join(", "),
                        drop_off.display()
                    )
                }
            }
            SettlementEvent::PayloadAbandoned { name, .. } => {
                write!(f, "{name} found no storage and dropped the load.")
            }
            SettlementEvent::SeedPlanted { name, .. } => write!(f, "{name} planted a seed."),
            SettlementEvent::ServantDied { name, cause, .. } => match cause {
                DeathCause::Starvation => write!(f, "{name} has died of starvation."),
                DeathCause::Dehydration => write!(f, "{name} has died of dehydration."),
                DeathCause::Exposure => write!(f, "{name} succumbed to the elements without shelter."),
                DeathCause::OldAge => write!(f, "{name} passed away of old age."),
            },
            SettlementEvent::ServantBorn { name, .. } => write!(f, "{name} was born in the huts."),
            SettlementEvent::Shortage {
                need: Need::Food,
                servants,
            } => write!(
                f,
                "Food stores ran short for {servants} servant{}.",
                plural(*servants)
            ),
            SettlementEvent::Shortage {
                need: Need::Water,
                servants,
            } => write!(
                f,
                "No water to refresh {servants} servant{}. Build wells!",
                plural(*servants)
            ),
            SettlementEvent::StructureBuilt { kind, .. } => write!(f, "You built a {}.", kind.display()),
            SettlementEvent::StructureDemolished { kind, .. } => {
                write!(f, "The {} was torn down.", kind.display())
            }
            SettlementEvent::RoleChanged { name, role, .. } => {
                write!(f, "{name} is now a {}.", role.display())
            }
            SettlementEvent::ToolApplied { tool, .. } => write!(f, "{}", tool.verb()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedEvent {
    pub day: u32,
    pub clock: String,
    pub message: String,
    pub event: SettlementEvent,
}

#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<LoggedEvent>,
    limit: usize,
    day: u32,
    clock: String,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(LOG_LIMIT)
    }
}

impl EventLog {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
            day: 1,
            clock: String::from("00:00"),
        }
    }

    /// Updates the stamp applied to subsequent events.
    pub(crate) fn set_stamp(&mut self, day: u32, clock: String) {
        self.day = day;
        self.clock = clock;
    }

    pub fn push(&mut self, event: SettlementEvent) {
        let message = event.to_string();
        info!(day = self.day, clock = %self.clock, "{message}");
        self.entries.push_front(LoggedEvent {
            day: self.day,
            clock: self.clock.clone(),
            message,
            event,
        });
        self.entries.truncate(self.limit);
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LoggedEvent> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
