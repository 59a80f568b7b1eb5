//! Failure taxonomy for player-facing operations and save loading.
//!
//! Nothing here is fatal: the tick path never returns a [`SimError`], and
//! every operation that does return one leaves the settlement untouched.

use crate::components::{ServantId, StructureUid};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// A tile coordinate lies outside `[0, width) x [0, height)`.
    #[error("tile ({x}, {y}) is outside the map")]
    OutOfBounds { x: i32, y: i32 },

    /// The inventory cannot cover a cost; nothing was deducted.
    #[error("not enough {resource}: need {needed}, have {available}")]
    InsufficientResources {
        resource: &'static str,
        needed: u32,
        available: u32,
    },

    /// The tile (or structure kind) cannot be acted on this way.
    #[error("tile ({x}, {y}) is not a valid target: {reason}")]
    InvalidTarget {
        x: i32,
        y: i32,
        reason: &'static str,
    },

    /// No reachable resource exists for the servant's role.
    #[error("servant {servant} has nothing to do")]
    NoValidTask { servant: ServantId },

    /// A loaded field failed validation and was defaulted or dropped.
    #[error("save field {field} was corrupted: {reason}")]
    CorruptedSaveField { field: String, reason: String },

    #[error("no servant with id {0}")]
    UnknownServant(ServantId),

    #[error("no structure with uid {0}")]
    UnknownStructure(StructureUid),
}

impl SimError {
    pub(crate) fn corrupted(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SimError::CorruptedSaveField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
