//! Error types for tracker operations.
//!
//! Every variant is a caller-correctable input problem. An `Err` always means
//! the tracker state is unchanged and no notification fired.

use crate::entity::{ConditionId, EntityId};

/// Errors from [`CombatTracker`](crate::CombatTracker) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("Name cannot be blank")]
    BlankName,

    #[error("Name already in use: {0}")]
    DuplicateName(String),

    #[error("Entity not found: {0}")]
    NotFound(EntityId),

    #[error("Entity is not a combatant: {0}")]
    NotACombatant(EntityId),

    #[error("Entity is not a group: {0}")]
    NotAGroup(EntityId),

    #[error("Condition not found: {0}")]
    ConditionNotFound(ConditionId),

    #[error("No combatants selected")]
    EmptySelection,

    #[error("No combatants are able to act")]
    EmptyTurnOrder,

    #[error("Tracker is locked")]
    Locked,

    #[error("Unknown field: {0}")]
    UnknownField(String),
}
