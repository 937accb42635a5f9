//! Timed status conditions.
//!
//! A condition's duration is counted in its owner's own turns, not in global
//! rounds. A condition applied mid-round to a combatant who has already acted
//! does not lose a round of duration before that combatant acts again.
//!
//! Activity is always computed from the current round and turn pointer;
//! nothing here is stored or decremented.

use crate::entity::{ConditionId, EntityId};
use crate::lenient;
use crate::turn::TurnClock;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Catalog
// ============================================================================

/// Standard condition names offered to pickers. The engine accepts any name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardCondition {
    Blinded,
    Charmed,
    Deafened,
    Exhaustion,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
}

impl StandardCondition {
    pub fn name(&self) -> &'static str {
        match self {
            StandardCondition::Blinded => "Blinded",
            StandardCondition::Charmed => "Charmed",
            StandardCondition::Deafened => "Deafened",
            StandardCondition::Exhaustion => "Exhaustion",
            StandardCondition::Frightened => "Frightened",
            StandardCondition::Grappled => "Grappled",
            StandardCondition::Incapacitated => "Incapacitated",
            StandardCondition::Invisible => "Invisible",
            StandardCondition::Paralyzed => "Paralyzed",
            StandardCondition::Petrified => "Petrified",
            StandardCondition::Poisoned => "Poisoned",
            StandardCondition::Prone => "Prone",
            StandardCondition::Restrained => "Restrained",
            StandardCondition::Stunned => "Stunned",
            StandardCondition::Unconscious => "Unconscious",
        }
    }

    pub fn all() -> &'static [StandardCondition] {
        &[
            StandardCondition::Blinded,
            StandardCondition::Charmed,
            StandardCondition::Deafened,
            StandardCondition::Exhaustion,
            StandardCondition::Frightened,
            StandardCondition::Grappled,
            StandardCondition::Incapacitated,
            StandardCondition::Invisible,
            StandardCondition::Paralyzed,
            StandardCondition::Petrified,
            StandardCondition::Poisoned,
            StandardCondition::Prone,
            StandardCondition::Restrained,
            StandardCondition::Stunned,
            StandardCondition::Unconscious,
        ]
    }

    /// Case-insensitive catalog lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for StandardCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Applied Conditions
// ============================================================================

/// A condition applied to one combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ConditionRecord")]
pub struct Condition {
    pub id: ConditionId,
    /// Back-reference to the combatant holding this condition.
    pub owner_id: EntityId,
    pub name: String,
    pub applied_at_round: u32,
    pub applied_at_turn_index: usize,
    /// Length in the owner's turns. Always at least 1.
    pub duration_rounds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Condition {
    pub fn new(
        owner_id: EntityId,
        name: impl Into<String>,
        duration_rounds: u32,
        applied_at: TurnClock,
    ) -> Self {
        Self {
            id: ConditionId::new(),
            owner_id,
            name: name.into(),
            applied_at_round: applied_at.round,
            applied_at_turn_index: applied_at.pointer,
            duration_rounds: duration_rounds.max(1),
            note: None,
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn applied_at(&self) -> TurnClock {
        TurnClock {
            round: self.applied_at_round,
            pointer: self.applied_at_turn_index,
        }
    }

    /// Compute the condition's state at `now`.
    ///
    /// `owner_index` is the owner's position in the current turn order, or
    /// `None` when the owner is not taking turns.
    pub fn status(&self, now: TurnClock, owner_index: Option<usize>) -> ConditionStatus {
        let applied = self.applied_at();
        let visible = now >= applied;
        let elapsed_turns = if visible {
            owner_turns_between(applied, now, owner_index)
        } else {
            0
        };
        let remaining = self.duration_rounds.saturating_sub(elapsed_turns);
        ConditionStatus {
            visible,
            elapsed_turns,
            remaining,
            active: visible && remaining > 0,
        }
    }
}

/// Derived state of a condition at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionStatus {
    /// False if the moment precedes the application.
    pub visible: bool,
    pub elapsed_turns: u32,
    pub remaining: u32,
    pub active: bool,
}

/// Number of owner turns that started in `(from, to]`.
///
/// The owner acts once per round at `owner_index`. Without an index the
/// count falls back to round boundaries crossed.
fn owner_turns_between(from: TurnClock, to: TurnClock, owner_index: Option<usize>) -> u32 {
    let rounds = to.round.saturating_sub(from.round);
    let Some(k) = owner_index else {
        return rounds;
    };
    // One slot per round in [from.round, to.round], minus the slot at or
    // before `from` in the first round and the slot after `to` in the last.
    let mut turns = i64::from(rounds) + 1;
    if k <= from.pointer {
        turns -= 1;
    }
    if k > to.pointer {
        turns -= 1;
    }
    turns.max(0) as u32
}

// ============================================================================
// Stored Shapes
// ============================================================================

/// Any condition shape accepted on deserialization.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConditionRecord {
    Current(StoredCondition),
    Legacy(LegacyCondition),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCondition {
    #[serde(default)]
    id: Option<ConditionId>,
    #[serde(default)]
    owner_id: Option<EntityId>,
    name: String,
    #[serde(deserialize_with = "lenient::count")]
    applied_at_round: u32,
    #[serde(default, deserialize_with = "lenient::index")]
    applied_at_turn_index: usize,
    #[serde(deserialize_with = "lenient::count")]
    duration_rounds: u32,
    #[serde(default, deserialize_with = "lenient::or_default")]
    note: Option<String>,
}

/// Older absolute round window: active from `start_round` through `end_round`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyCondition {
    #[serde(default)]
    id: Option<ConditionId>,
    name: String,
    #[serde(deserialize_with = "lenient::count")]
    start_round: u32,
    #[serde(deserialize_with = "lenient::count")]
    end_round: u32,
    #[serde(default, deserialize_with = "lenient::or_default")]
    note: Option<String>,
}

impl From<ConditionRecord> for Condition {
    fn from(record: ConditionRecord) -> Self {
        // The owner is fixed up by the combatant that holds the condition.
        let orphan = EntityId(uuid::Uuid::nil());
        match record {
            ConditionRecord::Current(c) => Condition {
                id: c.id.unwrap_or_default(),
                owner_id: c.owner_id.unwrap_or(orphan),
                name: c.name,
                applied_at_round: c.applied_at_round.max(1),
                applied_at_turn_index: c.applied_at_turn_index,
                duration_rounds: c.duration_rounds.max(1),
                note: c.note,
            },
            ConditionRecord::Legacy(c) => Condition {
                id: c.id.unwrap_or_default(),
                owner_id: orphan,
                name: c.name,
                applied_at_round: c.start_round.max(1),
                applied_at_turn_index: 0,
                duration_rounds: (i64::from(c.end_round) - i64::from(c.start_round) + 1).max(1)
                    as u32,
                note: c.note,
            },
        }
    }
}
