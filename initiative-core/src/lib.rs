//! Combat state engine for a tabletop initiative tracker.
//!
//! This crate provides:
//! - A roster of combatants and colored groups with unique names
//! - Turn order derived from the roster, with round counting
//! - Conditions measured in the owner's own turns
//! - Damage and healing with temporary hit points
//! - Snapshot notifications for any number of subscribers
//! - JSON import/export and debounced autosave
//!
//! # Quick Start
//!
//! ```ignore
//! use initiative_core::{CombatTracker, NewCombatant, SortDirection};
//!
//! let mut tracker = CombatTracker::default();
//! tracker.subscribe(|snapshot| println!("{}", snapshot.round_label));
//!
//! let ogre = tracker.add_combatant(NewCombatant::named("Ogre").with_initiative(10))?;
//! tracker.add_combatant(NewCombatant::named("Goblin").with_initiative(5))?;
//! tracker.sort_by_initiative(SortDirection::Descending)?;
//!
//! tracker.add_condition(ogre.id, "Poisoned", 2, None)?;
//! tracker.apply_damage_and_heal(&[ogre.id], 7, 0)?;
//! tracker.advance_turn()?;
//!
//! let json = tracker.export_state().to_json()?;
//! ```

pub mod autosave;
pub mod condition;
pub mod config;
pub mod damage;
pub mod entity;
pub mod error;
pub mod hub;
mod lenient;
pub mod patch;
pub mod persist;
pub mod roster;
pub mod testing;
pub mod tracker;
pub mod turn;

// Primary public API
pub use autosave::Autosave;
pub use condition::{Condition, ConditionStatus, StandardCondition};
pub use config::TrackerConfig;
pub use damage::DamageOutcome;
pub use entity::{
    Combatant, ConditionId, Entity, EntityId, Group, NewCombatant, SlotInfo, SpellSlots,
    GROUP_PALETTE,
};
pub use error::TrackerError;
pub use hub::{Snapshot, Subscription};
pub use patch::{CombatantPatch, GroupPatch};
pub use persist::{ExportedState, PersistError, SavedEncounter, SAVE_VERSION};
pub use roster::{EntityRef, Location, Roster};
pub use tracker::CombatTracker;
pub use turn::{SortDirection, TurnClock};
