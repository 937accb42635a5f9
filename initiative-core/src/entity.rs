//! Roster entity types.
//!
//! Combatants and groups as plain, serializable values. Everything here is
//! data plus identity; behavior lives in the roster, turn and condition
//! modules.

use crate::condition::Condition;
use crate::config::TrackerConfig;
use crate::lenient;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for roster entities (combatants and groups).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for applied conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConditionId(pub Uuid);

impl ConditionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConditionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Spell Slots
// ============================================================================

/// Spell slots by level (1-9). Carried through untouched by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlots(pub BTreeMap<u8, SlotInfo>);

impl SpellSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slot maximum for a level. Levels outside 1-9 are ignored.
    pub fn with_level(mut self, level: u8, max: u8) -> Self {
        if (1..=9).contains(&level) {
            self.0.insert(level, SlotInfo { max, used: 0 });
        }
        self
    }

    pub fn get(&self, level: u8) -> Option<&SlotInfo> {
        self.0.get(&level)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub max: u8,
    pub used: u8,
}

impl SlotInfo {
    pub fn available(&self) -> u8 {
        self.max.saturating_sub(self.used)
    }
}

// ============================================================================
// Combatants
// ============================================================================

/// An individual tracked in combat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    pub id: EntityId,
    pub name: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub initiative: i32,
    #[serde(default, deserialize_with = "lenient::int")]
    pub armor_class: i32,
    #[serde(default, deserialize_with = "lenient::int")]
    pub hit_points: i32,
    #[serde(default, deserialize_with = "lenient::int")]
    pub max_hit_points: i32,
    #[serde(default, deserialize_with = "lenient::int")]
    pub temporary_hit_points: i32,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub role: String,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_ref: Option<String>,
    /// Mirrors `hit_points <= 0`. Kept in sync by [`Combatant::refresh_out`].
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub is_out: bool,
    /// Unreadable conditions are dropped; the combatant is kept.
    #[serde(default, deserialize_with = "lenient::each")]
    pub conditions: Vec<Condition>,
    #[serde(
        default,
        deserialize_with = "lenient::or_default",
        skip_serializing_if = "Option::is_none"
    )]
    pub spell_slots: Option<SpellSlots>,
}

impl Combatant {
    /// Recompute `is_out` from the current hit points.
    pub fn refresh_out(&mut self) {
        self.is_out = self.hit_points <= 0;
    }

    pub fn condition(&self, id: ConditionId) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.id == id)
    }

    /// Clamp stored numbers into range and restore derived fields.
    ///
    /// Used on freshly imported data, where nothing can be assumed.
    pub(crate) fn normalize(&mut self) {
        self.armor_class = self.armor_class.max(0);
        self.hit_points = self.hit_points.max(0);
        self.max_hit_points = self.max_hit_points.max(0);
        self.temporary_hit_points = self.temporary_hit_points.max(0);
        self.refresh_out();
        let owner = self.id;
        for condition in &mut self.conditions {
            condition.owner_id = owner;
            condition.duration_rounds = condition.duration_rounds.max(1);
            condition.applied_at_round = condition.applied_at_round.max(1);
        }
    }
}

/// Creation defaults for a new combatant.
///
/// Unset fields fall back to the tracker's [`TrackerConfig`].
#[derive(Debug, Clone, Default)]
pub struct NewCombatant {
    pub name: Option<String>,
    pub initiative: Option<i32>,
    pub armor_class: Option<i32>,
    pub hit_points: Option<i32>,
    pub max_hit_points: Option<i32>,
    pub temporary_hit_points: Option<i32>,
    pub role: Option<String>,
    pub image_ref: Option<String>,
    pub spell_slots: Option<SpellSlots>,
}

impl NewCombatant {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_initiative(mut self, initiative: i32) -> Self {
        self.initiative = Some(initiative);
        self
    }

    pub fn with_armor_class(mut self, ac: i32) -> Self {
        self.armor_class = Some(ac);
        self
    }

    /// Set both current and maximum hit points.
    pub fn with_hp(mut self, hp: i32) -> Self {
        self.hit_points = Some(hp);
        self.max_hit_points = Some(hp);
        self
    }

    pub fn with_current_hp(mut self, hp: i32) -> Self {
        self.hit_points = Some(hp);
        self
    }

    pub fn with_temp_hp(mut self, temp: i32) -> Self {
        self.temporary_hit_points = Some(temp);
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    pub fn with_spell_slots(mut self, slots: SpellSlots) -> Self {
        self.spell_slots = Some(slots);
        self
    }

    /// The requested base name, or the configured default.
    pub(crate) fn base_name(&self, config: &TrackerConfig) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&config.default_combatant_name)
            .to_string()
    }

    pub(crate) fn build(self, name: String, config: &TrackerConfig) -> Combatant {
        let max_hit_points = self
            .max_hit_points
            .unwrap_or(config.default_max_hit_points)
            .max(0);
        let mut combatant = Combatant {
            id: EntityId::new(),
            name,
            initiative: self.initiative.unwrap_or(config.default_initiative),
            armor_class: self.armor_class.unwrap_or(config.default_armor_class).max(0),
            hit_points: self.hit_points.unwrap_or(max_hit_points).max(0),
            max_hit_points,
            temporary_hit_points: self.temporary_hit_points.unwrap_or(0).max(0),
            role: self.role.unwrap_or_else(|| config.default_role.clone()),
            image_ref: self.image_ref,
            is_out: false,
            conditions: Vec::new(),
            spell_slots: self.spell_slots,
        };
        combatant.refresh_out();
        combatant
    }
}

// ============================================================================
// Groups
// ============================================================================

/// Fixed group color palette. `Group::color_index` points into this.
pub const GROUP_PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6", "#bcf60c",
];

/// A named container of combatants. Members take their turns individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: EntityId,
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_int")]
    pub initiative: Option<i32>,
    #[serde(default, deserialize_with = "lenient::opt_index")]
    pub color_index: Option<usize>,
    /// Unreadable members are dropped; the rest of the group is kept.
    #[serde(default, deserialize_with = "lenient::each")]
    pub members: Vec<Combatant>,
}

impl Group {
    pub fn new(name: impl Into<String>, color_index: usize) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            initiative: None,
            color_index: Some(color_index % GROUP_PALETTE.len()),
            members: Vec::new(),
        }
    }

    /// The palette color, if one has been assigned.
    pub fn color(&self) -> Option<&'static str> {
        self.color_index.map(|i| GROUP_PALETTE[i % GROUP_PALETTE.len()])
    }
}

// ============================================================================
// Roster Entries
// ============================================================================

/// A top-level roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entity {
    Combatant(Combatant),
    Group(Group),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Combatant(c) => c.id,
            Entity::Group(g) => g.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Combatant(c) => &c.name,
            Entity::Group(g) => &g.name,
        }
    }

    /// Initiative used for sorting. Groups may have none.
    pub fn initiative(&self) -> Option<i32> {
        match self {
            Entity::Combatant(c) => Some(c.initiative),
            Entity::Group(g) => g.initiative,
        }
    }

    pub fn as_combatant(&self) -> Option<&Combatant> {
        match self {
            Entity::Combatant(c) => Some(c),
            Entity::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Entity::Group(g) => Some(g),
            Entity::Combatant(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Entity::Group(_))
    }
}

impl From<Combatant> for Entity {
    fn from(c: Combatant) -> Self {
        Entity::Combatant(c)
    }
}

impl From<Group> for Entity {
    fn from(g: Group) -> Self {
        Entity::Group(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_uses_config_defaults() {
        let config = TrackerConfig::default();
        let c = NewCombatant::default().build("Combatant".to_string(), &config);
        assert_eq!(c.hit_points, config.default_max_hit_points);
        assert_eq!(c.max_hit_points, config.default_max_hit_points);
        assert_eq!(c.armor_class, config.default_armor_class);
        assert!(!c.is_out);
    }

    #[test]
    fn test_build_clamps_negative_numbers() {
        let config = TrackerConfig::default();
        let c = NewCombatant::named("Zombie")
            .with_hp(-4)
            .with_armor_class(-1)
            .build("Zombie".to_string(), &config);
        assert_eq!(c.hit_points, 0);
        assert_eq!(c.armor_class, 0);
        assert!(c.is_out);
    }

    #[test]
    fn test_entity_serializes_with_type_tag() {
        let config = TrackerConfig::default();
        let c = NewCombatant::named("Orc").build("Orc".to_string(), &config);
        let value = serde_json::to_value(Entity::from(c)).unwrap();
        assert_eq!(value["type"], "combatant");
        assert_eq!(value["hitPoints"], 10);
        assert!(value.get("armorClass").is_some());

        let g = Group::new("Wolves", 3);
        let value = serde_json::to_value(Entity::from(g)).unwrap();
        assert_eq!(value["type"], "group");
        assert_eq!(value["colorIndex"], 3);
    }

    #[test]
    fn test_slot_available() {
        let slots = SpellSlots::new().with_level(1, 4).with_level(12, 1);
        assert_eq!(slots.get(1).unwrap().available(), 4);
        assert!(slots.get(12).is_none());

        let used = SlotInfo { max: 2, used: 5 };
        assert_eq!(used.available(), 0);
    }

    #[test]
    fn test_group_palette_wraps() {
        let g = Group::new("Bandits", GROUP_PALETTE.len() + 1);
        assert_eq!(g.color_index, Some(1));
        assert_eq!(g.color(), Some(GROUP_PALETTE[1]));
    }
}
