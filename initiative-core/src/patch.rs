//! Typed partial updates for roster entities.
//!
//! Patches come either from code (builder methods, serde with unknown fields
//! rejected) or from raw text input via `from_fields`, which coerces numbers
//! field by field.

use crate::entity::{Combatant, Group, SpellSlots};
use crate::error::TrackerError;
use serde::{Deserialize, Deserializer, Serialize};

/// Partial update for a combatant. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CombatantPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub initiative: Option<i32>,
    #[serde(default)]
    pub armor_class: Option<i32>,
    #[serde(default)]
    pub hit_points: Option<i32>,
    #[serde(default)]
    pub max_hit_points: Option<i32>,
    #[serde(default)]
    pub temporary_hit_points: Option<i32>,
    #[serde(default)]
    pub role: Option<String>,
    /// `Some(None)` clears the portrait.
    #[serde(default, deserialize_with = "double_option")]
    pub image_ref: Option<Option<String>>,
    #[serde(default)]
    pub spell_slots: Option<SpellSlots>,
}

impl CombatantPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn initiative(mut self, initiative: i32) -> Self {
        self.initiative = Some(initiative);
        self
    }

    pub fn armor_class(mut self, ac: i32) -> Self {
        self.armor_class = Some(ac);
        self
    }

    pub fn hit_points(mut self, hp: i32) -> Self {
        self.hit_points = Some(hp);
        self
    }

    pub fn max_hit_points(mut self, hp: i32) -> Self {
        self.max_hit_points = Some(hp);
        self
    }

    pub fn temporary_hit_points(mut self, hp: i32) -> Self {
        self.temporary_hit_points = Some(hp);
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Build a patch from raw `(field, text)` pairs, as an inline editor
    /// would produce them.
    ///
    /// Numbers that fail to parse are dropped from the patch so the stored
    /// value is kept. Unknown field names are rejected.
    pub fn from_fields<'a>(
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, TrackerError> {
        let mut patch = Self::default();
        for (key, raw) in fields {
            match key {
                "name" => patch.name = Some(raw.to_string()),
                "init" | "initiative" => patch.initiative = coerce_int(raw),
                "ac" | "armorClass" => patch.armor_class = coerce_int(raw),
                "hp" | "hitPoints" => patch.hit_points = coerce_int(raw),
                "maxHp" | "maxHitPoints" => patch.max_hit_points = coerce_int(raw),
                "tempHp" | "temporaryHitPoints" => patch.temporary_hit_points = coerce_int(raw),
                "role" => patch.role = Some(raw.trim().to_string()),
                "image" | "imageRef" => {
                    let raw = raw.trim();
                    patch.image_ref = Some((!raw.is_empty()).then(|| raw.to_string()));
                }
                other => return Err(TrackerError::UnknownField(other.to_string())),
            }
        }
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write the patch into `combatant`. Name validation is the caller's job.
    pub(crate) fn apply_to(self, combatant: &mut Combatant) {
        if let Some(name) = self.name {
            combatant.name = name.trim().to_string();
        }
        if let Some(initiative) = self.initiative {
            combatant.initiative = initiative;
        }
        if let Some(ac) = self.armor_class {
            combatant.armor_class = ac.max(0);
        }
        if let Some(hp) = self.hit_points {
            combatant.hit_points = hp.max(0);
        }
        if let Some(max) = self.max_hit_points {
            combatant.max_hit_points = max.max(0);
        }
        if let Some(temp) = self.temporary_hit_points {
            combatant.temporary_hit_points = temp.max(0);
        }
        if let Some(role) = self.role {
            combatant.role = role;
        }
        if let Some(image_ref) = self.image_ref {
            combatant.image_ref = image_ref;
        }
        if let Some(slots) = self.spell_slots {
            combatant.spell_slots = Some(slots);
        }
        combatant.refresh_out();
    }
}

/// Partial update for a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupPatch {
    #[serde(default)]
    pub name: Option<String>,
    /// `Some(None)` marks the initiative as unset.
    #[serde(default, deserialize_with = "double_option")]
    pub initiative: Option<Option<i32>>,
}

impl GroupPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn initiative(mut self, initiative: Option<i32>) -> Self {
        self.initiative = Some(initiative);
        self
    }

    /// Build a patch from raw `(field, text)` pairs.
    ///
    /// Unlike combatants, a group initiative that fails to parse is stored
    /// as unset rather than ignored.
    pub fn from_fields<'a>(
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, TrackerError> {
        let mut patch = Self::default();
        for (key, raw) in fields {
            match key {
                "name" => patch.name = Some(raw.to_string()),
                "init" | "initiative" => patch.initiative = Some(coerce_int(raw)),
                other => return Err(TrackerError::UnknownField(other.to_string())),
            }
        }
        Ok(patch)
    }

    pub(crate) fn apply_to(self, group: &mut Group) {
        if let Some(name) = self.name {
            group.name = name.trim().to_string();
        }
        if let Some(initiative) = self.initiative {
            group.initiative = initiative;
        }
    }
}

/// Parse user text as an integer.
///
/// Accepts plain integers and finite decimals (truncated toward zero).
/// Anything else yields `None`.
pub fn coerce_int(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i32>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok().filter(|f| f.is_finite())?;
    let t = f.trunc();
    (t >= f64::from(i32::MIN) && t <= f64::from(i32::MAX)).then_some(t as i32)
}

/// Distinguish a missing field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_int() {
        assert_eq!(coerce_int("12"), Some(12));
        assert_eq!(coerce_int(" -3 "), Some(-3));
        assert_eq!(coerce_int("+7"), Some(7));
        assert_eq!(coerce_int("4.9"), Some(4));
        assert_eq!(coerce_int("abc"), None);
        assert_eq!(coerce_int(""), None);
        assert_eq!(coerce_int("NaN"), None);
        assert_eq!(coerce_int("inf"), None);
        assert_eq!(coerce_int("1e12"), None);
    }

    #[test]
    fn test_combatant_fields_drop_bad_numbers() {
        let patch = CombatantPatch::from_fields([("hp", "lots"), ("ac", "15")]).unwrap();
        assert_eq!(patch.hit_points, None);
        assert_eq!(patch.armor_class, Some(15));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = CombatantPatch::from_fields([("speed", "30")]).unwrap_err();
        assert_eq!(err, TrackerError::UnknownField("speed".to_string()));

        let err = GroupPatch::from_fields([("hp", "3")]).unwrap_err();
        assert_eq!(err, TrackerError::UnknownField("hp".to_string()));
    }

    #[test]
    fn test_group_bad_initiative_becomes_unset() {
        let patch = GroupPatch::from_fields([("init", "??")]).unwrap();
        assert_eq!(patch.initiative, Some(None));

        let patch = GroupPatch::from_fields([("init", "14")]).unwrap();
        assert_eq!(patch.initiative, Some(Some(14)));
    }

    #[test]
    fn test_serde_rejects_unknown_fields() {
        let result: Result<CombatantPatch, _> = serde_json::from_str(r#"{"speed": 30}"#);
        assert!(result.is_err());

        let patch: CombatantPatch = serde_json::from_str(r#"{"hitPoints": 3}"#).unwrap();
        assert_eq!(patch.hit_points, Some(3));
    }

    #[test]
    fn test_serde_group_null_initiative() {
        let patch: GroupPatch = serde_json::from_str(r#"{"initiative": null}"#).unwrap();
        assert_eq!(patch.initiative, Some(None));

        let patch: GroupPatch = serde_json::from_str(r#"{"name": "Wolves"}"#).unwrap();
        assert_eq!(patch.initiative, None);
    }

    #[test]
    fn test_image_clear() {
        let patch = CombatantPatch::from_fields([("image", "  ")]).unwrap();
        assert_eq!(patch.image_ref, Some(None));
    }
}
