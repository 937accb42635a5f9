//! Tracker configuration.

use std::time::Duration;

/// Configuration for a [`CombatTracker`](crate::CombatTracker).
///
/// Carries the defaults applied to newly created entities and the autosave
/// idle gap.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base name for combatants created without one.
    pub default_combatant_name: String,

    /// Base name for groups created with a blank name.
    pub default_group_name: String,

    pub default_initiative: i32,
    pub default_armor_class: i32,

    /// New combatants start at full health with this maximum.
    pub default_max_hit_points: i32,

    pub default_role: String,

    /// Idle gap after the last change before an autosave is due.
    pub autosave_debounce: Duration,
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self {
            default_combatant_name: "Combatant".to_string(),
            default_group_name: "Group".to_string(),
            default_initiative: 0,
            default_armor_class: 10,
            default_max_hit_points: 10,
            default_role: "monster".to_string(),
            autosave_debounce: Duration::from_millis(750),
        }
    }

    /// Set the base name for unnamed combatants.
    pub fn with_default_name(mut self, name: impl Into<String>) -> Self {
        self.default_combatant_name = name.into();
        self
    }

    /// Set the base name for unnamed groups.
    pub fn with_default_group_name(mut self, name: impl Into<String>) -> Self {
        self.default_group_name = name.into();
        self
    }

    /// Set the default armor class.
    pub fn with_armor_class(mut self, ac: i32) -> Self {
        self.default_armor_class = ac;
        self
    }

    /// Set the default maximum hit points.
    pub fn with_max_hit_points(mut self, hp: i32) -> Self {
        self.default_max_hit_points = hp;
        self
    }

    /// Set the default role tag.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = role.into();
        self
    }

    /// Set the autosave idle gap.
    pub fn with_autosave_debounce(mut self, debounce: Duration) -> Self {
        self.autosave_debounce = debounce;
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}
