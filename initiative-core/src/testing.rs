//! Testing utilities for tracker scenarios.
//!
//! [`TrackerHarness`] wraps a tracker with a recording subscriber and
//! shorthand setup by name. The helpers panic on failure; they are meant for
//! tests only.

use crate::config::TrackerConfig;
use crate::entity::{EntityId, NewCombatant};
use crate::hub::Snapshot;
use crate::roster::name_key;
use crate::tracker::CombatTracker;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Test harness for running combat scenarios.
pub struct TrackerHarness {
    /// The tracker under test.
    pub tracker: CombatTracker,
    snapshots: Rc<RefCell<Vec<Snapshot>>>,
}

impl TrackerHarness {
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    /// Create a harness whose tracker uses `config`.
    pub fn with_config(config: TrackerConfig) -> Self {
        let mut tracker = CombatTracker::new(config);
        let snapshots = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&snapshots);
        tracker.subscribe(move |s| sink.borrow_mut().push(s.clone()));
        Self { tracker, snapshots }
    }

    /// Add a combatant with default stats.
    pub fn add(&mut self, name: &str, initiative: i32) -> EntityId {
        self.add_new(NewCombatant::named(name).with_initiative(initiative))
    }

    /// Add a combatant with `hp` current and maximum hit points.
    pub fn add_with_hp(&mut self, name: &str, initiative: i32, hp: i32) -> EntityId {
        self.add_new(
            NewCombatant::named(name)
                .with_initiative(initiative)
                .with_hp(hp),
        )
    }

    pub fn add_new(&mut self, new: NewCombatant) -> EntityId {
        match self.tracker.add_combatant(new) {
            Ok(c) => c.id,
            Err(e) => panic!("add_combatant failed: {e}"),
        }
    }

    /// Create a group and move `members` into it.
    pub fn group(&mut self, name: &str, members: &[EntityId]) -> EntityId {
        let group = match self.tracker.add_group(name) {
            Ok(g) => g,
            Err(e) => panic!("add_group failed: {e}"),
        };
        if !members.is_empty() {
            let moved = self
                .tracker
                .set_selection(members.iter().copied())
                .and_then(|_| self.tracker.move_selected_to_group(group.id))
                .and_then(|_| self.tracker.clear_selection());
            if let Err(e) = moved {
                panic!("grouping into '{name}' failed: {e}");
            }
        }
        group.id
    }

    /// Look up an entity id by name (case-insensitive).
    pub fn id(&self, name: &str) -> EntityId {
        let key = name_key(name);
        self.tracker
            .roster()
            .names()
            .find(|(_, n)| name_key(n) == key)
            .map(|(id, _)| id)
            .unwrap_or_else(|| panic!("no entity named '{name}'"))
    }

    /// Advance `n` turns.
    pub fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if let Err(e) = self.tracker.advance_turn() {
                panic!("advance_turn failed: {e}");
            }
        }
    }

    /// Current HP as (current, max).
    pub fn hp(&self, name: &str) -> (i32, i32) {
        let id = self.id(name);
        let c = self
            .tracker
            .combatant(id)
            .unwrap_or_else(|| panic!("'{name}' is not a combatant"));
        (c.hit_points, c.max_hit_points)
    }

    pub fn current_name(&self) -> Option<String> {
        self.tracker.current_combatant().map(|c| c.name.clone())
    }

    /// Names in turn order.
    pub fn order_names(&self) -> Vec<String> {
        self.tracker
            .turn_order()
            .into_iter()
            .filter_map(|id| self.tracker.combatant(id))
            .map(|c| c.name.clone())
            .collect()
    }

    /// Names of top-level entries in roster order.
    pub fn roster_names(&self) -> Vec<String> {
        self.tracker
            .roster()
            .entries()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Snapshots received so far, including the priming one.
    pub fn notifications(&self) -> usize {
        self.snapshots.borrow().len()
    }

    pub fn last_snapshot(&self) -> Option<Snapshot> {
        self.snapshots.borrow().last().cloned()
    }
}

impl Default for TrackerHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert every structural invariant of the tracker state.
#[track_caller]
pub fn assert_invariants(tracker: &CombatTracker) {
    let roster = tracker.roster();

    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for (id, name) in roster.names() {
        assert!(ids.insert(id), "Duplicate id {id}");
        assert!(
            names.insert(name_key(name)),
            "Duplicate name '{name}' (names must be unique ignoring case)"
        );
        assert!(!name.trim().is_empty(), "Blank name on {id}");
    }

    for c in roster.combatants() {
        assert_eq!(
            c.is_out,
            c.hit_points <= 0,
            "'{}' has is_out={} with {} HP",
            c.name,
            c.is_out,
            c.hit_points
        );
        assert!(
            c.armor_class >= 0
                && c.hit_points >= 0
                && c.max_hit_points >= 0
                && c.temporary_hit_points >= 0,
            "'{}' has a negative stat",
            c.name
        );
        for condition in &c.conditions {
            assert_eq!(condition.owner_id, c.id, "Condition owner mismatch on '{}'", c.name);
            assert!(condition.duration_rounds >= 1, "Zero-length condition on '{}'", c.name);
        }
    }

    let order = tracker.turn_order();
    for id in &order {
        let c = tracker.combatant(*id);
        assert!(
            c.map(|c| !c.is_out).unwrap_or(false),
            "Turn order holds {id}, which cannot act"
        );
    }
    let pointer = tracker.turn_pointer();
    assert!(
        pointer < order.len() || (order.is_empty() && pointer == 0),
        "Turn pointer {pointer} out of range for {} combatants",
        order.len()
    );
    assert!(tracker.current_round() >= 1, "Round dropped below 1");

    for id in tracker.selection() {
        assert!(tracker.combatant(id).is_some(), "Selection holds non-combatant {id}");
    }
    if tracker.is_locked() {
        assert!(tracker.selection().is_empty(), "Selection not empty while locked");
    }
}

/// Assert a combatant's HP.
#[track_caller]
pub fn assert_hp(harness: &TrackerHarness, name: &str, current: i32, max: i32) {
    let (actual_current, actual_max) = harness.hp(name);
    assert_eq!(
        (actual_current, actual_max),
        (current, max),
        "Expected '{name}' at {current}/{max} HP, got {actual_current}/{actual_max}"
    );
}

/// Assert whose turn it is.
#[track_caller]
pub fn assert_current_turn(harness: &TrackerHarness, name: &str) {
    assert_eq!(
        harness.current_name().as_deref(),
        Some(name),
        "Expected it to be {name}'s turn"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_setup_and_lookup() {
        let mut h = TrackerHarness::new();
        let a = h.add("Aria", 15);
        let b = h.add_with_hp("Bandit", 12, 11);
        let g = h.group("Bandits", &[b]);

        assert_eq!(h.id("aria"), a);
        assert_eq!(h.id("Bandits"), g);
        assert_hp(&h, "Bandit", 11, 11);
        assert_eq!(h.roster_names(), vec!["Aria", "Bandits"]);
        assert_eq!(h.order_names(), vec!["Aria", "Bandit"]);
        assert!(h.tracker.selection().is_empty());
        assert_invariants(&h.tracker);
    }

    #[test]
    fn test_harness_records_notifications() {
        let mut h = TrackerHarness::new();
        assert_eq!(h.notifications(), 1);
        h.add("Aria", 15);
        h.add("Bram", 10);
        assert_eq!(h.notifications(), 3);

        h.advance(1);
        assert_current_turn(&h, "Bram");
        let last = h.last_snapshot().unwrap();
        assert_eq!(last.current_turn_name.as_deref(), Some("Bram"));
    }

    #[test]
    #[should_panic(expected = "is_out")]
    fn test_invariants_catch_stale_out_flag() {
        let mut h = TrackerHarness::new();
        let id = h.add("Aria", 15);
        if let Some(c) = h.tracker.roster.combatant_mut(id) {
            c.hit_points = 0;
        }
        assert_invariants(&h.tracker);
    }
}
