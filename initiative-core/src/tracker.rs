//! CombatTracker - the single owner of combat state.
//!
//! Every mutation goes through this type. A successful mutation ends with
//! exactly one call to `notify()`, which clamps the turn pointer, fills in
//! derived values and hands a fresh [`Snapshot`] to every listener. A failed
//! mutation returns an error, leaves state untouched and notifies no one.

use crate::condition::{Condition, ConditionStatus};
use crate::config::TrackerConfig;
use crate::damage::{self, DamageOutcome};
use crate::entity::{Combatant, ConditionId, Entity, EntityId, Group, NewCombatant, GROUP_PALETTE};
use crate::error::TrackerError;
use crate::hub::{Hub, Snapshot, Subscription};
use crate::patch::{CombatantPatch, GroupPatch};
use crate::persist::{ExportedState, PersistError, SAVE_VERSION};
use crate::roster::{EntityRef, Location, Roster};
use crate::turn::{self, SortDirection, TurnClock};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// The combat state engine.
///
/// Single-threaded: listeners are plain closures and need not be `Send`.
#[derive(Debug)]
pub struct CombatTracker {
    config: TrackerConfig,
    pub(crate) roster: Roster,
    selection: BTreeSet<EntityId>,
    locked: bool,
    pub(crate) clock: TurnClock,
    next_color: usize,
    hub: Hub,
}

impl CombatTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            roster: Roster::new(),
            selection: BTreeSet::new(),
            locked: false,
            clock: TurnClock::default(),
            next_color: 0,
            hub: Hub::new(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn find_entity(&self, id: EntityId) -> Option<(EntityRef<'_>, Location)> {
        self.roster.find(id)
    }

    pub fn combatant(&self, id: EntityId) -> Option<&Combatant> {
        self.roster.combatant(id)
    }

    pub fn group(&self, id: EntityId) -> Option<&Group> {
        self.roster.group(id)
    }

    /// Current selection, copied.
    pub fn selection(&self) -> Vec<EntityId> {
        self.selection.iter().copied().collect()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn current_round(&self) -> u32 {
        self.clock.round
    }

    pub fn turn_pointer(&self) -> usize {
        self.clock.pointer
    }

    pub fn clock(&self) -> TurnClock {
        self.clock
    }

    /// Ids of combatants able to act, in turn order. Derived on every call.
    pub fn turn_order(&self) -> Vec<EntityId> {
        turn::turn_order(&self.roster)
    }

    /// The combatant whose turn it is.
    pub fn current_combatant(&self) -> Option<&Combatant> {
        let order = self.turn_order();
        let id = order.get(self.clock.pointer)?;
        self.roster.combatant(*id)
    }

    pub fn round_label(&self) -> String {
        format!("Round {}", self.clock.round)
    }

    pub fn snapshot(&self) -> Snapshot {
        let turn_order = self.turn_order();
        let current_turn_name = turn_order
            .get(self.clock.pointer)
            .and_then(|id| self.roster.combatant(*id))
            .map(|c| c.name.clone());
        Snapshot {
            roster: self.roster.clone(),
            selection: self.selection(),
            locked: self.locked,
            current_round: self.clock.round,
            turn_pointer: self.clock.pointer,
            turn_order,
            round_label: self.round_label(),
            current_turn_name,
        }
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Register a listener. It is called once right away with the current
    /// snapshot, then after every successful mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(&Snapshot) + 'static) -> Subscription {
        let subscription = self.hub.add(Box::new(listener));
        let snapshot = self.snapshot();
        self.hub.deliver_to(subscription, &snapshot);
        subscription
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.hub.remove(subscription)
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.len()
    }

    /// Recompute derived state and fan a snapshot out to listeners.
    pub(crate) fn notify(&mut self) {
        let order_len = self.turn_order().len();
        let before = self.clock;
        self.clock.clamp_to(order_len);
        if self.clock != before {
            self.rebase_conditions(before);
        }
        for group in self.roster.groups_mut() {
            if group.color_index.is_none() {
                group.color_index = Some(self.next_color % GROUP_PALETTE.len());
                self.next_color += 1;
            }
        }
        if self.hub.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.hub.broadcast(&snapshot);
    }

    /// Pull conditions applied between the clamped pointer and `before` back
    /// to the clamped pointer, so a shrinking turn order does not hide them.
    fn rebase_conditions(&mut self, before: TurnClock) {
        let now = self.clock;
        for combatant in self.roster.combatants_mut() {
            for condition in &mut combatant.conditions {
                let applied = condition.applied_at();
                if applied > now && applied <= before {
                    condition.applied_at_round = now.round;
                    condition.applied_at_turn_index = now.pointer;
                }
            }
        }
    }

    fn ensure_unlocked(&self) -> Result<(), TrackerError> {
        if self.locked {
            Err(TrackerError::Locked)
        } else {
            Ok(())
        }
    }

    fn require_combatant(&self, id: EntityId) -> Result<(), TrackerError> {
        match self.roster.find(id) {
            None => Err(TrackerError::NotFound(id)),
            Some((EntityRef::Group(_), _)) => Err(TrackerError::NotACombatant(id)),
            Some((EntityRef::Combatant(_), _)) => Ok(()),
        }
    }

    fn validate_name(&self, name: &str, id: EntityId) -> Result<(), TrackerError> {
        if name.trim().is_empty() {
            return Err(TrackerError::BlankName);
        }
        if self.roster.name_taken(name, Some(id)) {
            return Err(TrackerError::DuplicateName(name.trim().to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Roster Mutations
    // =========================================================================

    /// Append a combatant at top level. The name is made unique by suffixing
    /// the lowest free number ("Goblin 2", "Goblin 3", ...).
    pub fn add_combatant(&mut self, new: NewCombatant) -> Result<Combatant, TrackerError> {
        self.ensure_unlocked()?;
        let name = self.roster.unique_name(&new.base_name(&self.config));
        let combatant = new.build(name, &self.config);
        debug!(id = %combatant.id, name = %combatant.name, "combatant added");
        self.roster.push(combatant.clone());
        self.notify();
        Ok(combatant)
    }

    /// Append an empty group with the next palette color.
    pub fn add_group(&mut self, name: &str) -> Result<Group, TrackerError> {
        self.ensure_unlocked()?;
        let base = match name.trim() {
            "" => self.config.default_group_name.as_str(),
            trimmed => trimmed,
        };
        let group = Group::new(self.roster.unique_name(base), self.next_color);
        self.next_color += 1;
        debug!(id = %group.id, name = %group.name, "group added");
        self.roster.push(group.clone());
        self.notify();
        Ok(group)
    }

    pub fn update_combatant(
        &mut self,
        id: EntityId,
        patch: CombatantPatch,
    ) -> Result<(), TrackerError> {
        self.ensure_unlocked()?;
        self.require_combatant(id)?;
        if let Some(name) = &patch.name {
            self.validate_name(name, id)?;
        }
        if let Some(combatant) = self.roster.combatant_mut(id) {
            patch.apply_to(combatant);
            debug!(%id, "combatant updated");
        }
        self.notify();
        Ok(())
    }

    pub fn update_group(&mut self, id: EntityId, patch: GroupPatch) -> Result<(), TrackerError> {
        self.ensure_unlocked()?;
        match self.roster.find(id) {
            None => return Err(TrackerError::NotFound(id)),
            Some((EntityRef::Combatant(_), _)) => return Err(TrackerError::NotAGroup(id)),
            Some((EntityRef::Group(_), _)) => {}
        }
        if let Some(name) = &patch.name {
            self.validate_name(name, id)?;
        }
        if let Some(group) = self.roster.group_mut(id) {
            patch.apply_to(group);
            debug!(%id, "group updated");
        }
        self.notify();
        Ok(())
    }

    /// Remove a combatant, a group (with its members) or a group member.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity, TrackerError> {
        self.ensure_unlocked()?;
        let removed = self.roster.remove(id).ok_or(TrackerError::NotFound(id))?;
        match &removed {
            Entity::Combatant(c) => {
                self.selection.remove(&c.id);
            }
            Entity::Group(g) => {
                for member in &g.members {
                    self.selection.remove(&member.id);
                }
            }
        }
        debug!(%id, name = removed.name(), "entity removed");
        self.notify();
        Ok(removed)
    }

    /// Move every selected combatant into `group_id`, appended in roster order.
    pub fn move_selected_to_group(&mut self, group_id: EntityId) -> Result<usize, TrackerError> {
        self.ensure_unlocked()?;
        if self.selection.is_empty() {
            return Err(TrackerError::EmptySelection);
        }
        match self.roster.find(group_id) {
            None => return Err(TrackerError::NotFound(group_id)),
            Some((EntityRef::Combatant(_), _)) => return Err(TrackerError::NotAGroup(group_id)),
            Some((EntityRef::Group(_), _)) => {}
        }
        let moved = self.roster.take_combatants(&self.selection, false);
        let count = moved.len();
        if let Some(group) = self.roster.group_mut(group_id) {
            group.members.extend(moved);
        }
        debug!(%group_id, count, "selection moved to group");
        self.notify();
        Ok(count)
    }

    /// Move selected group members out to the top level.
    pub fn ungroup_selected(&mut self) -> Result<usize, TrackerError> {
        self.ensure_unlocked()?;
        if !self.roster.any_member(&self.selection) {
            return Err(TrackerError::EmptySelection);
        }
        let moved = self.roster.take_combatants(&self.selection, true);
        let count = moved.len();
        for combatant in moved {
            self.roster.push(combatant);
        }
        debug!(count, "selection ungrouped");
        self.notify();
        Ok(count)
    }

    /// Remove every selected combatant. Emptied groups are kept.
    pub fn delete_selected(&mut self) -> Result<usize, TrackerError> {
        self.ensure_unlocked()?;
        if self.selection.is_empty() {
            return Err(TrackerError::EmptySelection);
        }
        let removed = self.roster.take_combatants(&self.selection, false);
        self.selection.clear();
        debug!(count = removed.len(), "selection deleted");
        self.notify();
        Ok(removed.len())
    }

    // =========================================================================
    // Selection and Lock
    // =========================================================================

    /// Replace the selection. Ids that are not combatants are dropped.
    pub fn set_selection(
        &mut self,
        ids: impl IntoIterator<Item = EntityId>,
    ) -> Result<(), TrackerError> {
        self.ensure_unlocked()?;
        self.selection = ids
            .into_iter()
            .filter(|id| self.roster.combatant(*id).is_some())
            .collect();
        self.notify();
        Ok(())
    }

    pub fn select_all(&mut self) -> Result<(), TrackerError> {
        let all: Vec<_> = self.roster.combatants().map(|c| c.id).collect();
        self.set_selection(all)
    }

    pub fn clear_selection(&mut self) -> Result<(), TrackerError> {
        self.set_selection(std::iter::empty())
    }

    /// Lock or unlock editing. Locking clears the selection.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        if locked {
            self.selection.clear();
        }
        debug!(locked, "lock changed");
        self.notify();
    }

    // =========================================================================
    // Turns
    // =========================================================================

    /// Sort the top-level roster by initiative. The turn pointer follows the
    /// combatant who was current.
    pub fn sort_by_initiative(&mut self, direction: SortDirection) -> Result<(), TrackerError> {
        self.ensure_unlocked()?;
        let current = self.turn_order().get(self.clock.pointer).copied();
        turn::sort_roster(&mut self.roster, direction);
        if let Some(id) = current {
            if let Some(index) = self.turn_order().iter().position(|o| *o == id) {
                self.clock.pointer = index;
            }
        }
        debug!(%direction, "roster sorted");
        self.notify();
        Ok(())
    }

    pub fn advance_turn(&mut self) -> Result<TurnClock, TrackerError> {
        let len = self.turn_order().len();
        self.clock.clamp_to(len);
        if !self.clock.advance(len) {
            return Err(TrackerError::EmptyTurnOrder);
        }
        debug!(round = self.clock.round, pointer = self.clock.pointer, "turn advanced");
        self.notify();
        Ok(self.clock)
    }

    pub fn retreat_turn(&mut self) -> Result<TurnClock, TrackerError> {
        let len = self.turn_order().len();
        self.clock.clamp_to(len);
        if !self.clock.retreat(len) {
            return Err(TrackerError::EmptyTurnOrder);
        }
        debug!(round = self.clock.round, pointer = self.clock.pointer, "turn retreated");
        self.notify();
        Ok(self.clock)
    }

    // =========================================================================
    // Conditions
    // =========================================================================

    /// Apply a condition that lasts `duration_rounds` of the owner's turns
    /// (at least 1), starting now.
    pub fn add_condition(
        &mut self,
        combatant_id: EntityId,
        name: &str,
        duration_rounds: i32,
        note: Option<&str>,
    ) -> Result<ConditionId, TrackerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackerError::BlankName);
        }
        self.require_combatant(combatant_id)?;
        let clock = self.clock;
        let combatant = self
            .roster
            .combatant_mut(combatant_id)
            .ok_or(TrackerError::NotFound(combatant_id))?;
        let duration = u32::try_from(duration_rounds.max(1)).unwrap_or(1);
        let condition = Condition::new(combatant_id, name, duration, clock)
            .with_note(note.map(str::to_string));
        let id = condition.id;
        combatant.conditions.push(condition);
        debug!(%combatant_id, condition = name, duration, "condition applied");
        self.notify();
        Ok(id)
    }

    pub fn remove_condition(
        &mut self,
        combatant_id: EntityId,
        condition_id: ConditionId,
    ) -> Result<Condition, TrackerError> {
        self.require_combatant(combatant_id)?;
        let combatant = self
            .roster
            .combatant_mut(combatant_id)
            .ok_or(TrackerError::NotFound(combatant_id))?;
        let index = combatant
            .conditions
            .iter()
            .position(|c| c.id == condition_id)
            .ok_or(TrackerError::ConditionNotFound(condition_id))?;
        let removed = combatant.conditions.remove(index);
        debug!(%combatant_id, condition = %removed.name, "condition removed");
        self.notify();
        Ok(removed)
    }

    /// Where a condition stands at the current round and turn.
    pub fn condition_status(&self, condition: &Condition) -> ConditionStatus {
        let owner_index = self
            .turn_order()
            .iter()
            .position(|id| *id == condition.owner_id);
        condition.status(self.clock, owner_index)
    }

    pub fn is_condition_active(&self, condition: &Condition) -> bool {
        self.condition_status(condition).active
    }

    /// A combatant's conditions paired with their current status.
    pub fn conditions_with_status(&self, combatant_id: EntityId) -> Vec<(&Condition, ConditionStatus)> {
        self.roster
            .combatant(combatant_id)
            .map(|c| {
                c.conditions
                    .iter()
                    .map(|cond| (cond, self.condition_status(cond)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn active_conditions(&self, combatant_id: EntityId) -> Vec<&Condition> {
        self.conditions_with_status(combatant_id)
            .into_iter()
            .filter(|(_, status)| status.active)
            .map(|(c, _)| c)
            .collect()
    }

    /// Drop conditions whose duration has run out. Returns how many went.
    ///
    /// Expired conditions are otherwise kept; this is an explicit cleanup.
    pub fn prune_expired_conditions(&mut self) -> usize {
        let order = self.turn_order();
        let clock = self.clock;
        let mut pruned = 0;
        for combatant in self.roster.combatants_mut() {
            let owner_index = order.iter().position(|id| *id == combatant.id);
            let before = combatant.conditions.len();
            combatant.conditions.retain(|c| {
                let status = c.status(clock, owner_index);
                !(status.visible && status.remaining == 0)
            });
            pruned += before - combatant.conditions.len();
        }
        if pruned > 0 {
            debug!(pruned, "expired conditions pruned");
            self.notify();
        }
        pruned
    }

    // =========================================================================
    // Damage
    // =========================================================================

    /// Apply damage, then healing, to each targeted combatant.
    ///
    /// Ids that are not combatants are skipped. Fails only if none of them is.
    pub fn apply_damage_and_heal(
        &mut self,
        ids: &[EntityId],
        damage: i32,
        heal: i32,
    ) -> Result<Vec<DamageOutcome>, TrackerError> {
        let Some(first) = ids.first().copied() else {
            return Err(TrackerError::EmptySelection);
        };
        let targets: BTreeSet<EntityId> = ids.iter().copied().collect();
        let outcomes: Vec<DamageOutcome> = self
            .roster
            .combatants_mut()
            .filter(|c| targets.contains(&c.id))
            .map(|c| damage::apply(c, damage, heal))
            .collect();
        if outcomes.is_empty() {
            return Err(TrackerError::NotACombatant(first));
        }
        for outcome in &outcomes {
            debug!(
                target = %outcome.target_id,
                damage,
                heal,
                dropped = outcome.dropped_to_zero,
                "damage resolved"
            );
        }
        self.notify();
        Ok(outcomes)
    }
    // =========================================================================
    // Serialization
    // =========================================================================

    pub fn export_state(&self) -> ExportedState {
        ExportedState {
            version: SAVE_VERSION,
            roster: self.roster.clone(),
            current_round: self.clock.round,
            turn_pointer: self.clock.pointer,
        }
    }

    /// Replace roster, round and pointer wholesale. Clears the selection.
    pub fn import_state(&mut self, state: ExportedState) {
        self.roster = state.roster;
        for combatant in self.roster.combatants_mut() {
            combatant.normalize();
        }
        let renamed = self.roster.repair_names(
            &self.config.default_combatant_name,
            &self.config.default_group_name,
        );
        if renamed > 0 {
            warn!(renamed, "renamed imported entries with duplicate or blank names");
        }
        self.clock = TurnClock::new(state.current_round.max(1), state.turn_pointer);
        self.selection.clear();
        self.next_color = self.roster.groups().count();
        debug!(
            entries = self.roster.len(),
            round = self.clock.round,
            "state imported"
        );
        self.notify();
    }

    /// Import a loosely shaped JSON value. See [`ExportedState::from_value`].
    pub fn import_value(&mut self, value: serde_json::Value) -> Result<(), PersistError> {
        let state = ExportedState::from_value(value)?;
        self.import_state(state);
        Ok(())
    }

    pub fn import_json(&mut self, json: &str) -> Result<(), PersistError> {
        let state = ExportedState::from_json(json)?;
        self.import_state(state);
        Ok(())
    }
}

impl Default for CombatTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
