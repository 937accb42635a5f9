//! The roster: an ordered list of combatants and groups.
//!
//! Every combatant id appears exactly once, either at the top level or inside
//! exactly one group. Groups do not nest. Names are unique across the whole
//! structure, compared trimmed and case-insensitively.

use crate::entity::{Combatant, Entity, EntityId, Group};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Ordered top-level entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    entries: Vec<Entity>,
}

/// Where an entity lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Containing group, or `None` at top level.
    pub parent: Option<EntityId>,
    /// Index within the containing list.
    pub index: usize,
}

/// Borrowed view of a located entity.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Combatant(&'a Combatant),
    Group(&'a Group),
}

impl EntityRef<'_> {
    pub fn id(&self) -> EntityId {
        match self {
            EntityRef::Combatant(c) => c.id,
            EntityRef::Group(g) => g.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EntityRef::Combatant(c) => &c.name,
            EntityRef::Group(g) => &g.name,
        }
    }
}

/// Normalized form used for name comparisons.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Entity>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Entity] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<Entity> {
        &mut self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn push(&mut self, entity: impl Into<Entity>) {
        self.entries.push(entity.into());
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// All combatants in roster order, group members in member order.
    pub fn combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.entries.iter().flat_map(|e| match e {
            Entity::Combatant(c) => std::slice::from_ref(c).iter(),
            Entity::Group(g) => g.members.iter(),
        })
    }

    pub(crate) fn combatants_mut(&mut self) -> impl Iterator<Item = &mut Combatant> {
        self.entries.iter_mut().flat_map(|e| match e {
            Entity::Combatant(c) => std::slice::from_mut(c).iter_mut(),
            Entity::Group(g) => g.members.iter_mut(),
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.entries.iter().filter_map(Entity::as_group)
    }

    pub(crate) fn groups_mut(&mut self) -> impl Iterator<Item = &mut Group> {
        self.entries.iter_mut().filter_map(|e| match e {
            Entity::Group(g) => Some(g),
            Entity::Combatant(_) => None,
        })
    }

    /// Every name in the roster: top-level entities and group members.
    pub fn names(&self) -> impl Iterator<Item = (EntityId, &str)> {
        self.entries.iter().flat_map(|e| {
            let own = std::iter::once((e.id(), e.name()));
            let members = e
                .as_group()
                .into_iter()
                .flat_map(|g| g.members.iter().map(|m| (m.id, m.name.as_str())));
            own.chain(members)
        })
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Locate an entity anywhere in the roster.
    pub fn find(&self, id: EntityId) -> Option<(EntityRef<'_>, Location)> {
        for (index, entry) in self.entries.iter().enumerate() {
            match entry {
                Entity::Combatant(c) if c.id == id => {
                    return Some((EntityRef::Combatant(c), Location { parent: None, index }));
                }
                Entity::Group(g) if g.id == id => {
                    return Some((EntityRef::Group(g), Location { parent: None, index }));
                }
                Entity::Group(g) => {
                    if let Some(i) = g.members.iter().position(|m| m.id == id) {
                        let location = Location {
                            parent: Some(g.id),
                            index: i,
                        };
                        return Some((EntityRef::Combatant(&g.members[i]), location));
                    }
                }
                Entity::Combatant(_) => {}
            }
        }
        None
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.find(id).is_some()
    }

    pub fn combatant(&self, id: EntityId) -> Option<&Combatant> {
        self.combatants().find(|c| c.id == id)
    }

    pub(crate) fn combatant_mut(&mut self, id: EntityId) -> Option<&mut Combatant> {
        self.combatants_mut().find(|c| c.id == id)
    }

    pub fn group(&self, id: EntityId) -> Option<&Group> {
        self.groups().find(|g| g.id == id)
    }

    pub(crate) fn group_mut(&mut self, id: EntityId) -> Option<&mut Group> {
        self.groups_mut().find(|g| g.id == id)
    }

    /// Combatant by name, case-insensitive.
    pub fn find_by_name(&self, name: &str) -> Option<&Combatant> {
        let key = name_key(name);
        self.combatants().find(|c| name_key(&c.name) == key)
    }

    // =========================================================================
    // Names
    // =========================================================================

    /// True if `name` is used by any entity other than `except`.
    pub fn name_taken(&self, name: &str, except: Option<EntityId>) -> bool {
        let key = name_key(name);
        self.names()
            .any(|(id, existing)| Some(id) != except && name_key(existing) == key)
    }

    /// `base` if free, otherwise `base N` for the lowest free N starting at 2.
    pub fn unique_name(&self, base: &str) -> String {
        let base = base.trim();
        if !self.name_taken(base, None) {
            return base.to_string();
        }
        (2u32..)
            .map(|n| format!("{base} {n}"))
            .find(|candidate| !self.name_taken(candidate, None))
            .unwrap_or_else(|| base.to_string())
    }

    /// Make names unique and non-blank after an import.
    ///
    /// The first holder of a name keeps it; later holders get the lowest free
    /// `name N`. Blank names restart from the given base. Returns the number
    /// of entities renamed.
    pub(crate) fn repair_names(&mut self, combatant_base: &str, group_base: &str) -> usize {
        let existing: HashSet<String> = self.names().map(|(_, n)| name_key(n)).collect();
        let mut claimed = HashSet::new();
        let mut renamed = 0;
        for entry in &mut self.entries {
            let (own, members, base) = match entry {
                Entity::Combatant(c) => (&mut c.name, None, combatant_base),
                Entity::Group(g) => (&mut g.name, Some(&mut g.members), group_base),
            };
            renamed += usize::from(claim_name(own, base, &existing, &mut claimed));
            for member in members.into_iter().flatten() {
                renamed += usize::from(claim_name(
                    &mut member.name,
                    combatant_base,
                    &existing,
                    &mut claimed,
                ));
            }
        }
        renamed
    }

    // =========================================================================
    // Removal and Regrouping
    // =========================================================================

    /// Remove an entity by id.
    ///
    /// A top-level group takes its members with it. A group member is removed
    /// from its group, which stays.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        if let Some(index) = self.entries.iter().position(|e| e.id() == id) {
            return Some(self.entries.remove(index));
        }
        for group in self.groups_mut() {
            if let Some(index) = group.members.iter().position(|m| m.id == id) {
                return Some(Entity::Combatant(group.members.remove(index)));
            }
        }
        None
    }

    /// Pull the given combatants out of wherever they are, in roster order.
    ///
    /// With `members_only`, top-level combatants are left in place.
    pub(crate) fn take_combatants(
        &mut self,
        ids: &BTreeSet<EntityId>,
        members_only: bool,
    ) -> Vec<Combatant> {
        let mut taken = Vec::new();
        let mut kept = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            match entry {
                Entity::Combatant(c) if !members_only && ids.contains(&c.id) => taken.push(c),
                Entity::Group(mut g) => {
                    let (moved, stay): (Vec<_>, Vec<_>) =
                        g.members.drain(..).partition(|m| ids.contains(&m.id));
                    taken.extend(moved);
                    g.members = stay;
                    kept.push(Entity::Group(g));
                }
                other => kept.push(other),
            }
        }
        self.entries = kept;
        taken
    }

    /// True if any of `ids` is a group member.
    pub fn any_member(&self, ids: &BTreeSet<EntityId>) -> bool {
        self.groups()
            .flat_map(|g| g.members.iter())
            .any(|m| ids.contains(&m.id))
    }
}

/// Claim `name` or a numbered variant of it. True if it had to change.
fn claim_name(
    name: &mut String,
    blank_base: &str,
    existing: &HashSet<String>,
    claimed: &mut HashSet<String>,
) -> bool {
    let trimmed = name.trim();
    let blank = trimmed.is_empty();
    let base = if blank { blank_base.trim() } else { trimmed };
    if !blank && claimed.insert(name_key(base)) {
        return false;
    }
    let free = |candidate: &str| {
        let key = name_key(candidate);
        !claimed.contains(&key) && !existing.contains(&key)
    };
    let chosen = if free(base) {
        base.to_string()
    } else {
        (2u32..)
            .map(|n| format!("{base} {n}"))
            .find(|candidate| free(candidate))
            .unwrap_or_else(|| base.to_string())
    };
    claimed.insert(name_key(&chosen));
    *name = chosen;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::entity::NewCombatant;

    fn combatant(name: &str) -> Combatant {
        NewCombatant::named(name).build(name.to_string(), &TrackerConfig::default())
    }

    fn sample() -> (Roster, EntityId, EntityId, EntityId) {
        let mut roster = Roster::new();
        let a = combatant("Aria");
        let x = combatant("Wolf");
        let mut g = Group::new("Pack", 0);
        let gid = g.id;
        let xid = x.id;
        let aid = a.id;
        g.members.push(x);
        roster.push(a);
        roster.push(g);
        (roster, aid, gid, xid)
    }

    #[test]
    fn test_repair_names_keeps_first_holder() {
        let mut roster = Roster::new();
        roster.push(combatant("Orc"));
        roster.push(combatant("orc"));
        roster.push(combatant("Orc 2"));
        let mut g = Group::new("  ", 0);
        g.members.push(combatant("ORC"));
        g.members.push(combatant(""));
        roster.push(g);

        assert_eq!(roster.repair_names("Combatant", "Group"), 4);
        let names: Vec<&str> = roster.names().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["Orc", "orc 3", "Orc 2", "Group", "ORC 4", "Combatant"]);

        assert_eq!(roster.repair_names("Combatant", "Group"), 0);
    }

    #[test]
    fn test_find_nested_member() {
        let (roster, aid, gid, xid) = sample();

        let (found, loc) = roster.find(xid).unwrap();
        assert_eq!(found.name(), "Wolf");
        assert_eq!(loc.parent, Some(gid));
        assert_eq!(loc.index, 0);

        let (_, loc) = roster.find(aid).unwrap();
        assert_eq!(loc, Location { parent: None, index: 0 });
        assert!(roster.find(EntityId::new()).is_none());
    }

    #[test]
    fn test_name_taken_is_global_and_case_insensitive() {
        let (roster, aid, _, _) = sample();
        assert!(roster.name_taken(" wolf ", None));
        assert!(roster.name_taken("PACK", None));
        assert!(!roster.name_taken("aria", Some(aid)));
        assert!(!roster.name_taken("Ogre", None));
    }

    #[test]
    fn test_unique_name_picks_lowest_free_suffix() {
        let mut roster = Roster::new();
        assert_eq!(roster.unique_name("Goblin"), "Goblin");
        roster.push(combatant("Goblin"));
        assert_eq!(roster.unique_name("Goblin"), "Goblin 2");
        roster.push(combatant("Goblin 3"));
        assert_eq!(roster.unique_name("goblin"), "goblin 2");
        roster.push(combatant("Goblin 2"));
        assert_eq!(roster.unique_name("Goblin"), "Goblin 4");
    }

    #[test]
    fn test_remove_group_cascades() {
        let (mut roster, _, gid, xid) = sample();
        let removed = roster.remove(gid).unwrap();
        assert!(removed.is_group());
        assert!(roster.combatant(xid).is_none());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_remove_member_keeps_group() {
        let (mut roster, _, gid, xid) = sample();
        roster.remove(xid).unwrap();
        assert!(roster.group(gid).unwrap().members.is_empty());
        assert!(roster.remove(xid).is_none());
    }

    #[test]
    fn test_take_combatants_in_roster_order() {
        let (mut roster, aid, gid, xid) = sample();
        let ids: BTreeSet<_> = [xid, aid].into_iter().collect();

        let members = roster.take_combatants(&ids, true);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, xid);
        roster.push(members.into_iter().next().unwrap());

        let all = roster.take_combatants(&ids, false);
        let names: Vec<_> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Aria", "Wolf"]);
        assert_eq!(roster.len(), 1);
        assert!(roster.group(gid).is_some());
    }

    #[test]
    fn test_combatants_flatten_in_order() {
        let (mut roster, _, _, _) = sample();
        roster.push(combatant("Zed"));
        let names: Vec<_> = roster.combatants().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Aria", "Wolf", "Zed"]);
    }
}
