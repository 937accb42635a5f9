//! Turn order, round counting and initiative sorting.
//!
//! Turn order is never stored. It is derived from the roster on demand:
//! top-level combatants and group members in roster order, with anyone at
//! 0 HP or below left out.

use crate::entity::{Entity, EntityId};
use crate::roster::Roster;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A point in combat time: round number and turn pointer.
///
/// Ordered lexicographically, round first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TurnClock {
    pub round: u32,
    pub pointer: usize,
}

impl TurnClock {
    pub fn new(round: u32, pointer: usize) -> Self {
        Self { round, pointer }
    }

    /// Move to the next turn, wrapping into a new round.
    ///
    /// Returns false (and does nothing) when nobody can act.
    pub fn advance(&mut self, order_len: usize) -> bool {
        if order_len == 0 {
            return false;
        }
        self.pointer += 1;
        if self.pointer >= order_len {
            self.pointer = 0;
            self.round = self.round.saturating_add(1);
        }
        true
    }

    /// Move to the previous turn, wrapping into the previous round.
    ///
    /// The round never drops below 1.
    pub fn retreat(&mut self, order_len: usize) -> bool {
        if order_len == 0 {
            return false;
        }
        if self.pointer == 0 || self.pointer >= order_len {
            self.pointer = order_len - 1;
            self.round = self.round.saturating_sub(1).max(1);
        } else {
            self.pointer -= 1;
        }
        true
    }

    /// Keep the pointer inside `[0, order_len - 1]`, or 0 when empty.
    pub fn clamp_to(&mut self, order_len: usize) {
        self.pointer = clamp_pointer(self.pointer, order_len);
    }
}

impl Default for TurnClock {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

pub fn clamp_pointer(pointer: usize, order_len: usize) -> usize {
    pointer.min(order_len.saturating_sub(1))
}

/// Combatant ids eligible to act, in turn order.
pub fn turn_order(roster: &Roster) -> Vec<EntityId> {
    roster
        .combatants()
        .filter(|c| !c.is_out)
        .map(|c| c.id)
        .collect()
}

// ============================================================================
// Initiative Sorting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Highest initiative first.
    #[default]
    Descending,
    Ascending,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "desc" | "descending" => Ok(SortDirection::Descending),
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            other => Err(format!("Unknown sort direction: '{other}'. Use asc or desc")),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Descending => write!(f, "desc"),
            SortDirection::Ascending => write!(f, "asc"),
        }
    }
}

/// Stable sort of the top-level roster by initiative, then name.
///
/// Group members keep their order; a group moves as one unit by its own
/// initiative. Entities without initiative go last in either direction.
pub fn sort_roster(roster: &mut Roster, direction: SortDirection) {
    roster
        .entries_mut()
        .sort_by(|a, b| compare_entities(a, b, direction));
}

fn compare_entities(a: &Entity, b: &Entity, direction: SortDirection) -> Ordering {
    let ka = initiative_key(a, direction);
    let kb = initiative_key(b, direction);
    let primary = match direction {
        SortDirection::Descending => kb.cmp(&ka),
        SortDirection::Ascending => ka.cmp(&kb),
    };
    primary.then_with(|| compare_names(a.name(), b.name()))
}

fn initiative_key(entity: &Entity, direction: SortDirection) -> i64 {
    match entity.initiative() {
        Some(init) => i64::from(init),
        None => match direction {
            SortDirection::Descending => i64::MIN,
            SortDirection::Ascending => i64::MAX,
        },
    }
}

/// A name split into a lowercase base and an optional trailing number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameKey {
    pub base: String,
    pub number: Option<u64>,
}

impl NameKey {
    /// "Goblin 10" becomes base "goblin", number 10.
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        let digits_start = trimmed
            .char_indices()
            .rev()
            .take_while(|(_, ch)| ch.is_ascii_digit())
            .last()
            .map(|(i, _)| i);
        let (base, number) = match digits_start {
            Some(i) => match trimmed[i..].parse::<u64>() {
                Ok(n) => (&trimmed[..i], Some(n)),
                Err(_) => (trimmed, None),
            },
            None => (trimmed, None),
        };
        Self {
            base: base.trim_end().to_lowercase(),
            number,
        }
    }
}

/// Name ordering used to break initiative ties.
///
/// Same base: an unnumbered name comes first (it is the implicit first of
/// its series), then numbered names in numeric order. Falls back to plain
/// comparison of the full names.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let ka = NameKey::parse(a);
    let kb = NameKey::parse(b);
    ka.base
        .cmp(&kb.base)
        .then_with(|| match (ka.number, kb.number) {
            (Some(x), Some(y)) => x.cmp(&y),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::entity::{Group, NewCombatant};

    fn add(roster: &mut Roster, name: &str, init: i32) -> EntityId {
        let c = NewCombatant::named(name)
            .with_initiative(init)
            .build(name.to_string(), &TrackerConfig::default());
        let id = c.id;
        roster.push(c);
        id
    }

    fn names(roster: &Roster) -> Vec<&str> {
        roster.entries().iter().map(Entity::name).collect()
    }

    #[test]
    fn test_advance_wraps_and_counts_rounds() {
        let mut clock = TurnClock::default();
        for _ in 0..3 {
            assert!(clock.advance(3));
        }
        assert_eq!(clock, TurnClock::new(2, 0));
        assert!(!clock.advance(0));
        assert_eq!(clock, TurnClock::new(2, 0));
    }

    #[test]
    fn test_retreat_floors_round_at_one() {
        let mut clock = TurnClock::default();
        assert!(clock.retreat(3));
        assert_eq!(clock, TurnClock::new(1, 2));

        let mut clock = TurnClock::new(3, 0);
        clock.retreat(3);
        assert_eq!(clock, TurnClock::new(2, 2));
    }

    #[test]
    fn test_retreat_undoes_advance() {
        let start = TurnClock::new(2, 1);
        let mut clock = start;
        for _ in 0..7 {
            clock.advance(4);
        }
        for _ in 0..7 {
            clock.retreat(4);
        }
        assert_eq!(clock, start);
    }

    #[test]
    fn test_clamp_pointer() {
        assert_eq!(clamp_pointer(5, 3), 2);
        assert_eq!(clamp_pointer(1, 3), 1);
        assert_eq!(clamp_pointer(4, 0), 0);

        let mut clock = TurnClock::new(2, 7);
        clock.clamp_to(3);
        assert_eq!(clock, TurnClock::new(2, 2));
        clock.clamp_to(0);
        assert_eq!(clock, TurnClock::new(2, 0));
    }

    #[test]
    fn test_advance_at_last_round_saturates() {
        let mut clock = TurnClock::new(u32::MAX, 1);
        assert!(clock.advance(2));
        assert_eq!(clock, TurnClock::new(u32::MAX, 0));
        assert!(clock.round >= 1);
    }

    #[test]
    fn test_turn_order_skips_out_and_flattens_groups() {
        let mut roster = Roster::new();
        let a = add(&mut roster, "A", 1);
        let config = TrackerConfig::default();
        let mut g = Group::new("G", 0);
        let x = NewCombatant::named("X").build("X".to_string(), &config);
        let y = NewCombatant::named("Y")
            .with_current_hp(0)
            .build("Y".to_string(), &config);
        let xid = x.id;
        g.members.push(x);
        g.members.push(y);
        roster.push(g);
        let b = add(&mut roster, "B", 1);

        assert_eq!(turn_order(&roster), vec![a, xid, b]);
    }

    #[test]
    fn test_name_key_parse() {
        assert_eq!(
            NameKey::parse("Goblin 10"),
            NameKey {
                base: "goblin".to_string(),
                number: Some(10)
            }
        );
        assert_eq!(NameKey::parse("Ogre").number, None);
        assert_eq!(NameKey::parse("Orc7").base, "orc");
        assert_eq!(NameKey::parse("42").base, "");
    }

    #[test]
    fn test_numbered_names_sort_numerically() {
        assert_eq!(compare_names("Goblin 2", "Goblin 10"), Ordering::Less);
        assert_eq!(compare_names("Goblin", "Goblin 2"), Ordering::Less);
        assert_eq!(compare_names("Bandit 3", "Goblin"), Ordering::Less);
    }

    #[test]
    fn test_sort_descending_with_ties() {
        let mut roster = Roster::new();
        add(&mut roster, "Goblin 2", 5);
        add(&mut roster, "Goblin", 5);
        add(&mut roster, "Ogre", 10);
        add(&mut roster, "Goblin 10", 5);

        sort_roster(&mut roster, SortDirection::Descending);
        assert_eq!(names(&roster), vec!["Ogre", "Goblin", "Goblin 2", "Goblin 10"]);

        sort_roster(&mut roster, SortDirection::Ascending);
        assert_eq!(names(&roster), vec!["Goblin", "Goblin 2", "Goblin 10", "Ogre"]);
    }

    #[test]
    fn test_unset_group_initiative_sorts_last() {
        let mut roster = Roster::new();
        roster.push(Group::new("Unset", 0));
        add(&mut roster, "Low", -5);
        add(&mut roster, "High", 20);

        sort_roster(&mut roster, SortDirection::Descending);
        assert_eq!(names(&roster), vec!["High", "Low", "Unset"]);

        sort_roster(&mut roster, SortDirection::Ascending);
        assert_eq!(names(&roster), vec!["Low", "High", "Unset"]);
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!("DESC".parse::<SortDirection>(), Ok(SortDirection::Descending));
        assert_eq!("asc".parse::<SortDirection>(), Ok(SortDirection::Ascending));
        assert!("up".parse::<SortDirection>().is_err());
    }
}
