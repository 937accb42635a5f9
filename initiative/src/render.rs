//! Plain-text rendering of tracker snapshots.

use initiative_core::{Combatant, Entity, EntityId, Snapshot, TurnClock};
use std::fmt::Write;

/// Render a snapshot as a compact table.
///
/// `>` marks the current turn and `*` the selection.
pub fn table(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let current = snapshot.turn_order.get(snapshot.turn_pointer).copied();
    let turn = snapshot.current_turn_name.as_deref().unwrap_or("-");
    let lock = if snapshot.locked { " | LOCKED" } else { "" };
    let _ = writeln!(out, "=== {} | Turn: {turn}{lock} ===", snapshot.round_label);

    if snapshot.roster.is_empty() {
        let _ = writeln!(out, "  (empty roster)");
    }
    for entry in snapshot.roster.entries() {
        match entry {
            Entity::Combatant(c) => {
                let _ = writeln!(out, "{}", combatant_line(snapshot, c, current, 0));
            }
            Entity::Group(g) => {
                let init = g
                    .initiative
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let color = g.color().unwrap_or("none");
                let _ = writeln!(
                    out,
                    "  [{}] init {init} ({color}, {} members)",
                    g.name,
                    g.members.len()
                );
                for member in &g.members {
                    let _ = writeln!(out, "{}", combatant_line(snapshot, member, current, 4));
                }
            }
        }
    }
    out
}

fn combatant_line(
    snapshot: &Snapshot,
    c: &Combatant,
    current: Option<EntityId>,
    indent: usize,
) -> String {
    let turn_mark = if current == Some(c.id) { '>' } else { ' ' };
    let select_mark = if snapshot.is_selected(c.id) { '*' } else { ' ' };
    let mut line = format!(
        "{turn_mark}{select_mark}{:indent$}{:<18} init {:>3}  AC {:>2}  HP {}/{}",
        "", c.name, c.initiative, c.armor_class, c.hit_points, c.max_hit_points
    );
    if c.temporary_hit_points > 0 {
        let _ = write!(line, " +{} temp", c.temporary_hit_points);
    }
    if c.is_out {
        line.push_str("  OUT");
    }
    let conditions = condition_summary(snapshot, c);
    if !conditions.is_empty() {
        let _ = write!(line, "  {}", conditions.join(", "));
    }
    line
}

/// Active conditions with their remaining turns, e.g. "Poisoned(2)".
fn condition_summary(snapshot: &Snapshot, c: &Combatant) -> Vec<String> {
    let now = TurnClock::new(snapshot.current_round, snapshot.turn_pointer);
    let owner_index = snapshot.turn_order.iter().position(|id| *id == c.id);
    c.conditions
        .iter()
        .filter_map(|cond| {
            let status = cond.status(now, owner_index);
            status
                .active
                .then(|| format!("{}({})", cond.name, status.remaining))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use initiative_core::{CombatTracker, NewCombatant};

    #[test]
    fn test_table_marks_turn_selection_and_conditions() {
        let mut tracker = CombatTracker::default();
        let ogre = tracker
            .add_combatant(NewCombatant::named("Ogre").with_initiative(10).with_hp(30))
            .unwrap();
        let goblin = tracker
            .add_combatant(NewCombatant::named("Goblin").with_temp_hp(3))
            .unwrap();
        let group = tracker.add_group("Wolves").unwrap();
        tracker.set_selection([goblin.id]).unwrap();
        tracker.add_condition(ogre.id, "Poisoned", 2, None).unwrap();

        let text = table(&tracker.snapshot());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "=== Round 1 | Turn: Ogre ===");
        assert!(lines[1].starts_with("> Ogre"));
        assert!(lines[1].ends_with("Poisoned(2)"));
        assert!(lines[2].starts_with(" *Goblin"));
        assert!(lines[2].contains("+3 temp"));
        assert!(lines[3].contains(&format!("[{}] init -", group.name)));
    }

    #[test]
    fn test_table_empty_and_locked() {
        let mut tracker = CombatTracker::default();
        tracker.set_locked(true);
        let text = table(&tracker.snapshot());
        assert!(text.starts_with("=== Round 1 | Turn: - | LOCKED ==="));
        assert!(text.contains("(empty roster)"));
    }
}
