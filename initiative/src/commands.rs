//! Tracker commands for the headless driver.
//!
//! A command line is split into words (double quotes group words, so
//! `"Goblin 2"` is one argument), parsed into a [`Command`] and run against
//! the tracker. Entities are referred to by name, case-insensitively.

use initiative_core::roster::name_key;
use initiative_core::{
    CombatTracker, CombatantPatch, EntityId, EntityRef, GroupPatch, NewCombatant, SortDirection,
    StandardCondition, TrackerError,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown command '{0}'. Type #help for help.")]
    UnknownCommand(String),

    #[error("No entity named '{0}'")]
    UnknownEntity(String),

    #[error("No condition '{condition}' on {target}")]
    UnknownCondition { target: String, condition: String },

    #[error("Not a number: '{0}'")]
    NotANumber(String),

    #[error("{0}")]
    Tracker(#[from] TrackerError),
}

/// A parsed tracker command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add {
        name: String,
        initiative: Option<i32>,
        hp: Option<i32>,
        ac: Option<i32>,
    },
    Group(String),
    Set {
        target: String,
        fields: Vec<(String, String)>,
    },
    Remove(String),
    Select(Selection),
    Move(String),
    Ungroup,
    DeleteSelected,
    Lock(bool),
    Sort(SortDirection),
    Next,
    Prev,
    Condition {
        target: String,
        name: String,
        duration: i32,
        note: Option<String>,
    },
    RemoveCondition {
        target: String,
        name: String,
    },
    Damage {
        damage: i32,
        heal: i32,
        targets: Vec<String>,
    },
    Prune,
    Conditions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    All,
    None,
    Named(Vec<String>),
}

pub const USAGE: &[(&str, &str)] = &[
    ("add <name> [init] [hp] [ac]", "Add a combatant"),
    ("group <name>", "Add an empty group"),
    ("set <name> key=value...", "Edit name, init, ac, hp, maxHp, tempHp, role"),
    ("rm <name>", "Remove a combatant or group"),
    ("select <name>...|all|none", "Replace the selection"),
    ("move <group>", "Move the selection into a group"),
    ("ungroup", "Move selected group members to the top level"),
    ("delete-selected", "Remove every selected combatant"),
    ("lock | unlock", "Freeze or allow roster edits"),
    ("sort [desc|asc]", "Sort by initiative"),
    ("next | prev", "Advance or go back one turn"),
    ("cond <name> <condition> [rounds] [note]", "Apply a condition"),
    ("uncond <name> <condition>", "Remove a condition"),
    ("dmg <damage> [heal] [name...]", "Damage then heal (default: selection)"),
    ("prune", "Drop expired conditions"),
    ("conditions", "List standard conditions"),
];

/// Split a line into words, honoring double quotes.
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_word = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                has_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        words.push(current);
    }
    words
}

fn number(raw: &str) -> Result<i32, CommandError> {
    initiative_core::patch::coerce_int(raw).ok_or_else(|| CommandError::NotANumber(raw.to_string()))
}

fn optional_number(raw: Option<&String>) -> Result<Option<i32>, CommandError> {
    raw.map(|r| number(r)).transpose()
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let words = split_words(line);
        let Some((verb, args)) = words.split_first() else {
            return Err(CommandError::UnknownCommand(String::new()));
        };
        let command = match verb.to_lowercase().as_str() {
            "add" => {
                let name = args.first().cloned().unwrap_or_default();
                Command::Add {
                    name,
                    initiative: optional_number(args.get(1))?,
                    hp: optional_number(args.get(2))?,
                    ac: optional_number(args.get(3))?,
                }
            }
            "group" => Command::Group(args.join(" ")),
            "set" => {
                let (target, pairs) = args
                    .split_first()
                    .ok_or(CommandError::Usage("set <name> key=value..."))?;
                let fields = pairs
                    .iter()
                    .map(|pair| {
                        pair.split_once('=')
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .ok_or(CommandError::Usage("set <name> key=value..."))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if fields.is_empty() {
                    return Err(CommandError::Usage("set <name> key=value..."));
                }
                Command::Set {
                    target: target.clone(),
                    fields,
                }
            }
            "rm" | "remove" => Command::Remove(single(args, "rm <name>")?),
            "select" => match args {
                [] => return Err(CommandError::Usage("select <name>...|all|none")),
                [one] if one.eq_ignore_ascii_case("all") => Command::Select(Selection::All),
                [one] if one.eq_ignore_ascii_case("none") => Command::Select(Selection::None),
                names => Command::Select(Selection::Named(names.to_vec())),
            },
            "move" => Command::Move(single(args, "move <group>")?),
            "ungroup" => Command::Ungroup,
            "delete-selected" => Command::DeleteSelected,
            "lock" => Command::Lock(true),
            "unlock" => Command::Lock(false),
            "sort" => {
                let direction = match args.first() {
                    Some(raw) => raw.parse().map_err(|_| CommandError::Usage("sort [desc|asc]"))?,
                    None => SortDirection::Descending,
                };
                Command::Sort(direction)
            }
            "next" => Command::Next,
            "prev" => Command::Prev,
            "cond" => {
                let usage = "cond <name> <condition> [rounds] [note]";
                let [target, name, rest @ ..] = args else {
                    return Err(CommandError::Usage(usage));
                };
                let duration = optional_number(rest.first())?.unwrap_or(1);
                let note = (rest.len() > 1).then(|| rest[1..].join(" "));
                Command::Condition {
                    target: target.clone(),
                    name: name.clone(),
                    duration,
                    note,
                }
            }
            "uncond" => {
                let [target, name @ ..] = args else {
                    return Err(CommandError::Usage("uncond <name> <condition>"));
                };
                if name.is_empty() {
                    return Err(CommandError::Usage("uncond <name> <condition>"));
                }
                Command::RemoveCondition {
                    target: target.clone(),
                    name: name.join(" "),
                }
            }
            "dmg" => {
                let usage = "dmg <damage> [heal] [name...]";
                let damage = number(args.first().ok_or(CommandError::Usage(usage))?)?;
                let (heal, targets) = match args.get(1).map(|raw| initiative_core::patch::coerce_int(raw)) {
                    Some(Some(heal)) => (heal, args[2..].to_vec()),
                    _ => (0, args.get(1..).map(<[String]>::to_vec).unwrap_or_default()),
                };
                Command::Damage {
                    damage,
                    heal,
                    targets,
                }
            }
            "prune" => Command::Prune,
            "conditions" => Command::Conditions,
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

fn single(args: &[String], usage: &'static str) -> Result<String, CommandError> {
    match args {
        [] => Err(CommandError::Usage(usage)),
        words => Ok(words.join(" ")),
    }
}

/// Find an entity anywhere in the roster by name.
pub fn resolve(tracker: &CombatTracker, name: &str) -> Result<EntityId, CommandError> {
    let key = name_key(name);
    tracker
        .roster()
        .names()
        .find(|(_, n)| name_key(n) == key)
        .map(|(id, _)| id)
        .ok_or_else(|| CommandError::UnknownEntity(name.to_string()))
}

/// Run a command. Returns feedback lines to print; state changes are shown
/// by the snapshot subscriber.
pub fn execute(tracker: &mut CombatTracker, command: Command) -> Result<Vec<String>, CommandError> {
    let mut out = Vec::new();
    match command {
        Command::Add {
            name,
            initiative,
            hp,
            ac,
        } => {
            let mut new = NewCombatant::named(name);
            if let Some(init) = initiative {
                new = new.with_initiative(init);
            }
            if let Some(hp) = hp {
                new = new.with_hp(hp);
            }
            if let Some(ac) = ac {
                new = new.with_armor_class(ac);
            }
            let added = tracker.add_combatant(new)?;
            out.push(format!("[ADDED] {}", added.name));
        }
        Command::Group(name) => {
            let group = tracker.add_group(&name)?;
            out.push(format!("[ADDED] group {}", group.name));
        }
        Command::Set { target, fields } => {
            let id = resolve(tracker, &target)?;
            let pairs = fields.iter().map(|(k, v)| (k.as_str(), v.as_str()));
            let is_group = matches!(tracker.find_entity(id), Some((EntityRef::Group(_), _)));
            if is_group {
                tracker.update_group(id, GroupPatch::from_fields(pairs)?)?;
            } else {
                tracker.update_combatant(id, CombatantPatch::from_fields(pairs)?)?;
            }
        }
        Command::Remove(name) => {
            let id = resolve(tracker, &name)?;
            let removed = tracker.remove_entity(id)?;
            out.push(format!("[REMOVED] {}", removed.name()));
        }
        Command::Select(selection) => match selection {
            Selection::All => tracker.select_all()?,
            Selection::None => tracker.clear_selection()?,
            Selection::Named(names) => {
                let ids = names
                    .iter()
                    .map(|n| resolve(tracker, n))
                    .collect::<Result<Vec<_>, _>>()?;
                tracker.set_selection(ids)?;
            }
        },
        Command::Move(group) => {
            let id = resolve(tracker, &group)?;
            let moved = tracker.move_selected_to_group(id)?;
            out.push(format!("[MOVED] {moved} into {group}"));
        }
        Command::Ungroup => {
            let moved = tracker.ungroup_selected()?;
            out.push(format!("[MOVED] {moved} to top level"));
        }
        Command::DeleteSelected => {
            let removed = tracker.delete_selected()?;
            out.push(format!("[REMOVED] {removed} combatants"));
        }
        Command::Lock(locked) => tracker.set_locked(locked),
        Command::Sort(direction) => tracker.sort_by_initiative(direction)?,
        Command::Next => {
            tracker.advance_turn()?;
        }
        Command::Prev => {
            tracker.retreat_turn()?;
        }
        Command::Condition {
            target,
            name,
            duration,
            note,
        } => {
            let id = resolve(tracker, &target)?;
            let name = StandardCondition::from_name(&name)
                .map(|c| c.name().to_string())
                .unwrap_or(name);
            tracker.add_condition(id, &name, duration, note.as_deref())?;
        }
        Command::RemoveCondition { target, name } => {
            let id = resolve(tracker, &target)?;
            let condition_id = tracker
                .combatant(id)
                .and_then(|c| {
                    c.conditions
                        .iter()
                        .find(|cond| cond.name.eq_ignore_ascii_case(name.trim()))
                })
                .map(|cond| cond.id)
                .ok_or_else(|| CommandError::UnknownCondition {
                    target: target.clone(),
                    condition: name.clone(),
                })?;
            tracker.remove_condition(id, condition_id)?;
        }
        Command::Damage {
            damage,
            heal,
            targets,
        } => {
            let ids = if targets.is_empty() {
                tracker.selection()
            } else {
                targets
                    .iter()
                    .map(|n| resolve(tracker, n))
                    .collect::<Result<Vec<_>, _>>()?
            };
            for outcome in tracker.apply_damage_and_heal(&ids, damage, heal)? {
                let name = tracker
                    .combatant(outcome.target_id)
                    .map(|c| c.name.as_str())
                    .unwrap_or("?");
                let mut line = format!(
                    "[DAMAGE] {name}: -{} HP, -{} temp, +{} healed",
                    outcome.hp_lost, outcome.temp_absorbed, outcome.hp_healed
                );
                if outcome.dropped_to_zero {
                    line.push_str(" (down)");
                }
                if outcome.revived {
                    line.push_str(" (back up)");
                }
                out.push(line);
            }
        }
        Command::Prune => {
            let pruned = tracker.prune_expired_conditions();
            out.push(format!("[PRUNED] {pruned} expired conditions"));
        }
        Command::Conditions => {
            let names: Vec<_> = StandardCondition::all().iter().map(|c| c.name()).collect();
            out.push(format!("[CONDITIONS] {}", names.join(", ")));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(tracker: &mut CombatTracker, line: &str) -> Result<Vec<String>, CommandError> {
        execute(tracker, Command::parse(line)?)
    }

    #[test]
    fn test_split_words_quotes() {
        assert_eq!(
            split_words(r#"cond "Goblin 2" poisoned 3 "from a dart""#),
            vec!["cond", "Goblin 2", "poisoned", "3", "from a dart"]
        );
        assert_eq!(split_words(r#"group """#), vec!["group", ""]);
        assert!(split_words("   ").is_empty());
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("add Ogre 10 30").unwrap(),
            Command::Add {
                name: "Ogre".to_string(),
                initiative: Some(10),
                hp: Some(30),
                ac: None
            }
        );
        assert_eq!(
            Command::parse("sort asc").unwrap(),
            Command::Sort(SortDirection::Ascending)
        );
        assert_eq!(
            Command::parse("dmg 5 Ogre").unwrap(),
            Command::Damage {
                damage: 5,
                heal: 0,
                targets: vec!["Ogre".to_string()]
            }
        );
        assert_eq!(
            Command::parse("dmg 5 2").unwrap(),
            Command::Damage {
                damage: 5,
                heal: 2,
                targets: vec![]
            }
        );
        assert_eq!(
            Command::parse("add Ogre ten"),
            Err(CommandError::NotANumber("ten".to_string()))
        );
        assert_eq!(
            Command::parse("fly away"),
            Err(CommandError::UnknownCommand("fly".to_string()))
        );
        assert_eq!(
            Command::parse("set Ogre"),
            Err(CommandError::Usage("set <name> key=value..."))
        );
    }

    #[test]
    fn test_session_flow() {
        let mut tracker = CombatTracker::default();
        run(&mut tracker, "add Ogre 10 30").unwrap();
        run(&mut tracker, "add Goblin 5").unwrap();
        run(&mut tracker, "add Goblin 5").unwrap();
        run(&mut tracker, "group Goblins").unwrap();
        run(&mut tracker, r#"select goblin "Goblin 2""#).unwrap();
        run(&mut tracker, "move goblins").unwrap();
        run(&mut tracker, "set Goblins init=5").unwrap();
        run(&mut tracker, "sort").unwrap();

        let names: Vec<_> = tracker
            .roster()
            .entries()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["Ogre", "Goblins"]);

        run(&mut tracker, "cond ogre frightened 2").unwrap();
        let ogre = resolve(&tracker, "ogre").unwrap();
        assert_eq!(tracker.combatant(ogre).unwrap().conditions[0].name, "Frightened");

        let lines = run(&mut tracker, "dmg 12 0 Ogre").unwrap();
        assert_eq!(lines, vec!["[DAMAGE] Ogre: -12 HP, -0 temp, +0 healed"]);

        run(&mut tracker, "uncond ogre FRIGHTENED").unwrap();
        assert!(tracker.combatant(ogre).unwrap().conditions.is_empty());
    }

    #[test]
    fn test_errors_surface() {
        let mut tracker = CombatTracker::default();
        assert_eq!(
            run(&mut tracker, "rm Nobody"),
            Err(CommandError::UnknownEntity("Nobody".to_string()))
        );
        assert_eq!(
            run(&mut tracker, "next"),
            Err(CommandError::Tracker(TrackerError::EmptyTurnOrder))
        );
        run(&mut tracker, "add Ogre").unwrap();
        assert_eq!(
            run(&mut tracker, "set Ogre speed=30"),
            Err(CommandError::Tracker(TrackerError::UnknownField(
                "speed".to_string()
            )))
        );
        run(&mut tracker, "lock").unwrap();
        assert_eq!(
            run(&mut tracker, "add Troll"),
            Err(CommandError::Tracker(TrackerError::Locked))
        );
    }
}
