//! Encounter persistence.
//!
//! [`ExportedState`] is the plain-data shape of a tracker: roster, round and
//! turn pointer. [`SavedEncounter`] wraps it with a name and metadata for
//! JSON files on disk.

use crate::entity::{Entity, EntityId};
use crate::lenient;
use crate::roster::Roster;
use crate::turn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::warn;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid save format")]
    InvalidFormat,

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save format version.
pub const SAVE_VERSION: u32 = 1;

// ============================================================================
// Exported State
// ============================================================================

/// Everything needed to restore a tracker.
///
/// Selection and lock are session state and are not included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedState {
    pub version: u32,
    #[serde(default)]
    pub roster: Roster,
    #[serde(default = "default_round")]
    pub current_round: u32,
    #[serde(default)]
    pub turn_pointer: usize,
}

fn default_round() -> u32 {
    1
}

impl Default for ExportedState {
    fn default() -> Self {
        Self {
            version: SAVE_VERSION,
            roster: Roster::new(),
            current_round: 1,
            turn_pointer: 0,
        }
    }
}

impl ExportedState {
    /// Decode a loosely shaped payload.
    ///
    /// Roster entries are decoded one at a time and bad ones are skipped.
    /// A missing or unusable round becomes 1 and a bad pointer becomes 0.
    /// Only a newer `version` is fatal.
    pub fn from_value(value: Value) -> Result<Self, PersistError> {
        let Value::Object(mut fields) = value else {
            return Err(PersistError::InvalidFormat);
        };

        if let Some(found) = fields.get("version").and_then(lenient::number) {
            if found > f64::from(SAVE_VERSION) {
                return Err(PersistError::VersionMismatch {
                    expected: SAVE_VERSION,
                    found: found.min(f64::from(u32::MAX)) as u32,
                });
            }
        }

        let current_round = fields
            .get("currentRound")
            .and_then(lenient::number)
            .filter(|r| *r >= 1.0)
            .map(|r| r.min(f64::from(u32::MAX)) as u32)
            .unwrap_or(1);
        let turn_pointer = fields
            .get("turnPointer")
            .and_then(lenient::number)
            .filter(|p| *p >= 0.0)
            .map(|p| p as usize)
            .unwrap_or(0);

        let entries = match fields.remove("roster") {
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                warn!(kind = value_kind(&other), "roster is not a list, starting empty");
                Vec::new()
            }
            None => Vec::new(),
        };

        Ok(Self {
            version: SAVE_VERSION,
            roster: decode_roster(entries),
            current_round,
            turn_pointer,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn decode_roster(entries: Vec<Value>) -> Roster {
    let mut seen: HashSet<EntityId> = HashSet::new();
    let mut roster = Roster::new();
    for (index, raw) in entries.into_iter().enumerate() {
        let entity = match serde_json::from_value::<Entity>(raw) {
            Ok(entity) => entity,
            Err(err) => {
                warn!(index, error = %err, "skipping unreadable roster entry");
                continue;
            }
        };
        let ids: Vec<EntityId> = match &entity {
            Entity::Combatant(c) => vec![c.id],
            Entity::Group(g) => std::iter::once(g.id)
                .chain(g.members.iter().map(|m| m.id))
                .collect(),
        };
        if ids.iter().any(|id| seen.contains(id)) {
            warn!(index, name = entity.name(), "skipping roster entry with duplicate id");
            continue;
        }
        seen.extend(ids);
        roster.push(entity);
    }
    for combatant in roster.combatants_mut() {
        combatant.normalize();
    }
    roster
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Encounter Files
// ============================================================================

/// A saved encounter file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedEncounter {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created (seconds since the Unix epoch).
    pub saved_at: String,

    pub name: String,

    pub state: ExportedState,

    pub metadata: EncounterMetadata,
}

/// Summary readable without decoding the whole roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterMetadata {
    pub name: String,
    pub round: u32,
    pub combatant_count: usize,
    pub group_count: usize,

    /// Whose turn it was when saved.
    #[serde(default)]
    pub current_turn: Option<String>,

    #[serde(default)]
    pub saved_at: String,
}

impl SavedEncounter {
    pub fn new(name: impl Into<String>, state: ExportedState) -> Self {
        let name = name.into();
        let saved_at = chrono_now();
        let current_turn = turn::turn_order(&state.roster)
            .get(state.turn_pointer)
            .and_then(|id| state.roster.combatant(*id))
            .map(|c| c.name.clone());
        let metadata = EncounterMetadata {
            name: name.clone(),
            round: state.current_round,
            combatant_count: state.roster.combatants().count(),
            group_count: state.roster.groups().count(),
            current_turn,
            saved_at: saved_at.clone(),
        };

        Self {
            version: SAVE_VERSION,
            saved_at,
            name,
            state,
            metadata,
        }
    }

    /// Save to a JSON file, creating parent directories as needed.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }

    /// Read only the metadata of a save file.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<EncounterMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: EncounterMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;

        if partial.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }

        Ok(partial.metadata)
    }
}

/// A save file found by [`list_saves`].
#[derive(Debug, Clone)]
pub struct SaveInfo {
    pub path: PathBuf,
    pub metadata: EncounterMetadata,
}

/// List readable encounter saves in a directory, newest first.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let mut saves = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Ok(metadata) = SavedEncounter::peek_metadata(&path).await {
                saves.push(SaveInfo { path, metadata });
            }
        }
    }

    saves.sort_by(|a, b| {
        b.metadata
            .saved_at
            .cmp(&a.metadata.saved_at)
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(saves)
}

fn sanitize(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "encounter".to_string()
    } else {
        sanitized
    }
}

/// `<dir>/<name>.json`
pub fn encounter_save_path(base_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    base_dir.as_ref().join(format!("{}.json", sanitize(name)))
}

/// `<dir>/<name>_autosave.json`
pub fn autosave_path(base_dir: impl AsRef<Path>, name: &str) -> PathBuf {
    base_dir
        .as_ref()
        .join(format!("{}_autosave.json", sanitize(name)))
}

/// Current timestamp as seconds since the Unix epoch.
fn chrono_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn combatant_json(name: &str, hp: i64) -> Value {
        json!({
            "type": "combatant",
            "id": uuid::Uuid::new_v4(),
            "name": name,
            "initiative": 12,
            "armorClass": 14,
            "hitPoints": hp,
            "maxHitPoints": 20,
            "role": "monster"
        })
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let state = ExportedState::from_value(json!({})).unwrap();
        assert_eq!(state, ExportedState::default());
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            ExportedState::from_value(json!([1, 2])),
            Err(PersistError::InvalidFormat)
        ));
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = ExportedState::from_value(json!({"version": 2})).unwrap_err();
        assert!(matches!(
            err,
            PersistError::VersionMismatch {
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let state = ExportedState::from_value(json!({
            "version": 1,
            "currentRound": "soon",
            "turnPointer": -3
        }))
        .unwrap();
        assert_eq!(state.current_round, 1);
        assert_eq!(state.turn_pointer, 0);

        let state =
            ExportedState::from_value(json!({"currentRound": "4", "turnPointer": 2.0})).unwrap();
        assert_eq!(state.current_round, 4);
        assert_eq!(state.turn_pointer, 2);
    }

    #[test]
    fn test_bad_entries_skipped() {
        let good = combatant_json("Orc", 9);
        let state = ExportedState::from_value(json!({
            "roster": [good, {"type": "dragon"}, 7, {"name": "No type"}]
        }))
        .unwrap();
        assert_eq!(state.roster.len(), 1);
        assert_eq!(state.roster.entries()[0].name(), "Orc");
    }

    #[test]
    fn test_duplicate_ids_skipped() {
        let entry = combatant_json("Orc", 9);
        let state = ExportedState::from_value(json!({"roster": [entry.clone(), entry]})).unwrap();
        assert_eq!(state.roster.len(), 1);
    }

    #[test]
    fn test_paths_are_sanitized() {
        let dir = Path::new("/saves");
        assert_eq!(
            encounter_save_path(dir, "Goblin Ambush!"),
            PathBuf::from("/saves/Goblin_Ambush_.json")
        );
        assert_eq!(
            autosave_path(dir, "  "),
            PathBuf::from("/saves/encounter_autosave.json")
        );
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let state = ExportedState::from_value(json!({
            "roster": [combatant_json("Orc", 9), combatant_json("Troll", 0)],
            "currentRound": 3,
            "turnPointer": 0
        }))
        .unwrap();

        let saved = SavedEncounter::new("Bridge", state.clone());
        assert_eq!(saved.metadata.combatant_count, 2);
        assert_eq!(saved.metadata.current_turn.as_deref(), Some("Orc"));

        let path = encounter_save_path(temp_dir.path().join("nested"), "Bridge");
        saved.save_json(&path).await.unwrap();

        let loaded = SavedEncounter::load_json(&path).await.unwrap();
        assert_eq!(loaded.name, "Bridge");
        assert_eq!(loaded.state, state);

        let metadata = SavedEncounter::peek_metadata(&path).await.unwrap();
        assert_eq!(metadata.round, 3);
    }

    #[tokio::test]
    async fn test_load_rejects_other_version() {
        let temp_dir = TempDir::new().unwrap();
        let mut saved = SavedEncounter::new("Old", ExportedState::default());
        saved.version = 9;
        let path = temp_dir.path().join("old.json");
        saved.save_json(&path).await.unwrap();

        assert!(matches!(
            SavedEncounter::load_json(&path).await,
            Err(PersistError::VersionMismatch { found: 9, .. })
        ));
    }

    #[tokio::test]
    async fn test_list_saves_skips_junk() {
        let temp_dir = TempDir::new().unwrap();
        SavedEncounter::new("One", ExportedState::default())
            .save_json(encounter_save_path(temp_dir.path(), "One"))
            .await
            .unwrap();
        SavedEncounter::new("Two", ExportedState::default())
            .save_json(autosave_path(temp_dir.path(), "Two"))
            .await
            .unwrap();
        fs::write(temp_dir.path().join("notes.json"), "{ nope")
            .await
            .unwrap();
        fs::write(temp_dir.path().join("readme.txt"), "hi")
            .await
            .unwrap();

        let saves = list_saves(temp_dir.path()).await.unwrap();
        let mut names: Vec<_> = saves.iter().map(|s| s.metadata.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["One", "Two"]);
    }
}
