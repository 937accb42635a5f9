//! Headless mode for the initiative tracker.
//!
//! A line-oriented driver for scripted sessions and manual testing. It is an
//! ordinary tracker collaborator: it subscribes to snapshots to print the
//! table and calls mutators for each command line.

use crate::commands::{self, Command, USAGE};
use crate::render;
use initiative_core::persist::{autosave_path, encounter_save_path, list_saves};
use initiative_core::{Autosave, CombatTracker, PersistError, SavedEncounter, TrackerConfig};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// How often pending autosaves are checked.
const AUTOSAVE_TICK: Duration = Duration::from_millis(100);

/// Configuration for a headless session.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Directory for saves and autosaves.
    pub save_dir: PathBuf,

    /// Encounter name, used for file names.
    pub encounter: String,

    /// Save file to load on startup.
    pub load: Option<PathBuf>,

    /// `None` disables autosave.
    pub autosave_debounce: Option<Duration>,
}

impl DriverConfig {
    pub fn new() -> Self {
        Self {
            save_dir: PathBuf::from("saves"),
            encounter: "encounter".to_string(),
            load: None,
            autosave_debounce: Some(TrackerConfig::new().autosave_debounce),
        }
    }

    /// Start from defaults overridden by `INITIATIVE_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Ok(dir) = std::env::var("INITIATIVE_SAVE_DIR") {
            config = config.with_save_dir(dir);
        }
        if let Ok(name) = std::env::var("INITIATIVE_ENCOUNTER") {
            config = config.with_encounter(name);
        }
        if let Ok(ms) = std::env::var("INITIATIVE_AUTOSAVE_MS") {
            config = config.with_autosave_ms(&ms);
        }
        config
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_dir = dir.into();
        self
    }

    pub fn with_encounter(mut self, name: impl Into<String>) -> Self {
        self.encounter = name.into();
        self
    }

    /// `0` disables autosave; unparseable values are ignored.
    pub fn with_autosave_ms(mut self, raw: &str) -> Self {
        match raw.trim().parse::<u64>() {
            Ok(0) => self.autosave_debounce = None,
            Ok(ms) => self.autosave_debounce = Some(Duration::from_millis(ms)),
            Err(_) => warn!(value = raw, "ignoring invalid autosave interval"),
        }
        self
    }

    fn tracker_config(&self) -> TrackerConfig {
        let config = TrackerConfig::new();
        match self.autosave_debounce {
            Some(debounce) => config.with_autosave_debounce(debounce),
            None => config,
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply command line flags on top of `config`.
pub fn parse_config_from_args(args: &[String], mut config: DriverConfig) -> DriverConfig {
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--dir" => {
                if let Some(dir) = args.get(i + 1) {
                    config.save_dir = PathBuf::from(dir);
                    i += 1;
                }
            }
            "--name" => {
                if let Some(name) = args.get(i + 1) {
                    config.encounter = name.clone();
                    i += 1;
                }
            }
            "--load" => {
                if let Some(path) = args.get(i + 1) {
                    config.load = Some(PathBuf::from(path));
                    i += 1;
                }
            }
            "--autosave-ms" => {
                if let Some(ms) = args.get(i + 1) {
                    config = config.with_autosave_ms(ms);
                    i += 1;
                }
            }
            "--no-autosave" => config.autosave_debounce = None,
            _ => {}
        }
        i += 1;
    }
    config
}

/// Load a saved encounter, or a bare exported state, into the tracker.
async fn load_into(tracker: &mut CombatTracker, path: &Path) -> Result<(), PersistError> {
    match SavedEncounter::load_json(path).await {
        Ok(saved) => {
            tracker.import_state(saved.state);
            Ok(())
        }
        Err(PersistError::Json(_)) => {
            let content = tokio::fs::read_to_string(path).await?;
            tracker.import_json(&content)
        }
        Err(e) => Err(e),
    }
}

async fn save_to(tracker: &CombatTracker, name: &str, path: &Path) -> Result<(), PersistError> {
    SavedEncounter::new(name, tracker.export_state())
        .save_json(path)
        .await
}

fn print_help() {
    println!("[HELP]");
    println!("  #quit          - Exit");
    println!("  #save [path]   - Save the encounter");
    println!("  #load <path>   - Load a saved encounter");
    println!("  #list          - List saves in the save directory");
    println!("  #status        - Show round, turn and selection");
    println!("  #help          - Show this help");
    for (usage, what) in USAGE {
        println!("  {usage:<40} - {what}");
    }
}

/// Run the tracker in headless mode until `#quit` or end of input.
pub async fn run_headless(config: DriverConfig) -> Result<(), PersistError> {
    let mut tracker = CombatTracker::new(config.tracker_config());

    if let Some(path) = &config.load {
        load_into(&mut tracker, path).await?;
        info!(path = %path.display(), "encounter loaded");
    }

    println!("=== Initiative Headless Mode ===");
    println!("Encounter: {}", config.encounter);
    println!("Save directory: {}", config.save_dir.display());
    println!("Type #help for commands.");
    println!();

    tracker.subscribe(|snapshot| print!("{}", render::table(snapshot)));

    let mut autosave = config
        .autosave_debounce
        .map(|debounce| Autosave::with_debounce(&mut tracker, debounce));
    let autosave_file = autosave_path(&config.save_dir, &config.encounter);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(AUTOSAVE_TICK);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("Error reading input: {e}");
                        break;
                    }
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(rest) = line.strip_prefix('#') {
                    let parts: Vec<&str> = rest.split_whitespace().collect();
                    let arg = parts.get(1).map(PathBuf::from);
                    match parts.first().copied() {
                        Some("quit") | Some("exit") => {
                            println!("Goodbye!");
                            break;
                        }
                        Some("save") => {
                            let path = arg.unwrap_or_else(|| {
                                encounter_save_path(&config.save_dir, &config.encounter)
                            });
                            match save_to(&tracker, &config.encounter, &path).await {
                                Ok(()) => println!("[SAVED] {}", path.display()),
                                Err(e) => println!("[ERROR] Save failed: {e}"),
                            }
                        }
                        Some("load") => match arg {
                            Some(path) => match load_into(&mut tracker, &path).await {
                                Ok(()) => println!("[LOADED] {}", path.display()),
                                Err(e) => println!("[ERROR] Load failed: {e}"),
                            },
                            None => println!("[ERROR] Usage: #load <path>"),
                        },
                        Some("list") => match list_saves(&config.save_dir).await {
                            Ok(saves) if saves.is_empty() => println!("[SAVES] none"),
                            Ok(saves) => {
                                println!("[SAVES]");
                                for save in saves {
                                    println!(
                                        "  {} - {}, round {}, {} combatants",
                                        save.path.display(),
                                        save.metadata.name,
                                        save.metadata.round,
                                        save.metadata.combatant_count
                                    );
                                }
                            }
                            Err(e) => println!("[ERROR] {e}"),
                        },
                        Some("status") => {
                            println!("[STATUS]");
                            println!("  {}", tracker.round_label());
                            println!(
                                "  Turn: {}",
                                tracker.current_combatant().map(|c| c.name.as_str()).unwrap_or("-")
                            );
                            println!("  Entries: {}", tracker.roster().len());
                            println!("  Selected: {}", tracker.selection().len());
                            println!("  Locked: {}", tracker.is_locked());
                        }
                        Some("help") => print_help(),
                        _ => println!("[ERROR] Unknown command. Type #help for help."),
                    }
                    continue;
                }

                match Command::parse(line).and_then(|cmd| commands::execute(&mut tracker, cmd)) {
                    Ok(feedback) => {
                        for message in feedback {
                            println!("{message}");
                        }
                    }
                    Err(e) => println!("[ERROR] {e}"),
                }
            }
            _ = ticker.tick() => {
                if let Some(autosave) = autosave.as_mut() {
                    if let Some(state) = autosave.poll(&tracker, Instant::now()) {
                        write_autosave(&config.encounter, state, &autosave_file).await;
                    }
                }
            }
        }
    }

    if let Some(autosave) = autosave.as_mut() {
        if let Some(state) = autosave.flush(&tracker) {
            write_autosave(&config.encounter, state, &autosave_file).await;
        }
    }
    Ok(())
}

async fn write_autosave(name: &str, state: initiative_core::ExportedState, path: &Path) {
    match SavedEncounter::new(name, state).save_json(path).await {
        Ok(()) => info!(path = %path.display(), "autosaved"),
        Err(e) => warn!(path = %path.display(), error = %e, "autosave failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse_config_from_args(
            &args(&["initiative", "--dir", "/tmp/x", "--name", "Bridge", "--load", "a.json"]),
            DriverConfig::new(),
        );
        assert_eq!(config.save_dir, PathBuf::from("/tmp/x"));
        assert_eq!(config.encounter, "Bridge");
        assert_eq!(config.load, Some(PathBuf::from("a.json")));
        assert_eq!(config.autosave_debounce, Some(Duration::from_millis(750)));
    }

    #[test]
    fn test_autosave_interval_parsing() {
        let config = DriverConfig::new().with_autosave_ms("0");
        assert_eq!(config.autosave_debounce, None);
        let config = DriverConfig::new().with_autosave_ms("200");
        assert_eq!(config.autosave_debounce, Some(Duration::from_millis(200)));
        let config = DriverConfig::new().with_autosave_ms("soon");
        assert_eq!(config.autosave_debounce, Some(Duration::from_millis(750)));

        let config = parse_config_from_args(&args(&["--no-autosave"]), DriverConfig::new());
        assert_eq!(config.autosave_debounce, None);
    }

    #[tokio::test]
    async fn test_save_then_load_bare_and_wrapped() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let mut tracker = CombatTracker::default();
        commands::execute(&mut tracker, Command::parse("add Ogre 10").unwrap()).unwrap();

        let wrapped = temp_dir.path().join("wrapped.json");
        save_to(&tracker, "Test", &wrapped).await.unwrap();
        let bare = temp_dir.path().join("bare.json");
        tokio::fs::write(&bare, tracker.export_state().to_json().unwrap())
            .await
            .unwrap();

        for path in [wrapped, bare] {
            let mut restored = CombatTracker::default();
            load_into(&mut restored, &path).await.unwrap();
            assert_eq!(restored.snapshot(), tracker.snapshot());
        }
    }
}
