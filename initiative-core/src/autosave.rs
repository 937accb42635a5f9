//! Debounced autosave.
//!
//! [`Autosave`] subscribes to a tracker and counts notifications. The owner
//! polls it with the current time; once changes have been quiet for the
//! configured debounce, `poll` hands back a state to write. Writing is left
//! to the caller so this stays synchronous and testable.

use crate::hub::Subscription;
use crate::persist::ExportedState;
use crate::tracker::CombatTracker;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
pub struct Autosave {
    changes: Rc<Cell<u64>>,
    subscription: Subscription,
    debounce: Duration,
    /// Change count at the last poll, and when it was first seen.
    observed: u64,
    observed_at: Option<Instant>,
    saved: u64,
}

impl Autosave {
    /// Start watching `tracker`, using its configured debounce.
    pub fn attach(tracker: &mut CombatTracker) -> Self {
        let debounce = tracker.config().autosave_debounce;
        Self::with_debounce(tracker, debounce)
    }

    pub fn with_debounce(tracker: &mut CombatTracker, debounce: Duration) -> Self {
        let changes = Rc::new(Cell::new(0u64));
        let counter = Rc::clone(&changes);
        let subscription = tracker.subscribe(move |_| counter.set(counter.get() + 1));
        // The priming call is not a change.
        let baseline = changes.get();
        Self {
            changes,
            subscription,
            debounce,
            observed: baseline,
            observed_at: None,
            saved: baseline,
        }
    }

    /// Stop watching.
    pub fn detach(self, tracker: &mut CombatTracker) {
        tracker.unsubscribe(self.subscription);
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// True if there are changes not yet handed out for saving.
    pub fn is_dirty(&self) -> bool {
        self.changes.get() != self.saved
    }

    /// Returns the state to save once changes have been idle for the debounce.
    ///
    /// Newer changes restart the wait.
    pub fn poll(&mut self, tracker: &CombatTracker, now: Instant) -> Option<ExportedState> {
        let current = self.changes.get();
        if current != self.observed {
            self.observed = current;
            self.observed_at = Some(now);
            return None;
        }
        let since = self.observed_at?;
        if current == self.saved || now.saturating_duration_since(since) < self.debounce {
            return None;
        }
        Some(self.take(tracker))
    }

    /// Returns the state to save right away if anything changed.
    pub fn flush(&mut self, tracker: &CombatTracker) -> Option<ExportedState> {
        self.observed = self.changes.get();
        if !self.is_dirty() {
            return None;
        }
        Some(self.take(tracker))
    }

    /// Record that the current state has been saved and export it.
    fn take(&mut self, tracker: &CombatTracker) -> ExportedState {
        self.saved = self.changes.get();
        self.observed_at = None;
        debug!(changes = self.saved, "autosave due");
        tracker.export_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::NewCombatant;

    const GAP: Duration = Duration::from_millis(750);

    fn setup() -> (CombatTracker, Autosave) {
        let mut tracker = CombatTracker::default();
        let autosave = Autosave::attach(&mut tracker);
        (tracker, autosave)
    }

    #[test]
    fn test_clean_tracker_never_saves() {
        let (tracker, mut autosave) = setup();
        let start = Instant::now();
        assert!(!autosave.is_dirty());
        assert!(autosave.poll(&tracker, start).is_none());
        assert!(autosave.poll(&tracker, start + GAP * 4).is_none());
        assert_eq!(autosave.debounce(), GAP);
    }

    #[test]
    fn test_saves_after_idle_gap() {
        let (mut tracker, mut autosave) = setup();
        let start = Instant::now();
        tracker.add_combatant(NewCombatant::named("Orc")).unwrap();
        assert!(autosave.is_dirty());

        assert!(autosave.poll(&tracker, start).is_none());
        assert!(autosave.poll(&tracker, start + GAP / 2).is_none());
        let state = autosave.poll(&tracker, start + GAP).unwrap();
        assert_eq!(state.roster.len(), 1);
        assert!(!autosave.is_dirty());
        assert!(autosave.poll(&tracker, start + GAP * 3).is_none());
    }

    #[test]
    fn test_burst_of_changes_coalesces() {
        let (mut tracker, mut autosave) = setup();
        let start = Instant::now();
        tracker.add_combatant(NewCombatant::named("Orc")).unwrap();
        assert!(autosave.poll(&tracker, start).is_none());

        tracker.add_combatant(NewCombatant::named("Orc")).unwrap();
        assert!(autosave.poll(&tracker, start + GAP / 2).is_none());
        // The second change restarted the wait.
        assert!(autosave.poll(&tracker, start + GAP).is_none());

        let state = autosave.poll(&tracker, start + GAP / 2 + GAP).unwrap();
        assert_eq!(state.roster.len(), 2);
    }

    #[test]
    fn test_flush_and_detach() {
        let (mut tracker, mut autosave) = setup();
        assert!(autosave.flush(&tracker).is_none());
        tracker.advance_turn().ok();
        tracker.add_combatant(NewCombatant::named("Orc")).unwrap();
        assert!(autosave.flush(&tracker).is_some());
        assert!(autosave.flush(&tracker).is_none());

        autosave.detach(&mut tracker);
        assert_eq!(tracker.subscriber_count(), 0);
    }
}
