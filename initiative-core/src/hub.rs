//! Observer hub.
//!
//! Listeners receive an owned [`Snapshot`] after every successful mutation.
//! Snapshots are copies: changing one never reaches the tracker.

use crate::entity::{Combatant, EntityId};
use crate::roster::Roster;
use serde::Serialize;

/// Point-in-time copy of the tracker state handed to listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub roster: Roster,
    pub selection: Vec<EntityId>,
    pub locked: bool,
    pub current_round: u32,
    pub turn_pointer: usize,
    /// Derived turn order at the time of the snapshot.
    pub turn_order: Vec<EntityId>,
    /// e.g. "Round 3".
    pub round_label: String,
    /// Name of the combatant whose turn it is.
    pub current_turn_name: Option<String>,
}

impl Snapshot {
    pub fn current_combatant(&self) -> Option<&Combatant> {
        let id = self.turn_order.get(self.turn_pointer)?;
        self.roster.combatant(*id)
    }

    pub fn is_selected(&self, id: EntityId) -> bool {
        self.selection.contains(&id)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

pub type Listener = Box<dyn FnMut(&Snapshot)>;

/// Registered listeners, called in subscription order.
#[derive(Default)]
pub struct Hub {
    listeners: Vec<(Subscription, Listener)>,
    next_id: u64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Listener) -> Subscription {
        let subscription = Subscription(self.next_id);
        self.next_id += 1;
        self.listeners.push((subscription, listener));
        subscription
    }

    /// Returns false if the subscription was already gone.
    pub fn remove(&mut self, subscription: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(s, _)| *s != subscription);
        self.listeners.len() != before
    }

    /// Call one listener. Used to prime a new subscriber.
    pub fn deliver_to(&mut self, subscription: Subscription, snapshot: &Snapshot) {
        if let Some((_, listener)) = self.listeners.iter_mut().find(|(s, _)| *s == subscription) {
            listener(snapshot);
        }
    }

    pub fn broadcast(&mut self, snapshot: &Snapshot) {
        for (_, listener) in &mut self.listeners {
            listener(snapshot);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
