//! Live roster: nearby counterparts merged from REST snapshots and live push.

use std::collections::HashMap;

use chrono::Utc;
use tracing::debug;

use crate::models::{Position, RosterEntry};

/// In-memory set of nearby counterpart actors keyed by identity.
///
/// Merge rules make the store correct under arbitrary interleaving of
/// snapshots and live events: a snapshot replaces everything, a live location
/// only updates an already-known identity, and a live "new counterpart" event
/// is last-write-wins on its actor id. The store never time-evicts; staleness
/// is a display concern for the consuming view.
#[derive(Debug, Default)]
pub struct RosterStore {
    entries: HashMap<String, RosterEntry>,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// REST-driven full refresh: replaces the entire roster. `distance_km`
    /// comes from the server and is not recomputed locally.
    pub fn snapshot(&mut self, entries: Vec<RosterEntry>) {
        self.entries = entries
            .into_iter()
            .map(|e| (e.actor_id.clone(), e))
            .collect();
        debug!(count = self.entries.len(), "roster snapshot applied");
    }

    /// Merge a live location ping. Known identities get `position` and
    /// `last_seen_at` updated; `distance_km` deliberately stays stale until
    /// the next snapshot. A ping for an unknown identity is ignored rather
    /// than fabricating a partially populated entry.
    pub fn on_live_location_event(&mut self, actor_id: &str, position: Position) {
        match self.entries.get_mut(actor_id) {
            Some(entry) => {
                entry.position = position;
                entry.last_seen_at = Utc::now();
            }
            None => {
                debug!(actor_id = %actor_id, "ignoring location ping for unknown counterpart");
            }
        }
    }

    /// Append a fully populated entry sourced from a live event (e.g. a fresh
    /// emergency request). An already-present actor id is overwritten, never
    /// duplicated.
    pub fn on_new_entry(&mut self, entry: RosterEntry) {
        self.entries.insert(entry.actor_id.clone(), entry);
    }

    pub fn get(&self, actor_id: &str) -> Option<&RosterEntry> {
        self.entries.get(actor_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered for display: nearest first, unknown distance last,
    /// ties broken by name.
    pub fn entries(&self) -> Vec<&RosterEntry> {
        let mut out: Vec<&RosterEntry> = self.entries.values().collect();
        out.sort_by(|a, b| {
            match (a.distance_km, b.distance_km) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| a.display_name.cmp(&b.display_name))
        });
        out
    }
}
