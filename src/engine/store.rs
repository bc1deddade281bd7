use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use crate::bridge::ContextId;
use crate::clock::TimestampMs;
use crate::drift::DriftState;

struct Entry {
    state: DriftState,
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Table {
    entries: HashMap<ContextId, Entry>,
    next_generation: u64,
}

/// Handle for one in-flight tick. Carries the state as of tick start and the
/// identity of the entry it came from, so the write-back can be refused if
/// the context was removed (or removed and recreated) in the meantime.
#[derive(Debug, Clone)]
pub struct TickTicket {
    pub id: ContextId,
    pub state: DriftState,
    pub elapsed_ms: u64,
    pub created: bool,
    generation: u64,
    cancel: CancellationToken,
}

impl TickTicket {
    /// Fires when the context is removed.
    pub fn cancelled(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Owned per-context drift table.
#[derive(Default)]
pub struct ContextStore {
    inner: Mutex<Table>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, id: ContextId) -> Option<DriftState> {
        self.lock().entries.get(&id).map(|entry| entry.state.clone())
    }

    pub fn contains(&self, id: ContextId) -> bool {
        self.lock().entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates the entry on first sight, then advances `last_tick_at_ms` in
    /// place before anything can fail, so the next tick never double counts.
    pub fn begin_tick(&self, id: ContextId, now_ms: TimestampMs) -> TickTicket {
        let mut table = self.lock();
        let generation = table.next_generation;

        let mut created = false;
        let entry = table.entries.entry(id).or_insert_with(|| {
            created = true;
            Entry {
                state: DriftState::new(now_ms),
                generation,
                cancel: CancellationToken::new(),
            }
        });
        let elapsed_ms = entry.state.mark_tick(now_ms);
        let ticket = TickTicket {
            id,
            state: entry.state.clone(),
            elapsed_ms,
            created,
            generation: entry.generation,
            cancel: entry.cancel.clone(),
        };

        if created {
            table.next_generation += 1;
        }
        ticket
    }

    /// Writes the ticket's result back. Returns false, leaving the table
    /// untouched, when the originating entry no longer exists.
    pub fn commit(&self, ticket: &TickTicket, state: DriftState) -> bool {
        let mut table = self.lock();
        match table.entries.get_mut(&ticket.id) {
            Some(entry) if entry.generation == ticket.generation => {
                entry.state = state;
                true
            }
            _ => false,
        }
    }

    /// Idempotent; cancels any in-flight work for the context.
    pub fn remove(&self, id: ContextId) -> Option<DriftState> {
        let removed = self.lock().entries.remove(&id);
        removed.map(|entry| {
            entry.cancel.cancel();
            entry.state
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: ContextId = ContextId(7);

    #[test]
    fn first_tick_creates_zeroed_state() {
        let store = ContextStore::new();
        let ticket = store.begin_tick(CTX, 1_000);
        assert!(ticket.created);
        assert_eq!(ticket.elapsed_ms, 0);
        assert_eq!(ticket.state, DriftState::new(1_000));
        assert!(store.contains(CTX));
    }

    #[test]
    fn begin_tick_advances_timing_even_without_commit() {
        let store = ContextStore::new();
        store.begin_tick(CTX, 1_000);
        let second = store.begin_tick(CTX, 6_000);
        assert!(!second.created);
        assert_eq!(second.elapsed_ms, 5_000);

        let third = store.begin_tick(CTX, 11_000);
        assert_eq!(third.elapsed_ms, 5_000);
        assert_eq!(store.get(CTX).unwrap().last_tick_at_ms, 11_000);
    }

    #[test]
    fn commit_writes_state() {
        let store = ContextStore::new();
        let ticket = store.begin_tick(CTX, 0);
        let mut next = ticket.state.clone();
        next.accumulated_drift_ms = 5_000;
        assert!(store.commit(&ticket, next));
        assert_eq!(store.get(CTX).unwrap().accumulated_drift_ms, 5_000);
    }

    #[test]
    fn removal_is_idempotent_and_cancels() {
        let store = ContextStore::new();
        let ticket = store.begin_tick(CTX, 0);
        assert!(store.remove(CTX).is_some());
        assert!(ticket.cancelled().is_cancelled());
        assert!(store.remove(CTX).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn stale_ticket_cannot_write_into_recreated_context() {
        let store = ContextStore::new();
        let stale = store.begin_tick(CTX, 0);
        store.remove(CTX);
        let fresh = store.begin_tick(CTX, 50_000);
        assert!(fresh.created);

        let mut poisoned = stale.state.clone();
        poisoned.accumulated_drift_ms = 999_999;
        assert!(!store.commit(&stale, poisoned));
        assert_eq!(store.get(CTX).unwrap().accumulated_drift_ms, 0);
        assert!(!fresh.cancelled().is_cancelled());
    }

    #[test]
    fn commit_after_removal_is_refused() {
        let store = ContextStore::new();
        let ticket = store.begin_tick(CTX, 0);
        store.remove(CTX);
        assert!(!store.commit(&ticket, ticket.state.clone()));
        assert!(!store.contains(CTX));
    }
}
