use std::collections::{BTreeMap, HashMap};

use crate::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer<K> {
    pub id: TimerId,
    pub at: Millis,
    pub kind: K,
}

/// Deadline-ordered one-shot timers. Timers sharing a deadline fire in the
/// order they were scheduled.
#[derive(Debug)]
pub struct Scheduler<K> {
    next_id: u64,
    pending: BTreeMap<(Millis, TimerId), K>,
    deadlines: HashMap<TimerId, Millis>,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Scheduler<K> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, at: Millis, kind: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.pending.insert((at, id), kind);
        self.deadlines.insert(id, at);
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> Option<K> {
        let at = self.deadlines.remove(&id)?;
        self.pending.remove(&(at, id))
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn deadline(&self, id: TimerId) -> Option<Millis> {
        self.deadlines.get(&id).copied()
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.pending.keys().next().map(|(at, _)| *at)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns the earliest timer whose deadline is `<= now`.
    pub fn pop_due(&mut self, now: Millis) -> Option<FiredTimer<K>> {
        let (at, id) = *self.pending.keys().next()?;
        if at > now {
            return None;
        }
        let kind = self.pending.remove(&(at, id))?;
        self.deadlines.remove(&id);
        Some(FiredTimer { id, at, kind })
    }
}
