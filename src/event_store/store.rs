use std::collections::{HashSet, VecDeque};

use log::{debug, trace};
use regex::Regex;

use crate::event_model::{identity_key, EventRecord, IdentityKey};

use super::types::{AppendOutcome, KeyRetention, DEFAULT_RETENTION_CAP};

#[derive(Debug, Clone)]
struct StoredEvent {
    key: IdentityKey,
    record: EventRecord,
}

/// Bounded, arrival-ordered collection of deduplicated events.
///
/// The store owns the set of identity keys it has accepted since the last reset. No two
/// retained events share a key, and the sequence never grows past `capacity`: the
/// oldest entries are evicted first. Whether an evicted event's key stays in the seen
/// set is governed by [`KeyRetention`].
#[derive(Debug, Clone)]
pub struct EventStore {
    events: VecDeque<StoredEvent>,
    seen: HashSet<IdentityKey>,
    capacity: usize,
    key_retention: KeyRetention,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_CAP, KeyRetention::default())
    }
}

impl EventStore {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize, key_retention: KeyRetention) -> Self {
        Self {
            events: VecDeque::new(),
            seen: HashSet::new(),
            capacity: capacity.max(1),
            key_retention,
        }
    }

    pub fn reset(&mut self) {
        debug!("Resetting event store ({} event(s) dropped)", self.events.len());
        self.events.clear();
        self.seen.clear();
    }

    /// Replaces the whole content with `records`, taken in the order given.
    pub fn load_snapshot<I>(&mut self, records: I) -> impl DoubleEndedIterator<Item = &EventRecord>
    where
        I: IntoIterator<Item = EventRecord>,
    {
        self.reset();
        let mut offered = 0usize;
        for record in records {
            offered += 1;
            self.insert(record);
        }
        debug!(
            "Snapshot loaded: {} record(s) offered, {} retained, {} key(s) tracked",
            offered,
            self.events.len(),
            self.seen_keys()
        );
        self.events()
    }

    /// Appends a live record unless its identity key was already seen.
    pub fn append_live(&mut self, record: EventRecord) -> AppendOutcome {
        self.insert(record)
    }

    fn insert(&mut self, record: EventRecord) -> AppendOutcome {
        let key = identity_key(&record);
        if !self.seen.insert(key.clone()) {
            trace!("Dropping duplicate event {}", key);
            return AppendOutcome::Duplicate;
        }
        self.events.push_back(StoredEvent { key, record });
        self.evict_overflow();
        AppendOutcome::Accepted
    }

    fn evict_overflow(&mut self) {
        while self.events.len() > self.capacity {
            if let Some(evicted) = self.events.pop_front() {
                if self.key_retention == KeyRetention::Purge {
                    self.seen.remove(&evicted.key);
                }
            }
        }
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl DoubleEndedIterator<Item = &EventRecord> + ExactSizeIterator {
        self.events.iter().map(|stored| &stored.record)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of keys in the seen set, retained or not.
    pub fn seen_keys(&self) -> usize {
        self.seen.len()
    }

    /// Host of the most recent retained event matching `pattern`.
    pub fn latest_matching_host(&self, pattern: &Regex) -> Option<&str> {
        self.events
            .iter()
            .rev()
            .filter_map(|stored| stored.record.host.as_deref())
            .find(|host| pattern.is_match(host))
    }
}
