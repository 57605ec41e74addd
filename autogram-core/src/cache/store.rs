// File: autogram-core/src/cache/store.rs

use std::collections::HashMap;

use autogram_common::models::CacheStats;
use autogram_common::traits::Weighted;

/// Bookkeeping kept alongside each cached entry.
#[derive(Debug, Clone)]
struct Slot<E> {
    entry: E,
    hits: u64,
    last_access: u64,
}

/// Outcome of offering a freshly resolved entry to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Entry stored; ids evicted to make room, in eviction order.
    Inserted { evicted: Vec<String> },
    /// Entry alone is heavier than the whole limit; nothing changed.
    Oversized,
}

/// Weight-bounded map with hit counters and access stamps.
///
/// Access stamps come from a logical clock that ticks on every touch, so two
/// operations never share a stamp. Only the cache actor owns one of these.
#[derive(Debug)]
pub struct Store<E> {
    slots: HashMap<String, Slot<E>>,
    weight: u64,
    limit: u64,
    clock: u64,
}

impl<E: Weighted + Clone> Store<E> {
    pub fn new(limit: u64) -> Self {
        Self {
            slots: HashMap::new(),
            weight: 0,
            limit,
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Serves a hit: bumps the hit count, refreshes the stamp, returns a copy.
    pub fn hit(&mut self, id: &str) -> Option<E> {
        let now = self.tick();
        let slot = self.slots.get_mut(id)?;
        slot.hits += 1;
        slot.last_access = now;
        Some(slot.entry.clone())
    }

    /// Stores `entry`, evicting one victim at a time while it would not fit.
    ///
    /// `extra_hits` are credited on top of the seeded count of 1.
    pub fn admit(&mut self, entry: E, extra_hits: u64) -> Admission {
        let incoming = entry.weight();
        if incoming > self.limit {
            return Admission::Oversized;
        }

        // Re-resolving an id that is already present replaces it.
        if let Some(old) = self.slots.remove(entry.id()) {
            self.weight -= old.entry.weight();
        }

        let mut evicted = Vec::new();
        while self.weight + incoming > self.limit {
            match self.evict_one() {
                Some(id) => evicted.push(id),
                None => break,
            }
        }

        let now = self.tick();
        self.weight += incoming;
        self.slots.insert(
            entry.id().to_string(),
            Slot {
                entry,
                hits: 1 + extra_hits,
                last_access: now,
            },
        );
        Admission::Inserted { evicted }
    }

    /// Picks the least-hit entry, oldest stamp first, lowest id last.
    pub fn select_victim(&self) -> Option<&str> {
        self.slots
            .iter()
            .min_by(|(a_id, a), (b_id, b)| {
                a.hits
                    .cmp(&b.hits)
                    .then(a.last_access.cmp(&b.last_access))
                    .then(a_id.cmp(b_id))
            })
            .map(|(id, _)| id.as_str())
    }

    /// Removes exactly one victim and returns its id.
    pub fn evict_one(&mut self) -> Option<String> {
        let victim = self.select_victim()?.to_string();
        let slot = self.slots.remove(&victim)?;
        self.weight -= slot.entry.weight();
        Some(victim)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    pub fn hits(&self, id: &str) -> Option<u64> {
        self.slots.get(id).map(|s| s.hits)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            weight: self.weight,
            limit: self.limit,
            count: self.slots.len() as u64,
        }
    }

    #[cfg(test)]
    fn summed_weight(&self) -> u64 {
        self.slots.values().map(|s| s.entry.weight()).sum()
    }
}
