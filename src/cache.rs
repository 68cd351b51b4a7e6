use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time source for [`TtlCache`].
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Key/value cache whose entries expire `ttl` after insertion.
///
/// Each key also carries a generation that [`TtlCache::invalidate`] bumps.
/// A caller that loads a value outside the lock records the generation
/// first and stores with [`TtlCache::insert_if_generation`], so a load
/// that raced an invalidation is not cached.
pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: HashMap<K, (Instant, V)>,
    generations: HashMap<K, u64>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: HashMap::new(),
            generations: HashMap::new(),
        }
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    /// Fresh value for `key`; expired entries are evicted on the way.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some((at, value)) if now.duration_since(*at) < self.ttl => Some(value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        let now = self.clock.now();
        self.entries.insert(key, (now, value));
    }

    pub fn generation(&self, key: &K) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }

    /// Insert unless `key` was invalidated since `generation` was read.
    /// Returns whether the value was stored.
    pub fn insert_if_generation(&mut self, key: K, value: V, generation: u64) -> bool {
        if self.generation(&key) != generation {
            return false;
        }
        self.insert(key, value);
        true
    }

    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
        *self.generations.entry(key.clone()).or_insert(0) += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
