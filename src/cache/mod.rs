use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Cache keys are namespaced by an md5 hash of the IP so raw addresses never
/// appear in cache backends or logs of cache activity.
pub fn blocked_key(ip: &str) -> String {
    format!("blocked_ip_{:x}", md5::compute(ip))
}

pub fn suspicious_key(ip: &str) -> String {
    format!("suspicious_{:x}", md5::compute(ip))
}

/// Rolling record of recent suspicious requests from one IP. Cache-only;
/// losing it merely slows re-accumulation toward the block threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SuspicionRecord {
    pub count: u32,
    pub first_seen: DateTime<Utc>,
    pub routes: Vec<String>,
}

impl SuspicionRecord {
    const MAX_ROUTES: usize = 5;

    pub fn new(first_seen: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            first_seen,
            routes: Vec::new(),
        }
    }

    pub fn record(&mut self, route: &str) {
        self.count += 1;
        self.routes.push(route.to_string());
        if self.routes.len() > Self::MAX_ROUTES {
            let excess = self.routes.len() - Self::MAX_ROUTES;
            self.routes.drain(..excess);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    /// Store-confirmed blocked status. Only positive values are ever written;
    /// absence means "ask the store", never "assume allowed".
    Blocked(bool),
    Suspicion(SuspicionRecord),
}

/// Narrow cache-client interface so the gate can be tested against an
/// in-memory fake and deployed against anything with read/write/TTL.
pub trait GuardCache: Send + Sync {
    fn read(&self, key: &str) -> Option<CacheEntry>;
    fn write(&self, key: &str, value: CacheEntry, ttl: Duration);
    fn delete(&self, key: &str);
}

/// Process-local TTL cache.
pub struct MemoryTtlCache {
    entries: DashMap<String, (CacheEntry, Instant)>,
}

impl MemoryTtlCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Drop entries past their deadline; called from a periodic sweeper so
    /// keys that are never read again do not accumulate.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, (_, deadline)| *deadline > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryTtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardCache for MemoryTtlCache {
    fn read(&self, key: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.entries.get(key) {
            let (value, deadline) = entry.value();
            if *deadline > Instant::now() {
                return Some(value.clone());
            }
        }
        // Lazily drop the stale entry.
        self.entries.remove(key);
        None
    }

    fn write(&self, key: &str, value: CacheEntry, ttl: Duration) {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}
