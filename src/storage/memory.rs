use chrono::{DateTime, Utc};
use std::sync::Mutex;

use super::{BlockedEntry, BlocklistStore, StoreError};

/// In-memory blocklist for tests and embedded setups with no durability needs.
#[derive(Default)]
pub struct MemoryBlocklist {
    rows: Mutex<Vec<BlockedEntry>>,
}

impl MemoryBlocklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("blocklist mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.rows.lock().expect("blocklist mutex poisoned").clear();
    }

    pub fn entries_for(&self, ip: &str) -> Vec<BlockedEntry> {
        self.rows
            .lock()
            .expect("blocklist mutex poisoned")
            .iter()
            .filter(|row| row.ip_address == ip)
            .cloned()
            .collect()
    }
}

impl BlocklistStore for MemoryBlocklist {
    fn find_active(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<BlockedEntry>, StoreError> {
        let rows = self.rows.lock().expect("blocklist mutex poisoned");
        Ok(rows
            .iter()
            .filter(|row| row.ip_address == ip && row.is_active(now))
            .max_by_key(|row| row.created)
            .cloned())
    }

    fn find_latest(&self, ip: &str) -> Result<Option<BlockedEntry>, StoreError> {
        let rows = self.rows.lock().expect("blocklist mutex poisoned");
        Ok(rows
            .iter()
            .filter(|row| row.ip_address == ip)
            .max_by_key(|row| row.created)
            .cloned())
    }

    fn insert(&self, entry: BlockedEntry) -> Result<(), StoreError> {
        self.rows.lock().expect("blocklist mutex poisoned").push(entry);
        Ok(())
    }
}
