pub mod memory;
pub mod sqlite;

pub use memory::MemoryBlocklist;
pub use sqlite::SqliteBlocklist;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// One row of the blocklist. Rows are insert-only in the gate path; a block
/// ends by its `expires_at` passing, not by row removal.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedEntry {
    pub ip_address: String,
    pub reason: String,
    pub created: DateTime<Utc>,
    /// None means a permanent block.
    pub expires_at: Option<DateTime<Utc>>,
}

impl BlockedEntry {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at > now,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable blocklist backend. Queried by exact IP match only.
pub trait BlocklistStore: Send + Sync {
    /// The most recent entry for `ip` that is still in force at `now`.
    fn find_active(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<BlockedEntry>, StoreError>;

    /// The most recent entry for `ip` regardless of expiry, for repeat-offender
    /// escalation.
    fn find_latest(&self, ip: &str) -> Result<Option<BlockedEntry>, StoreError>;

    fn insert(&self, entry: BlockedEntry) -> Result<(), StoreError>;
}
