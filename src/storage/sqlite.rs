use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use super::{BlockedEntry, BlocklistStore, StoreError};

/// Sqlite-backed blocklist. The table is deliberately not unique on
/// `ip_address`: concurrent escalations may insert duplicates, and any
/// matching unexpired row blocks, so duplicates are harmless.
pub struct SqliteBlocklist {
    conn: Mutex<Connection>,
}

impl SqliteBlocklist {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS blocked_ips (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                ip_address  TEXT NOT NULL,
                reason      TEXT NOT NULL,
                created     TEXT NOT NULL,
                expires_at  TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_blocked_ips_ip ON blocked_ips (ip_address);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn rows_for(&self, ip: &str) -> Result<Vec<BlockedEntry>, StoreError> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT ip_address, reason, created, expires_at
             FROM blocked_ips WHERE ip_address = ?1
             ORDER BY created DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![ip], |row| {
            Ok(BlockedEntry {
                ip_address: row.get(0)?,
                reason: row.get(1)?,
                created: row.get::<_, DateTime<Utc>>(2)?,
                expires_at: row.get::<_, Option<DateTime<Utc>>>(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl BlocklistStore for SqliteBlocklist {
    fn find_active(&self, ip: &str, now: DateTime<Utc>) -> Result<Option<BlockedEntry>, StoreError> {
        // Expiry is compared in Rust rather than SQL so the on-disk timestamp
        // format never influences correctness.
        Ok(self.rows_for(ip)?.into_iter().find(|row| row.is_active(now)))
    }

    fn find_latest(&self, ip: &str) -> Result<Option<BlockedEntry>, StoreError> {
        Ok(self.rows_for(ip)?.into_iter().next())
    }

    fn insert(&self, entry: BlockedEntry) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("sqlite mutex poisoned");
        conn.execute(
            "INSERT INTO blocked_ips (ip_address, reason, created, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry.ip_address, entry.reason, entry.created, entry.expires_at],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(ip: &str, expires_at: Option<DateTime<Utc>>) -> BlockedEntry {
        BlockedEntry {
            ip_address: ip.to_string(),
            reason: "Test blocking".to_string(),
            created: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn test_permanent_block_is_active() {
        let store = SqliteBlocklist::open_in_memory().unwrap();
        store.insert(entry("192.0.2.1", None)).unwrap();

        let found = store.find_active("192.0.2.1", Utc::now()).unwrap();
        assert_eq!(found.unwrap().reason, "Test blocking");
    }

    #[test]
    fn test_future_expiry_is_active() {
        let store = SqliteBlocklist::open_in_memory().unwrap();
        store
            .insert(entry("192.0.2.2", Some(Utc::now() + Duration::hours(1))))
            .unwrap();

        assert!(store.find_active("192.0.2.2", Utc::now()).unwrap().is_some());
    }

    #[test]
    fn test_past_expiry_is_inactive() {
        let store = SqliteBlocklist::open_in_memory().unwrap();
        store
            .insert(entry("192.0.2.3", Some(Utc::now() - Duration::days(1))))
            .unwrap();

        assert!(store.find_active("192.0.2.3", Utc::now()).unwrap().is_none());
        // But still visible to the repeat-offender lookup.
        assert!(store.find_latest("192.0.2.3").unwrap().is_some());
    }

    #[test]
    fn test_exact_ip_match_only() {
        let store = SqliteBlocklist::open_in_memory().unwrap();
        store.insert(entry("192.0.2.4", None)).unwrap();

        assert!(store.find_active("192.0.2.40", Utc::now()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_rows_are_tolerated() {
        let store = SqliteBlocklist::open_in_memory().unwrap();
        store.insert(entry("192.0.2.5", None)).unwrap();
        store
            .insert(entry("192.0.2.5", Some(Utc::now() + Duration::hours(2))))
            .unwrap();

        assert!(store.find_active("192.0.2.5", Utc::now()).unwrap().is_some());
    }

    #[test]
    fn test_find_latest_orders_by_created() {
        let store = SqliteBlocklist::open_in_memory().unwrap();
        let mut old = entry("192.0.2.6", None);
        old.created = Utc::now() - Duration::days(2);
        old.reason = "old".to_string();
        store.insert(old).unwrap();

        let mut new = entry("192.0.2.6", Some(Utc::now() - Duration::hours(1)));
        new.reason = "new".to_string();
        store.insert(new).unwrap();

        assert_eq!(store.find_latest("192.0.2.6").unwrap().unwrap().reason, "new");
    }
}
