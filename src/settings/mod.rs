use dashmap::DashMap;

use crate::config::GuardConfig;

/// Settings keys read by the gate at request time.
pub mod keys {
    pub const BLOCK_ON_NO_IP: &str = "security.block_on_no_ip";
    pub const SUSPICIOUS_THRESHOLD: &str = "security.suspicious_threshold";
    pub const SUSPICIOUS_WINDOW_HOURS: &str = "security.suspicious_window_hours";
    pub const SUSPICIOUS_BLOCK_HOURS: &str = "security.suspicious_block_hours";
    pub const BLOCKED_CACHE_TTL_SECS: &str = "security.blocked_cache_ttl_secs";
}

/// Read-only key/value settings source. The gate has no compile-time coupling
/// to where settings live; tests substitute a writable in-memory map.
pub trait SettingsProvider: Send + Sync {
    fn read_bool(&self, key: &str, default: bool) -> bool;
    fn read_u64(&self, key: &str, default: u64) -> u64;
}

#[derive(Debug, Clone, Copy)]
enum SettingValue {
    Bool(bool),
    Int(u64),
}

/// Settings backed by an in-process map, seeded from the loaded config.
pub struct MapSettings {
    values: DashMap<String, SettingValue>,
}

impl MapSettings {
    pub fn new() -> Self {
        Self {
            values: DashMap::new(),
        }
    }

    pub fn from_config(config: &GuardConfig) -> Self {
        let settings = Self::new();
        settings.set_bool(keys::BLOCK_ON_NO_IP, config.security.block_on_no_ip);
        settings.set_u64(keys::SUSPICIOUS_THRESHOLD, config.security.suspicious_threshold);
        settings.set_u64(
            keys::SUSPICIOUS_WINDOW_HOURS,
            config.security.suspicious_window_hours,
        );
        settings.set_u64(
            keys::SUSPICIOUS_BLOCK_HOURS,
            config.security.suspicious_block_hours,
        );
        settings.set_u64(
            keys::BLOCKED_CACHE_TTL_SECS,
            config.security.blocked_cache_ttl_secs,
        );
        settings
    }

    pub fn set_bool(&self, key: &str, value: bool) {
        self.values.insert(key.to_string(), SettingValue::Bool(value));
    }

    pub fn set_u64(&self, key: &str, value: u64) {
        self.values.insert(key.to_string(), SettingValue::Int(value));
    }
}

impl Default for MapSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsProvider for MapSettings {
    fn read_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key).map(|v| *v.value()) {
            Some(SettingValue::Bool(value)) => value,
            Some(SettingValue::Int(value)) => value != 0,
            None => default,
        }
    }

    fn read_u64(&self, key: &str, default: u64) -> u64 {
        match self.values.get(key).map(|v| *v.value()) {
            Some(SettingValue::Int(value)) => value,
            Some(SettingValue::Bool(value)) => value as u64,
            None => default,
        }
    }
}
