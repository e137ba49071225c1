use serde::{Deserialize, Serialize};
use std::fs;

use crate::errors::GuardError;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GuardConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Read client IPs from proxy headers instead of the socket peer. Only
    /// safe behind a trusted edge that strips inbound copies of those headers.
    #[serde(default)]
    pub trust_proxy: bool,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecurityConfig {
    #[serde(default = "default_block_on_no_ip")]
    pub block_on_no_ip: bool,
    #[serde(default = "default_suspicious_threshold")]
    pub suspicious_threshold: u64,
    #[serde(default = "default_suspicious_window_hours")]
    pub suspicious_window_hours: u64,
    #[serde(default = "default_suspicious_block_hours")]
    pub suspicious_block_hours: u64,
    #[serde(default = "default_blocked_cache_ttl_secs")]
    pub blocked_cache_ttl_secs: u64,
}

// Default value functions
fn default_database_path() -> String {
    "data/guard.db".to_string()
}

fn default_block_on_no_ip() -> bool {
    true
}

fn default_suspicious_threshold() -> u64 {
    3
}

fn default_suspicious_window_hours() -> u64 {
    24
}

fn default_suspicious_block_hours() -> u64 {
    24
}

fn default_blocked_cache_ttl_secs() -> u64 {
    300
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            block_on_no_ip: default_block_on_no_ip(),
            suspicious_threshold: default_suspicious_threshold(),
            suspicious_window_hours: default_suspicious_window_hours(),
            suspicious_block_hours: default_suspicious_block_hours(),
            blocked_cache_ttl_secs: default_blocked_cache_ttl_secs(),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            trust_proxy: false,
            security: SecurityConfig::default(),
        }
    }
}

impl GuardConfig {
    pub fn from_file(path: &str) -> Result<Self, GuardError> {
        let content = fs::read_to_string(path)?;
        let config: GuardConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}
