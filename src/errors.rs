use thiserror::Error;

use crate::storage::StoreError;

/// Failures surfaced during startup and configuration. Request-path failures
/// never reach this type; the gate degrades instead of erroring.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
