//! State backend trait and error types

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::lock::{LockInfo, LockOperation};
use crate::state::StateFile;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("State is locked for {holder} (lock ID: {lock_id})")]
    Locked {
        lock_id: String,
        operation: LockOperation,
        /// Rendered `LockInfo`
        holder: String,
    },

    #[error("Lock not found: {0}")]
    LockNotFound(String),

    #[error("Lock ID mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    #[error("Backend configuration error: {0}")]
    Configuration(String),

    #[error("Invalid state file: {0}")]
    InvalidState(String),

    /// Refusing to overwrite a state that belongs to another lineage
    #[error("State lineage mismatch: expected {expected}, got {actual}")]
    LineageMismatch { expected: String, actual: String },

    /// Refusing to overwrite a newer state
    #[error("State serial {stored} on disk is newer than {writing}")]
    StaleSerial { stored: u64, writing: u64 },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            operation: lock.operation,
            holder: lock.to_string(),
        }
    }

    pub fn unsupported_backend(backend_type: impl Into<String>) -> Self {
        Self::UnsupportedBackend(backend_type.into())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for the state file, with locking for concurrent runs
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read the current state; `None` before the first write
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Write the state; the caller increments the serial first
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Fails while another unexpired lock is held
    async fn acquire_lock(&self, operation: LockOperation) -> BackendResult<LockInfo>;

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Administrative release of a lock by its ID
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;
}

/// `backend` block of the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Backend type; only "local" is supported
    #[serde(rename = "type", default = "default_backend_type")]
    pub backend_type: String,
    /// Backend-specific attributes
    #[serde(flatten)]
    pub attributes: HashMap<String, serde_json::Value>,
}

fn default_backend_type() -> String {
    "local".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: default_backend_type(),
            attributes: HashMap::new(),
        }
    }
}

impl BackendConfig {
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(serde_json::Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(serde_json::Value::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.attributes.get(key).and_then(serde_json::Value::as_i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_locked() {
        let lock = LockInfo::new(LockOperation::Apply, chrono::Duration::seconds(60));
        let err = BackendError::locked(&lock);
        assert!(
            err.to_string().starts_with(&format!("State is locked for apply by {}", lock.who)),
            "{}",
            err
        );
        match err {
            BackendError::Locked {
                lock_id, operation, ..
            } => {
                assert_eq!(lock_id, lock.id);
                assert_eq!(operation, LockOperation::Apply);
            }
            other => panic!("Expected Locked error, got {:?}", other),
        }
    }

    #[test]
    fn test_backend_config_from_json() {
        let config: BackendConfig =
            serde_json::from_str(r#"{"type": "local", "path": "gitlab.state.json"}"#).unwrap();
        assert_eq!(config.backend_type, "local");
        assert_eq!(config.get_string("path"), Some("gitlab.state.json"));

        let config: BackendConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.backend_type, "local");
        assert_eq!(config.get_string("path"), None);
    }

    #[test]
    fn test_backend_error_display() {
        let error = BackendError::unsupported_backend("s3");
        assert_eq!(error.to_string(), "Unsupported backend type: s3");
    }
}
