//! State lock: which tanuki command holds the state, for whom, and until when

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lock lifetime when the backend block sets no `lock_timeout` (15 minutes)
pub const DEFAULT_LOCK_TIMEOUT_SECS: i64 = 900;

/// Commands that write state and therefore take the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockOperation {
    Apply,
    Destroy,
    Import,
}

impl fmt::Display for LockOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LockOperation::Apply => "apply",
            LockOperation::Destroy => "destroy",
            LockOperation::Import => "import",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    pub id: String,
    pub operation: LockOperation,
    /// `username@hostname`
    pub who: String,
    #[serde(default)]
    pub pid: u32,
    /// tanuki version that wrote the lock file
    #[serde(default)]
    pub version: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(operation: LockOperation, timeout: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation,
            who: lock_owner(),
            pid: std::process::id(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created: now,
            expires: now + timeout,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} by {} (pid {}) since {}, expires {}",
            self.operation,
            self.who,
            self.pid,
            self.created.format("%Y-%m-%d %H:%M:%S UTC"),
            self.expires.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

fn lock_owner() -> String {
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    format!("{}@{}", username, hostname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_lock_records_this_process() {
        let lock = LockInfo::new(LockOperation::Apply, Duration::seconds(60));
        assert!(lock.who.contains('@'));
        assert_eq!(lock.pid, std::process::id());
        assert!(!lock.is_expired());
        assert_eq!(lock.expires - lock.created, Duration::seconds(60));
    }

    #[test]
    fn test_negative_timeout_is_expired() {
        let lock = LockInfo::new(LockOperation::Destroy, Duration::seconds(-1));
        assert!(lock.is_expired());
    }

    #[test]
    fn test_lock_file_format() {
        let lock = LockInfo::new(LockOperation::Import, Duration::seconds(60));
        let json = serde_json::to_value(&lock).unwrap();
        assert_eq!(json["operation"], "import");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));

        // Lock files written by hand or by older versions omit pid and version
        let parsed: LockInfo = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "operation": "apply",
            "who": "alice@ci",
            "created": "2026-01-01T00:00:00Z",
            "expires": "2026-01-01T00:15:00Z"
        }))
        .unwrap();
        assert_eq!(parsed.operation, LockOperation::Apply);
        assert_eq!(parsed.pid, 0);
        assert_eq!(
            parsed.to_string(),
            "apply by alice@ci (pid 0) since 2026-01-01 00:00:00 UTC, expires 2026-01-01 00:15:00 UTC"
        );
    }
}
