//! Remote key-value store seam
//!
//! The helper never stores anything itself; every operation goes through a
//! [`RemoteStore`]. Backends:
//! - [`RedisStore`]: an external Redis server (feature `redis`)
//! - [`MemoryStore`]: in-process store with the same command semantics

mod memory;
#[cfg(feature = "redis")]
mod proxy;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ExpireUnit;
use crate::error::StoreError;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use proxy::RedisStore;

/// Opaque SCAN continuation token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanCursor(String);

impl ScanCursor {
  /// Sentinel: a scan starts here and is complete when the store returns it
  pub const SENTINEL: &'static str = "0";

  pub fn start() -> Self {
    Self(Self::SENTINEL.to_string())
  }

  pub fn new(token: impl Into<String>) -> Self {
    Self(token.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn is_complete(&self) -> bool {
    self.0 == Self::SENTINEL
  }
}

impl std::fmt::Display for ScanCursor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

/// One SCAN response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
  pub cursor: ScanCursor,
  pub keys: Vec<String>,
}

/// TTL attached to a SET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiration {
  pub unit: ExpireUnit,
  pub ttl: u64,
}

impl Expiration {
  /// `None` for a zero TTL: the key is stored without expiry
  pub fn new(unit: ExpireUnit, ttl: u64) -> Option<Self> {
    (ttl > 0).then_some(Self { unit, ttl })
  }

  pub fn as_duration(&self) -> std::time::Duration {
    match self.unit {
      ExpireUnit::Seconds => std::time::Duration::from_secs(self.ttl),
      ExpireUnit::Milliseconds => std::time::Duration::from_millis(self.ttl),
    }
  }
}

/// Remote store commands used by the helper
#[async_trait]
pub trait RemoteStore: Send + Sync {
  /// GET: serialized payload, `None` when the key is absent
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
  /// SET with optional EX/PX
  async fn set(
    &self,
    key: &str,
    payload: &str,
    expiration: Option<Expiration>,
  ) -> Result<(), StoreError>;
  /// DEL: number of keys removed
  async fn del(&self, key: &str) -> Result<u64, StoreError>;
  /// INCR: counter value after the increment
  async fn incr(&self, key: &str) -> Result<i64, StoreError>;
  /// EXPIRE in seconds: whether the timeout was set
  async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError>;
  /// KEYS: every key matching the wildcard pattern in one response
  async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
  /// SCAN cursor MATCH pattern
  async fn scan(&self, cursor: &ScanCursor, pattern: &str) -> Result<ScanPage, StoreError>;

  /// Release the connection; later commands fail with [`StoreError::Closed`]
  async fn close(&self) -> Result<(), StoreError> {
    Ok(())
  }

  fn is_open(&self) -> bool {
    true
  }
}
