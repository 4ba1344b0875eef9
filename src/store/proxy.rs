//! Redis client for an external Redis server

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Expiration, RemoteStore, ScanCursor, ScanPage};
use crate::config::ConnectionConfig;
use crate::error::StoreError;

/// Remote store backed by a Redis server
pub struct RedisStore {
  connection: ConnectionManager,
  closed: AtomicBool,
}

impl RedisStore {
  /// Connect using the given configuration
  pub async fn connect(config: &ConnectionConfig) -> Result<Self, StoreError> {
    let client = Client::open(config.connection_url())?;
    let connection = ConnectionManager::new(client).await?;
    tracing::debug!("Connected to Redis at {}:{}", config.host, config.port);
    Ok(Self::from_connection(connection))
  }

  /// Wrap an existing connection
  pub fn from_connection(connection: ConnectionManager) -> Self {
    Self {
      connection,
      closed: AtomicBool::new(false),
    }
  }

  /// Test the connection to Redis
  pub async fn ping(&self) -> Result<(), StoreError> {
    let mut conn = self.conn()?;
    redis::cmd("PING").query_async::<()>(&mut conn).await?;
    Ok(())
  }

  /// Clone the multiplexed connection for one command
  fn conn(&self) -> Result<ConnectionManager, StoreError> {
    if self.closed.load(Ordering::Acquire) {
      return Err(StoreError::Closed);
    }
    Ok(self.connection.clone())
  }
}

#[async_trait]
impl RemoteStore for RedisStore {
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let mut conn = self.conn()?;
    let value: Option<String> = conn.get(key).await?;
    Ok(value)
  }

  async fn set(
    &self,
    key: &str,
    payload: &str,
    expiration: Option<Expiration>,
  ) -> Result<(), StoreError> {
    let mut conn = self.conn()?;
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(payload);
    if let Some(exp) = expiration {
      cmd.arg(exp.unit.token()).arg(exp.ttl);
    }
    cmd.query_async::<()>(&mut conn).await?;
    Ok(())
  }

  async fn del(&self, key: &str) -> Result<u64, StoreError> {
    let mut conn = self.conn()?;
    let removed: u64 = conn.del(key).await?;
    Ok(removed)
  }

  async fn incr(&self, key: &str) -> Result<i64, StoreError> {
    let mut conn = self.conn()?;
    let value: i64 = conn.incr(key, 1).await?;
    Ok(value)
  }

  async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
    let mut conn = self.conn()?;
    let seconds = i64::try_from(seconds)
      .map_err(|_| StoreError::InvalidValue(format!("expire {} out of range", seconds)))?;
    let set: bool = conn.expire(key, seconds).await?;
    Ok(set)
  }

  async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
    let mut conn = self.conn()?;
    let keys: Vec<String> = conn.keys(pattern).await?;
    Ok(keys)
  }

  async fn scan(&self, cursor: &ScanCursor, pattern: &str) -> Result<ScanPage, StoreError> {
    let mut conn = self.conn()?;
    let (next, keys): (String, Vec<String>) = redis::cmd("SCAN")
      .arg(cursor.as_str())
      .arg("MATCH")
      .arg(pattern)
      .query_async(&mut conn)
      .await?;
    Ok(ScanPage {
      cursor: ScanCursor::new(next),
      keys,
    })
  }

  async fn close(&self) -> Result<(), StoreError> {
    // The manager's socket goes away with the last clone
    self.closed.store(true, Ordering::Release);
    Ok(())
  }

  fn is_open(&self) -> bool {
    !self.closed.load(Ordering::Acquire)
  }
}
