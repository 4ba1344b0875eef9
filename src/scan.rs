//! Scan-filter-collect engine
//!
//! Enumerates keys matching a wildcard pattern, fetches each candidate's
//! value, runs the caller's filter and folds the matches into a result.
//! Two enumeration strategies:
//! - listing: one KEYS round trip (`find`, `del_many`)
//! - cursor: SCAN until the store hands back the `"0"` cursor (`search`)
//!
//! Candidates are processed one at a time in the order the store returned
//! them. Any store, decode or filter failure aborts the whole collection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{HelperError, Result};
use crate::filter::FindParams;
use crate::key::KeyCodec;
use crate::store::{RemoteStore, ScanCursor};
use crate::value;

/// A key that survived fetch and filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue<T> {
  /// Key without prefix
  pub key: String,
  /// Full store key
  pub full_key: String,
  pub value: T,
}

/// Terminal action applied to each match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
  Collect,
  Delete,
}

/// Accumulator owned by one collection pass
struct Collected<T> {
  records: Vec<KeyValue<T>>,
  deleted: u64,
}

/// Stateless driver over one store; every call owns its own accumulator
pub struct ScanCollector<'a> {
  store: &'a dyn RemoteStore,
  codec: &'a KeyCodec,
}

impl<'a> ScanCollector<'a> {
  pub fn new(store: &'a dyn RemoteStore, codec: &'a KeyCodec) -> Self {
    Self { store, codec }
  }

  /// Listing strategy: all matching full keys in one response
  pub async fn list(&self, pattern: &str, op: &'static str) -> Result<Vec<String>> {
    self
      .store
      .keys(pattern)
      .await
      .map_err(|e| HelperError::store(op, e))
  }

  /// Cursor strategy: full keys in first-seen order, each key once
  pub async fn scan(&self, pattern: &str, op: &'static str) -> Result<Vec<String>> {
    let mut cursor = ScanCursor::start();
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    let mut round_trips = 0usize;

    loop {
      let page = self
        .store
        .scan(&cursor, pattern)
        .await
        .map_err(|e| HelperError::store(op, e))?;
      round_trips += 1;

      for key in page.keys {
        if seen.insert(key.clone()) {
          keys.push(key);
        }
      }

      if page.cursor.is_complete() {
        break;
      }
      cursor = page.cursor;
    }

    tracing::debug!(
      "Cursor scan of {} finished: {} keys in {} round trips",
      pattern,
      keys.len(),
      round_trips
    );
    Ok(keys)
  }

  /// Fetch and decode one candidate. Absent keys and stored JSON nulls are `None`.
  pub async fn fetch<T: DeserializeOwned>(
    &self,
    full_key: &str,
    op: &'static str,
  ) -> Result<Option<T>> {
    let payload = self
      .store
      .get(full_key)
      .await
      .map_err(|e| HelperError::store(op, e))?;
    let value: Option<Option<T>> =
      value::deserialize(payload.as_deref()).map_err(|e| HelperError::unexpected(op, e))?;
    Ok(value.flatten())
  }

  /// Collect every matching record
  pub async fn find<T: DeserializeOwned>(
    &self,
    pattern: &str,
    params: &FindParams<T>,
  ) -> Result<Vec<KeyValue<T>>> {
    let collected = self.collect(pattern, params, "find", Terminal::Collect).await?;
    Ok(collected.records)
  }

  /// Delete every matching key, returning how many the store removed
  pub async fn delete_many<T: DeserializeOwned>(
    &self,
    pattern: &str,
    params: &FindParams<T>,
  ) -> Result<u64> {
    let collected = self.collect(pattern, params, "del_many", Terminal::Delete).await?;
    Ok(collected.deleted)
  }

  async fn collect<T: DeserializeOwned>(
    &self,
    pattern: &str,
    params: &FindParams<T>,
    op: &'static str,
    terminal: Terminal,
  ) -> Result<Collected<T>> {
    let keys = self.list(pattern, op).await?;
    let candidates = keys.len();
    let mut collected = Collected {
      records: Vec::new(),
      deleted: 0,
    };

    for full_key in keys {
      let Some(value) = self.fetch::<T>(&full_key, op).await? else {
        continue;
      };

      let matched = params
        .matches(&full_key, &value)
        .await
        .map_err(|e| HelperError::unexpected(op, e))?;
      if !matched {
        continue;
      }

      match terminal {
        Terminal::Collect => collected.records.push(KeyValue {
          key: self.codec.strip_prefix(&full_key).to_string(),
          full_key,
          value,
        }),
        Terminal::Delete => {
          collected.deleted += self
            .store
            .del(&full_key)
            .await
            .map_err(|e| HelperError::store(op, e))?;
        }
      }
    }

    tracing::debug!(
      "{} over {}: {} candidates, {} matched, {} deleted",
      op,
      pattern,
      candidates,
      collected.records.len(),
      collected.deleted
    );
    Ok(collected)
  }
}
