//! Scan engine tests against a scripted store

use async_trait::async_trait;
use parking_lot::Mutex;
use redis_helper::store::{Expiration, ScanCursor, ScanPage};
use redis_helper::{
  ErrorKind, FindParams, HelperConfig, MemoryStore, RedisHelper, RemoteStore, StoreError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Store whose SCAN replies and GET failures are scripted
#[derive(Default)]
struct ScriptedStore {
  values: Mutex<HashMap<String, String>>,
  listing: Vec<String>,
  pages: Mutex<VecDeque<ScanPage>>,
  failing_get: Option<String>,
  scan_calls: Mutex<Vec<String>>,
  deleted: Mutex<Vec<String>>,
}

impl ScriptedStore {
  fn with_values(values: &[(&str, &str)]) -> Self {
    Self {
      values: Mutex::new(
        values
          .iter()
          .map(|(k, v)| (k.to_string(), v.to_string()))
          .collect(),
      ),
      listing: values.iter().map(|(k, _)| k.to_string()).collect(),
      ..Self::default()
    }
  }

  fn pages(self, pages: Vec<(&str, Vec<&str>)>) -> Self {
    *self.pages.lock() = pages
      .into_iter()
      .map(|(cursor, keys)| ScanPage {
        cursor: ScanCursor::new(cursor),
        keys: keys.into_iter().map(String::from).collect(),
      })
      .collect();
    self
  }
}

#[async_trait]
impl RemoteStore for ScriptedStore {
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    if self.failing_get.as_deref() == Some(key) {
      return Err(StoreError::InvalidValue(format!("cannot read {}", key)));
    }
    Ok(self.values.lock().get(key).cloned())
  }

  async fn set(
    &self,
    key: &str,
    payload: &str,
    _expiration: Option<Expiration>,
  ) -> Result<(), StoreError> {
    self
      .values
      .lock()
      .insert(key.to_string(), payload.to_string());
    Ok(())
  }

  async fn del(&self, key: &str) -> Result<u64, StoreError> {
    self.deleted.lock().push(key.to_string());
    Ok(self.values.lock().remove(key).map(|_| 1).unwrap_or(0))
  }

  async fn incr(&self, _key: &str) -> Result<i64, StoreError> {
    Err(StoreError::InvalidValue("not scripted".into()))
  }

  async fn expire(&self, _key: &str, _seconds: u64) -> Result<bool, StoreError> {
    Ok(false)
  }

  async fn keys(&self, _pattern: &str) -> Result<Vec<String>, StoreError> {
    Ok(self.listing.clone())
  }

  async fn scan(&self, cursor: &ScanCursor, _pattern: &str) -> Result<ScanPage, StoreError> {
    self.scan_calls.lock().push(cursor.to_string());
    Ok(self.pages.lock().pop_front().unwrap_or(ScanPage {
      cursor: ScanCursor::start(),
      keys: Vec::new(),
    }))
  }
}

fn helper(store: Arc<ScriptedStore>) -> RedisHelper {
  RedisHelper::new(store, HelperConfig::new("test", 0)).unwrap()
}

// =============================================================================
// Cursor Strategy
// =============================================================================

#[tokio::test]
async fn test_scan_terminates_on_first_zero_cursor() {
  let store = Arc::new(ScriptedStore::default().pages(vec![("0", vec![])]));
  let results = helper(store.clone()).search("*").await.unwrap();

  assert!(results.is_empty());
  assert_eq!(*store.scan_calls.lock(), vec!["0"]);
}

#[tokio::test]
async fn test_scan_follows_cursor_through_empty_batches() {
  let store = Arc::new(ScriptedStore::default().pages(vec![
    ("17", vec![]),
    ("42", vec!["test:b", "test:a"]),
    ("9", vec![]),
    ("0", vec!["test:c"]),
  ]));
  let results = helper(store.clone()).search("*").await.unwrap();

  assert_eq!(
    results.keys().collect::<Vec<_>>(),
    vec!["test:b", "test:a", "test:c"]
  );
  assert_eq!(*store.scan_calls.lock(), vec!["0", "17", "42", "9"]);
}

#[tokio::test]
async fn test_scan_deduplicates_keys_across_batches() {
  let store = Arc::new(ScriptedStore::default().pages(vec![
    ("5", vec!["test:a", "test:b"]),
    ("3", vec!["test:b", "test:c", "test:a"]),
    ("0", vec!["test:c"]),
  ]));
  let results = helper(store).search("*").await.unwrap();

  assert_eq!(results.len(), 3);
  assert_eq!(
    results.keys().collect::<Vec<_>>(),
    vec!["test:a", "test:b", "test:c"]
  );
}

// =============================================================================
// Listing Strategy
// =============================================================================

#[tokio::test]
async fn test_find_keeps_listing_order() {
  let store = Arc::new(ScriptedStore::with_values(&[
    ("test:c", "3"),
    ("test:a", "1"),
    ("test:b", "2"),
  ]));
  let found = helper(store).find(FindParams::<i64>::new()).await.unwrap();

  let keys: Vec<&str> = found.iter().map(|r| r.key.as_str()).collect();
  assert_eq!(keys, vec!["c", "a", "b"]);
}

#[tokio::test]
async fn test_find_skips_keys_gone_before_fetch() {
  let store = ScriptedStore::with_values(&[("test:a", "1"), ("test:b", "2")]);
  let mut listing = store.listing.clone();
  listing.insert(1, "test:gone".to_string());
  let store = Arc::new(ScriptedStore { listing, ..store });

  let found = helper(store).find(FindParams::<i64>::new()).await.unwrap();
  assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn test_fetch_error_aborts_find() {
  let store = ScriptedStore::with_values(&[("test:a", "1"), ("test:b", "2")]);
  let store = Arc::new(ScriptedStore {
    failing_get: Some("test:b".to_string()),
    ..store
  });

  let err = helper(store).find(FindParams::<i64>::new()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Store);
  assert_eq!(err.op(), Some("find"));
}

#[tokio::test]
async fn test_filter_error_aborts_del_many_midway() {
  let store = Arc::new(ScriptedStore::with_values(&[
    ("test:a", "1"),
    ("test:b", "2"),
    ("test:c", "3"),
  ]));

  let err = helper(store.clone())
    .del_many(FindParams::<i64>::new().filter_async(|key, _| async move {
      if key == "test:b" {
        anyhow::bail!("filter failed");
      }
      Ok(true)
    }))
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Unexpected);
  // Keys before the failure were already deleted
  assert_eq!(*store.deleted.lock(), vec!["test:a"]);
}

#[tokio::test]
async fn test_del_many_counts_store_deletes() {
  let store = Arc::new(ScriptedStore::with_values(&[("test:a", "1"), ("test:b", "2")]));
  let deleted = helper(store.clone())
    .del_many(FindParams::<i64>::new().filter(|_, value| *value > 1))
    .await
    .unwrap();

  assert_eq!(deleted, 1);
  assert_eq!(*store.deleted.lock(), vec!["test:b"]);
}

#[tokio::test]
async fn test_pattern_is_prefixed_for_memory_store() {
  let store = Arc::new(MemoryStore::with_scan_count(1));
  let a = RedisHelper::new(store.clone(), HelperConfig::new("a", 0)).unwrap();
  let b = RedisHelper::new(store.clone(), HelperConfig::new("b", 0)).unwrap();
  for key in ["x1", "x2", "y1"] {
    a.set(key, 1i64).await.unwrap();
    b.set(key, 2i64).await.unwrap();
  }

  let results = a.search("x*").await.unwrap();
  assert_eq!(results.keys().collect::<Vec<_>>(), vec!["a:x1", "a:x2"]);

  let found = b.find(FindParams::<i64>::pattern("y*")).await.unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].full_key, "b:y1");
  assert_eq!(found[0].value, 2);
}
