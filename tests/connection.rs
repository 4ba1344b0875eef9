//! Connection handler tests

use async_trait::async_trait;
use redis_helper::store::{Expiration, ScanCursor, ScanPage};
use redis_helper::{
  ConnectionHandler, Connector, ErrorKind, HelperConfig, HelperError, HelperOptions, MemoryStore,
  RemoteStore, StoreError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct MemoryConnector;

#[async_trait]
impl Connector for MemoryConnector {
  async fn connect(&self) -> Result<Arc<dyn RemoteStore>, StoreError> {
    Ok(Arc::new(MemoryStore::new()))
  }
}

struct RefusingConnector;

#[async_trait]
impl Connector for RefusingConnector {
  async fn connect(&self) -> Result<Arc<dyn RemoteStore>, StoreError> {
    Err(StoreError::Closed)
  }
}

/// Store whose close always fails
struct StickyStore {
  inner: MemoryStore,
  close_attempted: Arc<AtomicBool>,
}

#[async_trait]
impl RemoteStore for StickyStore {
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    self.inner.get(key).await
  }

  async fn set(
    &self,
    key: &str,
    payload: &str,
    expiration: Option<Expiration>,
  ) -> Result<(), StoreError> {
    self.inner.set(key, payload, expiration).await
  }

  async fn del(&self, key: &str) -> Result<u64, StoreError> {
    self.inner.del(key).await
  }

  async fn incr(&self, key: &str) -> Result<i64, StoreError> {
    self.inner.incr(key).await
  }

  async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
    self.inner.expire(key, seconds).await
  }

  async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
    self.inner.keys(pattern).await
  }

  async fn scan(&self, cursor: &ScanCursor, pattern: &str) -> Result<ScanPage, StoreError> {
    self.inner.scan(cursor, pattern).await
  }

  async fn close(&self) -> Result<(), StoreError> {
    self.close_attempted.store(true, Ordering::SeqCst);
    Err(StoreError::InvalidValue("socket stuck".into()))
  }
}

struct StickyConnector {
  close_attempted: Arc<AtomicBool>,
}

#[async_trait]
impl Connector for StickyConnector {
  async fn connect(&self) -> Result<Arc<dyn RemoteStore>, StoreError> {
    Ok(Arc::new(StickyStore {
      inner: MemoryStore::new(),
      close_attempted: self.close_attempted.clone(),
    }))
  }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_helpers_share_one_connection() {
  let connection = ConnectionHandler::from_connector(MemoryConnector);
  let a = connection.create(HelperConfig::new("a", 0)).await.unwrap();
  let b = connection.create(HelperConfig::new("b", 0)).await.unwrap();

  a.set("k", 1i64).await.unwrap();
  assert!(Arc::ptr_eq(a.store(), b.store()));
  let shared = b
    .get_with::<i64>("a:k", HelperOptions::without_prefix())
    .await
    .unwrap();
  assert_eq!(shared, Some(1));
}

#[tokio::test]
async fn test_helper_fails_after_close() {
  let connection = ConnectionHandler::from_connector(MemoryConnector);
  let helper = connection.create(HelperConfig::new("a", 0)).await.unwrap();
  connection.close().await.unwrap();

  let err = helper.get::<i64>("k").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Store);
  assert!(matches!(
    err,
    HelperError::Store {
      source: StoreError::Closed,
      ..
    }
  ));
}

#[tokio::test]
async fn test_connect_failure_is_store_error() {
  let connection = ConnectionHandler::from_connector(RefusingConnector);
  let err = connection.instance().await.err().unwrap();
  assert_eq!(err.kind(), ErrorKind::Store);
  assert_eq!(err.op(), Some("connect"));
}

#[tokio::test]
async fn test_create_validates_config() {
  let connection = ConnectionHandler::from_connector(MemoryConnector);
  let err = connection
    .create(HelperConfig::new("a", -5))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_close_failure_is_reported_not_raised() {
  let close_attempted = Arc::new(AtomicBool::new(false));
  let reported: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
  let sink = reported.clone();

  let connection = ConnectionHandler::from_connector(StickyConnector {
    close_attempted: close_attempted.clone(),
  })
  .with_error_handler(Arc::new(move |err: &HelperError| {
    sink.lock().unwrap().push(err.to_string());
  }));

  connection.instance().await.unwrap();
  connection.close().await.unwrap();

  assert!(close_attempted.load(Ordering::SeqCst));
  let reported = reported.lock().unwrap();
  assert_eq!(reported.len(), 1);
  assert!(reported[0].contains("socket stuck"));
}

#[tokio::test]
async fn test_external_connection_cannot_be_closed() {
  let store: Arc<dyn RemoteStore> = Arc::new(MemoryStore::new());
  let connection = ConnectionHandler::from_store(store.clone());
  assert!(connection.is_external());

  let helper = connection.create(HelperConfig::new("ext", 0)).await.unwrap();
  helper.set("k", 1i64).await.unwrap();

  let err = connection.close().await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Configuration);
  assert!(store.is_open());
  assert_eq!(helper.get::<i64>("k").await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_handler_error_observer_reaches_helpers() {
  let reported: Arc<Mutex<Vec<ErrorKind>>> = Arc::new(Mutex::new(Vec::new()));
  let sink = reported.clone();
  let connection = ConnectionHandler::from_connector(MemoryConnector)
    .with_error_handler(Arc::new(move |err: &HelperError| {
      sink.lock().unwrap().push(err.kind());
    }));

  let helper = connection.create(HelperConfig::new("", 0)).await.unwrap();
  assert!(helper.clear().await.is_err());
  assert_eq!(*reported.lock().unwrap(), vec![ErrorKind::Configuration]);
}
