//! Value marshalling and deferred value resolution

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;

type Producer<T> = Box<dyn FnOnce() -> anyhow::Result<T> + Send>;
type AsyncProducer<T> = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send>;

/// A value to store that may need resolving first.
///
/// Every way of handing a value to [`crate::RedisHelper::set`] is one of
/// these four shapes; [`Deferred::resolve`] turns any of them into the
/// concrete value, propagating the producer's failure.
pub enum Deferred<T> {
  /// Concrete value
  Ready(T),
  /// Future settling to the value
  Pending(BoxFuture<'static, anyhow::Result<T>>),
  /// Function producing the value
  Producer(Producer<T>),
  /// Function producing a future of the value
  AsyncProducer(AsyncProducer<T>),
}

impl<T> Deferred<T> {
  pub fn ready(value: T) -> Self {
    Deferred::Ready(value)
  }

  pub fn future<F>(future: F) -> Self
  where
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
  {
    Deferred::Pending(Box::pin(future))
  }

  pub fn from_fn<F>(producer: F) -> Self
  where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
  {
    Deferred::Producer(Box::new(producer))
  }

  pub fn from_async_fn<F, Fut>(producer: F) -> Self
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
  {
    Deferred::AsyncProducer(Box::new(
      move || -> BoxFuture<'static, anyhow::Result<T>> { Box::pin(producer()) },
    ))
  }

  /// Settle to the concrete value
  pub async fn resolve(self) -> anyhow::Result<T> {
    match self {
      Deferred::Ready(value) => Ok(value),
      Deferred::Pending(future) => future.await,
      Deferred::Producer(producer) => producer(),
      Deferred::AsyncProducer(producer) => producer().await,
    }
  }
}

impl<T> From<T> for Deferred<T> {
  fn from(value: T) -> Self {
    Deferred::Ready(value)
  }
}

impl<T> std::fmt::Debug for Deferred<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let shape = match self {
      Deferred::Ready(_) => "Ready",
      Deferred::Pending(_) => "Pending",
      Deferred::Producer(_) => "Producer",
      Deferred::AsyncProducer(_) => "AsyncProducer",
    };
    f.debug_tuple("Deferred").field(&shape).finish()
  }
}

/// Encode a value for the store
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
  serde_json::to_string(value)
}

/// Decode a stored payload; a missing payload is `None`
pub fn deserialize<T: DeserializeOwned>(payload: Option<&str>) -> serde_json::Result<Option<T>> {
  payload.map(serde_json::from_str).transpose()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Obj {
    k: String,
    v: i64,
    x: bool,
  }

  #[tokio::test]
  async fn test_resolve_every_shape() {
    assert_eq!(Deferred::ready(42).resolve().await.unwrap(), 42);
    assert_eq!(Deferred::from(42).resolve().await.unwrap(), 42);
    assert_eq!(
      Deferred::future(async { anyhow::Ok(42) }).resolve().await.unwrap(),
      42
    );
    assert_eq!(Deferred::from_fn(|| Ok(42)).resolve().await.unwrap(), 42);
    assert_eq!(
      Deferred::from_async_fn(|| async { anyhow::Ok(42) })
        .resolve()
        .await
        .unwrap(),
      42
    );
  }

  #[tokio::test]
  async fn test_resolve_absent_value_settles_unchanged() {
    let value: Option<i32> = Deferred::ready(None).resolve().await.unwrap();
    assert_eq!(value, None);
  }

  #[tokio::test]
  async fn test_resolve_propagates_producer_failure() {
    let err = Deferred::<i32>::from_fn(|| anyhow::bail!("boom"))
      .resolve()
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "boom");

    let err = Deferred::<i32>::from_async_fn(|| async { Err(anyhow::anyhow!("async boom")) })
      .resolve()
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "async boom");
  }

  #[test]
  fn test_serialization_roundtrip() {
    let obj = Obj {
      k: "foo".into(),
      v: 123,
      x: true,
    };
    let payload = serialize(&obj).unwrap();
    assert_eq!(deserialize::<Obj>(Some(&payload)).unwrap(), Some(obj));

    let nested = json!({"a": {"b": [1, 2.5, "c", false, null]}});
    let payload = serialize(&nested).unwrap();
    assert_eq!(
      deserialize::<serde_json::Value>(Some(&payload)).unwrap(),
      Some(nested)
    );
  }

  #[test]
  fn test_deserialize_missing_and_null() {
    assert_eq!(deserialize::<i64>(None).unwrap(), None);
    // A stored JSON null is a value, not absence
    assert_eq!(
      deserialize::<serde_json::Value>(Some("null")).unwrap(),
      Some(serde_json::Value::Null)
    );
  }

  #[test]
  fn test_deserialize_malformed_fails() {
    assert!(deserialize::<i64>(Some("{not json")).is_err());
  }
}
