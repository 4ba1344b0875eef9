//! Match predicates for find / delete-many

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Default key pattern: everything under the namespace
pub const DEFAULT_KEY_PATTERN: &str = "*";

/// Predicate over a candidate key and its stored value.
///
/// The key passed in is the full (prefixed) key. Synchronous predicates
/// just return a ready result; an `Err` aborts the whole operation.
#[async_trait]
pub trait KeyFilter<T>: Send + Sync {
  async fn matches(&self, full_key: &str, value: &T) -> anyhow::Result<bool>;
}

/// Synchronous closure predicate
pub struct FnFilter<F>(pub F);

#[async_trait]
impl<T, F> KeyFilter<T> for FnFilter<F>
where
  T: Sync,
  F: Fn(&str, &T) -> bool + Send + Sync,
{
  async fn matches(&self, full_key: &str, value: &T) -> anyhow::Result<bool> {
    Ok((self.0)(full_key, value))
  }
}

/// Asynchronous, fallible closure predicate. Receives owned copies.
pub struct AsyncFnFilter<F>(pub F);

#[async_trait]
impl<T, F, Fut> KeyFilter<T> for AsyncFnFilter<F>
where
  T: Clone + Send + Sync,
  F: Fn(String, T) -> Fut + Send + Sync,
  Fut: Future<Output = anyhow::Result<bool>> + Send,
{
  async fn matches(&self, full_key: &str, value: &T) -> anyhow::Result<bool> {
    (self.0)(full_key.to_string(), value.clone()).await
  }
}

/// Key pattern plus optional value filter
pub struct FindParams<T> {
  /// Wildcard pattern, prefixed unless prefixing is turned off
  pub key_pattern: String,
  /// `None` accepts every key with a value
  pub filter: Option<Arc<dyn KeyFilter<T>>>,
}

impl<T> Default for FindParams<T> {
  fn default() -> Self {
    Self {
      key_pattern: DEFAULT_KEY_PATTERN.to_string(),
      filter: None,
    }
  }
}

impl<T> Clone for FindParams<T> {
  fn clone(&self) -> Self {
    Self {
      key_pattern: self.key_pattern.clone(),
      filter: self.filter.clone(),
    }
  }
}

impl<T> std::fmt::Debug for FindParams<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FindParams")
      .field("key_pattern", &self.key_pattern)
      .field("filter", &self.filter.is_some())
      .finish()
  }
}

impl<T> FindParams<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn pattern(key_pattern: impl Into<String>) -> Self {
    Self {
      key_pattern: key_pattern.into(),
      filter: None,
    }
  }

  pub fn with_pattern(mut self, key_pattern: impl Into<String>) -> Self {
    self.key_pattern = key_pattern.into();
    self
  }

  pub fn with_key_filter(mut self, filter: impl KeyFilter<T> + 'static) -> Self {
    self.filter = Some(Arc::new(filter));
    self
  }

  pub fn filter<F>(self, f: F) -> Self
  where
    T: Sync,
    F: Fn(&str, &T) -> bool + Send + Sync + 'static,
  {
    self.with_key_filter(FnFilter(f))
  }

  pub fn filter_async<F, Fut>(self, f: F) -> Self
  where
    T: Clone + Send + Sync,
    F: Fn(String, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
  {
    self.with_key_filter(AsyncFnFilter(f))
  }

  /// Evaluate the filter; no filter means match
  pub(crate) async fn matches(&self, full_key: &str, value: &T) -> anyhow::Result<bool> {
    match &self.filter {
      Some(filter) => filter.matches(full_key, value).await,
      None => Ok(true),
    }
  }
}
