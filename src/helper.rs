//! Cache facade over a remote store

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ExpireUnit, HelperConfig};
use crate::error::{ErrorHandler, HelperError, Result};
use crate::filter::{FindParams, DEFAULT_KEY_PATTERN};
use crate::key::KeyCodec;
use crate::options::{EffectiveOptions, HelperOptions};
use crate::scan::{KeyValue, ScanCollector};
use crate::store::{Expiration, RemoteStore};
use crate::value::{self, Deferred};

#[derive(Clone)]
struct Inner {
  store: Arc<dyn RemoteStore>,
  codec: KeyCodec,
  expire: u64,
  unit: ExpireUnit,
  on_error: Option<ErrorHandler>,
}

/// Namespaced, JSON-marshalling view over a [`RemoteStore`].
///
/// Cloning is cheap; clones share the store handle and configuration.
/// Prefix, default expiration and unit are fixed at construction.
#[derive(Clone)]
pub struct RedisHelper {
  inner: Arc<Inner>,
}

impl std::fmt::Debug for RedisHelper {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RedisHelper")
      .field("prefix", &self.inner.codec.prefix())
      .field("expire", &self.inner.expire)
      .field("unit", &self.inner.unit)
      .finish()
  }
}

impl RedisHelper {
  /// Build a helper, validating the store handle and configuration
  pub fn new(store: Arc<dyn RemoteStore>, config: HelperConfig) -> Result<Self> {
    if !store.is_open() {
      return Err(HelperError::configuration(
        "invalid store handle: connection is closed",
      ));
    }
    let (expire, unit) = config.validate()?;

    Ok(Self {
      inner: Arc::new(Inner {
        store,
        codec: KeyCodec::new(&config.prefix),
        expire,
        unit,
        on_error: None,
      }),
    })
  }

  /// Observer called once for every failed operation
  pub fn with_error_handler(self, handler: ErrorHandler) -> Self {
    let mut inner = (*self.inner).clone();
    inner.on_error = Some(handler);
    Self {
      inner: Arc::new(inner),
    }
  }

  /// Prefix including its separator
  pub fn prefix(&self) -> &str {
    self.inner.codec.prefix()
  }

  pub fn default_expire(&self) -> u64 {
    self.inner.expire
  }

  pub fn expire_unit(&self) -> ExpireUnit {
    self.inner.unit
  }

  pub fn store(&self) -> &Arc<dyn RemoteStore> {
    &self.inner.store
  }

  /// Full store key for `key`
  pub fn key(&self, key: &str) -> String {
    self.inner.codec.apply_prefix(key)
  }

  /// Key without prefix
  pub fn clean_key<'a>(&self, full_key: &'a str) -> &'a str {
    self.inner.codec.strip_prefix(full_key)
  }

  fn defaults(&self) -> EffectiveOptions {
    EffectiveOptions {
      use_key_prefix: self.inner.codec.has_prefix(),
      expire: self.inner.expire,
    }
  }

  fn resolve_key(&self, key: &str, options: &EffectiveOptions) -> String {
    if options.use_key_prefix {
      self.key(key)
    } else {
      key.to_string()
    }
  }

  fn collector(&self) -> ScanCollector<'_> {
    ScanCollector::new(self.inner.store.as_ref(), &self.inner.codec)
  }

  /// Hand failures to the observer on their way out
  fn report<T>(&self, result: Result<T>) -> Result<T> {
    if let (Err(err), Some(handler)) = (&result, &self.inner.on_error) {
      handler(err);
    }
    result
  }

  // ===========================================================================
  // Single-key operations
  // ===========================================================================

  /// Store a value, returning it after resolution
  pub async fn set<T: Serialize>(&self, key: &str, value: impl Into<Deferred<T>>) -> Result<T> {
    self.set_with(key, value, HelperOptions::default()).await
  }

  pub async fn set_with<T: Serialize>(
    &self,
    key: &str,
    value: impl Into<Deferred<T>>,
    options: HelperOptions,
  ) -> Result<T> {
    let result = self.write(key, value.into(), options).await;
    self.report(result)
  }

  async fn write<T: Serialize>(
    &self,
    key: &str,
    value: Deferred<T>,
    options: HelperOptions,
  ) -> Result<T> {
    let options = options.merge(self.defaults());
    let full_key = self.resolve_key(key, &options);

    let value = value
      .resolve()
      .await
      .map_err(|e| HelperError::unexpected("set", e))?;
    let payload = value::serialize(&value).map_err(|e| HelperError::unexpected("set", e))?;

    self
      .inner
      .store
      .set(
        &full_key,
        &payload,
        Expiration::new(self.inner.unit, options.expire),
      )
      .await
      .map_err(|e| HelperError::store("set", e))?;
    Ok(value)
  }

  /// Stored value, or `None` when the key is absent
  pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    self.get_with(key, HelperOptions::default()).await
  }

  pub async fn get_with<T: DeserializeOwned>(
    &self,
    key: &str,
    options: HelperOptions,
  ) -> Result<Option<T>> {
    let result = self.read(key, options).await;
    self.report(result)
  }

  async fn read<T: DeserializeOwned>(
    &self,
    key: &str,
    options: HelperOptions,
  ) -> Result<Option<T>> {
    let options = options.merge(self.defaults());
    let full_key = self.resolve_key(key, &options);

    let payload = self
      .inner
      .store
      .get(&full_key)
      .await
      .map_err(|e| HelperError::store("get", e))?;
    value::deserialize(payload.as_deref()).map_err(|e| HelperError::unexpected("get", e))
  }

  /// Existing value, or store and return `value`.
  ///
  /// Not atomic: a concurrent writer can land between the read and the write.
  /// `value` is only resolved when the key is absent or holds JSON `null`.
  pub async fn try_get<T>(&self, key: &str, value: impl Into<Deferred<T>>) -> Result<T>
  where
    T: Serialize + DeserializeOwned,
  {
    self.try_get_with(key, value, HelperOptions::default()).await
  }

  pub async fn try_get_with<T>(
    &self,
    key: &str,
    value: impl Into<Deferred<T>>,
    options: HelperOptions,
  ) -> Result<T>
  where
    T: Serialize + DeserializeOwned,
  {
    let merged = options.merge(self.defaults());
    let full_key = self.resolve_key(key, &merged);
    let result = match self.collector().fetch::<T>(&full_key, "try_get").await {
      Ok(Some(existing)) => Ok(existing),
      Ok(None) => self.write(key, value.into(), options).await,
      Err(err) => Err(err),
    };
    self.report(result)
  }

  /// Atomic increment; returns the counter after the increment
  pub async fn incr(&self, key: &str) -> Result<i64> {
    self.incr_with(key, HelperOptions::default()).await
  }

  pub async fn incr_with(&self, key: &str, options: HelperOptions) -> Result<i64> {
    let options = options.merge(self.defaults());
    let full_key = self.resolve_key(key, &options);
    let result = self
      .inner
      .store
      .incr(&full_key)
      .await
      .map_err(|e| HelperError::store("incr", e));
    self.report(result)
  }

  /// Set or refresh the key's timeout in seconds
  pub async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
    self.expire_with(key, seconds, HelperOptions::default()).await
  }

  pub async fn expire_with(&self, key: &str, seconds: u64, options: HelperOptions) -> Result<bool> {
    let options = options.merge(self.defaults());
    let full_key = self.resolve_key(key, &options);
    let result = self
      .inner
      .store
      .expire(&full_key, seconds)
      .await
      .map_err(|e| HelperError::store("expire", e));
    self.report(result)
  }

  /// Delete one key; returns 0 or 1
  pub async fn del(&self, key: &str) -> Result<u64> {
    self.del_with(key, HelperOptions::default()).await
  }

  pub async fn del_with(&self, key: &str, options: HelperOptions) -> Result<u64> {
    let options = options.merge(self.defaults());
    let full_key = self.resolve_key(key, &options);
    let result = self
      .inner
      .store
      .del(&full_key)
      .await
      .map_err(|e| HelperError::store("del", e));
    self.report(result)
  }

  // ===========================================================================
  // Pattern operations
  // ===========================================================================

  /// Records whose key matches the pattern and whose value passes the filter
  pub async fn find<T: DeserializeOwned>(&self, params: FindParams<T>) -> Result<Vec<KeyValue<T>>> {
    self.find_with(params, HelperOptions::default()).await
  }

  pub async fn find_with<T: DeserializeOwned>(
    &self,
    params: FindParams<T>,
    options: HelperOptions,
  ) -> Result<Vec<KeyValue<T>>> {
    let options = options.merge(self.defaults());
    let pattern = self.resolve_key(&params.key_pattern, &options);
    let result = self.collector().find(&pattern, &params).await;
    self.report(result)
  }

  /// Delete records matching pattern and filter; returns the delete count
  pub async fn del_many<T: DeserializeOwned>(&self, params: FindParams<T>) -> Result<u64> {
    self.del_many_with(params, HelperOptions::default()).await
  }

  pub async fn del_many_with<T: DeserializeOwned>(
    &self,
    params: FindParams<T>,
    options: HelperOptions,
  ) -> Result<u64> {
    let options = options.merge(self.defaults());
    let pattern = self.resolve_key(&params.key_pattern, &options);
    let result = self.collector().delete_many(&pattern, &params).await;
    self.report(result)
  }

  /// Cursor-scan keys matching the pattern; values are read lazily per entry
  pub async fn search(&self, pattern: &str) -> Result<SearchResults> {
    self.search_with(pattern, HelperOptions::default()).await
  }

  pub async fn search_with(&self, pattern: &str, options: HelperOptions) -> Result<SearchResults> {
    let options = options.merge(self.defaults());
    let pattern = self.resolve_key(pattern, &options);
    let result = self
      .collector()
      .scan(&pattern, "search")
      .await
      .map(|keys| SearchResults::new(self, keys));
    self.report(result)
  }

  /// Delete every key under the prefix. Refuses to run without a prefix.
  pub async fn clear(&self) -> Result<u64> {
    if !self.inner.codec.has_prefix() {
      return self.report(Err(HelperError::configuration(
        "clear requires a key prefix; refusing to delete the whole store",
      )));
    }
    let deleted = self
      .del_many_with(
        FindParams::<serde_json::Value>::pattern(DEFAULT_KEY_PATTERN),
        HelperOptions::new().use_key_prefix(true),
      )
      .await?;
    tracing::info!("Cleared {} keys under {}", deleted, self.prefix());
    Ok(deleted)
  }
}

/// Handle bound to one full key found by [`RedisHelper::search`].
///
/// Reads and writes skip prefixing since the key is already full.
#[derive(Debug, Clone)]
pub struct SearchEntry {
  key: String,
  helper: RedisHelper,
}

impl SearchEntry {
  /// Full store key
  pub fn key(&self) -> &str {
    &self.key
  }

  pub async fn read<T: DeserializeOwned>(&self) -> Result<Option<T>> {
    self
      .helper
      .get_with(&self.key, HelperOptions::without_prefix())
      .await
  }

  pub async fn write<T: Serialize>(&self, value: impl Into<Deferred<T>>) -> Result<T> {
    self
      .helper
      .set_with(&self.key, value, HelperOptions::without_prefix())
      .await
  }
}

/// Keys found by a cursor scan, in first-seen order, each once
#[derive(Debug, Clone)]
pub struct SearchResults {
  entries: Vec<SearchEntry>,
  index: HashMap<String, usize>,
}

impl SearchResults {
  fn new(helper: &RedisHelper, keys: Vec<String>) -> Self {
    let index = keys
      .iter()
      .enumerate()
      .map(|(pos, key)| (key.clone(), pos))
      .collect();
    let entries = keys
      .into_iter()
      .map(|key| SearchEntry {
        key,
        helper: helper.clone(),
      })
      .collect();
    Self { entries, index }
  }

  /// Entry for a full key
  pub fn get(&self, full_key: &str) -> Option<&SearchEntry> {
    self.index.get(full_key).map(|&pos| &self.entries[pos])
  }

  pub fn entries(&self) -> &[SearchEntry] {
    &self.entries
  }

  pub fn iter(&self) -> std::slice::Iter<'_, SearchEntry> {
    self.entries.iter()
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.entries.iter().map(|e| e.key.as_str())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

impl<'a> IntoIterator for &'a SearchResults {
  type Item = &'a SearchEntry;
  type IntoIter = std::slice::Iter<'a, SearchEntry>;

  fn into_iter(self) -> Self::IntoIter {
    self.entries.iter()
  }
}
