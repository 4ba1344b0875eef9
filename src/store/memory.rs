//! In-process store with Redis command semantics

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::{Expiration, RemoteStore, ScanCursor, ScanPage};
use crate::error::StoreError;

/// Keys examined per SCAN call (Redis' default COUNT)
const DEFAULT_SCAN_COUNT: usize = 10;

/// Marks a cursor that resumes after the key following it
const CURSOR_MARK: char = '>';

/// Deadline for a TTL, rejected like Redis' "invalid expire time"
fn deadline(ttl: Duration) -> Result<Instant, StoreError> {
  Instant::now()
    .checked_add(ttl)
    .ok_or_else(|| StoreError::InvalidValue("invalid expire time".into()))
}

/// A stored payload with its deadline
#[derive(Debug, Clone)]
struct Entry {
  payload: String,
  expires_at: Option<Instant>,
}

impl Entry {
  fn new(payload: String, ttl: Option<Duration>) -> Result<Self, StoreError> {
    Ok(Self {
      payload,
      expires_at: ttl.map(deadline).transpose()?,
    })
  }

  fn persistent(payload: String) -> Self {
    Self {
      payload,
      expires_at: None,
    }
  }

  fn is_expired(&self) -> bool {
    self
      .expires_at
      .map(|exp| Instant::now() >= exp)
      .unwrap_or(false)
  }
}

/// In-memory [`RemoteStore`].
///
/// Keys iterate in lexicographic order. SCAN walks that order `scan_count`
/// keys at a time and filters each window by the pattern, so a batch can
/// come back empty while the cursor is not yet complete, as with Redis.
pub struct MemoryStore {
  data: RwLock<BTreeMap<String, Entry>>,
  scan_count: usize,
  closed: AtomicBool,
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::with_scan_count(DEFAULT_SCAN_COUNT)
  }

  pub fn with_scan_count(scan_count: usize) -> Self {
    Self {
      data: RwLock::new(BTreeMap::new()),
      scan_count: scan_count.max(1),
      closed: AtomicBool::new(false),
    }
  }

  /// Number of live keys
  pub fn len(&self) -> usize {
    self.data.read().values().filter(|e| !e.is_expired()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Drop expired entries, returning how many were removed
  pub fn evict_expired(&self) -> usize {
    let mut data = self.data.write();
    let before = data.len();
    data.retain(|_, entry| !entry.is_expired());
    before - data.len()
  }

  fn check_open(&self) -> Result<(), StoreError> {
    if self.closed.load(Ordering::Acquire) {
      Err(StoreError::Closed)
    } else {
      Ok(())
    }
  }

  fn live_keys(&self) -> Vec<String> {
    self
      .data
      .read()
      .iter()
      .filter(|(_, e)| !e.is_expired())
      .map(|(k, _)| k.clone())
      .collect()
  }
}

#[async_trait]
impl RemoteStore for MemoryStore {
  async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    self.check_open()?;
    let mut data = self.data.write();
    let expired = match data.get(key) {
      Some(entry) if !entry.is_expired() => return Ok(Some(entry.payload.clone())),
      Some(_) => true,
      None => false,
    };
    if expired {
      data.remove(key);
    }
    Ok(None)
  }

  async fn set(
    &self,
    key: &str,
    payload: &str,
    expiration: Option<Expiration>,
  ) -> Result<(), StoreError> {
    self.check_open()?;
    let entry = Entry::new(payload.to_string(), expiration.map(|e| e.as_duration()))?;
    self.data.write().insert(key.to_string(), entry);
    Ok(())
  }

  async fn del(&self, key: &str) -> Result<u64, StoreError> {
    self.check_open()?;
    let removed = self.data.write().remove(key);
    Ok(match removed {
      Some(entry) if !entry.is_expired() => 1,
      _ => 0,
    })
  }

  async fn incr(&self, key: &str) -> Result<i64, StoreError> {
    self.check_open()?;
    let mut data = self.data.write();

    if let Some(entry) = data.get_mut(key) {
      if entry.is_expired() {
        *entry = Entry::persistent("1".to_string());
        return Ok(1);
      }

      let current = entry
        .payload
        .parse::<i64>()
        .map_err(|_| StoreError::InvalidValue("value is not an integer or out of range".into()))?;
      let next = current
        .checked_add(1)
        .ok_or_else(|| StoreError::InvalidValue("increment or decrement would overflow".into()))?;
      // INCR keeps the existing TTL
      entry.payload = next.to_string();
      Ok(next)
    } else {
      data.insert(key.to_string(), Entry::persistent("1".to_string()));
      Ok(1)
    }
  }

  async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
    self.check_open()?;
    let mut data = self.data.write();
    match data.get_mut(key) {
      Some(entry) if !entry.is_expired() => {
        entry.expires_at = Some(deadline(Duration::from_secs(seconds))?);
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
    self.check_open()?;
    let regex = glob_to_regex(pattern)?;
    Ok(
      self
        .live_keys()
        .into_iter()
        .filter(|k| regex.is_match(k))
        .collect(),
    )
  }

  async fn scan(&self, cursor: &ScanCursor, pattern: &str) -> Result<ScanPage, StoreError> {
    self.check_open()?;
    let start = if cursor.is_complete() {
      Bound::Unbounded
    } else {
      let last = cursor
        .as_str()
        .strip_prefix(CURSOR_MARK)
        .ok_or_else(|| StoreError::InvalidValue(format!("invalid cursor {}", cursor)))?;
      Bound::Excluded(last.to_string())
    };
    let regex = glob_to_regex(pattern)?;

    // One key past the window tells whether the walk is finished
    let data = self.data.read();
    let mut examined: Vec<&String> = data
      .range((start, Bound::Unbounded))
      .filter(|(_, e)| !e.is_expired())
      .map(|(k, _)| k)
      .take(self.scan_count + 1)
      .collect();
    let more = examined.len() > self.scan_count;
    examined.truncate(self.scan_count);

    let next = match examined.last() {
      Some(last) if more => ScanCursor::new(format!("{}{}", CURSOR_MARK, last)),
      _ => ScanCursor::start(),
    };
    let keys = examined
      .into_iter()
      .filter(|k| regex.is_match(k))
      .cloned()
      .collect();
    Ok(ScanPage { cursor: next, keys })
  }

  async fn close(&self) -> Result<(), StoreError> {
    self.closed.store(true, Ordering::Release);
    Ok(())
  }

  fn is_open(&self) -> bool {
    !self.closed.load(Ordering::Acquire)
  }
}

/// Convert a Redis glob pattern to a regex
fn glob_to_regex(pattern: &str) -> Result<regex::Regex, StoreError> {
  let mut regex_str = String::with_capacity(pattern.len() * 2);
  regex_str.push('^');

  let mut chars = pattern.chars();
  while let Some(c) = chars.next() {
    match c {
      '*' => regex_str.push_str(".*"),
      '?' => regex_str.push('.'),
      '\\' => match chars.next() {
        Some(escaped) => regex_str.push_str(&regex::escape(&escaped.to_string())),
        None => regex_str.push_str("\\\\"),
      },
      '[' => {
        let mut class = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
          if inner == ']' {
            closed = true;
            break;
          }
          if inner == '^' && class.is_empty() {
            class.push('^');
            continue;
          }
          if matches!(inner, '\\' | '[' | '&' | '~') {
            class.push('\\');
          }
          class.push(inner);
        }
        if closed && !class.is_empty() && class != "^" {
          regex_str.push('[');
          regex_str.push_str(&class);
          regex_str.push(']');
        } else {
          regex_str.push_str(&regex::escape(&format!("[{}", class)));
        }
      }
      _ => regex_str.push_str(&regex::escape(&c.to_string())),
    }
  }

  regex_str.push('$');
  regex::Regex::new(&regex_str)
    .or_else(|_| regex::Regex::new(&format!("^{}$", regex::escape(pattern))))
    .map_err(|e| StoreError::InvalidValue(format!("invalid pattern {}: {}", pattern, e)))
}
