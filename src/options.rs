//! Per-call options

/// Overrides for a single call; unset fields fall back to helper defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HelperOptions {
  /// Apply the helper's key prefix (default: only when a prefix is set)
  pub use_key_prefix: Option<bool>,
  /// Expiration for writes, in the helper's expire unit
  pub expire: Option<u64>,
}

/// Options after merging overrides with defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveOptions {
  pub use_key_prefix: bool,
  pub expire: u64,
}

impl HelperOptions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Keys are already full
  pub fn without_prefix() -> Self {
    Self::new().use_key_prefix(false)
  }

  pub fn use_key_prefix(mut self, use_key_prefix: bool) -> Self {
    self.use_key_prefix = Some(use_key_prefix);
    self
  }

  pub fn expire(mut self, expire: u64) -> Self {
    self.expire = Some(expire);
    self
  }

  pub fn merge(self, defaults: EffectiveOptions) -> EffectiveOptions {
    EffectiveOptions {
      use_key_prefix: self.use_key_prefix.unwrap_or(defaults.use_key_prefix),
      expire: self.expire.unwrap_or(defaults.expire),
    }
  }
}
