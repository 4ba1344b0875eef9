//! Key namespacing

/// Separator between the prefix and the logical key
pub const PREFIX_SEPARATOR: char = ':';

/// Applies and strips the helper's key prefix.
///
/// The stored prefix already carries its trailing separator, so an empty
/// namespace is the empty string and `"app"` is stored as `"app:"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCodec {
  prefix: String,
}

impl KeyCodec {
  pub fn new(namespace: &str) -> Self {
    let prefix = if namespace.is_empty() {
      String::new()
    } else {
      format!("{}{}", namespace, PREFIX_SEPARATOR)
    };
    Self { prefix }
  }

  /// Prefix including its separator (empty when no namespace is set)
  pub fn prefix(&self) -> &str {
    &self.prefix
  }

  pub fn has_prefix(&self) -> bool {
    !self.prefix.is_empty()
  }

  /// Build the full key
  pub fn apply_prefix(&self, key: &str) -> String {
    format!("{}{}", self.prefix, key)
  }

  /// Remove the prefix from a full key.
  ///
  /// Drops exactly as many leading characters as the prefix has, so keys
  /// listed without prefix expansion are trimmed the same way.
  pub fn strip_prefix<'a>(&self, full_key: &'a str) -> &'a str {
    if self.prefix.is_empty() {
      return full_key;
    }
    if let Some(key) = full_key.strip_prefix(self.prefix.as_str()) {
      return key;
    }
    let skip = self.prefix.chars().count();
    match full_key.char_indices().nth(skip) {
      Some((idx, _)) => &full_key[idx..],
      None => "",
    }
  }
}
