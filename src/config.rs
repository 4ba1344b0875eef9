//! Connection and helper configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{HelperError, Result};

/// Config files searched by [`Config::find_and_load`]
const CONFIG_FILES: [&str; 2] = ["redis-helper.yaml", "redis-helper.yml"];

/// Expand `$VAR_NAME` and `${VAR_NAME}` references. Unset variables expand to "".
fn expand_env_vars(input: &str) -> String {
  let mut result = String::with_capacity(input.len());
  let mut rest = input;

  while let Some(pos) = rest.find('$') {
    result.push_str(&rest[..pos]);
    let after = &rest[pos + 1..];

    if let Some(braced) = after.strip_prefix('{') {
      if let Some(end) = braced.find('}') {
        result.push_str(&std::env::var(&braced[..end]).unwrap_or_default());
        rest = &braced[end + 1..];
        continue;
      }
      result.push('$');
      rest = after;
      continue;
    }

    let var_len = after
      .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
      .unwrap_or(after.len());
    if var_len == 0 {
      result.push('$');
    } else {
      result.push_str(&std::env::var(&after[..var_len]).unwrap_or_default());
    }
    rest = &after[var_len..];
  }

  result.push_str(rest);
  result
}

/// Expire unit used by SET
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpireUnit {
  /// `EX`: expire time in seconds
  #[default]
  #[serde(rename = "EX")]
  Seconds,
  /// `PX`: expire time in milliseconds
  #[serde(rename = "PX")]
  Milliseconds,
}

impl ExpireUnit {
  pub fn token(self) -> &'static str {
    match self {
      ExpireUnit::Seconds => "EX",
      ExpireUnit::Milliseconds => "PX",
    }
  }
}

impl std::str::FromStr for ExpireUnit {
  type Err = HelperError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "EX" => Ok(ExpireUnit::Seconds),
      "PX" => Ok(ExpireUnit::Milliseconds),
      _ => Err(HelperError::configuration(format!(
        "invalid expire unit {:?}, expected \"EX\" or \"PX\"",
        s
      ))),
    }
  }
}

impl std::fmt::Display for ExpireUnit {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.token())
  }
}

/// Redis server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
  /// Full connection URL; overrides every other field when set
  #[serde(default)]
  pub url: Option<String>,

  /// Redis host
  #[serde(default = "default_host")]
  pub host: String,

  /// Redis port
  #[serde(default = "default_port")]
  pub port: u16,

  /// ACL username (optional)
  #[serde(default)]
  pub username: Option<String>,

  /// Redis password (optional)
  #[serde(default)]
  pub password: Option<String>,

  /// Redis database number
  #[serde(default)]
  pub database: u8,

  /// Enable TLS
  #[serde(default)]
  pub tls_enabled: bool,
}

fn default_host() -> String {
  "localhost".to_string()
}

fn default_port() -> u16 {
  6379
}

impl Default for ConnectionConfig {
  fn default() -> Self {
    Self {
      url: None,
      host: default_host(),
      port: default_port(),
      username: None,
      password: None,
      database: 0,
      tls_enabled: false,
    }
  }
}

impl ConnectionConfig {
  pub fn new(host: impl Into<String>, port: u16) -> Self {
    Self {
      host: host.into(),
      port,
      ..Self::default()
    }
  }

  /// Generate Redis connection URL
  pub fn connection_url(&self) -> String {
    if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
      return url.to_string();
    }

    let scheme = if self.tls_enabled { "rediss" } else { "redis" };
    let auth = match (&self.username, &self.password) {
      (Some(user), Some(pwd)) if !pwd.is_empty() => format!("{}:{}@", user, pwd),
      (None, Some(pwd)) if !pwd.is_empty() => format!(":{}@", pwd),
      (Some(user), _) if !user.is_empty() => format!("{}@", user),
      _ => String::new(),
    };
    format!(
      "{}://{}{}:{}/{}",
      scheme, auth, self.host, self.port, self.database
    )
  }
}

/// Facade settings, validated when a helper is built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperConfig {
  /// Key namespace; `"app"` makes keys look like `app:<key>`
  #[serde(default)]
  pub prefix: String,

  /// Default expiration (0 = no expiry)
  #[serde(default)]
  pub expire: i64,

  /// `EX` (seconds) or `PX` (milliseconds)
  #[serde(default = "default_expire_unit")]
  pub expire_unit: String,
}

fn default_expire_unit() -> String {
  ExpireUnit::Seconds.token().to_string()
}

impl Default for HelperConfig {
  fn default() -> Self {
    Self {
      prefix: String::new(),
      expire: 0,
      expire_unit: default_expire_unit(),
    }
  }
}

impl HelperConfig {
  pub fn new(prefix: impl Into<String>, expire: i64) -> Self {
    Self {
      prefix: prefix.into(),
      expire,
      ..Self::default()
    }
  }

  pub fn with_unit(mut self, unit: ExpireUnit) -> Self {
    self.expire_unit = unit.token().to_string();
    self
  }

  /// Check the default expiration and unit
  pub fn validate(&self) -> Result<(u64, ExpireUnit)> {
    let expire = u64::try_from(self.expire).map_err(|_| {
      HelperError::configuration(format!(
        "invalid expire {}, must be a non-negative number",
        self.expire
      ))
    })?;
    let unit = self.expire_unit.parse::<ExpireUnit>()?;
    Ok((expire, unit))
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_level")]
  pub level: String,
}

fn default_level() -> String {
  "info".into()
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_level(),
    }
  }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub connection: ConnectionConfig,
  #[serde(default)]
  pub helper: HelperConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

impl Config {
  pub fn from_yaml(content: &str) -> Result<Self> {
    let expanded = expand_env_vars(content);
    serde_yaml::from_str(&expanded)
      .map_err(|e| HelperError::configuration(format!("invalid config: {}", e)))
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
      HelperError::configuration(format!("cannot read {}: {}", path.display(), e))
    })?;
    Self::from_yaml(&content)
  }

  pub fn find_and_load() -> Result<Option<Self>> {
    for p in CONFIG_FILES {
      if Path::new(p).exists() {
        tracing::info!("Loading config from {}", p);
        return Ok(Some(Self::from_file(p)?));
      }
    }
    Ok(None)
  }
}
