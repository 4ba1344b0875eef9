//! Error types for helper operations

use std::sync::Arc;

/// Boxed cause for failures raised by local logic
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for helper operations
pub type Result<T> = std::result::Result<T, HelperError>;

/// Observer invoked once for every failed public operation
pub type ErrorHandler = Arc<dyn Fn(&HelperError) + Send + Sync>;

/// Default observer: report through tracing
pub fn log_error_handler() -> ErrorHandler {
  Arc::new(|err: &HelperError| {
    tracing::error!(code = err.kind().code(), "Redis helper error: {}", err);
  })
}

/// Error reported by a remote store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[cfg(feature = "redis")]
  #[error(transparent)]
  Redis(#[from] redis::RedisError),

  /// The store rejected the request (e.g. INCR on a non-integer)
  #[error("invalid value: {0}")]
  InvalidValue(String),

  /// The handle was closed
  #[error("connection closed")]
  Closed,
}

/// Helper error, one of three kinds
#[derive(Debug, thiserror::Error)]
pub enum HelperError {
  /// The remote store reported an error for a well-formed request
  #[error("redis helper error [{op}]: {source}")]
  Store {
    op: &'static str,
    #[source]
    source: StoreError,
  },

  /// Local logic failed (serialization, value producer, filter)
  #[error("redis helper error [{op}]: {source}")]
  Unexpected {
    op: &'static str,
    #[source]
    source: BoxError,
  },

  /// Invalid construction arguments or unsafe configuration state
  #[error("redis helper configuration error: {0}")]
  Configuration(String),
}

/// Error kind with the numeric codes used by the helper's error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Store,
  Unexpected,
  Configuration,
}

impl ErrorKind {
  pub fn code(self) -> u8 {
    match self {
      ErrorKind::Store => 1,
      ErrorKind::Unexpected => 2,
      ErrorKind::Configuration => 3,
    }
  }
}

impl std::fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ErrorKind::Store => write!(f, "store"),
      ErrorKind::Unexpected => write!(f, "unexpected"),
      ErrorKind::Configuration => write!(f, "configuration"),
    }
  }
}

impl HelperError {
  pub fn store(op: &'static str, source: impl Into<StoreError>) -> Self {
    HelperError::Store {
      op,
      source: source.into(),
    }
  }

  pub fn unexpected(op: &'static str, source: impl Into<BoxError>) -> Self {
    HelperError::Unexpected {
      op,
      source: source.into(),
    }
  }

  pub fn configuration(msg: impl Into<String>) -> Self {
    HelperError::Configuration(msg.into())
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      HelperError::Store { .. } => ErrorKind::Store,
      HelperError::Unexpected { .. } => ErrorKind::Unexpected,
      HelperError::Configuration(_) => ErrorKind::Configuration,
    }
  }

  /// Name of the operation that failed, if any
  pub fn op(&self) -> Option<&'static str> {
    match self {
      HelperError::Store { op, .. } | HelperError::Unexpected { op, .. } => Some(op),
      HelperError::Configuration(_) => None,
    }
  }
}
