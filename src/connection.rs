//! Connection lifecycle
//!
//! [`ConnectionHandler`] owns (or borrows) the one store handle shared by
//! every helper it creates. The handle is built on first use and cached
//! until `close()`.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{ConnectionConfig, HelperConfig};
use crate::error::{ErrorHandler, HelperError, Result, StoreError};
use crate::helper::RedisHelper;
use crate::store::RemoteStore;

/// Builds a store handle on demand
#[async_trait]
pub trait Connector: Send + Sync {
  async fn connect(&self) -> std::result::Result<Arc<dyn RemoteStore>, StoreError>;
}

#[cfg(feature = "redis")]
#[async_trait]
impl Connector for ConnectionConfig {
  async fn connect(&self) -> std::result::Result<Arc<dyn RemoteStore>, StoreError> {
    let store = crate::store::RedisStore::connect(self).await?;
    Ok(Arc::new(store))
  }
}

enum Source {
  /// Handle built (and owned) by this handler
  Owned(Arc<dyn Connector>),
  /// Handle supplied by the caller; never closed here
  External,
}

/// Lazily connecting owner of a shared store handle
pub struct ConnectionHandler {
  source: Source,
  store: Mutex<Option<Arc<dyn RemoteStore>>>,
  on_error: Option<ErrorHandler>,
}

impl ConnectionHandler {
  /// Connect to Redis with the given settings on first use
  #[cfg(feature = "redis")]
  pub fn from_config(config: ConnectionConfig) -> Self {
    Self::from_connector(config)
  }

  pub fn from_connector(connector: impl Connector + 'static) -> Self {
    Self {
      source: Source::Owned(Arc::new(connector)),
      store: Mutex::new(None),
      on_error: None,
    }
  }

  /// Use a handle the caller owns
  pub fn from_store(store: Arc<dyn RemoteStore>) -> Self {
    Self {
      source: Source::External,
      store: Mutex::new(Some(store)),
      on_error: None,
    }
  }

  /// Observer passed on to every helper created here
  pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
    self.on_error = Some(handler);
    self
  }

  pub fn is_external(&self) -> bool {
    matches!(self.source, Source::External)
  }

  /// Shared handle, connecting on first call
  pub async fn instance(&self) -> Result<Arc<dyn RemoteStore>> {
    let mut guard = self.store.lock().await;
    if let Some(store) = guard.as_ref() {
      return Ok(store.clone());
    }

    let connector = match &self.source {
      Source::Owned(connector) => connector,
      Source::External => {
        return Err(HelperError::configuration(
          "no connector configured for an external connection",
        ))
      }
    };

    let store = connector
      .connect()
      .await
      .map_err(|e| HelperError::store("connect", e))?;
    tracing::info!("Redis connection established");
    *guard = Some(store.clone());
    Ok(store)
  }

  /// Close the owned handle; a no-op when nothing is connected
  pub async fn close(&self) -> Result<()> {
    if self.is_external() {
      return Err(HelperError::configuration(
        "cannot close a connection this handler does not own",
      ));
    }

    let Some(store) = self.store.lock().await.take() else {
      tracing::debug!("Close requested with no open connection");
      return Ok(());
    };

    match store.close().await {
      Ok(()) => tracing::info!("Redis connection closed"),
      Err(e) => {
        let err = HelperError::store("close", e);
        match &self.on_error {
          Some(handler) => handler(&err),
          None => tracing::error!("Failed to close Redis connection: {}", err),
        }
      }
    }
    Ok(())
  }

  /// Helper bound to this handler's connection
  pub async fn create(&self, config: HelperConfig) -> Result<RedisHelper> {
    let store = self.instance().await?;
    let helper = RedisHelper::new(store, config)?;
    Ok(match &self.on_error {
      Some(handler) => helper.with_error_handler(handler.clone()),
      None => helper,
    })
  }
}

impl std::fmt::Debug for ConnectionHandler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ConnectionHandler")
      .field("external", &self.is_external())
      .finish()
  }
}
