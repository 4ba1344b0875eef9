//! Namespaced JSON cache helper over Redis
//!
//! ```no_run
//! # async fn run() -> redis_helper::Result<()> {
//! use redis_helper::{ConnectionConfig, ConnectionHandler, FindParams, HelperConfig};
//!
//! let connection = ConnectionHandler::from_config(ConnectionConfig::new("localhost", 6379));
//! let helper = connection.create(HelperConfig::new("app", 60)).await?;
//!
//! helper.set("a", 1).await?;
//! let found = helper.find(FindParams::<i64>::pattern("a*")).await?;
//! assert_eq!(found[0].key, "a");
//!
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod filter;
pub mod helper;
pub mod key;
pub mod options;
pub mod scan;
pub mod store;
pub mod value;

pub use config::{Config, ConnectionConfig, ExpireUnit, HelperConfig};
pub use connection::{ConnectionHandler, Connector};
pub use error::{log_error_handler, ErrorHandler, ErrorKind, HelperError, Result, StoreError};
pub use filter::{FindParams, KeyFilter};
pub use helper::{RedisHelper, SearchEntry, SearchResults};
pub use options::HelperOptions;
pub use scan::KeyValue;
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use store::{MemoryStore, RemoteStore};
pub use value::Deferred;
