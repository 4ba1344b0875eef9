use anyhow::ensure;
use clap::{Parser, Subcommand};
use redis_helper::{
  log_error_handler, Config, ConnectionHandler, FindParams, HelperConfig, RedisHelper,
  RedisStore,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "redis-helper", about = "Redis helper operator tool", version)]
struct Args {
  #[arg(long, env = "REDIS_HOST")]
  host: Option<String>,
  #[arg(long, env = "REDIS_PORT")]
  port: Option<u16>,
  #[arg(short, long)]
  config: Option<String>,
  #[arg(long)]
  prefix: Option<String>,
  #[arg(long)]
  log_level: Option<String>,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Check that the server answers
  Ping,
  /// Run the round-trip scenario against the server
  Check {
    /// Default expiration in seconds for the scenario's keys
    #[arg(long, default_value_t = 5)]
    expire: i64,
  },
  /// Print records matching a key pattern as JSON
  Keys {
    #[arg(default_value = "*")]
    pattern: String,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Sample {
  k: String,
  v: i64,
  x: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
  let args = Args::parse();

  // Load config: explicit path > auto-detect > defaults
  let mut config = if let Some(path) = &args.config {
    Config::from_file(path)?
  } else {
    Config::find_and_load()?.unwrap_or_default()
  };

  // CLI args override config file
  if let Some(host) = args.host {
    config.connection.host = host;
  }
  if let Some(port) = args.port {
    config.connection.port = port;
  }
  if let Some(prefix) = args.prefix {
    config.helper.prefix = prefix;
  }
  if let Some(level) = args.log_level {
    config.logging.level = level;
  }

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  tracing::info!(
    "Connecting to {}:{}",
    config.connection.host,
    config.connection.port
  );
  if let Command::Ping = args.command {
    let store = RedisStore::connect(&config.connection).await?;
    store.ping().await?;
    tracing::info!("PONG");
    return Ok(());
  }

  let connection = ConnectionHandler::from_config(config.connection.clone())
    .with_error_handler(log_error_handler());

  let outcome = match args.command {
    Command::Check { expire } => {
      let prefix = if config.helper.prefix.is_empty() {
        "test".to_string()
      } else {
        config.helper.prefix.clone()
      };
      let helper = connection.create(HelperConfig::new(prefix, expire)).await?;
      check(&helper, expire).await
    }
    Command::Keys { pattern } => {
      let helper = connection.create(config.helper.clone()).await?;
      keys(&helper, pattern).await
    }
    Command::Ping => Ok(()),
  };

  connection.close().await?;
  outcome
}

async fn check(helper: &RedisHelper, expire: i64) -> anyhow::Result<()> {
  tracing::info!("del first");
  helper.del("a").await?;

  tracing::info!("try_get");
  let a = helper.try_get("a", 123i64).await?;
  ensure!(a == 123, "try_get returned {}", a);

  tracing::info!("try_get previous value");
  let a = helper.try_get("a", 321i64).await?;
  ensure!(a == 123, "try_get returned {}", a);

  if expire > 0 {
    tracing::info!("try_get after expiry");
    tokio::time::sleep(Duration::from_secs(expire.unsigned_abs() + 1)).await;
    let a = helper.try_get("a", 333i64).await?;
    ensure!(a == 333, "try_get returned {}", a);
  }

  tracing::info!("del existing key");
  let d = helper.del("a").await?;
  ensure!(d == 1, "del removed {}", d);

  tracing::info!("get missing");
  let a = helper.get::<i64>("a").await?;
  ensure!(a.is_none(), "get returned {:?}", a);

  tracing::info!("del and incr");
  helper.del("i").await?;
  let i = helper.incr("i").await?;
  ensure!(i == 1, "incr returned {}", i);
  let i = helper.incr("i").await?;
  ensure!(i == 2, "incr returned {}", i);
  let i = helper.get::<i64>("i").await?;
  ensure!(i == Some(2), "get returned {:?}", i);

  let sample = Sample {
    k: "foo".into(),
    v: 123,
    x: true,
  };

  tracing::info!("set object");
  let stored = helper.set("b", sample.clone()).await?;
  ensure!(stored == sample, "set returned {:?}", stored);

  tracing::info!("get object");
  let read = helper.get::<Sample>("b").await?;
  ensure!(read.as_ref() == Some(&sample), "get returned {:?}", read);

  tracing::info!("find all");
  let all = helper
    .find(FindParams::<serde_json::Value>::pattern("*"))
    .await?;
  ensure!(all.len() > 1, "find returned {} records", all.len());

  tracing::info!("find object by key");
  let found = helper.find(FindParams::<Sample>::pattern("b*")).await?;
  ensure!(
    found.len() == 1 && found[0].key == "b" && found[0].value == sample,
    "find returned {:?}",
    found
  );

  let full_key = helper.key("b");
  tracing::info!("del object by del_many");
  let deleted = helper
    .del_many(FindParams::<serde_json::Value>::new().filter(move |key, _| key == full_key))
    .await?;
  ensure!(deleted == 1, "del_many removed {}", deleted);

  tracing::info!("get deleted object");
  let read = helper.get::<Sample>("b").await?;
  ensure!(read.is_none(), "get returned {:?}", read);

  tracing::info!("clear");
  helper.clear().await?;
  let rest = helper.search("*").await?;
  ensure!(rest.is_empty(), "{} keys left after clear", rest.len());

  tracing::info!("Ok");
  Ok(())
}

async fn keys(helper: &RedisHelper, pattern: String) -> anyhow::Result<()> {
  let records = helper
    .find(FindParams::<serde_json::Value>::pattern(pattern))
    .await?;
  println!("{}", serde_json::to_string_pretty(&records)?);
  Ok(())
}
