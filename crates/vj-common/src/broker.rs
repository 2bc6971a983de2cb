use redis::aio::MultiplexedConnection;
use thiserror::Error;
use tracing::info;

use crate::config::RedisConfig;

/// Shared handle to the Redis broker. Cheap to clone; every publisher,
/// consumer and the deduplicator hold their own clone.
pub type Broker = MultiplexedConnection;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid broker address: {0}")]
    InvalidAddr(redis::RedisError),
    #[error("broker connection failed: {0}")]
    Connect(redis::RedisError),
}

/// Open a multiplexed connection and verify it with a PING. Failure here is
/// fatal for every service, so callers bail out of startup on error.
pub async fn connect(cfg: &RedisConfig) -> Result<Broker, BrokerError> {
    let client = redis::Client::open(cfg.connection_url()).map_err(BrokerError::InvalidAddr)?;
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .map_err(BrokerError::Connect)?;

    let _: () = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .map_err(BrokerError::Connect)?;

    info!(addr = %cfg.addr, db = cfg.db, "broker connected");
    Ok(conn)
}
