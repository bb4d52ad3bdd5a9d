use redis::{Client, aio::MultiplexedConnection};
use tracing::info;

/// Shared Redis handle. The multiplexed connection is opened once and
/// cloned per caller; clones pipeline over the same socket.
#[derive(Clone)]
pub struct RedisService {
    conn: MultiplexedConnection,
}

impl RedisService {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = Client::open(connection_string)?;
        let conn = client.get_multiplexed_async_connection().await?;

        info!("✅ Connected to Redis");
        Ok(Self { conn })
    }

    pub fn get_conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }
}
