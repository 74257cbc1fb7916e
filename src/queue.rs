use crate::config::RedisConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;

/// Names of the logical queues; the store itself is external.
#[derive(Debug, Clone)]
pub struct QueueNames {
    pub jobs: String,
    pub requested_jobs: String,
    pub requests: String,
    pub responses: String,
}

impl QueueNames {
    pub fn from_config(config: &RedisConfig) -> Self {
        Self {
            jobs: config.job_queue.clone(),
            requested_jobs: config.requested_job_queue.clone(),
            requests: config.request_queue.clone(),
            responses: config.response_queue.clone(),
        }
    }
}

/// Durable queue collaborator: named FIFO queues (push one end, pop the
/// other) plus a key/value side for rotating backup payloads. All mutation
/// goes through the store's own atomic primitives; no client-side locking.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn push(&self, queue: &str, payload: &str) -> Result<()>;
    async fn pop(&self, queue: &str) -> Result<Option<String>>;
    async fn len(&self, queue: &str) -> Result<usize>;
    /// Read the last `count` entries without removing them.
    async fn peek_last(&self, queue: &str, count: usize) -> Result<Vec<String>>;

    async fn kv_set(&self, key: &str, value: &str) -> Result<()>;
    async fn kv_get(&self, key: &str) -> Result<Option<String>>;
    async fn kv_keys(&self, pattern: &str) -> Result<Vec<String>>;
}

pub struct RedisStore {
    connection: redis::aio::MultiplexedConnection,
}

impl RedisStore {
    /// Connect at startup; an unreachable store is the one failure allowed
    /// to abort the process.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let url = format!("redis://{}:{}/", config.host, config.port);
        let client = redis::Client::open(url.as_str())
            .with_context(|| format!("invalid redis url {}", url))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .with_context(|| format!("cannot reach redis at {}", url))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl QueueStore for RedisStore {
    async fn push(&self, queue: &str, payload: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.lpush::<_, _, ()>(queue, payload).await?;
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        Ok(conn.rpop(queue, None).await?)
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        let mut conn = self.connection.clone();
        Ok(conn.llen(queue).await?)
    }

    async fn peek_last(&self, queue: &str, count: usize) -> Result<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection.clone();
        Ok(conn.lrange(queue, -(count as isize), -1).await?)
    }

    async fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        Ok(conn.get(key).await?)
    }

    async fn kv_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        Ok(conn.keys(pattern).await?)
    }
}
