use std::time::Duration;

use anyhow::Context;
use redis::AsyncCommands;

#[derive(Clone)]
pub struct RedisStore {
    client: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("failed to create Redis client")?;

        let manager = redis::aio::ConnectionManager::new(client)
            .await
            .context("failed to connect to Redis")?;

        Ok(Self { client: manager })
    }

    pub async fn put(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        // SETEX rejects a zero expiry.
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.client.clone();
        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .with_context(|| format!("failed to store `{key}` in Redis"))?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.client.clone();
        conn.get(key)
            .await
            .with_context(|| format!("failed to read `{key}` from Redis"))
    }

    pub async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let mut conn = self.client.clone();
        let deleted: i64 = conn
            .del(key)
            .await
            .with_context(|| format!("failed to delete `{key}` from Redis"))?;
        Ok(deleted > 0)
    }

    /// `GETDEL`, so two concurrent readers never both see the value.
    pub async fn take(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.client.clone();
        conn.get_del(key)
            .await
            .with_context(|| format!("failed to take `{key}` from Redis"))
    }
}
