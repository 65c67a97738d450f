use std::time::Duration;

pub use self::config::StoreConfig;
pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

mod config;
mod memory;
mod redis;

/// Short-lived key-value storage for OAuth handoff records.
///
/// Every read honours the expiry set at write time: an expired entry is
/// indistinguishable from a missing one.
#[derive(Clone)]
pub enum TransientStore {
    Redis(RedisStore),
    Memory(MemoryStore),
}

impl TransientStore {
    /// Uses Redis when `REDIS_URL` is set, otherwise the in-process store
    /// with a background sweep of expired entries.
    pub async fn from_env(config: &StoreConfig) -> anyhow::Result<Self> {
        match std::env::var("REDIS_URL") {
            Ok(url) => {
                tracing::info!("connecting to Redis...");
                let store = RedisStore::connect(&url).await?;
                tracing::info!("Redis connected");
                Ok(Self::Redis(store))
            }
            Err(_) => {
                tracing::warn!(
                    "REDIS_URL not set, staging OAuth records in process memory; \
                     do not run more than one instance"
                );
                let store = MemoryStore::default();
                tokio::spawn(memory::run_cleanup(store.clone(), config.cleanup_interval));
                Ok(Self::Memory(store))
            }
        }
    }

    pub async fn put(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        match self {
            Self::Redis(redis) => redis.put(key, value, ttl).await,
            Self::Memory(memory) => {
                memory.put(key, value, ttl);
                Ok(())
            }
        }
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        match self {
            Self::Redis(redis) => redis.get(key).await,
            Self::Memory(memory) => Ok(memory.get(key)),
        }
    }

    /// Returns whether a live entry was removed.
    pub async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        match self {
            Self::Redis(redis) => redis.delete(key).await,
            Self::Memory(memory) => Ok(memory.delete(key)),
        }
    }

    /// Atomically reads and removes an entry.
    pub async fn take(&self, key: &str) -> anyhow::Result<Option<String>> {
        match self {
            Self::Redis(redis) => redis.take(key).await,
            Self::Memory(memory) => Ok(memory.take(key)),
        }
    }
}

pub fn state_key(org_id: &str, user_id: &str) -> String {
    format!("state:{org_id}:{user_id}")
}

pub fn credentials_key(org_id: &str, user_id: &str) -> String {
    format!("credentials:{org_id}:{user_id}")
}
