use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// In-process stand-in for Redis. Entries are only visible to this process.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
}

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

impl MemoryStore {
    pub fn put(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(key.to_owned(), Entry {
            value: value.to_owned(),
            expires_at: Instant::now() + ttl,
        });
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Some(entry.value.clone());
            }
        }

        // Drop the stale entry unless it was overwritten meanwhile.
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries
            .remove(key)
            .is_some_and(|(_, entry)| entry.is_live(Instant::now()))
    }

    pub fn take(&self, key: &str) -> Option<String> {
        let (_, entry) = self.entries.remove(key)?;
        entry.is_live(Instant::now()).then_some(entry.value)
    }

    /// Drops every expired entry, read or not.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Periodically evicts entries of abandoned flows.
pub async fn run_cleanup(store: MemoryStore, interval: Duration) {
    // `interval` panics on a zero period.
    let mut interval = tokio::time::interval(interval.max(Duration::from_secs(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let removed = store.cleanup_expired();
        tracing::debug!(removed, remaining = store.len(), "memory store cleanup complete");
    }
}
