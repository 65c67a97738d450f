use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long an issued OAuth state stays redeemable.
    ///
    /// Default: `10m`
    #[serde(with = "humantime_serde")]
    pub state_ttl: Duration,

    /// How long exchanged credentials wait for pickup.
    ///
    /// Default: `10m`
    #[serde(with = "humantime_serde")]
    pub credentials_ttl: Duration,

    /// How often the in-process store evicts expired entries.
    ///
    /// Default: `1m`
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_ttl: Duration::from_secs(600),
            credentials_ttl: Duration::from_secs(600),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}
