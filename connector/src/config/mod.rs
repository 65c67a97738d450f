use serde::{Deserialize, Serialize};

use crate::api::config::ApiConfig;
use crate::store::StoreConfig;
use crate::utils::logger::LoggerConfig;

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,

    pub store: StoreConfig,

    pub logger: LoggerConfig,
}
