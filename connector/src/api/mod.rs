use anyhow::Context;

use crate::api::config::ApiSecrets;
use crate::api::state::ApiState;
use crate::config::AppConfig;
use crate::store::TransientStore;

pub mod config;
pub mod controllers;
pub mod endpoint;
pub mod models;
pub mod state;

pub async fn http_service(config: AppConfig) -> anyhow::Result<()> {
    let secrets = ApiSecrets::from_env()?;
    let store = TransientStore::from_env(&config.store).await?;

    tracing::info!(listen_addr = %config.api.listen_addr, "API server starting...");

    let state = ApiState::builder()
        .with_config(config.api)
        .with_store_config(config.store)
        .with_http_client(reqwest::Client::new())
        .with_store(store)
        .with_secrets(secrets)
        .build();

    let endpoint = state.bind_endpoint().await?;

    endpoint.serve().await.context("API server failed")?;
    tracing::info!("API server stopped");

    Ok(())
}
