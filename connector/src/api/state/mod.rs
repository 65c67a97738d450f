use std::sync::Arc;

use reqwest::Client as HttpClient;
use tokio::net::TcpListener;

use crate::api::config::{ApiConfig, ApiSecrets};
use crate::api::endpoint::ApiEndpoint;
use crate::store::{StoreConfig, TransientStore};

pub struct ApiStateBuilder<MandatoryFields = (HttpClient, TransientStore, ApiSecrets)> {
    config: ApiConfig,
    store_config: StoreConfig,
    mandatory_fields: MandatoryFields,
}

impl ApiStateBuilder {
    pub fn build(self) -> ApiState {
        let (http_client, store, secrets) = self.mandatory_fields;

        ApiState {
            inner: Arc::new(Inner {
                config: self.config,
                store_config: self.store_config,
                secrets,
                http_client,
                store,
            }),
        }
    }
}

impl<T2, T3> ApiStateBuilder<((), T2, T3)> {
    pub fn with_http_client(self, http_client: HttpClient) -> ApiStateBuilder<(HttpClient, T2, T3)> {
        let (_, store, secrets) = self.mandatory_fields;

        ApiStateBuilder {
            config: self.config,
            store_config: self.store_config,
            mandatory_fields: (http_client, store, secrets),
        }
    }
}

impl<T1, T3> ApiStateBuilder<(T1, (), T3)> {
    pub fn with_store(self, store: TransientStore) -> ApiStateBuilder<(T1, TransientStore, T3)> {
        let (http_client, _, secrets) = self.mandatory_fields;

        ApiStateBuilder {
            config: self.config,
            store_config: self.store_config,
            mandatory_fields: (http_client, store, secrets),
        }
    }
}

impl<T1, T2> ApiStateBuilder<(T1, T2, ())> {
    pub fn with_secrets(self, secrets: ApiSecrets) -> ApiStateBuilder<(T1, T2, ApiSecrets)> {
        let (http_client, store, _) = self.mandatory_fields;

        ApiStateBuilder {
            config: self.config,
            store_config: self.store_config,
            mandatory_fields: (http_client, store, secrets),
        }
    }
}

impl<T1, T2, T3> ApiStateBuilder<(T1, T2, T3)> {
    pub fn with_config(self, config: ApiConfig) -> ApiStateBuilder<(T1, T2, T3)> {
        ApiStateBuilder { config, ..self }
    }

    pub fn with_store_config(self, store_config: StoreConfig) -> ApiStateBuilder<(T1, T2, T3)> {
        ApiStateBuilder {
            store_config,
            ..self
        }
    }
}

#[derive(Clone)]
#[repr(transparent)]
pub struct ApiState {
    inner: Arc<Inner>,
}

impl ApiState {
    pub fn builder() -> ApiStateBuilder<((), (), ())> {
        ApiStateBuilder {
            config: ApiConfig::default(),
            store_config: StoreConfig::default(),
            mandatory_fields: ((), (), ()),
        }
    }

    pub async fn bind_socket(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(self.config().listen_addr).await
    }

    pub async fn bind_endpoint(&self) -> anyhow::Result<ApiEndpoint> {
        ApiEndpoint::builder().bind(self.clone()).await
    }

    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    pub fn store_config(&self) -> &StoreConfig {
        &self.inner.store_config
    }

    pub fn secrets(&self) -> &ApiSecrets {
        &self.inner.secrets
    }

    pub fn http_client(&self) -> &HttpClient {
        &self.inner.http_client
    }

    pub fn store(&self) -> &TransientStore {
        &self.inner.store
    }
}

struct Inner {
    config: ApiConfig,
    store_config: StoreConfig,
    secrets: ApiSecrets,
    http_client: HttpClient,
    store: TransientStore,
}
