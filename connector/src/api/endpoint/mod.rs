use std::time::Duration;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tokio::net::TcpListener;

use crate::api::controllers;
use crate::api::state::*;

pub struct ApiEndpointBuilder {
    healthcheck_route: Option<String>,
    request_timeout: Duration,
}

impl Default for ApiEndpointBuilder {
    fn default() -> Self {
        Self {
            healthcheck_route: Some("/".to_owned()),
            request_timeout: Duration::from_secs(25),
        }
    }
}

impl ApiEndpointBuilder {
    pub async fn bind(self, state: ApiState) -> Result<ApiEndpoint> {
        let listener = state.bind_socket().await?;
        Ok(ApiEndpoint {
            listener,
            router: self.build_router(state),
        })
    }

    pub fn build_router(self, state: ApiState) -> axum::Router<()> {
        use tower::ServiceBuilder;
        use tower_http::cors::CorsLayer;
        use tower_http::timeout::TimeoutLayer;

        let mut router = axum::Router::new();
        if let Some(route) = &self.healthcheck_route {
            router = router.route(route, get(health_check));
        }
        let router = router.nest("/integrations/hubspot", integration_router());

        // Prepare middleware
        let service = ServiceBuilder::new()
            .layer(DefaultBodyLimit::max(MAX_REQUEST_SIZE))
            .layer(CorsLayer::permissive())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.request_timeout,
            ));

        #[cfg(feature = "compression")]
        let service = service.layer(tower_http::compression::CompressionLayer::new().gzip(true));

        router.layer(service).with_state(state)
    }
}

pub struct ApiEndpoint {
    listener: TcpListener,
    router: axum::Router<()>,
}

impl ApiEndpoint {
    pub fn builder() -> ApiEndpointBuilder {
        ApiEndpointBuilder::default()
    }

    pub async fn serve(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }
}

fn integration_router<S>() -> axum::Router<S>
where
    ApiState: FromRef<S>,
    S: Clone + Send + Sync + 'static,
{
    axum::Router::new()
        .route("/authorize", post(controllers::integration::authorize))
        .route("/oauth2callback", get(controllers::integration::oauth2_callback))
        .route("/credentials", post(controllers::integration::credentials))
        .route("/load", post(controllers::integration::load_items))
}

fn health_check() -> futures_util::future::Ready<impl IntoResponse> {
    futures_util::future::ready(chrono::Utc::now().timestamp_millis().to_string())
}

const MAX_REQUEST_SIZE: usize = 2 << 17; // 256kb
