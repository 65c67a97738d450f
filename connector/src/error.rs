use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    /// The caller sent something we cannot act on.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// The provider answered with a non-success status.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("transient store failure: {0:#}")]
    Store(anyhow::Error),

    #[error("malformed staged record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConnectorError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Drains a non-success provider response into an error.
    pub async fn from_upstream(response: reqwest::Response) -> Self {
        let status = response.status();
        match response.text().await {
            Ok(body) => Self::Upstream { status, body },
            Err(e) => Self::Transport(e),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { status, .. } => *status,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ConnectorError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, "request failed: {self}");
        } else {
            tracing::warn!(%status, "request rejected: {self}");
        }

        let body = match self {
            Self::Upstream { body, .. } => body,
            Self::Store(_) | Self::Serialization(_) => "Internal server error".to_owned(),
            other => other.to_string(),
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_is_passed_through() {
        let err = ConnectorError::Upstream {
            status: StatusCode::UNAUTHORIZED,
            body: r#"{"status":"error","message":"expired"}"#.to_owned(),
        };
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn store_failures_hide_details() {
        let err = ConnectorError::Store(anyhow::anyhow!("connection refused"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Internal server error");
    }

    #[test]
    fn validation_errors_are_client_errors() {
        assert_eq!(
            ConnectorError::bad_request("missing code or state").status(),
            StatusCode::BAD_REQUEST
        );
        assert!(
            ConnectorError::not_found("no credentials found")
                .status()
                .is_client_error()
        );
    }
}
