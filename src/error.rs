use std::{any::Any, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("No file uploaded")]
    MissingFile,

    #[error("Only JPEG, PNG, or WEBP images are supported")]
    UnsupportedMediaType,

    #[error("Image must be smaller than 4MB")]
    PayloadTooLarge,

    #[error("Malformed multipart body: {0}")]
    MalformedUpload(String),

    #[error("Prediction timed out ({}s limit)", .0.as_secs())]
    Timeout(Duration),

    #[error("API Error: {0}")]
    Upstream(String),

    #[error("Invalid response format from prediction API")]
    InvalidUpstreamResponse,

    #[error("{0}")]
    Network(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl GatewayError {
    /// Problems with the caller's upload. These are never retried or masked.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GatewayError::MissingFile
                | GatewayError::UnsupportedMediaType
                | GatewayError::PayloadTooLarge
                | GatewayError::MalformedUpload(_)
        )
    }

    /// Failures of the outbound call to the prediction service.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout(_)
                | GatewayError::Upstream(_)
                | GatewayError::InvalidUpstreamResponse
                | GatewayError::Network(_)
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingFile
            | GatewayError::UnsupportedMediaType
            | GatewayError::PayloadTooLarge
            | GatewayError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Upstream(_)
            | GatewayError::InvalidUpstreamResponse
            | GatewayError::Network(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = if self.is_upstream_failure() && !matches!(self, GatewayError::Timeout(_)) {
            ErrorBody {
                error: "Server error: fetch failed".to_string(),
                details: Some(self.to_string()),
            }
        } else if let GatewayError::Internal(ref source) = self {
            error!("Unhandled error while analyzing image: {source:?}");
            ErrorBody {
                error: "Internal server error".to_string(),
                details: None,
            }
        } else {
            ErrorBody {
                error: self.to_string(),
                details: None,
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Turns a handler panic into the generic 500 so callers still get a JSON body.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };

    GatewayError::Internal(format!("panic: {message}").into()).into_response()
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build prediction client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn render(err: GatewayError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_client_errors_are_bad_request() {
        let (status, body) = render(GatewayError::UnsupportedMediaType).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Only JPEG, PNG, or WEBP images are supported");
        assert!(body.get("details").is_none());

        let (status, body) = render(GatewayError::MissingFile).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file uploaded");

        let (status, _) = render(GatewayError::PayloadTooLarge).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_timeout_is_gateway_timeout() {
        let (status, body) = render(GatewayError::Timeout(Duration::from_secs(25))).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"], "Prediction timed out (25s limit)");
    }

    #[tokio::test]
    async fn test_upstream_failure_carries_details() {
        let (status, body) = render(GatewayError::Upstream("Model not loaded".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server error: fetch failed");
        assert_eq!(body["details"], "API Error: Model not loaded");

        let (status, body) = render(GatewayError::InvalidUpstreamResponse).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["details"], "Invalid response format from prediction API");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let source: Box<dyn std::error::Error + Send + Sync> = "stack trace here".into();
        let (status, body) = render(GatewayError::Internal(source)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_panic_payloads_become_internal_errors() {
        let payloads: [Box<dyn Any + Send>; 3] = [
            Box::new("boom"),
            Box::new(String::from("index out of bounds")),
            Box::new(42u8),
        ];
        for payload in payloads {
            let response = panic_response(payload);
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["error"], "Internal server error");
            assert!(body.get("details").is_none());
        }
    }

    #[test]
    fn test_classification_is_disjoint() {
        let errors = [
            GatewayError::MissingFile,
            GatewayError::UnsupportedMediaType,
            GatewayError::PayloadTooLarge,
            GatewayError::MalformedUpload("bad boundary".into()),
            GatewayError::Timeout(Duration::from_secs(1)),
            GatewayError::Upstream("down".into()),
            GatewayError::InvalidUpstreamResponse,
        ];

        for err in &errors {
            assert!(!(err.is_client_error() && err.is_upstream_failure()), "{err}");
        }
        assert!(errors[0].is_client_error());
        assert!(errors[4].is_upstream_failure());
    }
}
