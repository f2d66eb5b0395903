use std::{future::Future, time::Duration};

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use tracing::{error, info};

use crate::{
    error::GatewayError,
    prediction::{upstream_error_message, PredictionResult},
    upload::ImageUpload,
};

const DEFAULT_FILE_NAME: &str = "image";

/// Anything that can classify an already validated image.
#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict(&self, upload: &ImageUpload) -> Result<PredictionResult, GatewayError>;
}

/// Time limit for a single outbound call. Expiry drops the call, which aborts the request.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    limit: Duration,
}

impl Deadline {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub async fn run<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.limit)),
        }
    }
}

/// Forwards images to the remote prediction API as a fresh multipart form.
pub struct HttpPredictionService {
    client: Client,
    endpoint: String,
}

impl HttpPredictionService {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn form(upload: &ImageUpload) -> Result<Form, GatewayError> {
        let file_name = upload.file_name().unwrap_or(DEFAULT_FILE_NAME).to_string();
        let part = Part::bytes(upload.data().to_vec())
            .file_name(file_name)
            .mime_str(upload.content_type())?;

        Ok(Form::new().part("file", part))
    }
}

#[async_trait]
impl PredictionService for HttpPredictionService {
    async fn predict(&self, upload: &ImageUpload) -> Result<PredictionResult, GatewayError> {
        info!("Forwarding {} byte image to {}", upload.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(Self::form(upload)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            error!("API responded with status: {status}");
            return Err(GatewayError::Upstream(upstream_error_message(&body)));
        }

        PredictionResult::from_upstream_body(&body)
    }
}
