use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart},
    http::StatusCode,
};
use tracing::debug;

use crate::error::GatewayError;

pub const MAX_UPLOAD_BYTES: usize = 4 * 1024 * 1024;
pub const SUPPORTED_MEDIA_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

const FILE_FIELD: &str = "file";

/// An image that has passed media type and size checks.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    file_name: Option<String>,
    content_type: String,
    data: Bytes,
}

pub fn check_media_type(content_type: Option<&str>) -> Result<(), GatewayError> {
    let content_type = content_type.ok_or(GatewayError::UnsupportedMediaType)?;
    let supported = SUPPORTED_MEDIA_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(content_type.trim()));

    if supported {
        Ok(())
    } else {
        Err(GatewayError::UnsupportedMediaType)
    }
}

pub fn check_size(len: usize) -> Result<(), GatewayError> {
    if len > MAX_UPLOAD_BYTES {
        return Err(GatewayError::PayloadTooLarge);
    }
    Ok(())
}

impl ImageUpload {
    pub fn new(
        file_name: Option<String>,
        content_type: Option<&str>,
        data: Bytes,
    ) -> Result<Self, GatewayError> {
        check_media_type(content_type)?;
        check_size(data.len())?;

        Ok(Self {
            file_name,
            content_type: content_type.unwrap_or_default().trim().to_ascii_lowercase(),
            data,
        })
    }

    /// Pulls the first `file` field out of the form. The media type is checked before the bytes are read.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, GatewayError> {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }

            let file_name = field.file_name().map(str::to_owned);
            let content_type = field.content_type().map(str::to_owned);
            check_media_type(content_type.as_deref())?;

            let data = field.bytes().await.map_err(multipart_error)?;
            debug!(
                "Received {} ({} bytes, {})",
                file_name.as_deref().unwrap_or("unnamed file"),
                data.len(),
                content_type.as_deref().unwrap_or_default()
            );

            return Self::new(file_name, content_type.as_deref(), data);
        }

        Err(GatewayError::MissingFile)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn multipart_error(err: MultipartError) -> GatewayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::PayloadTooLarge
    } else {
        GatewayError::MalformedUpload(err.body_text())
    }
}
