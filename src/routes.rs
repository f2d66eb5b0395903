use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::GatewayError, gateway::Gateway, prediction::PredictionResult, upload::ImageUpload,
};

pub struct AppState {
    pub gateway: Gateway,
}

pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, GatewayError> {
    let multipart = multipart.map_err(|e| GatewayError::MalformedUpload(e.body_text()))?;
    let upload = ImageUpload::from_multipart(multipart).await?;

    let result = state.gateway.analyze(upload).await?;
    Ok(Json(result))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}
