use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::GatewayError;

/// The closed set of labels the prediction service is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Acne,
    Eczema,
    Psoriasis,
    Warts,
    SkinCancer,
    UnknownNormal,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Acne,
        Category::Eczema,
        Category::Psoriasis,
        Category::Warts,
        Category::SkinCancer,
        Category::UnknownNormal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Acne => "Acne",
            Category::Eczema => "Eczema",
            Category::Psoriasis => "Psoriasis",
            Category::Warts => "Warts",
            Category::SkinCancer => "SkinCancer",
            Category::UnknownNormal => "Unknown_Normal",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.as_str() == label)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub prediction: String,
    pub confidence_percentages: BTreeMap<String, f64>,
}

/// Upstream success body before the required fields are checked.
#[derive(Deserialize)]
struct UpstreamPrediction {
    prediction: Option<String>,
    confidence_percentages: Option<BTreeMap<String, f64>>,
}

/// Values at or below 1 are fractions and get scaled; the result is clamped to `[0, 100]`.
pub fn normalize_confidence(value: f64) -> f64 {
    let scaled = if value <= 1.0 { value * 100.0 } else { value };
    scaled.clamp(0.0, 100.0)
}

impl PredictionResult {
    pub fn from_upstream_body(body: &[u8]) -> Result<Self, GatewayError> {
        let parsed: UpstreamPrediction = serde_json::from_slice(body).map_err(|e| {
            warn!("Unparseable prediction response: {e}");
            GatewayError::InvalidUpstreamResponse
        })?;

        let prediction = parsed
            .prediction
            .filter(|p| !p.is_empty())
            .ok_or(GatewayError::InvalidUpstreamResponse)?;
        let confidence_percentages = parsed
            .confidence_percentages
            .ok_or(GatewayError::InvalidUpstreamResponse)?;

        if Category::from_label(&prediction).is_none() {
            warn!("Prediction service returned unrecognized label '{prediction}'");
        }

        Ok(Self {
            prediction,
            confidence_percentages,
        })
    }

    /// Each confidence is judged on its own, so mixed fraction/percentage maps are fixed per entry.
    pub fn normalized(mut self) -> Self {
        for value in self.confidence_percentages.values_mut() {
            *value = normalize_confidence(*value);
        }
        self
    }

    /// Fixed result served in place of upstream failures outside production.
    pub fn canned() -> Self {
        let confidences = [0.05, 0.85, 0.04, 0.02, 0.01, 0.03];

        Self {
            prediction: Category::Eczema.as_str().to_string(),
            confidence_percentages: Category::ALL
                .iter()
                .zip(confidences)
                .map(|(category, confidence)| (category.as_str().to_string(), confidence))
                .collect(),
        }
    }
}

/// Best-effort human readable message from a failed upstream response body.
pub fn upstream_error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
            Some(detail) if !is_falsy(detail) => detail.to_string(),
            _ => Value::Object(map.clone()).to_string(),
        },
        Ok(other) => other.to_string(),
        Err(e) => {
            warn!("Error parsing error response: {e}");
            "API request failed".to_string()
        }
    }
}

/// `null`, `false`, `0` and `""` count as an absent detail.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
