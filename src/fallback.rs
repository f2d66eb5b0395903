use std::sync::Arc;

use crate::{config::DeploymentMode, error::GatewayError, prediction::PredictionResult};

/// Decides whether a failed prediction may be replaced with substitute data.
pub trait Fallback: Send + Sync {
    fn substitute(&self, error: &GatewayError) -> Option<PredictionResult>;
}

/// Every failure reaches the caller.
pub struct Strict;

impl Fallback for Strict {
    fn substitute(&self, _error: &GatewayError) -> Option<PredictionResult> {
        None
    }
}

/// Serves a fixed result whenever the prediction service fails. Input errors still propagate.
pub struct CannedPrediction {
    result: PredictionResult,
}

impl CannedPrediction {
    pub fn new(result: PredictionResult) -> Self {
        Self { result }
    }
}

impl Default for CannedPrediction {
    fn default() -> Self {
        Self::new(PredictionResult::canned())
    }
}

impl Fallback for CannedPrediction {
    fn substitute(&self, error: &GatewayError) -> Option<PredictionResult> {
        if error.is_client_error() {
            return None;
        }
        error.is_upstream_failure().then(|| self.result.clone())
    }
}

pub fn for_mode(mode: DeploymentMode) -> Arc<dyn Fallback> {
    if mode.allows_fallback() {
        Arc::new(CannedPrediction::default())
    } else {
        Arc::new(Strict)
    }
}
