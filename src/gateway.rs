use std::sync::Arc;

use tracing::{error, warn};

use crate::{
    error::GatewayError,
    fallback::Fallback,
    prediction::PredictionResult,
    upload::ImageUpload,
    upstream::{Deadline, PredictionService},
};

/// Stateless per-request pipeline: forward under a deadline, normalize, or fall back.
pub struct Gateway {
    service: Arc<dyn PredictionService>,
    deadline: Deadline,
    fallback: Arc<dyn Fallback>,
}

impl Gateway {
    pub fn new(
        service: Arc<dyn PredictionService>,
        deadline: Deadline,
        fallback: Arc<dyn Fallback>,
    ) -> Self {
        Self {
            service,
            deadline,
            fallback,
        }
    }

    pub async fn analyze(&self, upload: ImageUpload) -> Result<PredictionResult, GatewayError> {
        let outcome = self.deadline.run(self.service.predict(&upload)).await;

        match outcome {
            Ok(result) => Ok(result.normalized()),
            Err(err) => {
                error!("Fetch error: {err}");
                match self.fallback.substitute(&err) {
                    Some(canned) => {
                        warn!("Using canned prediction as fallback");
                        Ok(canned)
                    }
                    None => Err(err),
                }
            }
        }
    }
}
