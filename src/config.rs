use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::info;

use crate::{error::ConfigError, upload::MAX_UPLOAD_BYTES};

const DEFAULT_PREDICTION_URL: &str = "https://skin-disease-api-j0l8.onrender.com/predict/";

/// Which failure policy the deployment runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Production,
    Development,
    Preview,
}

impl DeploymentMode {
    /// Non-production deployments may serve canned data when the prediction service is unreachable.
    pub fn allows_fallback(self) -> bool {
        matches!(self, DeploymentMode::Development | DeploymentMode::Preview)
    }
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(DeploymentMode::Production),
            "development" => Ok(DeploymentMode::Development),
            "preview" => Ok(DeploymentMode::Preview),
            other => Err(format!(
                "unknown deployment mode '{other}', expected production, development or preview"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub prediction_url: String,
    pub prediction_timeout: Duration,
    pub deployment_mode: DeploymentMode,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let body_limit_mb: usize = try_load("BODY_LIMIT_MB", "5")?;
        let timeout_secs: u64 = try_load("PREDICTION_TIMEOUT_SECS", "25")?;

        Ok(Self {
            port: try_load("PORT", "5020")?,
            body_limit_bytes: body_limit_bytes(body_limit_mb)?,
            prediction_url: try_load("PREDICTION_API_URL", DEFAULT_PREDICTION_URL)?,
            prediction_timeout: Duration::from_secs(timeout_secs),
            deployment_mode: try_load("DEPLOYMENT_MODE", "production")?,
        })
    }
}

/// The transport limit must leave room for a maximum size image plus its multipart envelope.
fn body_limit_bytes(mb: usize) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: "BODY_LIMIT_MB",
        value: mb.to_string(),
        reason: reason.to_string(),
    };

    let bytes = mb
        .checked_mul(1024 * 1024)
        .ok_or_else(|| invalid("limit overflows"))?;
    if bytes <= MAX_UPLOAD_BYTES {
        return Err(invalid("must be larger than the 4 MiB image limit"));
    }
    Ok(bytes)
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_mode_parsing() {
        assert_eq!("production".parse(), Ok(DeploymentMode::Production));
        assert_eq!("Development".parse(), Ok(DeploymentMode::Development));
        assert_eq!(" PREVIEW ".parse(), Ok(DeploymentMode::Preview));
        assert!("staging".parse::<DeploymentMode>().is_err());
    }

    #[test]
    fn test_only_non_production_allows_fallback() {
        assert!(!DeploymentMode::Production.allows_fallback());
        assert!(DeploymentMode::Development.allows_fallback());
        assert!(DeploymentMode::Preview.allows_fallback());
    }

    #[test]
    fn test_body_limit_must_exceed_image_limit() {
        assert_eq!(body_limit_bytes(5).unwrap(), 5 * 1024 * 1024);
        assert!(body_limit_bytes(4).is_err());
        assert!(body_limit_bytes(0).is_err());

        let err = body_limit_bytes(usize::MAX).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_try_load_uses_default_and_reports_bad_values() {
        let port: u16 = try_load("SKIN_SCAN_TEST_UNSET_PORT", "5020").unwrap();
        assert_eq!(port, 5020);

        let err = try_load::<u16>("SKIN_SCAN_TEST_UNSET_PORT", "not-a-port").unwrap_err();
        assert!(err.to_string().contains("SKIN_SCAN_TEST_UNSET_PORT"));
    }
}
