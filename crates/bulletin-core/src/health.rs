use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body of the API's `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub modules: Vec<String>,
}

pub trait HealthProbe {
    /// One probe of `<base_url>/health`. Any non-2xx answer is an error.
    fn check(&self, base_url: &str) -> Result<HealthStatus>;
}

/// Probe over HTTP with a blocking client.
pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeployError::HealthCheck {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl HealthProbe for HttpProbe {
    fn check(&self, base_url: &str) -> Result<HealthStatus> {
        let url = health_url(base_url);
        let fail = |reason: String| DeployError::HealthCheck {
            url: url.clone(),
            reason,
        };
        let resp = self.client.get(&url).send().map_err(|e| fail(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }
        resp.json::<HealthStatus>()
            .map_err(|e| fail(format!("unexpected body: {e}")))
    }
}

pub fn health_url(base_url: &str) -> String {
    format!("{}/health", base_url.trim_end_matches('/'))
}

/// Sleep `delay`, then probe up to `attempts` times, `interval` apart.
pub fn wait_healthy(
    probe: &dyn HealthProbe,
    base_url: &str,
    delay: Duration,
    attempts: u32,
    interval: Duration,
) -> Result<HealthStatus> {
    std::thread::sleep(delay);
    let attempts = attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match probe.check(base_url) {
            Ok(status) => return Ok(status),
            Err(e) => {
                tracing::warn!(attempt, attempts, error = %e, "health check failed");
                last_err = Some(e);
            }
        }
        if attempt < attempts {
            std::thread::sleep(interval);
        }
    }
    Err(last_err.unwrap_or_else(|| DeployError::HealthCheck {
        url: health_url(base_url),
        reason: "no attempts made".into(),
    }))
}
