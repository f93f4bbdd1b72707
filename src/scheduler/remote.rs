//! Remote-call boundary between the form scheduler and the calculator.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;

use crate::app::pipeline::CentileCalculator;
use crate::domain::{CalculationResponse, RawInput};
use crate::error::{ApiError, AppError};

pub trait RemoteCalculator {
    /// Transport and HTTP failures are errors; a top-level calculation failure
    /// comes back as `Ok` with `success: false`.
    fn calculate(&self, snapshot: &RawInput) -> Result<CalculationResponse, ApiError>;
}

/// Posts the form snapshot to the calculation endpoint.
pub struct HttpCalculator {
    client: Client,
    url: String,
}

impl HttpCalculator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build calculation client: {e}")))?;
        Ok(Self { client, url: url.into() })
    }
}

impl RemoteCalculator for HttpCalculator {
    fn calculate(&self, snapshot: &RawInput) -> Result<CalculationResponse, ApiError> {
        let resp = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .json(snapshot)
            .send()
            .map_err(|e| ApiError::Transport {
                message: format!("Calculation request failed: {e}"),
            })?;

        let status = resp.status();
        let text = resp.text().map_err(|e| ApiError::Transport {
            message: format!("Failed to read calculation response: {e}"),
        })?;

        if !status.is_success() {
            // Top-level failures still carry `{success:false, error}`.
            let message = serde_json::from_str::<CalculationResponse>(&text)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Malformed { message: e.to_string() })
    }
}

/// Calls an in-process calculator; used when the form and the calculator
/// share a process, and in tests.
pub struct LocalCalculator<'a> {
    calculator: &'a dyn CentileCalculator,
}

impl<'a> LocalCalculator<'a> {
    pub fn new(calculator: &'a dyn CentileCalculator) -> Self {
        Self { calculator }
    }
}

impl RemoteCalculator for LocalCalculator<'_> {
    fn calculate(&self, snapshot: &RawInput) -> Result<CalculationResponse, ApiError> {
        Ok(CalculationResponse::from_result(&self.calculator.calculate(snapshot)))
    }
}
