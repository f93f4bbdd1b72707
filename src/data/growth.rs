//! Growth-reference calculation API integration.
//!
//! Each `MeasurementRequest` becomes exactly one POST. There are no retries at
//! this layer; callers decide whether a failed metric is worth another attempt.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

use crate::domain::{CentileValues, MeasurementRequest};
use crate::error::{ApiError, AppError};

pub const DEFAULT_API_URL: &str = "https://api.rcpch.ac.uk/growth/v1/uk-who/calculation";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Seam between the orchestrator and the remote calculator.
pub trait GrowthApi: Send + Sync {
    fn send(&self, request: &MeasurementRequest) -> Result<GrowthPayload, ApiError>;
}

/// Body posted to the calculator.
#[derive(Debug, Clone, Serialize)]
pub struct ObservationRequest<'a> {
    pub birth_date: String,
    pub observation_date: String,
    pub observation_value: f64,
    pub measurement_method: &'a str,
    pub sex: &'a str,
    pub gestation_weeks: i32,
    pub gestation_days: i32,
}

impl<'a> From<&'a MeasurementRequest> for ObservationRequest<'a> {
    fn from(r: &'a MeasurementRequest) -> Self {
        Self {
            birth_date: r.birth_date.to_string(),
            observation_date: r.observation_date.to_string(),
            observation_value: r.value,
            measurement_method: &r.measurement_method,
            sex: r.sex.as_str(),
            gestation_weeks: r.gestation_weeks,
            gestation_days: r.gestation_days,
        }
    }
}

/// Successful calculator response, decoded once at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GrowthPayload {
    #[serde(default)]
    pub measurement_calculated_values: Option<CalculatedValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CalculatedValues {
    #[serde(default)]
    pub centile: Option<f64>,
    #[serde(default)]
    pub sds: Option<f64>,
    #[serde(default)]
    pub centile_band: Option<String>,
    #[serde(default)]
    pub chronological_decimal_age_error: Option<String>,
    #[serde(default)]
    pub corrected_decimal_age: Option<f64>,
    #[serde(default)]
    pub clinician_comment: Option<String>,
}

impl From<GrowthPayload> for CentileValues {
    fn from(payload: GrowthPayload) -> Self {
        let v = payload.measurement_calculated_values.unwrap_or_default();
        CentileValues {
            centile: v.centile,
            sds: v.sds,
            centile_band: v.centile_band,
            age_error: v.chronological_decimal_age_error,
            corrected_age: v.corrected_decimal_age,
            clinical_advice: v.clinician_comment,
        }
    }
}

pub struct GrowthClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GrowthClient {
    /// Build a client with certificate verification on and a per-call timeout.
    ///
    /// Must be called outside an async context (blocking reqwest client).
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build growth API client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl GrowthApi for GrowthClient {
    fn send(&self, request: &MeasurementRequest) -> Result<GrowthPayload, ApiError> {
        let body = ObservationRequest::from(request);

        let mut req = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .json(&body);

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().map_err(|e| ApiError::Transport {
            message: format!("Growth API request failed: {e}"),
        })?;

        let status = resp.status().as_u16();
        let text = resp.text().map_err(|e| ApiError::Transport {
            message: format!("Failed to read growth API response: {e}"),
        })?;

        interpret_response(status, &text)
    }
}

/// Map a calculator HTTP response to a payload or a typed error.
pub fn interpret_response(status: u16, body: &str) -> Result<GrowthPayload, ApiError> {
    if status != 200 {
        return Err(ApiError::Upstream {
            status,
            message: upstream_message(body).unwrap_or_else(|| format!("API error: HTTP {status}")),
        });
    }

    serde_json::from_str(body).map_err(|e| ApiError::Malformed {
        message: e.to_string(),
    })
}

// Calculator errors carry `detail` (a string, or a list of validation
// entries with `msg`) or `message`.
fn upstream_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    if let Some(detail) = object.get("detail") {
        return match detail {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                    .collect();
                if msgs.is_empty() {
                    Some(detail.to_string())
                } else {
                    Some(msgs.join("; "))
                }
            }
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        };
    }

    object
        .get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}
