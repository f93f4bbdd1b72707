//! Endpoint handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::Serialize;

use super::error::ServerError;
use super::state::AppState;
use crate::domain::{CalculationResponse, RawInput};
use crate::error::CentileError;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// POST /calculate
///
/// Checks run in a fixed order: calculator availability, empty body, JSON
/// syntax, then the calculation itself (which validates required fields).
pub async fn calculate(State(state): State<AppState>, body: Bytes) -> Result<Json<CalculationResponse>, ServerError> {
    let calculator = state.calculator()?;

    let input = parse_input(&body)?;

    let result = tokio::task::spawn_blocking(move || calculator.calculate(&input))
        .await
        .map_err(|e| ServerError::Internal(format!("Calculation task failed: {e}")))?;

    match result {
        Ok(results) => Ok(Json(CalculationResponse::success(results))),
        Err(e) => {
            tracing::info!(error = %e, "calculation rejected");
            Err(e.into())
        }
    }
}

fn parse_input(body: &[u8]) -> Result<RawInput, CentileError> {
    if body.is_empty() {
        return Err(CentileError::InvalidInput("No input data received".to_string()));
    }

    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| CentileError::InvalidInput(format!("Invalid JSON: {e}")))?;

    // `null` carries no fields; required-field validation reports it.
    if value.is_null() {
        return Ok(RawInput::default());
    }

    serde_json::from_value(value).map_err(|e| CentileError::InvalidInput(format!("Invalid JSON: {e}")))
}
