//! Handler errors rendered as `{success: false, error}` bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::domain::CalculationResponse;
use crate::error::CentileError;

#[derive(Debug)]
pub enum ServerError {
    Calculation(CentileError),
    Internal(String),
}

impl From<CentileError> for ServerError {
    fn from(e: CentileError) -> Self {
        ServerError::Calculation(e)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::Calculation(e) => {
                let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, e.to_string())
            }
            ServerError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(CalculationResponse::failure(message))).into_response()
    }
}
