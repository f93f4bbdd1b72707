use thiserror::Error;

use crate::domain::FormatHint;

/// Process-level failure for the `centile` binary.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failures that abort a whole calculation cycle.
///
/// None of these are per-metric: they are reported once, as the top-level
/// `error` of the response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CentileError {
    #[error("Date cannot be empty")]
    EmptyDate,

    #[error("Invalid date format: {raw} (hint: {})", hint_label(.hint))]
    InvalidDateFormat {
        raw: String,
        hint: Option<FormatHint>,
    },

    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("No valid measurements provided")]
    NoMeasurementsProvided,

    #[error("Invalid sex code: {0}")]
    InvalidSexCode(String),

    /// The request body could not be read as a calculation request.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Module initialization failed: {0}")]
    ModuleContextUnavailable(String),
}

impl CentileError {
    /// HTTP status used when this error is returned by the endpoint.
    pub fn status_code(&self) -> u16 {
        match self {
            CentileError::ModuleContextUnavailable(_) => 500,
            _ => 400,
        }
    }
}

fn hint_label(hint: &Option<FormatHint>) -> &'static str {
    hint.map(FormatHint::as_str).unwrap_or("none")
}

/// Failure of a single call to the external growth calculator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Connection failure, timeout, or an unreadable response stream.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Non-200 status; `message` is taken from the body when it carries one.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid JSON response from API: {message}")]
    Malformed { message: String },
}
