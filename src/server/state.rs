//! Shared handler state.

use std::sync::Arc;

use crate::app::pipeline::{CentileCalculator, CentileOrchestrator};
use crate::config::Settings;
use crate::data::GrowthClient;
use crate::error::CentileError;
use crate::request::RequestBuilder;

#[derive(Clone)]
pub struct AppState {
    calculator: Option<Arc<dyn CentileCalculator>>,
    unavailable_reason: Arc<str>,
}

impl AppState {
    pub fn new(calculator: Arc<dyn CentileCalculator>) -> Self {
        Self {
            calculator: Some(calculator),
            unavailable_reason: Arc::from(""),
        }
    }

    /// State whose every calculation fails with a context error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            calculator: None,
            unavailable_reason: Arc::from(reason.into()),
        }
    }

    /// Wire the production calculator from settings.
    ///
    /// Must run outside an async context: the outbound client is blocking.
    /// A client that cannot be built leaves the server up but unavailable.
    pub fn from_settings(settings: &Settings) -> Self {
        match GrowthClient::new(settings.api_url.clone(), settings.api_key.clone(), settings.api_timeout) {
            Ok(client) => {
                if client.has_api_key() {
                    tracing::info!(endpoint = client.endpoint(), "growth API client ready");
                } else {
                    tracing::warn!(endpoint = client.endpoint(), "no API key configured; requests are unauthenticated");
                }
                let builder = RequestBuilder::new(settings.sex_policy.clone());
                Self::new(Arc::new(CentileOrchestrator::new(builder, client)))
            }
            Err(e) => {
                tracing::error!(error = %e, "growth API client unavailable");
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn calculator(&self) -> Result<Arc<dyn CentileCalculator>, CentileError> {
        self.calculator
            .clone()
            .ok_or_else(|| CentileError::ModuleContextUnavailable(self.unavailable_reason.to_string()))
    }
}
